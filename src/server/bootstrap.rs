use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::agreement::{LocalAgreement, QuorumAgreement, RandomAgreement};
use crate::config::GameConfig;
use crate::game::GameEngine;

use super::routes::ChainAuditServer;

const LOG_TARGET: &str = "chain_audit::server::bootstrap";

/// How scenario draws and role shuffles are agreed on.
#[derive(Debug, Clone)]
pub enum AgreementMode {
    /// Single executor, optionally seeded for reproducible runs.
    Local { seed: Option<u64> },
    Quorum { beacon: [u8; 32], executors: usize },
}

impl AgreementMode {
    pub fn build(&self) -> Arc<dyn RandomAgreement> {
        match self {
            AgreementMode::Local { seed: Some(seed) } => Arc::new(LocalAgreement::seeded(*seed)),
            AgreementMode::Local { seed: None } => Arc::new(LocalAgreement::from_entropy()),
            AgreementMode::Quorum { beacon, executors } => {
                Arc::new(QuorumAgreement::new(*beacon, *executors))
            }
        }
    }
}

pub struct ServerConfig {
    pub bind: SocketAddr,
    pub game: GameConfig,
    pub agreement: AgreementMode,
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let engine = GameEngine::in_memory(config.game.clone(), config.agreement.build())
        .context("invalid game configuration")?;
    let router = ChainAuditServer::new(Arc::new(engine)).into_router();
    let make_service = router.into_make_service();

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    let local_addr = listener.local_addr()?;
    info!(
        target: LOG_TARGET,
        %local_addr,
        entry_fee = config.game.entry_fee,
        agreement = ?config.agreement,
        "chain audit server listening"
    );

    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target: LOG_TARGET,
            error = %err,
            "failed to install ctrl-c handler"
        );
    }
    info!(target: LOG_TARGET, "shutdown signal received");
}
