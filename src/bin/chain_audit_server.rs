use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use chain_audit::config::GameConfig;
use chain_audit::server::bootstrap::AgreementMode;
use chain_audit::server::{run_server, ServerConfig};

const LOG_TARGET: &str = "bin::chain_audit_server";
const DEFAULT_BIND: &str = "127.0.0.1:4000";

#[derive(Debug, Parser)]
#[command(name = "chain_audit_server")]
#[command(about = "Serve the chain audit game over HTTP", long_about = None)]
struct Args {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "SERVER_BIND", default_value = DEFAULT_BIND)]
    bind: SocketAddr,

    /// Stake debited per member
    #[arg(long, env = "GAME_ENTRY_FEE", default_value_t = chain_audit::config::DEFAULT_ENTRY_FEE)]
    entry_fee: u64,

    #[arg(long, env = "GAME_MIN_PLAYERS", default_value_t = chain_audit::config::DEFAULT_MIN_PLAYERS)]
    min_players: usize,

    #[arg(long, env = "GAME_MAX_PLAYERS", default_value_t = chain_audit::config::DEFAULT_MAX_PLAYERS)]
    max_players: usize,

    #[arg(long, env = "GAME_LEADERBOARD_SIZE", default_value_t = chain_audit::config::DEFAULT_LEADERBOARD_SIZE)]
    leaderboard_size: usize,

    /// Balance granted on registration
    #[arg(long, env = "GAME_STARTING_BALANCE", default_value_t = chain_audit::config::DEFAULT_STARTING_BALANCE)]
    starting_balance: u64,

    /// Optional RNG seed for reproducible scenario draws and role shuffles
    #[arg(long, env = "SERVER_RNG_SEED")]
    rng_seed: Option<u64>,

    /// Hex-encoded 32-byte beacon; switches to quorum agreement when set
    #[arg(long, env = "SERVER_QUORUM_BEACON")]
    quorum_beacon: Option<String>,

    /// Number of executors that must agree in quorum mode
    #[arg(long, env = "SERVER_QUORUM_EXECUTORS", default_value_t = 3)]
    quorum_executors: usize,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "SERVER_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json)?;
    let config = build_config(args).context("failed to build server config")?;
    info!(target: LOG_TARGET, bind = %config.bind, "starting chain audit server");
    run_server(config).await
}

fn load_dotenv() {
    let manifest_env = env!("CARGO_MANIFEST_DIR");
    let manifest_env_path = PathBuf::from(manifest_env).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(true);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn build_config(args: Args) -> Result<ServerConfig> {
    let game = GameConfig {
        entry_fee: args.entry_fee,
        min_players: args.min_players,
        max_players: args.max_players,
        leaderboard_size: args.leaderboard_size,
        starting_balance: args.starting_balance,
    };
    game.validate().context("invalid game configuration")?;

    let agreement = match args.quorum_beacon {
        Some(raw) => AgreementMode::Quorum {
            beacon: parse_beacon(&raw)?,
            executors: args.quorum_executors,
        },
        None => AgreementMode::Local {
            seed: args.rng_seed,
        },
    };

    Ok(ServerConfig {
        bind: args.bind,
        game,
        agreement,
    })
}

fn parse_beacon(input: &str) -> Result<[u8; 32]> {
    let trimmed = input.trim();
    let without_prefix = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(without_prefix).context("invalid quorum beacon hex")?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow!("quorum beacon must be 32 bytes, got {}", bytes.len()))
}
