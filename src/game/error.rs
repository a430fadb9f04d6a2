use thiserror::Error;

use crate::agreement::AgreementError;
use crate::ledger::LedgerError;
use crate::scenario::ScenarioId;

use super::types::{Address, Amount, Phase, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("player {0} not registered")]
    NotRegistered(Address),
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("session {session_id} is {actual}, expected {expected}")]
    WrongPhase {
        session_id: SessionId,
        expected: Phase,
        actual: Phase,
    },
    #[error("session {session_id} is full ({max_players} players)")]
    SessionFull {
        session_id: SessionId,
        max_players: usize,
    },
    #[error("player {address} already in session {session_id}")]
    AlreadyMember {
        session_id: SessionId,
        address: Address,
    },
    #[error("player {address} not in session {session_id}")]
    NotAMember {
        session_id: SessionId,
        address: Address,
    },
    #[error("session {session_id} needs {required} players, has {joined}")]
    NotEnoughPlayers {
        session_id: SessionId,
        required: usize,
        joined: usize,
    },
    #[error("scenario {0} not found")]
    ScenarioNotFound(ScenarioId),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("random agreement failed: {0}")]
    Agreement(#[from] AgreementError),
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
    /// Crediting a finalized session failed; nothing was applied.
    #[error("settlement failed: {0}")]
    Settlement(LedgerError),
}

impl GameError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<LedgerError> for GameError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(address) => GameError::NotRegistered(address),
            LedgerError::InsufficientBalance {
                required,
                available,
                ..
            } => GameError::InsufficientBalance {
                required,
                available,
            },
            other => GameError::Ledger(other),
        }
    }
}
