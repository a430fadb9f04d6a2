//! Player registry and balance ledger the game core settles against.
//!
//! The core never touches balances directly: every stake and reward goes
//! through [`PlayerLedger`], and multi-entry mutations go through a
//! [`LedgerTxn`] so they land all-or-nothing.

use async_trait::async_trait;
use thiserror::Error;

use crate::game::types::{Address, Amount, Player};

pub mod in_memory;

pub use in_memory::InMemoryPlayerLedger;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("player {0} not found")]
    NotFound(Address),
    #[error("player {0} already registered")]
    AlreadyRegistered(Address),
    #[error("player {address} has balance {available}, needs {required}")]
    InsufficientBalance {
        address: Address,
        required: Amount,
        available: Amount,
    },
    #[error("arithmetic overflow updating player {0}")]
    Overflow(Address),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PlayerLedger: Send + Sync {
    async fn register(&self, player: Player) -> Result<(), LedgerError>;

    async fn is_registered(&self, address: &Address) -> Result<bool, LedgerError>;

    async fn player(&self, address: &Address) -> Result<Option<Player>, LedgerError>;

    /// Fails with [`LedgerError::NotFound`] for unregistered addresses.
    async fn balance(&self, address: &Address) -> Result<Amount, LedgerError>;

    /// Atomic check-and-subtract. Returns the new balance.
    async fn debit(&self, address: &Address, amount: Amount) -> Result<Amount, LedgerError>;

    /// Returns the new balance.
    async fn credit(&self, address: &Address, amount: Amount) -> Result<Amount, LedgerError>;

    async fn record_game_stat(
        &self,
        address: &Address,
        reward_delta: Amount,
        is_winner: bool,
    ) -> Result<(), LedgerError>;

    /// All players in the registry's natural (address) order.
    async fn players(&self) -> Result<Vec<Player>, LedgerError>;

    async fn player_count(&self) -> Result<usize, LedgerError>;

    async fn begin(&self) -> Result<Box<dyn LedgerTxn + Send>, LedgerError>;
}

/// Staged ledger mutations. Nothing is visible to other callers until
/// [`LedgerTxn::commit`] succeeds; a failed commit applies nothing.
#[async_trait]
pub trait LedgerTxn: Send {
    async fn debit(&mut self, address: &Address, amount: Amount) -> Result<(), LedgerError>;

    async fn credit(&mut self, address: &Address, amount: Amount) -> Result<(), LedgerError>;

    async fn record_game_stat(
        &mut self,
        address: &Address,
        reward_delta: Amount,
        is_winner: bool,
    ) -> Result<(), LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>);
}
