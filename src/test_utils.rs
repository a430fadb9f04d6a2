//! Common test utilities: scripted randomness and a ledger that fails on cue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::agreement::{AgreementError, RandomAgreement, Sampler};
use crate::game::types::{Address, Amount, Player};
use crate::ledger::{InMemoryPlayerLedger, LedgerError, LedgerTxn, PlayerLedger};

/// Helpers shared across test modules.
pub mod serde {
    use std::fmt::Debug;

    /// Assert that a value survives a serde_json round-trip using structural equality.
    pub fn assert_round_trip_eq<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned + PartialEq + Debug,
    {
        let json = serde_json::to_string(value)
            .expect("serialization should succeed during round-trip testing");
        let restored: T = serde_json::from_str(&json)
            .expect("deserialization should succeed during round-trip testing");
        assert_eq!(restored, *value, "serde_json round-trip altered the value");
    }
}

/// Agreement that ignores the sampler and hands back pre-scripted values in
/// order. Runs dry with `Unavailable`.
#[derive(Default)]
pub struct ScriptedAgreement {
    queue: Mutex<VecDeque<Vec<u8>>>,
}

impl ScriptedAgreement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: ::serde::Serialize>(&self, value: &T) -> &Self {
        let bytes = serde_json::to_vec(value).expect("scripted value should encode");
        self.queue.lock().push_back(bytes);
        self
    }

    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl RandomAgreement for ScriptedAgreement {
    async fn resolve_bytes(
        &self,
        label: &str,
        _sampler: Sampler<'_>,
    ) -> Result<Vec<u8>, AgreementError> {
        self.queue
            .lock()
            .pop_front()
            .ok_or_else(|| AgreementError::Unavailable(format!("script exhausted at {label}")))
    }
}

/// Wraps the in-memory ledger; while `fail_commits` is set every transaction
/// commit fails and applies nothing.
#[derive(Clone, Default)]
pub struct FlakyLedger {
    inner: InMemoryPlayerLedger,
    fail_commits: Arc<AtomicBool>,
}

impl FlakyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

struct FlakyTxn {
    inner: Box<dyn LedgerTxn + Send>,
    fail: bool,
}

#[async_trait]
impl LedgerTxn for FlakyTxn {
    async fn debit(&mut self, address: &Address, amount: Amount) -> Result<(), LedgerError> {
        self.inner.debit(address, amount).await
    }

    async fn credit(&mut self, address: &Address, amount: Amount) -> Result<(), LedgerError> {
        self.inner.credit(address, amount).await
    }

    async fn record_game_stat(
        &mut self,
        address: &Address,
        reward_delta: Amount,
        is_winner: bool,
    ) -> Result<(), LedgerError> {
        self.inner
            .record_game_stat(address, reward_delta, is_winner)
            .await
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        if self.fail {
            self.inner.rollback().await;
            return Err(LedgerError::Unavailable("injected commit failure".into()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) {
        self.inner.rollback().await
    }
}

#[async_trait]
impl PlayerLedger for FlakyLedger {
    async fn register(&self, player: Player) -> Result<(), LedgerError> {
        self.inner.register(player).await
    }

    async fn is_registered(&self, address: &Address) -> Result<bool, LedgerError> {
        self.inner.is_registered(address).await
    }

    async fn player(&self, address: &Address) -> Result<Option<Player>, LedgerError> {
        self.inner.player(address).await
    }

    async fn balance(&self, address: &Address) -> Result<Amount, LedgerError> {
        self.inner.balance(address).await
    }

    async fn debit(&self, address: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        self.inner.debit(address, amount).await
    }

    async fn credit(&self, address: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        self.inner.credit(address, amount).await
    }

    async fn record_game_stat(
        &self,
        address: &Address,
        reward_delta: Amount,
        is_winner: bool,
    ) -> Result<(), LedgerError> {
        self.inner
            .record_game_stat(address, reward_delta, is_winner)
            .await
    }

    async fn players(&self) -> Result<Vec<Player>, LedgerError> {
        self.inner.players().await
    }

    async fn player_count(&self) -> Result<usize, LedgerError> {
        self.inner.player_count().await
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTxn + Send>, LedgerError> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FlakyTxn {
            inner,
            fail: self.fail_commits.load(Ordering::SeqCst),
        }))
    }
}
