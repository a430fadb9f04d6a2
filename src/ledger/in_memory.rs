use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::game::types::{Address, Amount, Player};

use super::{LedgerError, LedgerTxn, PlayerLedger};

const LOG_TARGET: &str = "chain_audit::ledger::in_memory";

#[derive(Default)]
struct Inner {
    players: BTreeMap<Address, Player>,
}

impl Inner {
    fn get(&self, address: &Address) -> Result<&Player, LedgerError> {
        self.players
            .get(address)
            .ok_or_else(|| LedgerError::NotFound(address.clone()))
    }

    fn get_mut(&mut self, address: &Address) -> Result<&mut Player, LedgerError> {
        self.players
            .get_mut(address)
            .ok_or_else(|| LedgerError::NotFound(address.clone()))
    }
}

#[derive(Clone, Debug)]
enum StagedOp {
    Debit(Address, Amount),
    Credit(Address, Amount),
    GameStat {
        address: Address,
        reward_delta: Amount,
        is_winner: bool,
    },
}

impl StagedOp {
    fn address(&self) -> &Address {
        match self {
            StagedOp::Debit(address, _) | StagedOp::Credit(address, _) => address,
            StagedOp::GameStat { address, .. } => address,
        }
    }

    fn apply(&self, player: &mut Player) -> Result<(), LedgerError> {
        match self {
            StagedOp::Debit(address, amount) => {
                if player.balance < *amount {
                    return Err(LedgerError::InsufficientBalance {
                        address: address.clone(),
                        required: *amount,
                        available: player.balance,
                    });
                }
                player.balance -= amount;
            }
            StagedOp::Credit(address, amount) => {
                player.balance = player
                    .balance
                    .checked_add(*amount)
                    .ok_or_else(|| LedgerError::Overflow(address.clone()))?;
            }
            StagedOp::GameStat {
                address,
                reward_delta,
                is_winner,
            } => {
                player.games_played += 1;
                player.total_rewards = player
                    .total_rewards
                    .checked_add(*reward_delta)
                    .ok_or_else(|| LedgerError::Overflow(address.clone()))?;
                if *is_winner {
                    player.wins += 1;
                }
            }
        }
        Ok(())
    }
}

/// Process-local ledger. Every mutation happens under one write lock, which
/// makes per-address debit/credit atomic and transaction commits
/// all-or-nothing.
#[derive(Clone)]
pub struct InMemoryPlayerLedger {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryPlayerLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    fn apply_one(&self, op: StagedOp) -> Result<Amount, LedgerError> {
        let mut inner = self.inner.write();
        let player = inner.get_mut(op.address())?;
        let mut updated = player.clone();
        op.apply(&mut updated)?;
        let balance = updated.balance;
        *player = updated;
        Ok(balance)
    }
}

impl Default for InMemoryPlayerLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlayerLedger for InMemoryPlayerLedger {
    async fn register(&self, player: Player) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();
        if inner.players.contains_key(&player.address) {
            return Err(LedgerError::AlreadyRegistered(player.address));
        }
        debug!(target: LOG_TARGET, address = %player.address, "registered player");
        inner.players.insert(player.address.clone(), player);
        Ok(())
    }

    async fn is_registered(&self, address: &Address) -> Result<bool, LedgerError> {
        Ok(self.inner.read().players.contains_key(address))
    }

    async fn player(&self, address: &Address) -> Result<Option<Player>, LedgerError> {
        Ok(self.inner.read().players.get(address).cloned())
    }

    async fn balance(&self, address: &Address) -> Result<Amount, LedgerError> {
        Ok(self.inner.read().get(address)?.balance)
    }

    async fn debit(&self, address: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        self.apply_one(StagedOp::Debit(address.clone(), amount))
    }

    async fn credit(&self, address: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        self.apply_one(StagedOp::Credit(address.clone(), amount))
    }

    async fn record_game_stat(
        &self,
        address: &Address,
        reward_delta: Amount,
        is_winner: bool,
    ) -> Result<(), LedgerError> {
        self.apply_one(StagedOp::GameStat {
            address: address.clone(),
            reward_delta,
            is_winner,
        })
        .map(|_| ())
    }

    async fn players(&self) -> Result<Vec<Player>, LedgerError> {
        Ok(self.inner.read().players.values().cloned().collect())
    }

    async fn player_count(&self) -> Result<usize, LedgerError> {
        Ok(self.inner.read().players.len())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTxn + Send>, LedgerError> {
        Ok(Box::new(InMemoryLedgerTxn {
            inner: Arc::clone(&self.inner),
            staged: Vec::new(),
        }))
    }
}

pub struct InMemoryLedgerTxn {
    inner: Arc<RwLock<Inner>>,
    staged: Vec<StagedOp>,
}

impl InMemoryLedgerTxn {
    /// Balance as this transaction would see it: committed state plus
    /// everything staged so far.
    fn effective_balance(&self, address: &Address) -> Result<Amount, LedgerError> {
        let mut player = self.inner.read().get(address)?.clone();
        for op in self.staged.iter().filter(|op| op.address() == address) {
            op.apply(&mut player)?;
        }
        Ok(player.balance)
    }
}

#[async_trait]
impl LedgerTxn for InMemoryLedgerTxn {
    async fn debit(&mut self, address: &Address, amount: Amount) -> Result<(), LedgerError> {
        let available = self.effective_balance(address)?;
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                address: address.clone(),
                required: amount,
                available,
            });
        }
        self.staged.push(StagedOp::Debit(address.clone(), amount));
        Ok(())
    }

    async fn credit(&mut self, address: &Address, amount: Amount) -> Result<(), LedgerError> {
        if !self.inner.read().players.contains_key(address) {
            return Err(LedgerError::NotFound(address.clone()));
        }
        self.staged.push(StagedOp::Credit(address.clone(), amount));
        Ok(())
    }

    async fn record_game_stat(
        &mut self,
        address: &Address,
        reward_delta: Amount,
        is_winner: bool,
    ) -> Result<(), LedgerError> {
        if !self.inner.read().players.contains_key(address) {
            return Err(LedgerError::NotFound(address.clone()));
        }
        self.staged.push(StagedOp::GameStat {
            address: address.clone(),
            reward_delta,
            is_winner,
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let mut inner = self.inner.write();

        // Apply against copies first so a failure anywhere leaves the ledger untouched.
        let mut touched: HashMap<Address, Player> = HashMap::new();
        for op in &self.staged {
            let address = op.address();
            if !touched.contains_key(address) {
                let current = inner.get(address)?.clone();
                touched.insert(address.clone(), current);
            }
            if let Some(player) = touched.get_mut(address) {
                op.apply(player)?;
            }
        }

        let applied = touched.len();
        for (address, player) in touched {
            inner.players.insert(address, player);
        }
        debug!(
            target: LOG_TARGET,
            ops = self.staged.len(),
            players = applied,
            "committed ledger transaction"
        );
        Ok(())
    }

    async fn rollback(self: Box<Self>) {
        debug!(
            target: LOG_TARGET,
            ops = self.staged.len(),
            "rolled back ledger transaction"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger_with(players: &[(&str, Amount)]) -> InMemoryPlayerLedger {
        let ledger = InMemoryPlayerLedger::new();
        for (address, balance) in players {
            ledger
                .register(Player::new((*address).into(), *address, *balance))
                .await
                .unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn register_twice_is_rejected() {
        let ledger = ledger_with(&[("alice", 100)]).await;
        let err = ledger
            .register(Player::new("alice".into(), "again", 100))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyRegistered("alice".into()));
        assert_eq!(ledger.player_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn debit_checks_balance_atomically() {
        let ledger = ledger_with(&[("alice", 7)]).await;
        assert_eq!(ledger.debit(&"alice".into(), 5).await.unwrap(), 2);
        let err = ledger.debit(&"alice".into(), 5).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                required: 5,
                available: 2,
                ..
            }
        ));
        assert_eq!(ledger.balance(&"alice".into()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unknown_address_is_not_found() {
        let ledger = ledger_with(&[]).await;
        assert_eq!(
            ledger.balance(&"ghost".into()).await.unwrap_err(),
            LedgerError::NotFound("ghost".into())
        );
        assert!(!ledger.is_registered(&"ghost".into()).await.unwrap());
    }

    #[tokio::test]
    async fn transaction_is_invisible_until_commit() {
        let ledger = ledger_with(&[("alice", 10), ("bob", 10)]).await;
        let mut txn = ledger.begin().await.unwrap();
        txn.credit(&"alice".into(), 5).await.unwrap();
        txn.record_game_stat(&"alice".into(), 5, true).await.unwrap();
        txn.debit(&"bob".into(), 10).await.unwrap();
        assert_eq!(ledger.balance(&"alice".into()).await.unwrap(), 10);

        txn.commit().await.unwrap();
        let alice = ledger.player(&"alice".into()).await.unwrap().unwrap();
        assert_eq!(alice.balance, 15);
        assert_eq!(alice.total_rewards, 5);
        assert_eq!(alice.wins, 1);
        assert_eq!(alice.games_played, 1);
        assert_eq!(ledger.balance(&"bob".into()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn staged_debits_count_against_balance() {
        let ledger = ledger_with(&[("alice", 8)]).await;
        let mut txn = ledger.begin().await.unwrap();
        txn.debit(&"alice".into(), 5).await.unwrap();
        assert!(txn.debit(&"alice".into(), 5).await.is_err());
        txn.rollback().await;
        assert_eq!(ledger.balance(&"alice".into()).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn failed_commit_applies_nothing() {
        let ledger = ledger_with(&[("alice", 10), ("bob", 3)]).await;
        let mut txn = ledger.begin().await.unwrap();
        txn.credit(&"alice".into(), 5).await.unwrap();
        txn.debit(&"bob".into(), 3).await.unwrap();
        // Someone else drains bob before we commit.
        ledger.debit(&"bob".into(), 3).await.unwrap();

        assert!(txn.commit().await.is_err());
        assert_eq!(ledger.balance(&"alice".into()).await.unwrap(), 10);
        assert_eq!(ledger.balance(&"bob".into()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn players_iterate_in_address_order() {
        let ledger = ledger_with(&[("carol", 1), ("alice", 1), ("bob", 1)]).await;
        let order: Vec<_> = ledger
            .players()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.address)
            .collect();
        assert_eq!(order, vec!["alice".into(), "bob".into(), Address::from("carol")]);
    }
}
