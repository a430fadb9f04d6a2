use tokio::sync::Mutex;
use tracing::debug;

use crate::ledger::PlayerLedger;

use super::error::GameError;
use super::types::{Address, Player};

const LOG_TARGET: &str = "chain_audit::game::leaderboard";

/// Top-N addresses by cumulative rewards, rebuilt wholesale from the ledger.
pub struct Leaderboard {
    capacity: usize,
    ranking: Mutex<Vec<Address>>,
}

impl Leaderboard {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ranking: Mutex::new(Vec::new()),
        }
    }

    /// Stable sort on rewards only: equal totals keep the ledger's address
    /// order. Holding the lock across the ledger read keeps concurrent
    /// recomputes from publishing out of order.
    pub async fn recompute(&self, ledger: &dyn PlayerLedger) -> Result<Vec<Address>, GameError> {
        let mut ranking = self.ranking.lock().await;
        let players = ledger.players().await?;
        *ranking = rank(players, self.capacity);
        debug!(
            target: LOG_TARGET,
            entries = ranking.len(),
            capacity = self.capacity,
            "leaderboard recomputed"
        );
        Ok(ranking.clone())
    }

    pub async fn ranking(&self) -> Vec<Address> {
        self.ranking.lock().await.clone()
    }
}

pub fn rank(mut players: Vec<Player>, capacity: usize) -> Vec<Address> {
    players.sort_by(|a, b| b.total_rewards.cmp(&a.total_rewards));
    players
        .into_iter()
        .take(capacity)
        .map(|player| player.address)
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::ledger::InMemoryPlayerLedger;

    fn player(address: &str, rewards: u64) -> Player {
        let mut player = Player::new(address.into(), address, 100);
        player.total_rewards = rewards;
        player
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank(
            vec![player("a", 5), player("b", 9), player("c", 5), player("d", 0)],
            3,
        );
        assert_eq!(ranked, vec!["b".into(), "a".into(), Address::from("c")]);
    }

    #[tokio::test]
    async fn recompute_reads_ledger() {
        let ledger = InMemoryPlayerLedger::new();
        for (address, reward) in [("alice", 3u64), ("bob", 7)] {
            ledger
                .register(Player::new(address.into(), address, 100))
                .await
                .unwrap();
            ledger
                .record_game_stat(&address.into(), reward, reward > 5)
                .await
                .unwrap();
        }
        let board = Leaderboard::new(20);
        assert!(board.ranking().await.is_empty());
        board.recompute(&ledger).await.unwrap();
        assert_eq!(board.ranking().await, vec!["bob".into(), Address::from("alice")]);
    }

    proptest! {
        /// Property: ranking is bounded and non-increasing in rewards.
        #[test]
        fn prop_ranking_bounded_and_sorted(
            rewards in prop::collection::vec(0u64..50, 0..60),
            capacity in 1usize..=20,
        ) {
            let players: Vec<Player> = rewards
                .iter()
                .enumerate()
                .map(|(i, r)| player(&format!("p{i:03}"), *r))
                .collect();
            let ranked = rank(players.clone(), capacity);
            prop_assert!(ranked.len() <= capacity);
            let reward_of = |address: &Address| {
                players.iter().find(|p| &p.address == address).map(|p| p.total_rewards).unwrap()
            };
            for pair in ranked.windows(2) {
                prop_assert!(reward_of(&pair[0]) >= reward_of(&pair[1]));
            }
        }
    }
}
