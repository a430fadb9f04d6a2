use serde::{Deserialize, Serialize};

use crate::game::error::GameError;
use crate::game::types::Amount;

/// Role quotas need one saboteur, one supervisor and at least one auditor.
pub const MIN_PLAYERS_FLOOR: usize = 3;

pub const DEFAULT_ENTRY_FEE: Amount = 5;
pub const DEFAULT_MIN_PLAYERS: usize = 3;
pub const DEFAULT_MAX_PLAYERS: usize = 5;
pub const DEFAULT_LEADERBOARD_SIZE: usize = 20;
pub const DEFAULT_STARTING_BALANCE: Amount = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Stake debited from every member at create/join time.
    pub entry_fee: Amount,
    pub min_players: usize,
    pub max_players: usize,
    pub leaderboard_size: usize,
    /// Balance granted to a newly registered player.
    pub starting_balance: Amount,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            entry_fee: DEFAULT_ENTRY_FEE,
            min_players: DEFAULT_MIN_PLAYERS,
            max_players: DEFAULT_MAX_PLAYERS,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            starting_balance: DEFAULT_STARTING_BALANCE,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.min_players < MIN_PLAYERS_FLOOR {
            return Err(GameError::configuration(format!(
                "min_players must be at least {MIN_PLAYERS_FLOOR}"
            )));
        }
        if self.min_players > self.max_players {
            return Err(GameError::configuration(
                "min_players cannot exceed max_players",
            ));
        }
        if self.entry_fee == 0 {
            return Err(GameError::configuration(
                "entry_fee must be greater than zero",
            ));
        }
        if self.leaderboard_size == 0 {
            return Err(GameError::configuration(
                "leaderboard_size must be greater than zero",
            ));
        }
        Ok(())
    }
}
