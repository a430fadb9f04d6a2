//! Session lifecycle, role assignment, outcome resolution and ranking.

pub mod error;
pub mod leaderboard;
pub mod outcome;
pub mod roles;
pub mod service;
pub mod session_store;
pub mod types;
pub mod validation;


pub use error::GameError;
pub use leaderboard::Leaderboard;
pub use outcome::{OutcomeResolver, Resolution, RewardSchedule, Tally};
pub use roles::RoleAssigner;
pub use service::GameEngine;
pub use session_store::{SessionGuard, SessionStore};
pub use types::*;
