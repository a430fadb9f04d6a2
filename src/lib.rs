pub mod agreement;
pub mod config;
pub mod game;
pub mod ledger;
pub mod scenario;
pub mod server;

#[cfg(test)]
pub mod test_utils;

pub use config::GameConfig;
pub use game::{GameEngine, GameError};
