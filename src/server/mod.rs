pub mod bootstrap;
pub mod dto;
pub mod error;
pub mod logging;
pub mod routes;

pub use bootstrap::{run_server, AgreementMode, ServerConfig};
pub use error::ApiError;
pub use routes::{ChainAuditServer, ServerContext};
