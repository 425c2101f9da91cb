//! API governance gateway library.

pub mod admin;
pub mod config;
pub mod governance;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use governance::{GovernanceEngine, GovernanceRequest, ResponseHolder};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
