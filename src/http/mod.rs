//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID, governance request view, identity)
//!     → middleware/governance.rs (evaluate rules)
//!         blocked → response.rs (status, headers, JSON body)
//!         allowed → server.rs (forward upstream)
//!                 → response.rs (append governance headers)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::GatewayServer;
