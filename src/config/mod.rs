//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! rules document (JSON/TOML)
//!     → loader.rs (parse, check ids and patterns)
//!     → GovernanceEngine::install (atomic swap)
//!
//! On rules file change:
//!     watcher.rs detects change
//!     → loader.rs loads new document
//!     → server task installs it
//!     → next request observes the new rule set
//! ```
//!
//! # Design Decisions
//! - Gateway config is immutable once loaded; rules are hot-reloadable
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::AdminConfig;
pub use schema::GatewayConfig;
pub use schema::GovernanceConfig;
pub use schema::ListenerConfig;
pub use schema::UpstreamConfig;
