//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the governance engine
//! - Install the initial rules document, if one is configured
//!
//! # Design Decisions
//! - Fail fast: a configured but unreadable or invalid rules file is fatal
//! - Without a rules file the engine starts empty and allows everything

use std::path::Path;
use std::sync::Arc;

use crate::config::loader::{load_document, ConfigError};
use crate::config::GatewayConfig;
use crate::governance::GovernanceEngine;
use crate::observability::metrics;

/// Create the engine and load the configured rules document.
pub fn bootstrap(config: &GatewayConfig) -> Result<Arc<GovernanceEngine>, ConfigError> {
    let engine = Arc::new(GovernanceEngine::new());

    match &config.governance.rules_path {
        Some(path) => {
            let document = load_document(Path::new(path))?;
            engine.install(document)?;
            metrics::record_rule_reload("installed");
            metrics::record_rules_loaded(engine.store().len());
            tracing::info!(path = %path, rules = engine.store().len(), "Initial rules loaded");
        }
        None => tracing::warn!("No rules_path configured; starting with an empty rule set"),
    }

    Ok(engine)
}
