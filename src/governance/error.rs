//! Errors raised while installing a rule set.

use thiserror::Error;

/// Errors that can occur when a rule set is loaded into the store.
///
/// Evaluation never fails; only `replace_all` and `install` return these.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// Two rules in the same set share an id.
    #[error("Duplicate rule id: {0}")]
    DuplicateRuleId(String),

    /// A regex condition failed to compile.
    #[error("Rule {rule_id}: invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        rule_id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
