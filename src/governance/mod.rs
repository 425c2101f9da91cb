//! Governance decision core.
//!
//! # Data Flow
//! ```text
//! GovernanceDocument (rules + cohort assignments)
//!     → store.rs (validate, compile patterns, swap in snapshot)
//!
//! Per request:
//!     GovernanceRequest + user id + company id
//!     → matcher.rs (regex rules matching the request)
//!     → cohort.rs (company rules, then user rules, by polarity)
//!     → merger.rs (fold into ResponseHolder)
//!         → template.rs (render header values and block bodies)
//! ```
//!
//! # Design Decisions
//! - Evaluation is pure and never fails; configuration errors surface at load
//! - The rule set is swapped wholesale; one evaluation sees one generation
//! - Precedence escalates regex → company → user; the last writer wins

pub mod cohort;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod merger;
pub mod request;
pub mod rules;
pub mod store;
pub mod template;

pub use cohort::{is_assigned, ApplicableRule, CohortConfig, RuleAssignment};
pub use engine::{GovernanceDocument, GovernanceEngine};
pub use error::GovernanceError;
pub use merger::ResponseHolder;
pub use request::GovernanceRequest;
pub use rules::{AppliedTo, Condition, ConditionGroup, Rule, RuleKind, RuleResponse, RuleType, RuleVariable};
pub use store::{RuleSnapshot, RuleStore};
