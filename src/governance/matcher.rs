//! Request matching for regex rules.
//!
//! # Responsibilities
//! - Resolve each condition's field path against the request view
//! - Test the resolved value against the condition's regular expression
//! - Combine conditions with AND, groups with OR
//!
//! # Design Decisions
//! - Patterns are compiled once when a rule set is installed
//! - An unresolvable field fails its condition, never the evaluation
//! - A group with no conditions never matches; neither does a rule with no groups
//! - Regexes are unanchored, as with any conventional `is_match`

use regex::Regex;

use crate::governance::error::GovernanceError;
use crate::governance::request::GovernanceRequest;
use crate::governance::rules::{Condition, ConditionGroup, Rule};

#[derive(Debug, Clone)]
struct CompiledCondition {
    path: String,
    regex: Regex,
}

impl CompiledCondition {
    fn matches(&self, request: &GovernanceRequest) -> bool {
        request
            .resolve(&self.path)
            .map(|value| self.regex.is_match(&value))
            .unwrap_or(false)
    }
}

/// Pre-compiled condition groups of one regex rule.
#[derive(Debug, Clone, Default)]
pub struct CompiledPattern {
    groups: Vec<Vec<CompiledCondition>>,
}

impl CompiledPattern {
    /// Compile every condition of `rule`.
    pub fn compile(rule: &Rule) -> Result<Self, GovernanceError> {
        let groups = rule
            .condition_groups()
            .iter()
            .map(|group| {
                group
                    .conditions
                    .iter()
                    .map(|condition| compile_condition(&rule.id, condition))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { groups })
    }

    /// True if any group fully matches.
    pub fn matches(&self, request: &GovernanceRequest) -> bool {
        self.groups
            .iter()
            .any(|group| !group.is_empty() && group.iter().all(|c| c.matches(request)))
    }
}

fn compile_condition(rule_id: &str, condition: &Condition) -> Result<CompiledCondition, GovernanceError> {
    let regex = Regex::new(&condition.value).map_err(|source| GovernanceError::InvalidPattern {
        rule_id: rule_id.to_string(),
        pattern: condition.value.clone(),
        source,
    })?;
    Ok(CompiledCondition {
        path: condition.path.clone(),
        regex,
    })
}

/// Check a rule against a request without a pre-compiled pattern.
///
/// A pattern that fails to compile is logged and treated as a non-match.
pub fn matches(rule: &Rule, request: &GovernanceRequest) -> bool {
    rule.condition_groups()
        .iter()
        .any(|group| group_matches(&rule.id, group, request))
}

fn group_matches(rule_id: &str, group: &ConditionGroup, request: &GovernanceRequest) -> bool {
    if group.conditions.is_empty() {
        return false;
    }
    group.conditions.iter().all(|condition| {
        match compile_condition(rule_id, condition) {
            Ok(compiled) => compiled.matches(request),
            Err(e) => {
                tracing::warn!(
                    rule_id,
                    pattern = %condition.value,
                    error = %e,
                    "failed to compile condition regex; treating as non-match"
                );
                false
            }
        }
    })
}
