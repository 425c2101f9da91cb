//! Decision pipeline: fold the applicable rules into one response.
//!
//! # Data Flow
//! ```text
//! regex rules matching the request      (least specific)
//!     → company cohort rules
//!     → user cohort rules               (most specific)
//!     → for each rule, in order:
//!         merge assignment values into the variable map
//!         merge rendered headers (last writer wins per key)
//!         if block: render body, set status / body / blocked_by,
//!                   force Content-Type: application/json
//! ```
//!
//! Later rules override earlier ones; headers contributed by non-blocking
//! rules survive unless a later rule writes the same key.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::governance::cohort::{applicable_rules, ApplicableRule, CohortConfig};
use crate::governance::request::GovernanceRequest;
use crate::governance::rules::RuleType;
use crate::governance::store::RuleSnapshot;
use crate::governance::template;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const APPLICATION_JSON: &str = "application/json";

/// Outcome of one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseHolder {
    /// Status set by the last block rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Cumulative headers from every applicable rule.
    pub headers: BTreeMap<String, String>,

    /// Rendered body of the last block rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Id of the last block rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,

    /// Variables accumulated from assignments, in processing order.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

impl ResponseHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_by.is_some()
    }

    /// Insert a header, replacing any existing key that differs only in case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Apply one rule on top of the current state.
    pub fn apply(&mut self, applicable: &ApplicableRule) {
        let rule = &applicable.rule;

        if let Some(values) = &applicable.values {
            self.variables
                .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        if let Some(headers) = rule.headers() {
            for (name, value) in headers {
                let rendered = template::render_str(value, &self.variables);
                self.set_header(name, rendered);
            }
        }

        if rule.block {
            self.status = rule.status();
            self.body = rule.body().map(|body| template::render(body, &self.variables));
            self.blocked_by = Some(rule.id.clone());
            self.set_header(CONTENT_TYPE, APPLICATION_JSON);
        }
    }
}

/// Regex rules whose patterns match `request`, in store order.
pub fn matching_regex_rules(snapshot: &RuleSnapshot, request: &GovernanceRequest) -> Vec<ApplicableRule> {
    snapshot
        .patterns()
        .filter(|(_, pattern)| pattern.matches(request))
        .map(|(rule, _)| ApplicableRule::new(rule.clone()))
        .collect()
}

/// All applicable rules in precedence order: regex, company, user.
pub fn collect_applicable(
    snapshot: &RuleSnapshot,
    config: &CohortConfig,
    user_id: Option<&str>,
    company_id: Option<&str>,
    request: &GovernanceRequest,
) -> Vec<ApplicableRule> {
    let mut rules = matching_regex_rules(snapshot, request);
    rules.extend(applicable_rules(snapshot, company_id, RuleType::Company, config));
    rules.extend(applicable_rules(snapshot, user_id, RuleType::User, config));
    rules
}

/// Apply already-collected rules in order to a fresh holder.
pub fn fold(rules: &[ApplicableRule]) -> ResponseHolder {
    let mut holder = ResponseHolder::new();
    for applicable in rules {
        tracing::trace!(
            rule_id = %applicable.rule.id,
            rule = %applicable.rule.label(),
            rule_type = %applicable.rule.rule_type(),
            block = applicable.rule.block,
            "Applying rule"
        );
        holder.apply(applicable);
    }
    holder
}

/// Evaluate one request against one snapshot. Never fails.
pub fn govern(
    snapshot: &RuleSnapshot,
    config: &CohortConfig,
    user_id: Option<&str>,
    company_id: Option<&str>,
    request: &GovernanceRequest,
) -> ResponseHolder {
    let rules = collect_applicable(snapshot, config, user_id, company_id, request);
    let holder = fold(&rules);

    tracing::debug!(
        generation = snapshot.generation(),
        route = %request.route,
        applicable = rules.len(),
        blocked_by = ?holder.blocked_by,
        status = ?holder.status,
        "Governance decision"
    );

    holder
}
