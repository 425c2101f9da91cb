//! Entry points exposed to callers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::governance::cohort::{applicable_rules, ApplicableRule, CohortConfig, RuleAssignment};
use crate::governance::error::GovernanceError;
use crate::governance::merger::{self, ResponseHolder};
use crate::governance::request::GovernanceRequest;
use crate::governance::rules::{Rule, RuleType};
use crate::governance::store::{RuleSnapshot, RuleStore};
use crate::governance::template;

/// A complete rule set plus cohort assignments, as loaded from disk or
/// received over the admin API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceDocument {
    pub rules: Vec<Rule>,
    pub user_rules: HashMap<String, Vec<RuleAssignment>>,
    pub company_rules: HashMap<String, Vec<RuleAssignment>>,
}

impl GovernanceDocument {
    /// Split into the rule list and the cohort config.
    pub fn into_parts(self) -> (Vec<Rule>, CohortConfig) {
        (
            self.rules,
            CohortConfig {
                user_rules: self.user_rules,
                company_rules: self.company_rules,
            },
        )
    }
}

/// The governance engine. Rules and cohort assignments are installed and
/// read as one generation of the store.
#[derive(Debug, Default)]
pub struct GovernanceEngine {
    store: RuleStore,
}

impl GovernanceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk rule load. The previous set stays active if this fails.
    pub fn replace_rules(&self, rules: Vec<Rule>) -> Result<(), GovernanceError> {
        warn_undeclared_variables(&rules);
        self.store.replace_all(rules)
    }

    /// Install a full document. Rules and cohort assignments swap together.
    pub fn install(&self, document: GovernanceDocument) -> Result<(), GovernanceError> {
        let (rules, cohorts) = document.into_parts();
        warn_undeclared_variables(&rules);
        self.store.install(rules, cohorts)
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.store.snapshot()
    }

    /// The installed cohort config.
    pub fn cohorts(&self) -> Arc<CohortConfig> {
        self.store.snapshot().cohorts().clone()
    }

    pub fn applicable_rules_for_user(&self, user_id: Option<&str>, config: &CohortConfig) -> Vec<ApplicableRule> {
        applicable_rules(&self.store.snapshot(), user_id, RuleType::User, config)
    }

    pub fn applicable_rules_for_company(
        &self,
        company_id: Option<&str>,
        config: &CohortConfig,
    ) -> Vec<ApplicableRule> {
        applicable_rules(&self.store.snapshot(), company_id, RuleType::Company, config)
    }

    /// Decide the outcome for one request.
    pub fn govern(
        &self,
        config: &CohortConfig,
        user_id: Option<&str>,
        company_id: Option<&str>,
        request: &GovernanceRequest,
    ) -> ResponseHolder {
        let snapshot = self.store.snapshot();
        merger::govern(&snapshot, config, user_id, company_id, request)
    }

    /// [`govern`](Self::govern) against the installed cohort config, with
    /// rules and assignments taken from the same generation.
    pub fn evaluate(
        &self,
        user_id: Option<&str>,
        company_id: Option<&str>,
        request: &GovernanceRequest,
    ) -> ResponseHolder {
        let snapshot = self.store.snapshot();
        merger::govern(&snapshot, snapshot.cohorts(), user_id, company_id, request)
    }
}

// Undeclared references still render (to their default or UNKNOWN); this
// only surfaces likely typos at load time.
fn warn_undeclared_variables(rules: &[Rule]) {
    for rule in rules.iter().filter(|r| !r.variables.is_empty()) {
        let mut referenced: Vec<String> = rule
            .headers()
            .into_iter()
            .flat_map(|h| h.values())
            .flat_map(|v| template::placeholders(v))
            .collect();
        if let Some(body) = rule.body() {
            referenced.extend(template::placeholders_in(body));
        }
        for name in referenced.iter().filter(|n| !rule.declares(n)) {
            tracing::warn!(rule_id = %rule.id, variable = %name, "Template references undeclared variable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluate_uses_installed_cohorts() {
        let engine = GovernanceEngine::new();
        let document: GovernanceDocument = serde_json::from_value(json!({
            "rules": [
                { "id": "deny", "type": "user", "block": true,
                  "response": { "status": 403, "body": { "message": "bye {{user.name}}" } } }
            ],
            "user_rules": {
                "u1": [ { "rule_id": "deny", "values": { "user.name": "Alice" } } ]
            }
        }))
        .unwrap();
        engine.install(document).unwrap();

        let req = GovernanceRequest::new("GET", "/");
        let holder = engine.evaluate(Some("u1"), None, &req);
        assert_eq!(holder.status, Some(403));
        assert_eq!(holder.body, Some(json!({ "message": "bye Alice" })));

        assert!(!engine.evaluate(Some("u2"), None, &req).is_blocked());
        assert!(!engine.govern(&CohortConfig::default(), Some("u1"), None, &req).is_blocked());
    }

    #[test]
    fn failed_install_keeps_cohorts() {
        let engine = GovernanceEngine::new();
        let first = GovernanceDocument {
            rules: vec![Rule::user("a")],
            user_rules: [("x".to_string(), vec![RuleAssignment::new("a")])].into(),
            ..Default::default()
        };
        engine.install(first).unwrap();

        let broken = GovernanceDocument {
            rules: vec![Rule::user("dup"), Rule::user("dup")],
            ..Default::default()
        };
        assert!(engine.install(broken).is_err());
        assert_eq!(engine.cohorts().user_rules.len(), 1);
        assert!(engine.store().get("a").is_some());
    }

    #[test]
    fn introspection_entry_points() {
        let engine = GovernanceEngine::new();
        engine
            .replace_rules(vec![Rule::user("u").not_matching(), Rule::company("c")])
            .unwrap();
        let config = CohortConfig::default().assign_company("acme", RuleAssignment::new("c"));

        assert_eq!(engine.applicable_rules_for_user(Some("anyone"), &config).len(), 1);
        assert!(engine.applicable_rules_for_user(None, &config).is_empty());
        assert_eq!(engine.applicable_rules_for_company(Some("acme"), &config)[0].id(), "c");
        assert!(engine.applicable_rules_for_company(Some("other"), &config).is_empty());
    }
}
