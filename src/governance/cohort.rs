//! Cohort membership for user and company rules.
//!
//! Membership is decided per rule id: an identifier is "in cohort" for a rule
//! only when one of its assignments names that rule. Being a key in the
//! config, even with assignments for other rules, says nothing about this one.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::governance::rules::{AppliedTo, Rule, RuleType};
use crate::governance::store::RuleSnapshot;

/// Links an identity to a rule plus the variable values used when the rule
/// applies to that identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleAssignment {
    pub rule_id: String,
    #[serde(default)]
    pub values: HashMap<String, String>,
}

impl RuleAssignment {
    pub fn new(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            values: HashMap::new(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

/// Per-identity rule assignments for users and companies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    pub user_rules: HashMap<String, Vec<RuleAssignment>>,
    pub company_rules: HashMap<String, Vec<RuleAssignment>>,
}

impl CohortConfig {
    pub fn assign_user(mut self, user_id: impl Into<String>, assignment: RuleAssignment) -> Self {
        self.user_rules.entry(user_id.into()).or_default().push(assignment);
        self
    }

    pub fn assign_company(mut self, company_id: impl Into<String>, assignment: RuleAssignment) -> Self {
        self.company_rules
            .entry(company_id.into())
            .or_default()
            .push(assignment);
        self
    }

    /// Assignment table for a cohort rule type; `None` for regex.
    fn table(&self, rule_type: RuleType) -> Option<&HashMap<String, Vec<RuleAssignment>>> {
        match rule_type {
            RuleType::User => Some(&self.user_rules),
            RuleType::Company => Some(&self.company_rules),
            RuleType::Regex => None,
        }
    }

    /// The assignment linking `identifier` to `rule_id`, if any.
    ///
    /// When an identity lists the same rule twice, the first entry wins.
    pub fn assignment(&self, identifier: &str, rule_id: &str, rule_type: RuleType) -> Option<&RuleAssignment> {
        self.table(rule_type)?
            .get(identifier)?
            .iter()
            .find(|a| a.rule_id == rule_id)
    }
}

/// True when `identifier` is explicitly assigned to `rule_id`.
pub fn is_assigned(identifier: &str, rule_id: &str, config: &CohortConfig, rule_type: RuleType) -> bool {
    config.assignment(identifier, rule_id, rule_type).is_some()
}

/// A rule that applies to the current evaluation, with the identity's
/// variable values when it was matched through an assignment.
#[derive(Debug, Clone)]
pub struct ApplicableRule {
    pub rule: Arc<Rule>,
    pub values: Option<HashMap<String, String>>,
}

impl ApplicableRule {
    pub fn new(rule: Arc<Rule>) -> Self {
        Self { rule, values: None }
    }

    pub fn id(&self) -> &str {
        &self.rule.id
    }
}

/// Rules of `rule_type` that apply to `identifier` under each rule's polarity.
///
/// An absent or blank identifier gets nothing, including `not_matching` rules.
pub fn applicable_rules(
    snapshot: &RuleSnapshot,
    identifier: Option<&str>,
    rule_type: RuleType,
    config: &CohortConfig,
) -> Vec<ApplicableRule> {
    let identifier = match identifier {
        Some(id) if !id.trim().is_empty() => id,
        _ => return Vec::new(),
    };

    snapshot
        .of_type(rule_type)
        .filter_map(|rule| {
            match (config.assignment(identifier, &rule.id, rule_type), rule.applied_to) {
                (Some(assignment), AppliedTo::Matching) => Some(ApplicableRule {
                    rule: rule.clone(),
                    values: Some(assignment.values.clone()),
                }),
                (None, AppliedTo::NotMatching) => Some(ApplicableRule::new(rule.clone())),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(rules: Vec<Rule>) -> RuleSnapshot {
        RuleSnapshot::build(rules, 1).unwrap()
    }

    fn ids(rules: &[ApplicableRule]) -> Vec<&str> {
        rules.iter().map(ApplicableRule::id).collect()
    }

    #[test]
    fn absent_identifier_gets_nothing() {
        let snap = snapshot(vec![Rule::user("u1"), Rule::user("u2").not_matching()]);
        let config = CohortConfig::default().assign_user("", RuleAssignment::new("u1"));

        assert!(applicable_rules(&snap, None, RuleType::User, &config).is_empty());
        assert!(applicable_rules(&snap, Some(""), RuleType::User, &config).is_empty());
        assert!(applicable_rules(&snap, Some("   "), RuleType::User, &config).is_empty());
    }

    #[test]
    fn identifier_is_looked_up_verbatim() {
        let snap = snapshot(vec![Rule::user("vip")]);
        let config = CohortConfig::default().assign_user(" alice", RuleAssignment::new("vip"));

        assert_eq!(ids(&applicable_rules(&snap, Some(" alice"), RuleType::User, &config)), vec!["vip"]);
        assert!(applicable_rules(&snap, Some("alice"), RuleType::User, &config).is_empty());
    }

    #[test]
    fn matching_rule_applies_only_to_assigned_identifiers() {
        let snap = snapshot(vec![Rule::user("vip")]);
        let config = CohortConfig::default().assign_user("alice", RuleAssignment::new("vip"));

        assert_eq!(ids(&applicable_rules(&snap, Some("alice"), RuleType::User, &config)), vec!["vip"]);
        assert!(applicable_rules(&snap, Some("bob"), RuleType::User, &config).is_empty());
    }

    #[test]
    fn not_matching_rule_applies_to_everyone_else() {
        let snap = snapshot(vec![Rule::user("trial").not_matching()]);
        let config = CohortConfig::default().assign_user("alice", RuleAssignment::new("trial"));

        assert!(applicable_rules(&snap, Some("alice"), RuleType::User, &config).is_empty());
        assert_eq!(ids(&applicable_rules(&snap, Some("bob"), RuleType::User, &config)), vec!["trial"]);
    }

    #[test]
    fn membership_is_per_rule_not_per_key() {
        let snap = snapshot(vec![Rule::user("a"), Rule::user("b").not_matching()]);
        // alice is a key, but only for rule "a".
        let config = CohortConfig::default().assign_user("alice", RuleAssignment::new("a"));

        assert_eq!(ids(&applicable_rules(&snap, Some("alice"), RuleType::User, &config)), vec!["a", "b"]);

        let empty_list = CohortConfig {
            user_rules: HashMap::from([("carol".to_string(), Vec::new())]),
            ..Default::default()
        };
        assert_eq!(ids(&applicable_rules(&snap, Some("carol"), RuleType::User, &empty_list)), vec!["b"]);
    }

    #[test]
    fn assigned_rules_carry_their_values() {
        let snap = snapshot(vec![Rule::company("plan")]);
        let config = CohortConfig::default()
            .assign_company("acme", RuleAssignment::new("plan").with_value("company.plan", "Gold"));

        let rules = applicable_rules(&snap, Some("acme"), RuleType::Company, &config);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].values.as_ref().unwrap()["company.plan"], "Gold");
    }

    #[test]
    fn user_and_company_tables_are_separate() {
        let snap = snapshot(vec![Rule::user("shared-id"), Rule::company("c")]);
        let config = CohortConfig::default().assign_company("x", RuleAssignment::new("shared-id"));

        assert!(!is_assigned("x", "shared-id", &config, RuleType::User));
        assert!(is_assigned("x", "shared-id", &config, RuleType::Company));
        assert!(applicable_rules(&snap, Some("x"), RuleType::User, &config).is_empty());
        assert!(!is_assigned("x", "shared-id", &config, RuleType::Regex));
    }

    #[test]
    fn output_preserves_store_order() {
        let snap = snapshot(vec![
            Rule::user("third").not_matching(),
            Rule::user("first").not_matching(),
            Rule::user("second").not_matching(),
        ]);
        let rules = applicable_rules(&snap, Some("anyone"), RuleType::User, &CohortConfig::default());
        assert_eq!(ids(&rules), vec!["third", "first", "second"]);
    }
}
