//! Governance rule definitions.
//!
//! A rule is a shared base record (id, polarity, block flag, response) plus a
//! type-specific payload carried by [`RuleKind`]. Only regex rules carry a
//! payload: their condition groups.
//!
//! ```json
//! {
//!   "id": "block-admin",
//!   "type": "regex",
//!   "block": true,
//!   "response": { "status": 403, "body": { "message": "Forbidden" } },
//!   "regex_config": [
//!     { "conditions": [ { "path": "request.route", "value": "^/admin" } ] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The evaluator family a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Regex,
    User,
    Company,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleType::Regex => write!(f, "regex"),
            RuleType::User => write!(f, "user"),
            RuleType::Company => write!(f, "company"),
        }
    }
}

/// Whether a rule fires for cohort members or for everyone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedTo {
    #[default]
    Matching,
    NotMatching,
}

/// A single `{path, value}` test: the request field at `path` must match
/// the regular expression `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub path: String,
    pub value: String,
}

/// Conditions combined with AND semantics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }
}

/// Type tag plus type-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Pattern-triggered rule. Groups are OR'd.
    Regex {
        #[serde(default)]
        regex_config: Vec<ConditionGroup>,
    },
    /// Cohort rule keyed by user id.
    User,
    /// Cohort rule keyed by company id.
    Company,
}

impl RuleKind {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleKind::Regex { .. } => RuleType::Regex,
            RuleKind::User => RuleType::User,
            RuleKind::Company => RuleType::Company,
        }
    }
}

/// Response emitted (or contributed to) when the rule applies.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Declares a variable name the rule's response text may reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVariable {
    pub name: String,
}

/// A governance rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier within a rule set.
    pub id: String,

    /// Human-readable label for logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub kind: RuleKind,

    #[serde(default)]
    pub applied_to: AppliedTo,

    #[serde(default)]
    pub block: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<RuleResponse>,

    #[serde(default)]
    pub variables: Vec<RuleVariable>,
}

impl Rule {
    fn with_kind(id: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
            applied_to: AppliedTo::Matching,
            block: false,
            response: None,
            variables: Vec::new(),
        }
    }

    /// A regex rule with the given condition groups.
    pub fn regex(id: impl Into<String>, regex_config: Vec<ConditionGroup>) -> Self {
        Self::with_kind(id, RuleKind::Regex { regex_config })
    }

    /// A user cohort rule.
    pub fn user(id: impl Into<String>) -> Self {
        Self::with_kind(id, RuleKind::User)
    }

    /// A company cohort rule.
    pub fn company(id: impl Into<String>) -> Self {
        Self::with_kind(id, RuleKind::Company)
    }

    /// Flip the rule's polarity to `not_matching`.
    pub fn not_matching(mut self) -> Self {
        self.applied_to = AppliedTo::NotMatching;
        self
    }

    /// Mark the rule as blocking with the given status and body.
    pub fn blocking(mut self, status: u16, body: Value) -> Self {
        self.block = true;
        let response = self.response.get_or_insert_with(RuleResponse::default);
        response.status = Some(status);
        response.body = Some(body);
        self
    }

    /// Add a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response
            .get_or_insert_with(RuleResponse::default)
            .headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Declare a template variable.
    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variables.push(RuleVariable { name: name.into() });
        self
    }

    pub fn rule_type(&self) -> RuleType {
        self.kind.rule_type()
    }

    /// Condition groups of a regex rule; empty for cohort rules.
    pub fn condition_groups(&self) -> &[ConditionGroup] {
        match &self.kind {
            RuleKind::Regex { regex_config } => regex_config,
            _ => &[],
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().and_then(|r| r.status)
    }

    pub fn headers(&self) -> Option<&BTreeMap<String, String>> {
        self.response.as_ref().and_then(|r| r.headers.as_ref())
    }

    pub fn body(&self) -> Option<&Value> {
        self.response.as_ref().and_then(|r| r.body.as_ref())
    }

    /// Whether `name` is listed in the rule's declared variables.
    pub fn declares(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    /// Label for logs: the name if set, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
