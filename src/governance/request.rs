//! The request view the engine evaluates against.
//!
//! Built by the caller from whatever transport it sits in. Header names are
//! lower-cased on insert so lookups are case-insensitive.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Already-normalized request metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceRequest {
    /// HTTP method, e.g. `GET`.
    pub verb: String,

    /// Normalized request path, without query string.
    pub route: String,

    /// Client address, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Request headers keyed by lower-cased name.
    pub headers: HashMap<String, String>,

    /// Query string parameters.
    pub query: HashMap<String, String>,

    /// Parsed JSON body, when the caller captured one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl GovernanceRequest {
    pub fn new(verb: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            route: route.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Resolve a dotted field path (e.g. `request.route`) to its string value.
    ///
    /// Returns `None` for anything that cannot be resolved: unknown roots,
    /// missing headers/params, or body paths that land on a non-scalar.
    pub fn resolve(&self, path: &str) -> Option<String> {
        let rest = path.trim().strip_prefix("request.")?;
        let (field, tail) = match rest.split_once('.') {
            Some((field, tail)) => (field, Some(tail)),
            None => (rest, None),
        };

        match (field, tail) {
            ("route", None) => Some(self.route.clone()),
            ("verb", None) | ("method", None) => Some(self.verb.clone()),
            ("ip_address", None) => self.ip_address.clone(),
            ("headers", Some(name)) => self.header(name).map(str::to_string),
            ("query", Some(name)) => self.query.get(name).cloned(),
            ("body", Some(tail)) => {
                let mut current = self.body.as_ref()?;
                for segment in tail.split('.') {
                    current = match current {
                        Value::Object(map) => map.get(segment)?,
                        Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                        _ => return None,
                    };
                }
                scalar_text(current)
            }
            _ => None,
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
