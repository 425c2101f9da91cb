//! `{{name}}` / `{{name|default}}` interpolation.
//!
//! Each placeholder is parsed into two tokens, a name and an optional default.
//! A present variable wins, then the default, then the literal `UNKNOWN`.
//! Substituted text is never scanned again.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

/// Substituted when a variable is missing and no default is given.
pub const UNKNOWN: &str = "UNKNOWN";

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([^{}|]*?)\s*(?:\|\s*([^{}]*?))?\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Render every string inside `value`, walking objects and arrays.
/// Non-string leaves pass through unchanged.
pub fn render(value: &Value, variables: &HashMap<String, String>) -> Value {
    match value {
        Value::String(text) => Value::String(render_str(text, variables)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render(v, variables)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve all placeholders in one string.
pub fn render_str(text: &str, variables: &HashMap<String, String>) -> String {
    placeholder()
        .replace_all(text, |caps: &Captures<'_>| {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if name.is_empty() {
                return caps[0].to_string();
            }
            match (variables.get(name), caps.get(2)) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.as_str().to_string(),
                (None, None) => UNKNOWN.to_string(),
            }
        })
        .into_owned()
}

/// Names referenced by placeholders in `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<String> {
    placeholder()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Names referenced anywhere inside `value`.
pub fn placeholders_in(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => placeholders(text),
        Value::Array(items) => items.iter().flat_map(placeholders_in).collect(),
        Value::Object(map) => map.values().flat_map(placeholders_in).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn variable_then_default_then_unknown() {
        let alice = vars(&[("user.name", "Alice")]);
        let none = HashMap::new();

        assert_eq!(render_str("{{user.name|Friend}}", &alice), "Alice");
        assert_eq!(render_str("{{user.name|Friend}}", &none), "Friend");
        assert_eq!(render_str("{{not.provided}}", &none), "UNKNOWN");
    }

    #[test]
    fn placeholders_resolve_independently() {
        let v = vars(&[("a", "1")]);
        assert_eq!(
            render_str("a={{a|x}} b={{b|y}} c={{c}}", &v),
            "a=1 b=y c=UNKNOWN"
        );
    }

    #[test]
    fn whitespace_and_empty_default() {
        let v = vars(&[("plan", "Gold")]);
        assert_eq!(render_str("{{ plan | Free }}", &v), "Gold");
        assert_eq!(render_str("{{ tier | Free Tier }}", &v), "Free Tier");
        assert_eq!(render_str("[{{missing|}}]", &v), "[]");
        assert_eq!(render_str("[{{ missing |   }}]", &v), "[]");
        assert_eq!(render_str("{{missing|  spaced  out  }}", &v), "spaced  out");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let v = vars(&[("a", "{{b}}"), ("b", "nope")]);
        assert_eq!(render_str("{{a}}", &v), "{{b}}");
        let d = vars(&[("b", "nope")]);
        assert_eq!(render_str("{{missing|{b}}", &d), "{{missing|{b}}");
    }

    #[test]
    fn malformed_placeholders_are_left_alone() {
        let v = HashMap::new();
        assert_eq!(render_str("{{}} and {{unterminated", &v), "{{}} and {{unterminated");
        assert_eq!(render_str("no placeholders", &v), "no placeholders");
    }

    #[test]
    fn walks_nested_values() {
        let v = vars(&[("user.name", "Alice")]);
        let body = json!({
            "message": "Hello {{user.name|Friend}}",
            "details": ["{{reason|quota}}", 42, null, true],
            "nested": { "who": "{{user.name}}" }
        });

        assert_eq!(
            render(&body, &v),
            json!({
                "message": "Hello Alice",
                "details": ["quota", 42, null, true],
                "nested": { "who": "Alice" }
            })
        );
    }

    #[test]
    fn lists_referenced_names() {
        assert_eq!(placeholders("{{a}} {{ b|x }} {{}}"), vec!["a", "b"]);
        assert_eq!(
            placeholders_in(&json!({ "m": "{{user.name}}", "l": ["{{c|d}}"] })).len(),
            2
        );
    }
}
