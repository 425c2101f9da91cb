//! Response handling and transformation.
//!
//! # Responsibilities
//! - Render a blocking governance decision as an HTTP response
//! - Decorate pass-through responses with governance headers
//!
//! # Design Decisions
//! - A block rule without a (valid) status answers 403
//! - The body is the rendered rule body serialized as JSON
//! - Header names/values that HTTP cannot carry are skipped with a warning

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;

use crate::governance::ResponseHolder;

/// Build the response sent in place of the upstream call.
pub fn blocked_response(holder: &ResponseHolder) -> Response {
    let status = match holder.status.map(StatusCode::from_u16) {
        Some(Ok(status)) => status,
        Some(Err(_)) => {
            tracing::warn!(status = ?holder.status, blocked_by = ?holder.blocked_by, "Invalid block status; using 403");
            StatusCode::FORBIDDEN
        }
        None => StatusCode::FORBIDDEN,
    };

    let body = match &holder.body {
        Some(value) => match serde_json::to_vec(value) {
            Ok(bytes) => Body::from(bytes),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize block body");
                Body::empty()
            }
        },
        None => Body::empty(),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    apply_headers(response.headers_mut(), &holder.headers);
    response
}

/// Insert governance headers, overwriting same-named upstream headers.
pub fn apply_headers(target: &mut HeaderMap, headers: &BTreeMap<String, String>) {
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                target.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping governance header that is not valid HTTP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use serde_json::json;

    fn blocked(status: Option<u16>) -> ResponseHolder {
        let mut holder = ResponseHolder::new();
        holder.status = status;
        holder.body = Some(json!({ "message": "denied" }));
        holder.blocked_by = Some("r".into());
        holder.set_header("Content-Type", "application/json");
        holder.set_header("X-Reason", "policy");
        holder
    }

    #[tokio::test]
    async fn renders_status_headers_and_json_body() {
        let response = blocked_response(&blocked(Some(401)));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()["x-reason"], "policy");

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "message": "denied" }));
    }

    #[test]
    fn missing_or_invalid_status_falls_back_to_403() {
        assert_eq!(blocked_response(&blocked(None)).status(), StatusCode::FORBIDDEN);
        assert_eq!(blocked_response(&blocked(Some(42))).status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn invalid_headers_are_skipped() {
        let mut map = HeaderMap::new();
        map.insert("x-existing", HeaderValue::from_static("old"));
        let headers = BTreeMap::from([
            ("X-Existing".to_string(), "new".to_string()),
            ("bad header".to_string(), "v".to_string()),
            ("X-Newline".to_string(), "a\nb".to_string()),
        ]);

        apply_headers(&mut map, &headers);
        assert_eq!(map["x-existing"], "new");
        assert_eq!(map.len(), 1);
    }
}
