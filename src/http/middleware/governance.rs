//! Governance Middleware.
//! Evaluates every request against the active rule set.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    middleware::Next,
    response::Response,
};

use crate::config::GovernanceConfig;
use crate::governance::GovernanceEngine;
use crate::http::request::{governance_request, identity, request_id};
use crate::http::response::{apply_headers, blocked_response};
use crate::observability::metrics;

/// State required by the governance middleware.
#[derive(Clone)]
pub struct GovernanceState {
    pub engine: Arc<GovernanceEngine>,
    pub user_id_header: HeaderName,
    pub company_id_header: HeaderName,
}

impl GovernanceState {
    /// Header names fall back to the defaults if the configured ones are
    /// invalid; validation rejects those before startup anyway.
    pub fn new(engine: Arc<GovernanceEngine>, config: &GovernanceConfig) -> Self {
        Self {
            engine,
            user_id_header: HeaderName::from_bytes(config.user_id_header.as_bytes())
                .unwrap_or(HeaderName::from_static("x-user-id")),
            company_id_header: HeaderName::from_bytes(config.company_id_header.as_bytes())
                .unwrap_or(HeaderName::from_static("x-company-id")),
        }
    }
}

pub async fn governance_middleware(
    State(state): State<GovernanceState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let view = governance_request(&req);
    let user_id = identity(req.headers(), &state.user_id_header);
    let company_id = identity(req.headers(), &state.company_id_header);

    let holder = state
        .engine
        .evaluate(user_id.as_deref(), company_id.as_deref(), &view);
    metrics::record_decision(holder.blocked_by.as_deref());

    if holder.is_blocked() {
        tracing::info!(
            request_id = %request_id(req.headers()),
            route = %view.route,
            user_id = ?user_id,
            company_id = ?company_id,
            blocked_by = ?holder.blocked_by,
            status = ?holder.status,
            "Request blocked by governance rule"
        );
        return blocked_response(&holder);
    }

    let mut response = next.run(req).await;
    apply_headers(response.headers_mut(), &holder.headers);
    response
}
