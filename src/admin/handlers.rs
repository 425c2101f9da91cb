use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::governance::merger::{collect_applicable, fold};
use crate::governance::{GovernanceDocument, GovernanceRequest, ResponseHolder, Rule, RuleType};
use crate::observability::metrics;

#[derive(Debug, Serialize, Deserialize)]
pub struct RuleCounts {
    pub total: usize,
    pub regex: usize,
    pub user: usize,
    pub company: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub generation: u64,
    pub rules: RuleCounts,
    pub users: usize,
    pub companies: usize,
}

/// Dry-run input: who is calling and what they request.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateRequest {
    pub user_id: Option<String>,
    pub company_id: Option<String>,
    pub request: GovernanceRequest,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub blocked: bool,
    /// Applicable rule ids in processing order.
    pub applied: Vec<String>,
    pub decision: ResponseHolder,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallResponse {
    pub generation: u64,
    pub rules: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.engine.snapshot();
    let cohorts = snapshot.cohorts();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        generation: snapshot.generation(),
        rules: RuleCounts {
            total: snapshot.len(),
            regex: snapshot.count(RuleType::Regex),
            user: snapshot.count(RuleType::User),
            company: snapshot.count(RuleType::Company),
        },
        users: cohorts.user_rules.len(),
        companies: cohorts.company_rules.len(),
    })
}

pub async fn get_rules(State(state): State<AdminState>) -> Json<Vec<Rule>> {
    let snapshot = state.engine.snapshot();
    Json(snapshot.rules().iter().map(|r| r.as_ref().clone()).collect())
}

pub async fn put_rules(
    State(state): State<AdminState>,
    Json(document): Json<GovernanceDocument>,
) -> impl IntoResponse {
    match state.engine.install(document) {
        Ok(()) => {
            metrics::record_rule_reload("installed");
            metrics::record_rules_loaded(state.engine.store().len());
            let response = InstallResponse {
                generation: state.engine.store().generation(),
                rules: state.engine.store().len(),
            };
            (StatusCode::OK, Json(serde_json::json!(response)))
        }
        Err(e) => {
            metrics::record_rule_reload("rejected");
            tracing::warn!(error = %e, "Rejected rules submitted over admin API");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}

pub async fn post_evaluate(
    State(state): State<AdminState>,
    Json(input): Json<EvaluateRequest>,
) -> Json<EvaluateResponse> {
    let snapshot = state.engine.snapshot();
    let user_id = input.user_id.as_deref();
    let company_id = input.company_id.as_deref();

    let rules = collect_applicable(&snapshot, snapshot.cohorts(), user_id, company_id, &input.request);
    let decision = fold(&rules);
    let applied = rules.iter().map(|r| r.id().to_string()).collect();

    Json(EvaluateResponse {
        blocked: decision.is_blocked(),
        applied,
        decision,
    })
}
