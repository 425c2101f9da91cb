//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use governance_gateway::governance::{
    CohortConfig, Condition, ConditionGroup, GovernanceDocument, Rule, RuleAssignment,
};

/// Start a mock upstream that answers every request with `200 OK` and `body`.
///
/// Returns the bound address and a counter of served requests.
#[allow(dead_code)]
pub async fn start_mock_backend(body: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                // Drain the request head before answering.
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Upstream: mock\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}

pub fn route_is(pattern: &str) -> Vec<ConditionGroup> {
    vec![ConditionGroup::new(vec![Condition {
        path: "request.route".into(),
        value: pattern.into(),
    }])]
}

/// The reference scenario: a blocking regex rule, a company header rule,
/// a `not_matching` user header rule and a blocking user rule.
pub fn scenario_rules() -> Vec<Rule> {
    vec![
        Rule::regex("regexRule", route_is("/api/blocked"))
            .blocking(403, json!({ "message": "regex blocked" })),
        Rule::company("companyHeaderRule").with_header("X-Company-Plan", "{{company.plan|Free}}"),
        Rule::user("userHeaderRule").not_matching().with_header("X-Unused", "1"),
        Rule::user("userBlockRule")
            .blocking(401, json!({ "message": "Hello {{user.name|Friend}}" }))
            .with_variable("user.name"),
    ]
}

pub fn scenario_cohorts() -> CohortConfig {
    CohortConfig::default()
        .assign_user(
            "user123",
            RuleAssignment::new("userBlockRule").with_value("user.name", "Alice"),
        )
        .assign_user("user123", RuleAssignment::new("userHeaderRule"))
        .assign_company(
            "companyABC",
            RuleAssignment::new("companyHeaderRule").with_value("company.plan", "Gold"),
        )
}

#[allow(dead_code)]
pub fn scenario_document() -> GovernanceDocument {
    let cohorts = scenario_cohorts();
    GovernanceDocument {
        rules: scenario_rules(),
        user_rules: cohorts.user_rules,
        company_rules: cohorts.company_rules,
    }
}
