//! Metrics collection and exposition.
//!
//! # Metrics
//! - `governance_decisions_total` (counter): decisions by outcome (allow/block)
//! - `governance_blocks_total` (counter): blocks by rule id
//! - `governance_rule_reloads_total` (counter): rule installs by result
//! - `governance_rules_loaded` (gauge): rules in the active snapshot
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a governance decision.
pub fn record_decision(blocked_by: Option<&str>) {
    match blocked_by {
        Some(rule_id) => {
            counter!("governance_decisions_total", "outcome" => "block").increment(1);
            counter!("governance_blocks_total", "rule" => rule_id.to_string()).increment(1);
        }
        None => counter!("governance_decisions_total", "outcome" => "allow").increment(1),
    }
}

/// Record a rule set install attempt ("installed" or "rejected").
pub fn record_rule_reload(result: &'static str) {
    counter!("governance_rule_reloads_total", "result" => result).increment(1);
}

pub fn record_rules_loaded(count: usize) {
    gauge!("governance_rules_loaded").set(count as f64);
}

/// Record a completed gateway request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
