//! End-to-end tests: gateway in front of a mock upstream.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use governance_gateway::config::GatewayConfig;
use governance_gateway::governance::{GovernanceDocument, GovernanceEngine, Rule};
use governance_gateway::{GatewayServer, Shutdown};

mod common;

struct Harness {
    base: String,
    client: reqwest::Client,
    updates: mpsc::UnboundedSender<GovernanceDocument>,
    shutdown: Shutdown,
    server: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

async fn start_gateway(upstream: Option<String>) -> Harness {
    let engine = Arc::new(GovernanceEngine::new());
    engine.install(common::scenario_document()).unwrap();

    let mut config = GatewayConfig::default();
    config.upstream.url = upstream;
    config.observability.metrics_enabled = false;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (updates, rx) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config, engine);
    let server = tokio::spawn(server.run(listener, rx, shutdown.subscribe()));

    Harness {
        base: format!("http://{}", addr),
        client: reqwest::Client::builder().no_proxy().build().unwrap(),
        updates,
        shutdown,
        server,
    }
}

#[tokio::test]
async fn test_assigned_user_is_blocked_before_upstream() {
    let (upstream, hits) = common::start_mock_backend("upstream ok").await;
    let gw = start_gateway(Some(format!("http://{}", upstream))).await;

    let res = gw
        .client
        .get(format!("{}/api/blocked", gw.base))
        .header("x-user-id", "user123")
        .header("x-company-id", "companyABC")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 401);
    assert_eq!(res.headers()["x-company-plan"], "Gold");
    assert_eq!(res.headers()["content-type"], "application/json");
    assert!(res.headers().get("x-unused").is_none());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Hello Alice" }));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_regex_block_for_other_users() {
    let (upstream, hits) = common::start_mock_backend("upstream ok").await;
    let gw = start_gateway(Some(format!("http://{}", upstream))).await;

    let res = gw
        .client
        .get(format!("{}/api/blocked", gw.base))
        .header("x-user-id", "otherUser")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 403);
    assert_eq!(res.headers()["x-unused"], "1");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "regex blocked");
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_allowed_request_is_forwarded_with_rule_headers() {
    let (upstream, hits) = common::start_mock_backend("upstream ok").await;
    let gw = start_gateway(Some(format!("http://{}", upstream))).await;

    let res = gw
        .client
        .get(format!("{}/api/open?page=2", gw.base))
        .header("x-user-id", "otherUser")
        .header("x-company-id", "companyABC")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-upstream"], "mock");
    assert_eq!(res.headers()["x-unused"], "1");
    assert_eq!(res.headers()["x-company-plan"], "Gold");
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "upstream ok");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_missing_upstream_is_bad_gateway() {
    let gw = start_gateway(None).await;

    let res = gw
        .client
        .get(format!("{}/api/open", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);

    // Blocks are still answered locally.
    let res = gw
        .client
        .get(format!("{}/api/blocked", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_reloaded_document_takes_effect() {
    let (upstream, _hits) = common::start_mock_backend("upstream ok").await;
    let gw = start_gateway(Some(format!("http://{}", upstream))).await;

    let mut document = common::scenario_document();
    document.rules.push(
        Rule::regex("maintenance", common::route_is("^/api/open"))
            .blocking(503, json!({ "message": "down for maintenance" })),
    );
    gw.updates.send(document).unwrap();

    let mut status = 0;
    for _ in 0..50 {
        status = gw
            .client
            .get(format!("{}/api/open", gw.base))
            .send()
            .await
            .unwrap()
            .status()
            .as_u16();
        if status == 503 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, 503);

    // An invalid update is rejected and the previous rules stay active.
    let mut broken = common::scenario_document();
    broken.rules.push(Rule::regex("bad", common::route_is("(unclosed")));
    gw.updates.send(broken).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = gw
        .client
        .get(format!("{}/api/open", gw.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let gw = start_gateway(None).await;

    gw.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), gw.server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
