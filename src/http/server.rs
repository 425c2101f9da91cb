//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler
//! - Wire up middleware (governance, tracing, limits, request ID)
//! - Bind server to listener
//! - Install reloaded rule documents
//! - Forward allowed requests to the upstream

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::governance::{GovernanceDocument, GovernanceEngine};
use crate::http::middleware::{governance_middleware, GovernanceState};
use crate::http::request::{request_id, MakeRequestUuidV4};
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Where allowed requests are sent.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub scheme: Scheme,
    pub authority: Authority,
}

impl Upstream {
    /// Parse an upstream base URL. Only scheme and authority are used.
    pub fn parse(url: &str) -> Option<Self> {
        let uri: Uri = url.parse().ok()?;
        let parts = uri.into_parts();
        Some(Self {
            scheme: parts.scheme?,
            authority: parts.authority?,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Option<Upstream>,
}

/// HTTP server for the governance gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    engine: Arc<GovernanceEngine>,
}

impl GatewayServer {
    /// Create a new gateway server around an already-initialized engine.
    pub fn new(config: GatewayConfig, engine: Arc<GovernanceEngine>) -> Self {
        let upstream = config.upstream.url.as_deref().and_then(|url| {
            let parsed = Upstream::parse(url);
            if parsed.is_none() {
                tracing::warn!(url, "Unusable upstream URL; allowed requests will get 502");
            }
            parsed
        });

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = AppState { client, upstream };
        let governance = GovernanceState::new(engine.clone(), &config.governance);

        let router = Self::build_router(&config, state, governance);
        Self {
            router,
            config,
            engine,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, governance: GovernanceState) -> Router {
        Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .layer(middleware::from_fn_with_state(governance, governance_middleware))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.upstream.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// Run the server until `shutdown` fires, installing every document
    /// received on `updates` into the engine.
    pub async fn run(
        self,
        listener: TcpListener,
        updates: mpsc::UnboundedReceiver<GovernanceDocument>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = ?self.config.upstream.url,
            "Gateway server starting"
        );

        tokio::spawn(apply_updates(self.engine.clone(), updates, shutdown.resubscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

/// Install reloaded documents until the channel closes or shutdown fires.
async fn apply_updates(
    engine: Arc<GovernanceEngine>,
    mut updates: mpsc::UnboundedReceiver<GovernanceDocument>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(document) => match engine.install(document) {
                    Ok(()) => {
                        metrics::record_rule_reload("installed");
                        metrics::record_rules_loaded(engine.store().len());
                    }
                    Err(e) => {
                        metrics::record_rule_reload("rejected");
                        tracing::error!(error = %e, "Rejected rules update; keeping current rules");
                    }
                },
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
    tracing::debug!("Rules update task stopped");
}

/// Forward an allowed request to the upstream.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let request_id = request_id(request.headers()).to_string();

    let Some(upstream) = state.upstream.as_ref() else {
        metrics::record_request(&method, 502, start_time);
        return (StatusCode::BAD_GATEWAY, "No upstream configured").into_response();
    };

    let (mut parts, body) = request.into_parts();
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(upstream.scheme.clone());
    uri_parts.authority = Some(upstream.authority.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Could not build upstream URI");
            metrics::record_request(&method, 400, start_time);
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };
    parts.headers.remove(header::HOST);

    tracing::debug!(request_id = %request_id, method = %method, uri = %parts.uri, "Forwarding request");

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), start_time);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_request(&method, 502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
