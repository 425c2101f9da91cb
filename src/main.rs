//! API Governance Gateway (v1)
//!
//! An inline governance layer built with Tokio and Axum: every request is
//! evaluated against the active rule set before it may reach the upstream.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────┐
//!                        │                GOVERNANCE GATEWAY                 │
//!                        │                                                   │
//!     Client Request     │  ┌─────────┐    ┌────────────┐    ┌────────────┐  │
//!     ───────────────────┼─▶│  http   │───▶│ governance │───▶│  forward   │──┼──▶ Upstream
//!                        │  │ server  │    │ middleware │    │  handler   │  │
//!                        │  └─────────┘    └─────┬──────┘    └────────────┘  │
//!                        │                       │ blocked                   │
//!     Client Response    │                       ▼                           │
//!     ◀──────────────────┼──────────── status / headers / JSON body          │
//!                        │                                                   │
//!                        │  ┌─────────────────────────────────────────────┐  │
//!                        │  │ governance core: store → matcher / cohort   │  │
//!                        │  │                  → merger → template        │  │
//!                        │  └─────────────────────────────────────────────┘  │
//!                        │  ┌────────┐ ┌──────────┐ ┌───────┐ ┌───────────┐  │
//!                        │  │ config │ │ observa- │ │ admin │ │ lifecycle │  │
//!                        │  │+watcher│ │ bility   │ │  API  │ │           │  │
//!                        │  └────────┘ └──────────┘ └───────┘ └───────────┘  │
//!                        └───────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `governance-gateway [CONFIG_PATH]` (defaults apply without a path).

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use governance_gateway::admin::{setup_admin_router, AdminState};
use governance_gateway::config::loader::load_config;
use governance_gateway::config::watcher::DocumentWatcher;
use governance_gateway::config::GatewayConfig;
use governance_gateway::lifecycle::{shutdown, signals, startup, Shutdown};
use governance_gateway::observability::{logging, metrics};
use governance_gateway::GatewayServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("governance-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        rules_path = ?config.governance.rules_path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let engine = startup::bootstrap(&config)?;
    let shutdown = Shutdown::new();

    // Keep the watcher handle alive for the lifetime of the server.
    let (_watcher, updates) = match (&config.governance.rules_path, config.governance.watch) {
        (Some(path), true) => {
            let (watcher, updates) = DocumentWatcher::new(Path::new(path));
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        let admin = setup_admin_router(AdminState {
            engine: engine.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(admin_listener, admin)
                .with_graceful_shutdown(shutdown::wait(admin_shutdown))
                .await
            {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = GatewayServer::new(config, engine);
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, updates, server_shutdown));

    signals::wait_for_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
