mod args;

use std::net::SocketAddr;
use std::sync::Arc;

use args::Args;
use clap::Parser;
use switchboard_adapters::AdapterRegistry;
use switchboard_auth::{Authenticator, SessionStore};
use switchboard_catalog::Catalog;
use switchboard_config::{CatalogFile, GatewayConfig};
use switchboard_ratelimit::RateLimiter;
use switchboard_recorder::{InvocationRecorder, JsonlRecordStore, MemoryRecordStore, RecordStore};
use switchboard_router::RouterEngine;
use switchboard_server::{AppState, Server};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_filter);

    let config = GatewayConfig::load(&args.config)?;

    // Seed the catalog from the configured file, if any
    let catalog = Catalog::default();
    if let Some(path) = &config.catalog_path {
        let snapshot = CatalogFile::load(path)?.into_snapshot()?;
        catalog.replace(snapshot);
    } else {
        tracing::warn!("no catalog_path configured; starting with an empty catalog");
    }

    // Observability store: JSONL file when configured, memory otherwise
    let store: Arc<dyn RecordStore> = match &config.recorder.output_path {
        Some(path) => Arc::new(JsonlRecordStore::new(path.clone())),
        None => Arc::new(MemoryRecordStore::new()),
    };
    let (recorder, recorder_handle) =
        InvocationRecorder::spawn(store, config.recorder.queue_size, config.recorder.full_capture);

    let sessions = Arc::new(SessionStore::new(config.auth.session_ttl()));
    let auth = Authenticator::new(catalog.clone(), Arc::clone(&sessions), config.auth.require_auth);

    let engine = RouterEngine::new(catalog, AdapterRegistry::new(), RateLimiter::new(), recorder);
    let state = AppState::new(engine, auth, config.server.request_timeout());

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let server = Server::bind(addr, state).await?;

    // Graceful shutdown plumbing
    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_shutdown.cancel();
    });

    let sweeper_sessions = Arc::clone(&sessions);
    let sweeper_shutdown = shutdown.clone();
    tokio::spawn(async move {
        sweeper_sessions.run_sweeper(sweeper_shutdown).await;
    });

    server.serve(shutdown).await?;

    // Drain queued invocation records before exiting
    recorder_handle.shutdown().await;

    tracing::info!("switchboard stopped");
    Ok(())
}

fn init_tracing(filter: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
