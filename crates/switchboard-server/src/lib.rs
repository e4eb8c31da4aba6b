//! HTTP surface
//!
//! Four request-serving endpoint families compose the core components:
//! direct invoke, tag-routed invoke, the OpenAI-compatible shim, and
//! session management. Every handler follows the same flow: parse,
//! authenticate, resolve, authorize, rate-limit, invoke, record, respond.

mod auth_routes;
mod error;
mod invoke;
mod middleware;
mod openai_compat;
mod state;
mod streaming;

pub use state::AppState;

use std::net::SocketAddr;

use axum::{Json, Router, routing};
use tokio_util::sync::CancellationToken;

/// Build the full route tree
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", routing::get(health))
        .route("/models/{provider}/{model}/invoke", routing::post(invoke::invoke_model))
        .route("/route/invoke", routing::post(invoke::route_invoke))
        .route("/v1/chat/completions", routing::post(openai_compat::chat_completions))
        .route("/v1/models", routing::get(openai_compat::list_models))
        .route("/auth/login", routing::post(auth_routes::login))
        .route("/auth/logout", routing::post(auth_routes::logout))
        .route("/auth/bind-model", routing::post(auth_routes::bind_model))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Bound listener plus its route tree
pub struct Server {
    listener: tokio::net::TcpListener,
    router: Router,
}

impl Server {
    /// Bind the listener; port 0 picks an ephemeral port
    pub async fn bind(addr: SocketAddr, state: AppState) -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            router: build_router(state),
        })
    }

    /// The bound address (useful with ephemeral ports)
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the token is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let addr = self.listener.local_addr()?;
        tracing::info!(%addr, "gateway listening");

        axum::serve(
            self.listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

        Ok(())
    }
}
