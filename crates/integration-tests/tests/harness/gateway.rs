//! In-process gateway wired to the mock upstream

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use switchboard_adapters::AdapterRegistry;
use switchboard_auth::{Authenticator, SessionStore};
use switchboard_catalog::{
    Catalog, CatalogSnapshot, Credential, KeySource, Model, ModelConfig, ParameterLimits, Provider, ProviderType,
    RateLimitConfig, normalize_tags,
};
use switchboard_ratelimit::RateLimiter;
use switchboard_recorder::{InvocationRecorder, MemoryRecordStore, RecorderHandle};
use switchboard_router::RouterEngine;
use switchboard_server::{AppState, Server};
use tokio_util::sync::CancellationToken;

/// Gateway bound to an ephemeral port, with its record store exposed
pub struct Gateway {
    addr: SocketAddr,
    shutdown: CancellationToken,
    pub records: Arc<MemoryRecordStore>,
    pub recorder: InvocationRecorder,
    recorder_handle: Option<RecorderHandle>,
}

impl Gateway {
    /// Start a gateway over the standard test catalog
    pub async fn start(upstream_base_url: &str) -> anyhow::Result<Self> {
        Self::start_with(test_catalog(upstream_base_url), Duration::from_secs(2)).await
    }

    /// Start over an arbitrary catalog snapshot
    pub async fn start_with(snapshot: CatalogSnapshot, request_timeout: Duration) -> anyhow::Result<Self> {
        let catalog = Catalog::new(snapshot);

        let records = Arc::new(MemoryRecordStore::new());
        let (recorder, recorder_handle) = InvocationRecorder::spawn(records.clone(), 64, false);

        let sessions = Arc::new(SessionStore::new(Duration::from_secs(3600)));
        let auth = Authenticator::new(catalog.clone(), sessions, true);

        let engine = RouterEngine::new(catalog, AdapterRegistry::new(), RateLimiter::new(), recorder.clone());
        let state = AppState::new(engine, auth, request_timeout);

        let server = Server::bind("127.0.0.1:0".parse()?, state).await?;
        let addr = server.local_addr()?;
        let shutdown = CancellationToken::new();
        let server_shutdown = shutdown.clone();

        tokio::spawn(async move {
            server.serve(server_shutdown).await.ok();
        });

        Ok(Self {
            addr,
            shutdown,
            records,
            recorder,
            recorder_handle: Some(recorder_handle),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Wait until at least `n` records reached the store
    pub async fn wait_for_records(&self, n: usize) {
        for _ in 0..100 {
            if self.records.len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} records, found {}", self.records.len());
    }

    /// Stop the server and drain the recorder
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.recorder_handle.take() {
            handle.shutdown().await;
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Catalog used by most scenarios
///
/// One openai-compatible provider (the mock upstream) with a chat model,
/// a coding model, a rate-limited model, and two credentials: one
/// restricted to a foreign model, one with a max_tokens cap.
pub fn test_catalog(upstream_base_url: &str) -> CatalogSnapshot {
    let provider = Provider {
        name: "p1".to_owned(),
        provider_type: ProviderType::OpenaiCompatible,
        base_url: Some(upstream_base_url.parse().expect("valid mock url")),
        api_keys: vec![],
        settings: IndexMap::new(),
        is_active: true,
    };

    let m1 = model("p1", "m1", &["chat", "general"], None);
    let m2 = model("p1", "m2", &["coding"], None);
    let m3 = model(
        "p1",
        "m3",
        &["slow"],
        Some(RateLimitConfig {
            max_requests: 1,
            per_seconds: 60,
            burst_size: None,
        }),
    );

    let restricted = Credential {
        id: "restricted".to_owned(),
        secret: KeySource::Literal(SecretString::from("sk-restricted")),
        name: None,
        is_active: true,
        allowed_models: Some(vec!["p2/m2".to_owned()]),
        allowed_providers: None,
        parameter_limits: None,
    };
    let limited = Credential {
        id: "limited".to_owned(),
        secret: KeySource::Literal(SecretString::from("sk-limited")),
        name: None,
        is_active: true,
        allowed_models: None,
        allowed_providers: None,
        parameter_limits: Some(ParameterLimits {
            max_tokens: Some(500),
            ..ParameterLimits::default()
        }),
    };

    CatalogSnapshot::new(vec![provider], vec![m1, m2, m3], vec![restricted, limited]).expect("valid test catalog")
}

pub fn model(provider: &str, name: &str, tags: &[&str], rate_limit: Option<RateLimitConfig>) -> Model {
    Model {
        name: name.to_owned(),
        provider_name: provider.to_owned(),
        display_name: None,
        description: None,
        remote_identifier: None,
        tags: normalize_tags(tags.iter().copied()),
        default_params: IndexMap::new(),
        config: ModelConfig::default(),
        rate_limit,
        is_active: true,
    }
}
