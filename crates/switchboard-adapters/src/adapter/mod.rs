//! Adapter trait and per-provider-type implementations

mod anthropic;
mod gemini;
mod generic;
mod ollama;
mod openai;
mod support;
mod transformers;
mod vllm;

use async_trait::async_trait;
use switchboard_catalog::{ModelTarget, ParameterLimits, ProviderType};
use switchboard_core::Deadline;

use crate::error::AdapterError;
use crate::types::{ChunkStream, InvokeRequest, InvokeResponse, StreamChunk};

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use generic::GenericHttpAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiCompatibleAdapter;
pub use transformers::TransformersAdapter;
pub use vllm::VllmAdapter;

/// Capabilities advertised by an adapter
#[derive(Debug, Clone, Copy)]
pub struct AdapterCapabilities {
    /// Whether the adapter can stream natively
    pub streaming: bool,
}

/// Per-call context handed to an adapter
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Deadline propagated from the inbound request; the adapter derives
    /// its upstream timeout from the remaining budget and abandons the
    /// call once it fires
    pub deadline: Deadline,
    /// Credential-imposed parameter caps; applied after the default-merge
    /// so the limiter wins over both caller and catalog defaults
    pub parameter_limits: Option<ParameterLimits>,
}

impl CallContext {
    pub fn new(deadline: Deadline) -> Self {
        Self {
            deadline,
            parameter_limits: None,
        }
    }

    pub fn with_limits(mut self, limits: Option<ParameterLimits>) -> Self {
        self.parameter_limits = limits;
        self
    }
}

/// Trait implemented by each upstream protocol adapter
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter name, matching the provider type string
    fn name(&self) -> &'static str;

    /// Advertised capabilities
    fn capabilities(&self) -> AdapterCapabilities;

    /// Send a non-streaming invocation
    async fn invoke(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        ctx: &CallContext,
    ) -> Result<InvokeResponse, AdapterError>;

    /// Send a streaming invocation
    ///
    /// Adapters without native streaming either refuse with `bad-request`
    /// or fall back to one synchronous yield; the choice is documented on
    /// each implementation.
    async fn invoke_stream(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        ctx: &CallContext,
    ) -> Result<ChunkStream, AdapterError> {
        let _ = (target, request, ctx);
        Err(AdapterError::BadRequest(format!(
            "provider type {} does not support streaming",
            self.name()
        )))
    }
}

/// Dispatch table keyed by provider type
///
/// Constructed once at startup with every type populated; the catalog's
/// type set is closed, so lookups cannot miss. `register` swaps in a
/// replacement, which is how test harnesses install stub adapters.
pub struct AdapterRegistry {
    adapters: std::collections::HashMap<ProviderType, Box<dyn Adapter>>,
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            adapters: std::collections::HashMap::new(),
        };
        registry.register(ProviderType::OpenaiCompatible, Box::new(OpenAiCompatibleAdapter::new()));
        registry.register(ProviderType::Anthropic, Box::new(AnthropicAdapter::new()));
        registry.register(ProviderType::Gemini, Box::new(GeminiAdapter::new()));
        registry.register(ProviderType::OllamaLocal, Box::new(OllamaAdapter::new()));
        registry.register(ProviderType::VllmLocal, Box::new(VllmAdapter::new()));
        registry.register(ProviderType::TransformersLocal, Box::new(TransformersAdapter::new()));
        registry.register(ProviderType::GenericHttp, Box::new(GenericHttpAdapter::new()));
        registry
    }

    /// Replace the adapter for a provider type
    pub fn register(&mut self, provider_type: ProviderType, adapter: Box<dyn Adapter>) {
        self.adapters.insert(provider_type, adapter);
    }

    /// Adapter serving the given provider type
    ///
    /// Every type is populated at construction, so this cannot miss.
    pub fn get(&self, provider_type: ProviderType) -> &dyn Adapter {
        self.adapters
            .get(&provider_type)
            .map(|adapter| adapter.as_ref())
            .expect("registry populated for every provider type")
    }
}

/// Single-yield fallback used by adapters whose upstream cannot stream
pub(crate) async fn single_shot_stream(
    adapter: &dyn Adapter,
    target: &ModelTarget,
    request: &InvokeRequest,
    ctx: &CallContext,
) -> Result<ChunkStream, AdapterError> {
    let response = adapter.invoke(target, request, ctx).await?;
    let chunk = StreamChunk {
        text: Some(response.output_text),
        usage: response.usage,
        cost: response.cost,
        finish_reason: Some("stop".to_owned()),
        raw: Some(response.raw),
        is_final: false,
    };
    Ok(Box::pin(futures_util::stream::iter([Ok(chunk), Ok(StreamChunk::done())])))
}
