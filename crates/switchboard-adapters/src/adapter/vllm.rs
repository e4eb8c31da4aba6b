//! Local vLLM adapter
//!
//! Every call posts to the single `/v1/completions` endpoint; the server
//! accepts prompt- and message-shaped bodies there. A `base_url` is
//! mandatory; the bearer key is optional. Streaming is refused with
//! bad-request.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use switchboard_catalog::ModelTarget;

use super::support::{apply_setting_headers, endpoint_url, send_json};
use super::{Adapter, AdapterCapabilities, CallContext};
use crate::error::AdapterError;
use crate::protocol::local::VllmCompletionRequest;
use crate::protocol::openai::{OpenAiContent, OpenAiMessage, OpenAiResponse, extract_output_text};
use crate::types::{InvokeRequest, InvokeResponse, effective_parameters};

/// Completion endpoint for every call
const DEFAULT_ENDPOINT: &str = "/v1/completions";

pub struct VllmAdapter {
    client: Client,
}

impl Default for VllmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for VllmAdapter {
    fn name(&self) -> &'static str {
        "vllm-local"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { streaming: false }
    }

    async fn invoke(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        ctx: &CallContext,
    ) -> Result<InvokeResponse, AdapterError> {
        request.validate()?;

        // No default base: a vLLM server address must be configured
        let url = endpoint_url(&target.provider, None, DEFAULT_ENDPOINT)?;
        let wire = self.build_request(target, request, ctx);

        let mut builder = self.client.post(&url).json(&wire);
        if let Some(key) = target.api_keys().first() {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let raw = send_json(apply_setting_headers(builder, &target.provider), ctx.deadline).await?;

        let parsed: OpenAiResponse = serde_json::from_value(raw.clone()).map_err(|e| AdapterError::Upstream {
            status: 200,
            body: format!("unrecognized response shape: {e}"),
        })?;

        Ok(InvokeResponse::new(extract_output_text(&parsed), raw))
    }
}

impl VllmAdapter {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    fn build_request(&self, target: &ModelTarget, request: &InvokeRequest, ctx: &CallContext) -> VllmCompletionRequest {
        let messages = request.messages.as_ref().map(|_| {
            request
                .conversation()
                .iter()
                .filter(|m| !m.content.is_empty())
                .map(|m| OpenAiMessage {
                    role: m.role.as_str().to_owned(),
                    content: OpenAiContent::Text(m.content.as_text()),
                })
                .collect()
        });

        VllmCompletionRequest {
            model: request.remote_identifier(&target.model).to_owned(),
            prompt: request.prompt.clone(),
            messages,
            parameters: effective_parameters(&target.model, request, ctx.parameter_limits.as_ref()),
        }
    }
}
