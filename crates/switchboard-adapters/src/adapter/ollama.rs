//! Local Ollama adapter
//!
//! Conversations go to `/api/chat`, bare prompts to `/api/generate`, and
//! generation parameters ride under `options`. No credentials are sent.
//! Streaming is refused with bad-request.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use switchboard_catalog::ModelTarget;

use super::support::{apply_setting_headers, endpoint_url, send_json};
use super::{Adapter, AdapterCapabilities, CallContext};
use crate::error::AdapterError;
use crate::protocol::local::{OllamaChatRequest, OllamaGenerateRequest, OllamaMessage, OllamaResponse};
use crate::types::{InvokeRequest, InvokeResponse, Usage, effective_parameters};

/// Default daemon address
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

pub struct OllamaAdapter {
    client: Client,
}

impl Default for OllamaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaAdapter {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

#[async_trait]
impl Adapter for OllamaAdapter {
    fn name(&self) -> &'static str {
        "ollama-local"
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

        let options = effective_parameters(&target.model, request, ctx.parameter_limits.as_ref());
        let model = request.remote_identifier(&target.model).to_owned();
        let chat = request.messages.is_some();

        let endpoint = if chat { "/api/chat" } else { "/api/generate" };
        let url = endpoint_url(&target.provider, Some(DEFAULT_BASE_URL), endpoint)?;

        let builder = if chat {
            let messages = request
                .conversation()
                .iter()
                .filter(|m| !m.content.is_empty())
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_owned(),
                    content: m.content.as_text(),
                })
                .collect();
            self.client.post(&url).json(&OllamaChatRequest {
                model,
                messages,
                stream: false,
                options,
            })
        } else {
            self.client.post(&url).json(&OllamaGenerateRequest {
                model,
                prompt: request.prompt.clone().unwrap_or_default(),
                stream: false,
                options,
            })
        };

        let raw = send_json(apply_setting_headers(builder, &target.provider), ctx.deadline).await?;

        let parsed: OllamaResponse = serde_json::from_value(raw.clone()).map_err(|e| AdapterError::Upstream {
            status: 200,
            body: format!("unrecognized response shape: {e}"),
        })?;

        let output_text = parsed
            .message
            .map(|m| m.content)
            .or(parsed.response)
            .or_else(|| raw.get("output").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_default();
        let usage = Usage::from_counts(parsed.prompt_eval_count, parsed.eval_count);

        Ok(InvokeResponse {
            output_text,
            usage,
            cost: None,
            raw,
        })
    }
}
