//! Local transformers inference-server adapter
//!
//! Targets a text-generation-inference style `/generate` endpoint; the
//! gateway never hosts weights itself. Message-shaped requests are
//! rendered to a plain prompt. Streaming is refused with bad-request.

use async_trait::async_trait;
use reqwest::Client;
use switchboard_catalog::ModelTarget;

use super::support::{apply_setting_headers, endpoint_url, send_json};
use super::{Adapter, AdapterCapabilities, CallContext};
use crate::error::AdapterError;
use crate::protocol::local::{TgiGenerateRequest, TgiGenerateResponse};
use crate::types::{InvokeRequest, InvokeResponse, effective_parameters};

/// Generation endpoint path
const DEFAULT_ENDPOINT: &str = "/generate";

pub struct TransformersAdapter {
    client: Client,
}

impl Default for TransformersAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformersAdapter {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

#[async_trait]
impl Adapter for TransformersAdapter {
    fn name(&self) -> &'static str {
        "transformers-local"
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

        let inputs = request.prompt.clone().unwrap_or_else(|| render_prompt(request));
        if inputs.is_empty() {
            return Err(AdapterError::BadRequest("nothing to generate from".to_owned()));
        }

        // An inference-server address must be configured
        let url = endpoint_url(&target.provider, None, DEFAULT_ENDPOINT)?;
        let wire = TgiGenerateRequest {
            inputs,
            parameters: effective_parameters(&target.model, request, ctx.parameter_limits.as_ref()),
        };

        let builder = apply_setting_headers(self.client.post(&url).json(&wire), &target.provider);
        let raw = send_json(builder, ctx.deadline).await?;

        let parsed: TgiGenerateResponse = serde_json::from_value(raw.clone()).map_err(|e| AdapterError::Upstream {
            status: 200,
            body: format!("unrecognized response shape: {e}"),
        })?;

        Ok(InvokeResponse::new(parsed.text(), raw))
    }
}

/// Render a conversation as "Role: content" lines
fn render_prompt(request: &InvokeRequest) -> String {
    request
        .conversation()
        .iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| {
            let role = m.role.as_str();
            let mut label = role.to_owned();
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            format!("{label}: {}", m.content.as_text())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Role};

    #[test]
    fn conversation_renders_to_labeled_lines() {
        let request = InvokeRequest {
            messages: Some(vec![
                Message::text(Role::System, "be brief"),
                Message::text(Role::User, "hi"),
            ]),
            ..InvokeRequest::default()
        };
        assert_eq!(render_prompt(&request), "System: be brief\nUser: hi");
    }
}
