//! Generic JSON-over-HTTP adapter
//!
//! Posts the normalized payload to a configured endpoint and pulls the
//! reply text out of the common field names. The endpoint may be set per
//! model (config `endpoint`) or per provider. Streaming is refused with
//! bad-request.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use switchboard_catalog::ModelTarget;

use super::support::{apply_setting_headers, send_json};
use super::{Adapter, AdapterCapabilities, CallContext};
use crate::error::AdapterError;
use crate::types::{InvokeRequest, InvokeResponse, Message, effective_parameters};

/// Default endpoint path
const DEFAULT_ENDPOINT: &str = "/invoke";

/// Wire payload: the normalized request, nearly verbatim
#[derive(Debug, Serialize)]
struct GenericPayload {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<Message>>,
    parameters: indexmap::IndexMap<String, Value>,
}

pub struct GenericHttpAdapter {
    client: Client,
}

impl Default for GenericHttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericHttpAdapter {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

#[async_trait]
impl Adapter for GenericHttpAdapter {
    fn name(&self) -> &'static str {
        "generic-http"
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

        // Model-level endpoint wins over the provider setting
        let endpoint = target
            .model
            .config
            .extra
            .get("endpoint")
            .and_then(Value::as_str)
            .or_else(|| target.provider.setting_str("endpoint"))
            .unwrap_or(DEFAULT_ENDPOINT);

        let base = target
            .provider
            .base_url
            .as_ref()
            .map(|u| u.as_str().trim_end_matches('/').to_owned())
            .ok_or_else(|| {
                AdapterError::BadRequest(format!("provider {} requires a base_url", target.provider.name))
            })?;
        let url = format!("{base}/{}", endpoint.trim_start_matches('/'));

        let payload = GenericPayload {
            model: request.remote_identifier(&target.model).to_owned(),
            prompt: request.prompt.clone(),
            messages: request.messages.clone(),
            parameters: effective_parameters(&target.model, request, ctx.parameter_limits.as_ref()),
        };

        let mut builder = self.client.post(&url).json(&payload);
        if let Some(key) = target.api_keys().first() {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let raw = send_json(apply_setting_headers(builder, &target.provider), ctx.deadline).await?;
        Ok(InvokeResponse::new(extract_output(&raw), raw.clone()))
    }
}

/// Reply text from the common field names, joining list replies
fn extract_output(raw: &Value) -> String {
    for key in ["output", "text", "data"] {
        match raw.get(key) {
            Some(Value::String(text)) => return text.clone(),
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            _ => {}
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_extraction_tries_common_fields() {
        assert_eq!(extract_output(&json!({"output": "a"})), "a");
        assert_eq!(extract_output(&json!({"text": "b"})), "b");
        assert_eq!(extract_output(&json!({"data": ["x", "y"]})), "x\ny");
        assert_eq!(extract_output(&json!({"unrelated": 1})), "");
    }
}
