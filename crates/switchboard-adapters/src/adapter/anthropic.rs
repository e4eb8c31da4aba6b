//! Anthropic Messages API adapter
//!
//! System prompts are lifted out of the message list, `max_tokens` is
//! mandatory, and streaming is served natively over SSE.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use switchboard_catalog::ModelTarget;

use super::support::{apply_setting_headers, endpoint_url, send_json, send_sse};
use super::{Adapter, AdapterCapabilities, CallContext};
use crate::error::AdapterError;
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicRequest, AnthropicResponse,
    AnthropicStreamDelta, AnthropicStreamEvent, extract_output_text,
};
use crate::rotation::{KeyRing, with_key_rotation};
use crate::types::{ChunkStream, Content, ContentPart, InvokeRequest, InvokeResponse, Role, StreamChunk, Usage,
    effective_parameters};

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// Messages endpoint path
const DEFAULT_ENDPOINT: &str = "/v1/messages";
/// API version header value
const DEFAULT_VERSION: &str = "2023-06-01";
/// Applied when neither caller nor catalog set a token cap
const FALLBACK_MAX_TOKENS: u64 = 1024;

pub struct AnthropicAdapter {
    client: Client,
    keys: KeyRing,
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            keys: KeyRing::new(),
        }
    }

    fn build_request(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        ctx: &CallContext,
        stream: bool,
    ) -> Result<AnthropicRequest, AdapterError> {
        let mut system_parts: Vec<String> = Vec::new();
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for message in &request.conversation() {
            if message.content.is_empty() {
                continue;
            }
            match message.role {
                Role::System => system_parts.push(message.content.as_text()),
                role => {
                    // The wire format only knows user and assistant
                    let wire_role = if role == Role::Assistant { "assistant" } else { "user" };
                    messages.push(AnthropicMessage {
                        role: wire_role.to_owned(),
                        content: convert_content(&message.content)?,
                    });
                }
            }
        }

        if messages.is_empty() {
            return Err(AdapterError::BadRequest(
                "at least one user message is required".to_owned(),
            ));
        }

        let mut parameters = effective_parameters(&target.model, request, ctx.parameter_limits.as_ref());
        let max_tokens = parameters
            .shift_remove("max_tokens")
            .or_else(|| parameters.shift_remove("max_output_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(FALLBACK_MAX_TOKENS);

        Ok(AnthropicRequest {
            model: request.remote_identifier(&target.model).to_owned(),
            max_tokens,
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n")),
            messages,
            stream: stream.then_some(true),
            parameters,
        })
    }

    fn decorated(
        &self,
        url: &str,
        target: &ModelTarget,
        wire: &AnthropicRequest,
        key: &SecretString,
    ) -> reqwest::RequestBuilder {
        let version = target
            .provider
            .setting_str("anthropic_version")
            .unwrap_or(DEFAULT_VERSION);
        let builder = self
            .client
            .post(url)
            .header("x-api-key", key.expose_secret())
            .header("anthropic-version", version)
            .json(wire);
        apply_setting_headers(builder, &target.provider)
    }
}

#[async_trait]
impl Adapter for AnthropicAdapter {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities { streaming: true }
    }

    async fn invoke(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        ctx: &CallContext,
    ) -> Result<InvokeResponse, AdapterError> {
        let wire = self.build_request(target, request, ctx, false)?;
        let url = endpoint_url(&target.provider, Some(DEFAULT_BASE_URL), DEFAULT_ENDPOINT)?;
        let keys = self.keys.rotated(&target.provider.name, target.api_keys());

        let raw = with_key_rotation(&keys, true, &target.provider.name, |key| {
            let key = key.expect("rotation provides a key when required");
            let builder = self.decorated(&url, target, &wire, &key);
            send_json(builder, ctx.deadline)
        })
        .await?;

        let parsed: AnthropicResponse = serde_json::from_value(raw.clone()).map_err(|e| AdapterError::Upstream {
            status: 200,
            body: format!("unrecognized response shape: {e}"),
        })?;

        let usage = parsed
            .usage
            .and_then(|u| Usage::from_counts(u.input_tokens, u.output_tokens));

        Ok(InvokeResponse {
            output_text: extract_output_text(&parsed),
            usage,
            cost: None,
            raw,
        })
    }

    async fn invoke_stream(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        ctx: &CallContext,
    ) -> Result<ChunkStream, AdapterError> {
        let wire = self.build_request(target, request, ctx, true)?;
        let url = endpoint_url(&target.provider, Some(DEFAULT_BASE_URL), DEFAULT_ENDPOINT)?;
        let keys = self.keys.rotated(&target.provider.name, target.api_keys());

        let events = with_key_rotation(&keys, true, &target.provider.name, |key| {
            let key = key.expect("rotation provides a key when required");
            let builder = self.decorated(&url, target, &wire, &key);
            send_sse(builder, ctx.deadline)
        })
        .await?;

        // Input token count arrives on message_start; output count on
        // message_delta. Carry the former until the latter shows up.
        let mut input_tokens: Option<u64> = None;

        let chunks = events
            .map(move |event| match event {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        return vec![];
                    }
                    let raw: Value = match serde_json::from_str(data) {
                        Ok(raw) => raw,
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping unparseable SSE event");
                            return vec![];
                        }
                    };
                    let Ok(parsed) = serde_json::from_value::<AnthropicStreamEvent>(raw.clone()) else {
                        return vec![];
                    };
                    match parsed {
                        AnthropicStreamEvent::MessageStart { message } => {
                            input_tokens = message.usage.and_then(|u| u.input_tokens);
                            vec![]
                        }
                        AnthropicStreamEvent::ContentBlockDelta {
                            delta: AnthropicStreamDelta::TextDelta { text },
                        } => vec![Ok(StreamChunk {
                            text: Some(text),
                            raw: Some(raw),
                            ..StreamChunk::default()
                        })],
                        AnthropicStreamEvent::MessageDelta { delta, usage } => {
                            let usage = usage.and_then(|u| Usage::from_counts(input_tokens, u.output_tokens));
                            vec![Ok(StreamChunk {
                                usage,
                                finish_reason: delta.stop_reason,
                                raw: Some(raw),
                                ..StreamChunk::default()
                            })]
                        }
                        AnthropicStreamEvent::MessageStop => vec![Ok(StreamChunk::done())],
                        _ => vec![],
                    }
                }
                Err(e) => vec![Err(AdapterError::Network(e.to_string()))],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(chunks))
    }
}

/// Normalized content to Anthropic content blocks
fn convert_content(content: &Content) -> Result<Vec<AnthropicContentBlock>, AdapterError> {
    match content {
        Content::Text(text) => Ok(vec![AnthropicContentBlock::Text { text: text.clone() }]),
        Content::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => Ok(AnthropicContentBlock::Text { text: text.clone() }),
                ContentPart::ImageRef(media) => {
                    let source = if let Some(data) = &media.data {
                        AnthropicImageSource::Base64 {
                            media_type: media.mime_type.clone().unwrap_or_else(|| "image/png".to_owned()),
                            data: data.clone(),
                        }
                    } else if let Some(url) = &media.url {
                        AnthropicImageSource::Url { url: url.clone() }
                    } else {
                        return Err(AdapterError::BadRequest(
                            "image parts require either url or inline data".to_owned(),
                        ));
                    };
                    Ok(AnthropicContentBlock::Image { source })
                }
                ContentPart::AudioRef(_) | ContentPart::VideoRef(_) | ContentPart::FileRef(_) => {
                    Err(AdapterError::BadRequest(
                        "only text and image parts are supported by anthropic providers".to_owned(),
                    ))
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use switchboard_catalog::{Model, ModelConfig, Provider, ProviderType};
    use switchboard_core::Deadline;

    fn target() -> ModelTarget {
        ModelTarget {
            provider: Arc::new(Provider {
                name: "claude".to_owned(),
                provider_type: ProviderType::Anthropic,
                base_url: None,
                api_keys: vec![],
                settings: IndexMap::new(),
                is_active: true,
            }),
            model: Arc::new(Model {
                name: "sonnet".to_owned(),
                provider_name: "claude".to_owned(),
                display_name: None,
                description: None,
                remote_identifier: None,
                tags: vec![],
                default_params: IndexMap::new(),
                config: ModelConfig::default(),
                rate_limit: None,
                is_active: true,
            }),
        }
    }

    fn ctx() -> CallContext {
        CallContext::new(Deadline::after(Duration::from_secs(5)))
    }

    #[test]
    fn system_messages_are_lifted_out() {
        let adapter = AnthropicAdapter::new();
        let request = InvokeRequest {
            messages: Some(vec![
                Message::text(Role::System, "be terse"),
                Message::text(Role::User, "ping"),
            ]),
            ..InvokeRequest::default()
        };
        let wire = adapter.build_request(&target(), &request, &ctx(), false).unwrap();
        assert_eq!(wire.system.as_deref(), Some("be terse"));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
        assert_eq!(wire.max_tokens, FALLBACK_MAX_TOKENS);
    }

    #[test]
    fn max_tokens_moves_out_of_the_parameter_map() {
        let adapter = AnthropicAdapter::new();
        let mut request = InvokeRequest::from_prompt("hi");
        request.parameters.insert("max_tokens".to_owned(), json!(64));
        request.parameters.insert("temperature".to_owned(), json!(0.0));

        let wire = adapter.build_request(&target(), &request, &ctx(), false).unwrap();
        assert_eq!(wire.max_tokens, 64);
        assert!(wire.parameters.get("max_tokens").is_none());
        assert_eq!(wire.parameters["temperature"], json!(0.0));
    }

    #[test]
    fn system_only_conversations_are_rejected() {
        let adapter = AnthropicAdapter::new();
        let request = InvokeRequest {
            messages: Some(vec![Message::text(Role::System, "rules")]),
            ..InvokeRequest::default()
        };
        assert!(matches!(
            adapter.build_request(&target(), &request, &ctx(), false),
            Err(AdapterError::BadRequest(_))
        ));
    }

    #[test]
    fn canned_reply_round_trip() {
        let raw = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "sonnet",
            "content": [{"type": "text", "text": "pong"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 8, "output_tokens": 1}
        });
        let parsed: AnthropicResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(extract_output_text(&parsed), "pong");
        let usage = Usage::from_counts(
            parsed.usage.unwrap().input_tokens,
            parsed.usage.unwrap().output_tokens,
        )
        .unwrap();
        assert_eq!(usage.total_tokens, Some(9));
    }
}
