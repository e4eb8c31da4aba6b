//! OpenAI-compatible adapter
//!
//! Serves the whole compatible family: the canonical API plus deepseek,
//! glm, qwen, kimi, openrouter, grok, and self-hosted OpenAI-style
//! servers. Streams natively over SSE.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use switchboard_catalog::ModelTarget;

use super::support::{apply_setting_headers, endpoint_url, send_json, send_sse};
use super::{Adapter, AdapterCapabilities, CallContext};
use crate::error::AdapterError;
use crate::protocol::openai::{
    OpenAiContent, OpenAiContentPart, OpenAiImageUrl, OpenAiInputAudio, OpenAiMessage, OpenAiRequest, OpenAiResponse,
    OpenAiStreamChunk, content_text, extract_output_text,
};
use crate::rotation::{KeyRing, with_key_rotation};
use crate::types::{ChunkStream, Content, ContentPart, InvokeRequest, InvokeResponse, MediaRef, StreamChunk, Usage,
    effective_parameters};

/// Default base URL for the canonical API
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
/// Default chat-completions path
const DEFAULT_ENDPOINT: &str = "/v1/chat/completions";

pub struct OpenAiCompatibleAdapter {
    client: Client,
    keys: KeyRing,
}

impl Default for OpenAiCompatibleAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiCompatibleAdapter {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            keys: KeyRing::new(),
        }
    }

    /// Build the wire request for `target`
    fn build_request(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        ctx: &CallContext,
        stream: bool,
    ) -> Result<OpenAiRequest, AdapterError> {
        let messages = request
            .conversation()
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| {
                Ok(OpenAiMessage {
                    role: m.role.as_str().to_owned(),
                    content: convert_content(&m.content)?,
                })
            })
            .collect::<Result<Vec<_>, AdapterError>>()?;

        if messages.is_empty() {
            return Err(AdapterError::BadRequest("no non-empty messages to send".to_owned()));
        }

        Ok(OpenAiRequest {
            model: request.remote_identifier(&target.model).to_owned(),
            messages,
            stream: stream.then_some(true),
            parameters: effective_parameters(&target.model, request, ctx.parameter_limits.as_ref()),
        })
    }

    /// Decorate a request with credentials per the provider settings
    ///
    /// `auth_header`/`auth_scheme` settings support vendors that want
    /// their key somewhere other than `Authorization: Bearer`.
    fn decorated(
        &self,
        url: &str,
        target: &ModelTarget,
        wire: &OpenAiRequest,
        key: Option<&SecretString>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url).json(wire);
        builder = apply_setting_headers(builder, &target.provider);

        if let Some(key) = key {
            let header = target.provider.setting_str("auth_header").unwrap_or("Authorization");
            let scheme = target.provider.setting_str("auth_scheme").unwrap_or("Bearer");
            let value = if scheme.is_empty() {
                key.expose_secret().to_owned()
            } else {
                format!("{scheme} {}", key.expose_secret())
            };
            builder = builder.header(header, value);
        }
        builder
    }
}

#[async_trait]
impl Adapter for OpenAiCompatibleAdapter {
    fn name(&self) -> &'static str {
        "openai-compatible"
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

        // Self-hosted compatible servers commonly run keyless
        let raw = with_key_rotation(&keys, false, &target.provider.name, |key| {
            let builder = self.decorated(&url, target, &wire, key.as_ref());
            send_json(builder, ctx.deadline)
        })
        .await?;

        let parsed: OpenAiResponse = serde_json::from_value(raw.clone())
            .map_err(|e| AdapterError::Upstream {
                status: 200,
                body: format!("unrecognized response shape: {e}"),
            })?;

        Ok(InvokeResponse::new(extract_output_text(&parsed), raw))
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

        let events = with_key_rotation(&keys, false, &target.provider.name, |key| {
            let builder = self.decorated(&url, target, &wire, key.as_ref());
            send_sse(builder, ctx.deadline)
        })
        .await?;

        let chunks = events
            .map(|event| match event {
                Ok(event) => {
                    let data = event.data.trim();
                    if data.is_empty() {
                        return vec![];
                    }
                    if data == "[DONE]" {
                        return vec![Ok(StreamChunk::done())];
                    }
                    match serde_json::from_str::<Value>(data) {
                        Ok(raw) => chunk_from_raw(raw).map_or_else(Vec::new, |chunk| vec![Ok(chunk)]),
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping unparseable SSE chunk");
                            vec![]
                        }
                    }
                }
                Err(e) => vec![Err(AdapterError::Network(e.to_string()))],
            })
            .flat_map(futures_util::stream::iter);

        Ok(Box::pin(chunks))
    }
}

/// Convert one SSE data payload into a stream chunk
fn chunk_from_raw(raw: Value) -> Option<StreamChunk> {
    let parsed: OpenAiStreamChunk = serde_json::from_value(raw.clone()).ok()?;

    let choice = parsed.choices.first();
    let text = choice
        .and_then(|c| c.delta.content.as_ref())
        .and_then(content_text)
        .filter(|t| !t.is_empty());
    let finish_reason = choice.and_then(|c| c.finish_reason.clone());
    let usage = parsed.usage.and_then(|u| {
        Usage::from_raw(&serde_json::json!({
            "usage": {
                "prompt_tokens": u.prompt_tokens,
                "completion_tokens": u.completion_tokens,
                "total_tokens": u.total_tokens,
            }
        }))
    });

    if text.is_none() && finish_reason.is_none() && usage.is_none() {
        return None;
    }
    Some(StreamChunk {
        text,
        usage,
        cost: None,
        finish_reason,
        raw: Some(raw),
        is_final: false,
    })
}

/// Normalized content to the OpenAI content shape
///
/// Video and file references have no representation on this wire format
/// and are rejected rather than silently dropped.
fn convert_content(content: &Content) -> Result<OpenAiContent, AdapterError> {
    match content {
        Content::Text(text) => Ok(OpenAiContent::Text(text.clone())),
        Content::Parts(parts) => {
            let converted = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => Ok(OpenAiContentPart::Text { text: text.clone() }),
                    ContentPart::ImageRef(media) => Ok(OpenAiContentPart::ImageUrl {
                        image_url: OpenAiImageUrl {
                            url: media_url(media, "image/png")?,
                        },
                    }),
                    ContentPart::AudioRef(media) => {
                        let data = media.data.clone().ok_or_else(|| {
                            AdapterError::BadRequest("audio parts require inline base64 data".to_owned())
                        })?;
                        let format = media
                            .mime_type
                            .as_deref()
                            .and_then(|m| m.strip_prefix("audio/"))
                            .unwrap_or("wav")
                            .to_owned();
                        Ok(OpenAiContentPart::InputAudio {
                            input_audio: OpenAiInputAudio { data, format },
                        })
                    }
                    ContentPart::VideoRef(_) | ContentPart::FileRef(_) => Err(AdapterError::BadRequest(
                        "video and file parts are not supported by openai-compatible providers".to_owned(),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(OpenAiContent::Parts(converted))
        }
    }
}

/// Media reference as a URL, composing a data URI for inline payloads
fn media_url(media: &MediaRef, default_mime: &str) -> Result<String, AdapterError> {
    if let Some(url) = &media.url {
        return Ok(url.clone());
    }
    if let Some(data) = &media.data {
        let mime = media.mime_type.as_deref().unwrap_or(default_mime);
        return Ok(format!("data:{mime};base64,{data}"));
    }
    Err(AdapterError::BadRequest(
        "media parts require either url or inline data".to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Role};
    use indexmap::IndexMap;
    use serde_json::json;
    use std::time::Duration;
    use switchboard_catalog::{Model, ModelConfig, Provider, ProviderType};
    use switchboard_core::Deadline;

    fn target() -> ModelTarget {
        ModelTarget {
            provider: std::sync::Arc::new(Provider {
                name: "p1".to_owned(),
                provider_type: ProviderType::OpenaiCompatible,
                base_url: None,
                api_keys: vec![],
                settings: IndexMap::new(),
                is_active: true,
            }),
            model: std::sync::Arc::new(Model {
                name: "m1".to_owned(),
                provider_name: "p1".to_owned(),
                display_name: None,
                description: None,
                remote_identifier: Some("upstream-m1".to_owned()),
                tags: vec![],
                default_params: {
                    let mut defaults = IndexMap::new();
                    defaults.insert("temperature".to_owned(), json!(0.5));
                    defaults
                },
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
    fn wire_request_uses_remote_identifier_and_merged_params() {
        let adapter = OpenAiCompatibleAdapter::new();
        let mut request = InvokeRequest {
            messages: Some(vec![Message::text(Role::User, "ping")]),
            ..InvokeRequest::default()
        };
        request.parameters.insert("max_tokens".to_owned(), json!(1));

        let wire = adapter.build_request(&target(), &request, &ctx(), false).unwrap();
        assert_eq!(wire.model, "upstream-m1");
        assert_eq!(wire.parameters["temperature"], json!(0.5));
        assert_eq!(wire.parameters["max_tokens"], json!(1));
        assert_eq!(wire.messages.len(), 1);
    }

    #[test]
    fn prompt_becomes_a_user_message() {
        let adapter = OpenAiCompatibleAdapter::new();
        let wire = adapter
            .build_request(&target(), &InvokeRequest::from_prompt("hi"), &ctx(), false)
            .unwrap();
        assert_eq!(wire.messages[0].role, "user");
    }

    #[test]
    fn round_trip_extracts_canned_reply() {
        let raw = json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        });
        let parsed: OpenAiResponse = serde_json::from_value(raw.clone()).unwrap();
        let response = InvokeResponse::new(extract_output_text(&parsed), raw);
        assert_eq!(response.output_text, "hello");
        assert_eq!(response.usage.unwrap().total_tokens, Some(2));
    }

    #[test]
    fn stream_chunk_conversion() {
        let chunk = chunk_from_raw(json!({
            "choices": [{"delta": {"content": "hi"}, "finish_reason": null}]
        }))
        .unwrap();
        assert_eq!(chunk.text.as_deref(), Some("hi"));

        let usage_only = chunk_from_raw(json!({
            "choices": [],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }))
        .unwrap();
        assert_eq!(usage_only.usage.unwrap().total_tokens, Some(5));

        assert!(chunk_from_raw(json!({"choices": [{"delta": {}}]})).is_none());
    }

    #[test]
    fn inline_image_becomes_a_data_uri() {
        let content = Content::Parts(vec![ContentPart::ImageRef(MediaRef {
            url: None,
            data: Some("QUJD".to_owned()),
            mime_type: Some("image/jpeg".to_owned()),
        })]);
        let OpenAiContent::Parts(parts) = convert_content(&content).unwrap() else {
            panic!("expected parts");
        };
        let OpenAiContentPart::ImageUrl { image_url } = &parts[0] else {
            panic!("expected image");
        };
        assert_eq!(image_url.url, "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn video_parts_are_refused() {
        let content = Content::Parts(vec![ContentPart::VideoRef(MediaRef::default())]);
        assert!(matches!(convert_content(&content), Err(AdapterError::BadRequest(_))));
    }
}
