//! Google Generative Language adapter
//!
//! The API key travels as a query parameter and the assistant role is
//! renamed to "model". Upstream streaming is not wired up; a streaming
//! call falls back to one synchronous yield.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use switchboard_catalog::ModelTarget;

use super::support::{apply_setting_headers, send_json};
use super::{Adapter, AdapterCapabilities, CallContext, single_shot_stream};
use crate::error::AdapterError;
use crate::protocol::gemini::{
    GeminiContent, GeminiFileData, GeminiGenerationConfig, GeminiInlineData, GeminiPart, GeminiRequest, GeminiResponse,
    extract_output_text,
};
use crate::rotation::{KeyRing, with_key_rotation};
use crate::types::{ChunkStream, Content, ContentPart, InvokeRequest, InvokeResponse, MediaRef, Role, Usage,
    effective_parameters};

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Endpoint template; `{model}` is replaced with the remote identifier
const DEFAULT_ENDPOINT_TEMPLATE: &str = "/v1beta/models/{model}:generateContent";

pub struct GeminiAdapter {
    client: Client,
    keys: KeyRing,
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            keys: KeyRing::new(),
        }
    }

    /// Endpoint URL without the key query parameter
    fn base_endpoint(&self, target: &ModelTarget, request: &InvokeRequest) -> String {
        let base = target
            .provider
            .base_url
            .as_ref()
            .map(|u| u.as_str().trim_end_matches('/').to_owned())
            .or_else(|| {
                target
                    .provider
                    .setting_str("base_url")
                    .map(|s| s.trim_end_matches('/').to_owned())
            })
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());

        let template = target
            .provider
            .setting_str("endpoint_template")
            .unwrap_or(DEFAULT_ENDPOINT_TEMPLATE);
        let endpoint = template.replace("{model}", request.remote_identifier(&target.model));
        format!("{base}{endpoint}")
    }

    fn build_request(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        ctx: &CallContext,
    ) -> Result<GeminiRequest, AdapterError> {
        let mut system_parts: Vec<GeminiPart> = Vec::new();
        let mut contents: Vec<GeminiContent> = Vec::new();

        for message in &request.conversation() {
            if message.content.is_empty() {
                continue;
            }
            let parts = convert_content(&message.content)?;
            match message.role {
                Role::System => system_parts.extend(parts),
                Role::Assistant => contents.push(GeminiContent {
                    role: Some("model".to_owned()),
                    parts,
                }),
                Role::User | Role::Tool => contents.push(GeminiContent {
                    role: Some("user".to_owned()),
                    parts,
                }),
            }
        }

        if contents.is_empty() {
            return Err(AdapterError::BadRequest(
                "at least one user message is required".to_owned(),
            ));
        }

        let mut parameters = effective_parameters(&target.model, request, ctx.parameter_limits.as_ref());
        let generation_config = split_generation_config(&mut parameters);

        Ok(GeminiRequest {
            contents,
            system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
                role: None,
                parts: system_parts,
            }),
            generation_config: (!generation_config.is_empty()).then_some(generation_config),
            extra: parameters,
        })
    }
}

#[async_trait]
impl Adapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        "gemini"
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
        let wire = self.build_request(target, request, ctx)?;
        let url = self.base_endpoint(target, request);
        let keys = self.keys.rotated(&target.provider.name, target.api_keys());

        let raw = with_key_rotation(&keys, true, &target.provider.name, |key: Option<SecretString>| {
            let key = key.expect("rotation provides a key when required");
            // The key rides in the query string, never in a header
            let builder = self
                .client
                .post(&url)
                .query(&[("key", key.expose_secret())])
                .json(&wire);
            let builder = apply_setting_headers(builder, &target.provider);
            send_json(builder, ctx.deadline)
        })
        .await?;

        let parsed: GeminiResponse = serde_json::from_value(raw.clone()).map_err(|e| AdapterError::Upstream {
            status: 200,
            body: format!("unrecognized response shape: {e}"),
        })?;

        let usage = parsed.usage_metadata.and_then(|u| {
            Usage::from_counts(u.prompt_token_count, u.candidates_token_count).map(|mut usage| {
                usage.total_tokens = u.total_token_count.or(usage.total_tokens);
                usage
            })
        });

        Ok(InvokeResponse {
            output_text: extract_output_text(&parsed),
            usage,
            cost: None,
            raw,
        })
    }

    /// Falls back to a single synchronous yield; the upstream SSE variant
    /// is not wired up
    async fn invoke_stream(
        &self,
        target: &ModelTarget,
        request: &InvokeRequest,
        ctx: &CallContext,
    ) -> Result<ChunkStream, AdapterError> {
        single_shot_stream(self, target, request, ctx).await
    }
}

/// Move known sampling keys into the generation config
fn split_generation_config(parameters: &mut indexmap::IndexMap<String, Value>) -> GeminiGenerationConfig {
    GeminiGenerationConfig {
        temperature: parameters.shift_remove("temperature").and_then(|v| v.as_f64()),
        top_p: parameters.shift_remove("top_p").and_then(|v| v.as_f64()),
        top_k: parameters.shift_remove("top_k").and_then(|v| v.as_u64()),
        max_output_tokens: parameters
            .shift_remove("max_tokens")
            .or_else(|| parameters.shift_remove("max_output_tokens"))
            .and_then(|v| v.as_u64()),
        stop_sequences: parameters.shift_remove("stop").and_then(|v| match v {
            Value::String(s) => Some(vec![s]),
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_owned))
                    .collect(),
            ),
            _ => None,
        }),
    }
}

/// Normalized content to Gemini parts
///
/// Inline payloads carry an explicit MIME type; URL references become
/// file-data parts.
fn convert_content(content: &Content) -> Result<Vec<GeminiPart>, AdapterError> {
    match content {
        Content::Text(text) => Ok(vec![GeminiPart::Text(text.clone())]),
        Content::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => Ok(GeminiPart::Text(text.clone())),
                ContentPart::ImageRef(media) => media_part(media, "image/png"),
                ContentPart::AudioRef(media) => media_part(media, "audio/wav"),
                ContentPart::VideoRef(media) => media_part(media, "video/mp4"),
                ContentPart::FileRef(media) => media_part(media, "application/octet-stream"),
            })
            .collect(),
    }
}

fn media_part(media: &MediaRef, default_mime: &str) -> Result<GeminiPart, AdapterError> {
    if let Some(data) = &media.data {
        return Ok(GeminiPart::InlineData(GeminiInlineData {
            mime_type: media.mime_type.clone().unwrap_or_else(|| default_mime.to_owned()),
            data: data.clone(),
        }));
    }
    if let Some(url) = &media.url {
        return Ok(GeminiPart::FileData(GeminiFileData {
            mime_type: media.mime_type.clone(),
            file_uri: url.clone(),
        }));
    }
    Err(AdapterError::BadRequest(
        "media parts require either url or inline data".to_owned(),
    ))
}
