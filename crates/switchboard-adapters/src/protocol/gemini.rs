//! Google Generative Language API wire format

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Request types --

/// `generateContent` request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Conversation contents
    pub contents: Vec<GeminiContent>,
    /// System instruction, separated from the conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    /// Sampling configuration, separated per the upstream schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
    /// Pass-through parameters the gateway does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Content object containing role and parts
#[derive(Debug, Clone, Serialize)]
pub struct GeminiContent {
    /// "user" or "model" (the assistant role is renamed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    pub parts: Vec<GeminiPart>,
}

/// Individual part within a content object
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GeminiPart {
    /// Text content
    Text(String),
    /// Inline binary data with explicit MIME type
    InlineData(GeminiInlineData),
    /// Remote file reference
    FileData(GeminiFileData),
}

/// Inline binary data
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    /// MIME type (e.g. "image/png")
    pub mime_type: String,
    /// Base64-encoded data
    pub data: String,
}

/// Remote file reference
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFileData {
    /// MIME type, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// File URI
    pub file_uri: String,
}

/// Generation configuration
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl GeminiGenerationConfig {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.top_p.is_none()
            && self.top_k.is_none()
            && self.max_output_tokens.is_none()
            && self.stop_sequences.is_none()
    }
}

// -- Response types --

/// `generateContent` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Generated candidates
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    /// Token usage metadata
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsageMetadata>,
}

/// Generated candidate
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// Generated content
    #[serde(default)]
    pub content: Option<GeminiResponseContent>,
    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Content of a candidate
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiResponseContent {
    /// Response parts
    #[serde(default)]
    pub parts: Vec<GeminiResponsePart>,
}

/// Part of a candidate's content
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiResponsePart {
    /// Text payload, absent for non-text parts
    #[serde(default)]
    pub text: Option<String>,
}

/// Token usage metadata
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: Option<u64>,
    #[serde(default)]
    pub candidates_token_count: Option<u64>,
    #[serde(default)]
    pub total_token_count: Option<u64>,
}

/// Concatenated text of the first candidate
pub fn extract_output_text(response: &GeminiResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_text_concatenates_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "hel"}, {"text": "lo"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        }))
        .unwrap();
        assert_eq!(extract_output_text(&response), "hello");
        assert_eq!(response.usage_metadata.unwrap().total_token_count, Some(6));
    }

    #[test]
    fn request_serializes_camel_case() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_owned()),
                parts: vec![GeminiPart::Text("hi".to_owned())],
            }],
            system_instruction: None,
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: Some(16),
                ..GeminiGenerationConfig::default()
            }),
            extra: IndexMap::new(),
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["contents"][0]["parts"][0]["text"], json!("hi"));
        assert_eq!(wire["generationConfig"]["maxOutputTokens"], json!(16));
    }
}
