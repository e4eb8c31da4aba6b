//! OpenAI chat-completions wire format
//!
//! Shared by every compatible vendor (deepseek, glm, qwen, kimi,
//! openrouter, grok, and self-hosted OpenAI-style servers).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Request types --

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest {
    /// Upstream model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<OpenAiMessage>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Generation parameters, known and pass-through alike
    #[serde(flatten)]
    pub parameters: IndexMap<String, Value>,
}

/// Message within a request
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiMessage {
    /// Message role
    pub role: String,
    /// Content, a string or typed parts
    pub content: OpenAiContent,
}

/// Content is a string or an array of typed parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OpenAiContent {
    /// Plain text content
    Text(String),
    /// Array of content parts
    Parts(Vec<OpenAiContentPart>),
}

/// Individual content part
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAiContentPart {
    /// Text block
    Text {
        /// The text string
        text: String,
    },
    /// Image via URL or data URI
    ImageUrl {
        /// Image URL specification
        image_url: OpenAiImageUrl,
    },
    /// Inline audio payload
    InputAudio {
        /// Audio payload specification
        input_audio: OpenAiInputAudio,
    },
}

/// Image URL specification
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiImageUrl {
    /// URL or base64 data URI
    pub url: String,
}

/// Inline audio specification
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiInputAudio {
    /// Base64-encoded audio
    pub data: String,
    /// Audio container format (e.g. "wav", "mp3")
    pub format: String,
}

// -- Response types --

/// Chat completion response, tolerant of vendor variation
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    /// Generated choices
    #[serde(default)]
    pub choices: Vec<OpenAiChoice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

/// Choice within a response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    /// Generated message (chat-shaped replies)
    #[serde(default)]
    pub message: Option<OpenAiChoiceMessage>,
    /// Bare text (legacy completion-shaped replies)
    #[serde(default)]
    pub text: Option<String>,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message within a response choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoiceMessage {
    /// Text content; some vendors return an array of text fragments
    #[serde(default)]
    pub content: Option<Value>,
}

/// Token usage block
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OpenAiUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

// -- Streaming types --

/// Streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Delta choices
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    /// Usage, present on the final chunk for some vendors
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

/// Choice within a streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Incremental delta
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    /// Present on the final content chunk
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content within a streaming choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Incremental text; tolerant of fragment arrays
    #[serde(default)]
    pub content: Option<Value>,
}

/// Extract the assistant text from a tolerant content value
///
/// Vendors return either a string or a list of string fragments.
pub fn content_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|part| part.as_str().map(str::to_owned))
                .collect::<Vec<_>>()
                .join(""),
        ),
        _ => None,
    }
}

/// Assistant text of the first choice, chat or completion shaped
pub fn extract_output_text(response: &OpenAiResponse) -> String {
    let Some(choice) = response.choices.first() else {
        return String::new();
    };
    choice
        .message
        .as_ref()
        .and_then(|m| m.content.as_ref())
        .and_then(content_text)
        .or_else(|| choice.text.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_shaped_reply_text() {
        let response: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 2, "completion_tokens": 1, "total_tokens": 3}
        }))
        .unwrap();
        assert_eq!(extract_output_text(&response), "hello");
    }

    #[test]
    fn completion_shaped_reply_text() {
        let response: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{"text": "legacy"}]
        }))
        .unwrap();
        assert_eq!(extract_output_text(&response), "legacy");
    }

    #[test]
    fn fragment_array_content_joins() {
        let response: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": ["a", "b"]}}]
        }))
        .unwrap();
        assert_eq!(extract_output_text(&response), "ab");
    }

    #[test]
    fn request_flattens_parameters() {
        let mut parameters = IndexMap::new();
        parameters.insert("temperature".to_owned(), json!(0.0));
        parameters.insert("custom_knob".to_owned(), json!("x"));
        let request = OpenAiRequest {
            model: "m".to_owned(),
            messages: vec![OpenAiMessage {
                role: "user".to_owned(),
                content: OpenAiContent::Text("ping".to_owned()),
            }],
            stream: None,
            parameters,
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["temperature"], json!(0.0));
        assert_eq!(wire["custom_knob"], json!("x"));
        assert!(wire.get("stream").is_none());
    }
}
