//! Anthropic Messages API wire format

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Request types --

/// Messages API request
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    /// Upstream model identifier
    pub model: String,
    /// Maximum tokens to generate (mandatory for Anthropic)
    pub max_tokens: u64,
    /// System prompt, extracted out of the message list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation, user/assistant roles only
    pub messages: Vec<AnthropicMessage>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Remaining generation parameters
    #[serde(flatten)]
    pub parameters: IndexMap<String, Value>,
}

/// Message with typed content blocks
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    /// "user" or "assistant"
    pub role: String,
    /// Content blocks
    pub content: Vec<AnthropicContentBlock>,
}

/// Content block in a request message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
    /// Image content
    Image {
        /// Image source
        source: AnthropicImageSource,
    },
}

/// Image source, inline base64 or URL
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicImageSource {
    /// Inline base64 payload
    Base64 {
        /// Media type (e.g. "image/png")
        media_type: String,
        /// Base64-encoded data
        data: String,
    },
    /// Remote URL
    Url {
        /// Image URL
        url: String,
    },
}

// -- Response types --

/// Messages API response
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    /// Response content blocks
    #[serde(default)]
    pub content: Vec<AnthropicResponseBlock>,
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Content block in a response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicResponseBlock {
    /// Text block
    Text {
        /// The text string
        text: String,
    },
    /// Any other block type (tool use, thinking, ...)
    #[serde(other)]
    Other,
}

/// Token usage
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
}

/// Concatenated text of all text blocks
pub fn extract_output_text(response: &AnthropicResponse) -> String {
    response
        .content
        .iter()
        .filter_map(|block| match block {
            AnthropicResponseBlock::Text { text } => Some(text.as_str()),
            AnthropicResponseBlock::Other => None,
        })
        .collect()
}

// -- Streaming types --

/// SSE event on a streaming response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// Stream started; carries initial usage
    MessageStart {
        /// Partial message metadata
        message: AnthropicStreamMessage,
    },
    /// New content block started
    ContentBlockStart,
    /// Incremental content within a block
    ContentBlockDelta {
        /// Delta content
        delta: AnthropicStreamDelta,
    },
    /// Content block finished
    ContentBlockStop,
    /// Message metadata delta (stop reason, output usage)
    MessageDelta {
        /// Delta with stop reason
        delta: AnthropicMessageDelta,
        /// Updated usage
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    /// Stream completed
    MessageStop,
    /// Keep-alive
    Ping,
    /// Unrecognized event types are ignored
    #[serde(other)]
    Other,
}

/// Partial message in a `message_start` event
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicStreamMessage {
    /// Initial usage (input token count)
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

/// Delta content in a `content_block_delta` event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamDelta {
    /// Incremental text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// Any other delta kind
    #[serde(other)]
    Other,
}

/// Delta in a `message_delta` event
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessageDelta {
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
}
