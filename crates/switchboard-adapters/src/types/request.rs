use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_catalog::{Model, ParameterLimits};

use crate::error::AdapterError;

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// End-user message
    User,
    /// Assistant response
    Assistant,
    /// Tool/function result
    Tool,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Reference to an out-of-band media payload
///
/// Either a URL or an inline base64 payload; inline payloads should carry
/// a MIME type so adapters that need one (Gemini) can forward it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaRef {
    /// Location of the media
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Inline base64 payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// MIME type of the payload (e.g. `image/png`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// One part of a multipart message body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    /// Plain text block
    Text {
        /// The text string
        text: String,
    },
    /// Image reference
    ImageRef(MediaRef),
    /// Audio reference
    AudioRef(MediaRef),
    /// Video reference
    VideoRef(MediaRef),
    /// Opaque file reference
    FileRef(MediaRef),
}

/// Message content, either plain text or structured parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text content
    Text(String),
    /// Ordered multipart content
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Concatenated text of all textual parts
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Whether the content carries anything at all
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }
}

/// Message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Message content
    pub content: Content,
}

impl Message {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Content::Text(content.into()),
        }
    }
}

/// The gateway's normalized invocation request
///
/// Exactly one of `prompt` and `messages` must be present. `parameters`
/// accepts arbitrary keys; adapters translate the ones they know and pass
/// the rest through opaquely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// Single-shot prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Ordered conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    /// Generation parameters, known keys plus pass-through
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
    /// Per-call override of the catalog's remote identifier
    /// (used by the OpenAI shim; never exposed on the public body)
    #[serde(skip)]
    pub remote_identifier_override: Option<String>,
}

impl InvokeRequest {
    /// Shorthand for a prompt-only request
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Enforce the exactly-one-of-prompt/messages contract
    pub fn validate(&self) -> Result<(), AdapterError> {
        match (&self.prompt, &self.messages) {
            (Some(_), Some(_)) => Err(AdapterError::BadRequest(
                "provide either prompt or messages, not both".to_owned(),
            )),
            (None, None) => Err(AdapterError::BadRequest(
                "one of prompt or messages is required".to_owned(),
            )),
            (None, Some(messages)) if messages.is_empty() => {
                Err(AdapterError::BadRequest("messages must not be empty".to_owned()))
            }
            _ => Ok(()),
        }
    }

    /// The conversation as messages, folding a bare prompt into a single
    /// user message
    pub fn conversation(&self) -> Vec<Message> {
        match (&self.messages, &self.prompt) {
            (Some(messages), _) => messages.clone(),
            (None, Some(prompt)) => vec![Message::text(Role::User, prompt.clone())],
            (None, None) => Vec::new(),
        }
    }

    /// Identifier to send upstream for `model`
    pub fn remote_identifier<'a>(&'a self, model: &'a Model) -> &'a str {
        self.remote_identifier_override
            .as_deref()
            .unwrap_or_else(|| model.remote_identifier())
    }
}

/// Merge model defaults under caller parameters; the caller wins
pub fn merge_parameters(
    defaults: &IndexMap<String, Value>,
    caller: &IndexMap<String, Value>,
) -> IndexMap<String, Value> {
    let mut merged = defaults.clone();
    for (key, value) in caller {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Parameters as an adapter must send them upstream
///
/// Defaults under the caller's values, then per-credential limits clamp
/// the result; the limiter wins over both.
pub fn effective_parameters(
    model: &Model,
    request: &InvokeRequest,
    limits: Option<&ParameterLimits>,
) -> IndexMap<String, Value> {
    let mut params = merge_parameters(&model.default_params, &request.parameters);
    if let Some(limits) = limits {
        limits.clamp(&mut params);
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_requires_exactly_one_body_shape() {
        assert!(InvokeRequest::default().validate().is_err());
        assert!(InvokeRequest::from_prompt("hi").validate().is_ok());

        let both = InvokeRequest {
            prompt: Some("hi".to_owned()),
            messages: Some(vec![Message::text(Role::User, "hi")]),
            ..InvokeRequest::default()
        };
        assert!(both.validate().is_err());
    }

    #[test]
    fn prompt_folds_into_a_user_message() {
        let request = InvokeRequest::from_prompt("ping");
        let conversation = request.conversation();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].role, Role::User);
        assert_eq!(conversation[0].content.as_text(), "ping");
    }

    #[test]
    fn caller_parameters_override_defaults() {
        let mut defaults = IndexMap::new();
        defaults.insert("temperature".to_owned(), json!(0.7));
        defaults.insert("max_tokens".to_owned(), json!(256));

        let mut caller = IndexMap::new();
        caller.insert("temperature".to_owned(), json!(0.1));

        let merged = merge_parameters(&defaults, &caller);
        assert_eq!(merged["temperature"], json!(0.1));
        assert_eq!(merged["max_tokens"], json!(256));
    }

    #[test]
    fn multipart_content_deserializes_with_kebab_tags() {
        let raw = json!([
            {"type": "text", "text": "look: "},
            {"type": "image-ref", "url": "https://example.com/cat.png"}
        ]);
        let content: Content = serde_json::from_value(raw).unwrap();
        assert_eq!(content.as_text(), "look: ");
        let Content::Parts(parts) = content else {
            panic!("expected parts")
        };
        assert!(matches!(&parts[1], ContentPart::ImageRef(m) if m.url.is_some()));
    }
}
