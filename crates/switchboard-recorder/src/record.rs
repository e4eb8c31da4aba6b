use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_catalog::ModelConfig;

/// Outcome of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Success,
    Error,
}

/// Response text cap in bytes, applied unless full capture is enabled
const RESPONSE_TEXT_CAP: usize = 64 * 1024;
/// Prompt snapshot cap in characters
const PROMPT_CAP: usize = 1000;
/// Per-message content snapshot cap in characters
const MESSAGE_CAP: usize = 500;

/// Parameter keys that must never reach the observability store
const REDACTED_PARAMETER_KEYS: &[&str] = &["api_key", "authorization", "session_token"];

/// One row in the observability store; immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecord {
    /// Synthetic identifier
    pub id: u64,
    pub provider_name: String,
    pub model_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: InvocationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_messages: Option<Vec<MessageSnapshot>>,
    pub request_parameters: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

/// Truncated view of one request message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub role: String,
    pub content: String,
}

/// Everything the router knows about a completed call, pre-redaction
///
/// The recorder turns a draft into an `InvocationRecord` at enqueue time:
/// cost is computed from the token counts and the model's pricing, text
/// is truncated, and credential material is stripped.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub provider_name: String,
    pub model_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: InvocationStatus,
    pub error_message: Option<String>,
    pub request_prompt: Option<String>,
    pub request_messages: Option<Vec<MessageSnapshot>>,
    pub request_parameters: IndexMap<String, Value>,
    pub response_text: Option<String>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub raw_response: Option<Value>,
    /// Pricing source for the cost computation
    pub model_config: ModelConfig,
}

impl RecordDraft {
    /// Apply redaction and compute derived fields
    pub fn finalize(self, id: u64, full_capture: bool) -> InvocationRecord {
        let response_text_length = self.response_text.as_ref().map(|t| t.chars().count() as u64);
        let response_text = self.response_text.map(|t| {
            if full_capture {
                t
            } else {
                truncate_bytes(&t, RESPONSE_TEXT_CAP)
            }
        });
        let request_prompt = self.request_prompt.map(|p| truncate_chars(&p, PROMPT_CAP));
        let request_messages = self.request_messages.map(|messages| {
            messages
                .into_iter()
                .map(|m| MessageSnapshot {
                    role: m.role,
                    content: truncate_chars(&m.content, MESSAGE_CAP),
                })
                .collect()
        });

        let mut request_parameters = self.request_parameters;
        for key in REDACTED_PARAMETER_KEYS {
            if request_parameters.shift_remove(*key).is_some() {
                request_parameters.insert((*key).to_owned(), Value::from("[redacted]"));
            }
        }

        // Null token inputs yield null cost, never zero
        let cost = self.model_config.cost(self.prompt_tokens, self.completion_tokens);

        let duration_ms = (self.completed_at - self.started_at).num_milliseconds();

        InvocationRecord {
            id,
            provider_name: self.provider_name,
            model_name: self.model_name,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_ms,
            status: self.status,
            error_message: self.error_message,
            request_prompt,
            request_messages,
            request_parameters,
            response_text,
            response_text_length,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            cost,
            raw_response: self.raw_response,
        }
    }
}

/// Truncate at most `cap` bytes on a UTF-8 boundary, marking the cut
fn truncate_bytes(text: &str, cap: usize) -> String {
    if text.len() <= cap {
        return text.to_owned();
    }
    let mut cut = cap;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

/// Truncate at most `cap` characters, marking the cut
fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(cap).collect();
    out.push_str("...");
    out
}
