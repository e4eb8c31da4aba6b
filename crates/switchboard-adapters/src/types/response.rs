use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token usage reported by the upstream
///
/// Counts are `None` when the upstream omitted them; a partial reply never
/// fabricates zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: Option<u64>,
    /// Tokens generated in the completion
    pub completion_tokens: Option<u64>,
    /// Total tokens, as reported (or summed when both halves are known)
    pub total_tokens: Option<u64>,
}

impl Usage {
    /// Build from halves, deriving the total when possible
    pub fn from_counts(prompt_tokens: Option<u64>, completion_tokens: Option<u64>) -> Option<Self> {
        if prompt_tokens.is_none() && completion_tokens.is_none() {
            return None;
        }
        let total_tokens = match (prompt_tokens, completion_tokens) {
            (Some(p), Some(c)) => Some(p + c),
            _ => None,
        };
        Some(Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        })
    }

    /// Extract OpenAI-style usage out of a raw reply
    ///
    /// Looks for a `usage` object first, then top-level counts, the two
    /// placements seen across compatible vendors.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let source = raw.get("usage").unwrap_or(raw);
        let prompt_tokens = source.get("prompt_tokens").and_then(Value::as_u64);
        let completion_tokens = source.get("completion_tokens").and_then(Value::as_u64);
        let total_tokens = source.get("total_tokens").and_then(Value::as_u64);

        if prompt_tokens.is_none() && completion_tokens.is_none() && total_tokens.is_none() {
            return None;
        }
        Some(Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: total_tokens.or_else(|| match (prompt_tokens, completion_tokens) {
                (Some(p), Some(c)) => Some(p + c),
                _ => None,
            }),
        })
    }
}

/// The gateway's normalized invocation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    /// Concatenated assistant text
    pub output_text: String,
    /// Token usage, when the upstream reported it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Computed call cost, when pricing and counts are both known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Upstream reply preserved verbatim for observability
    #[serde(default)]
    pub raw: Value,
}

impl InvokeResponse {
    /// Response with usage pulled from the raw reply
    pub fn new(output_text: String, raw: Value) -> Self {
        let usage = Usage::from_raw(&raw);
        Self {
            output_text,
            usage,
            cost: None,
            raw,
        }
    }
}
