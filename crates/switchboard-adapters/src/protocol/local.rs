//! Wire shapes for local-runtime providers
//!
//! Ollama, vLLM, and transformers-style inference servers each speak a
//! small renaming of one of the dominant patterns; the gateway treats them
//! as ordinary HTTP targets and never hosts weights itself.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Ollama --

/// `/api/chat` request
#[derive(Debug, Clone, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    /// Always false; the adapter does not stream Ollama
    pub stream: bool,
    /// Generation parameters live under `options`
    pub options: IndexMap<String, Value>,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaMessage {
    pub role: String,
    pub content: String,
}

/// `/api/generate` request
#[derive(Debug, Clone, Serialize)]
pub struct OllamaGenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: IndexMap<String, Value>,
}

/// Response from either Ollama endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaResponse {
    /// `/api/chat` puts the text under `message.content`
    #[serde(default)]
    pub message: Option<OllamaMessage>,
    /// `/api/generate` puts the text under `response`
    #[serde(default)]
    pub response: Option<String>,
    /// Prompt token count
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    /// Completion token count
    #[serde(default)]
    pub eval_count: Option<u64>,
}

// -- vLLM --

/// `/v1/completions` request
///
/// Every call goes to this one endpoint; the server accepts a `prompt`
/// or a `messages` array on it, so exactly one of the two is populated.
#[derive(Debug, Clone, Serialize)]
pub struct VllmCompletionRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<crate::protocol::openai::OpenAiMessage>>,
    #[serde(flatten)]
    pub parameters: IndexMap<String, Value>,
}

// -- Transformers inference server --

/// `/generate` request (text-generation-inference shape)
#[derive(Debug, Clone, Serialize)]
pub struct TgiGenerateRequest {
    /// Prompt text
    pub inputs: String,
    /// Generation parameters
    pub parameters: IndexMap<String, Value>,
}

/// `/generate` response; servers return an object or a one-element list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TgiGenerateResponse {
    One(TgiGenerated),
    Many(Vec<TgiGenerated>),
}

/// Generated text payload
#[derive(Debug, Clone, Deserialize)]
pub struct TgiGenerated {
    #[serde(default)]
    pub generated_text: Option<String>,
}

impl TgiGenerateResponse {
    /// First generated text, empty when absent
    pub fn text(&self) -> String {
        match self {
            Self::One(one) => one.generated_text.clone().unwrap_or_default(),
            Self::Many(many) => many
                .first()
                .and_then(|g| g.generated_text.clone())
                .unwrap_or_default(),
        }
    }
}
