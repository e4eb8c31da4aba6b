use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdapterError;
use crate::types::response::Usage;

/// One element of a streaming response
///
/// The sequence is finite and non-restartable: zero or more text deltas,
/// optionally a usage-bearing chunk, then a final marker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Incremental assistant text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Usage totals, usually on the last data chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Computed cost, set alongside usage when pricing is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Upstream finish reason, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Raw upstream chunk for observability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    /// Set on the terminating marker
    #[serde(default)]
    pub is_final: bool,
}

impl StreamChunk {
    /// A text delta
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// The terminating marker
    pub fn done() -> Self {
        Self {
            is_final: true,
            ..Self::default()
        }
    }
}

/// Boxed stream of chunks as returned by `Adapter::invoke_stream`
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AdapterError>> + Send>>;
