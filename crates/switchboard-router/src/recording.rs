use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures_util::Stream;
use serde_json::Value;
use switchboard_adapters::{AdapterError, ChunkStream, InvokeRequest, InvokeResponse, StreamChunk};
use switchboard_catalog::ModelTarget;
use switchboard_recorder::{InvocationRecorder, InvocationStatus, MessageSnapshot, RecordDraft};

/// Snapshot the request messages for the observability row
fn message_snapshots(request: &InvokeRequest) -> Option<Vec<MessageSnapshot>> {
    let messages = request.messages.as_ref()?;
    let snapshots: Vec<MessageSnapshot> = messages
        .iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| MessageSnapshot {
            role: m.role.as_str().to_owned(),
            content: m.content.as_text(),
        })
        .collect();
    (!snapshots.is_empty()).then_some(snapshots)
}

/// Draft for a completed non-streaming call
pub(crate) fn draft_for_response(
    target: &ModelTarget,
    request: &InvokeRequest,
    started_at: DateTime<Utc>,
    response: &InvokeResponse,
) -> RecordDraft {
    RecordDraft {
        provider_name: target.model.provider_name.clone(),
        model_name: target.model.name.clone(),
        started_at,
        completed_at: Utc::now(),
        status: InvocationStatus::Success,
        error_message: None,
        request_prompt: request.prompt.clone(),
        request_messages: message_snapshots(request),
        request_parameters: request.parameters.clone(),
        response_text: Some(response.output_text.clone()),
        prompt_tokens: response.usage.and_then(|u| u.prompt_tokens),
        completion_tokens: response.usage.and_then(|u| u.completion_tokens),
        total_tokens: response.usage.and_then(|u| u.total_tokens),
        raw_response: Some(response.raw.clone()),
        model_config: target.model.config.clone(),
    }
}

/// Draft for a failed call
pub(crate) fn draft_for_error(
    target: &ModelTarget,
    request: &InvokeRequest,
    started_at: DateTime<Utc>,
    error: &AdapterError,
) -> RecordDraft {
    RecordDraft {
        provider_name: target.model.provider_name.clone(),
        model_name: target.model.name.clone(),
        started_at,
        completed_at: Utc::now(),
        status: InvocationStatus::Error,
        error_message: Some(error.to_string()),
        request_prompt: request.prompt.clone(),
        request_messages: message_snapshots(request),
        request_parameters: request.parameters.clone(),
        response_text: None,
        prompt_tokens: None,
        completion_tokens: None,
        total_tokens: None,
        raw_response: None,
        model_config: target.model.config.clone(),
    }
}

/// Aggregation state carried while a stream is live
struct StreamRecordState {
    recorder: InvocationRecorder,
    target: ModelTarget,
    request_prompt: Option<String>,
    request_messages: Option<Vec<MessageSnapshot>>,
    request_parameters: indexmap::IndexMap<String, Value>,
    started_at: DateTime<Utc>,
    text: String,
    usage: Option<switchboard_adapters::Usage>,
    raw_chunks: Vec<Value>,
    error_message: Option<String>,
    finished_cleanly: bool,
}

impl StreamRecordState {
    fn finalize(self) {
        let error_message = match (self.error_message, self.finished_cleanly) {
            (Some(message), _) => Some(message),
            (None, false) => Some("stream abandoned before completion".to_owned()),
            (None, true) => None,
        };
        let status = if error_message.is_some() {
            InvocationStatus::Error
        } else {
            InvocationStatus::Success
        };
        let raw_response =
            (!self.raw_chunks.is_empty()).then(|| serde_json::json!({ "stream": self.raw_chunks }));

        self.recorder.record(RecordDraft {
            provider_name: self.target.model.provider_name.clone(),
            model_name: self.target.model.name.clone(),
            started_at: self.started_at,
            completed_at: Utc::now(),
            status,
            error_message,
            request_prompt: self.request_prompt,
            request_messages: self.request_messages,
            request_parameters: self.request_parameters,
            response_text: (!self.text.is_empty()).then_some(self.text),
            prompt_tokens: self.usage.and_then(|u| u.prompt_tokens),
            completion_tokens: self.usage.and_then(|u| u.completion_tokens),
            total_tokens: self.usage.and_then(|u| u.total_tokens),
            raw_response,
            model_config: self.target.model.config.clone(),
        });
    }
}

/// Stream wrapper that records the invocation when the stream ends
///
/// Aggregates text and usage as chunks flow through, injects cost onto
/// usage-bearing chunks, and writes exactly one record: at clean end, at
/// first error, or from `Drop` when the client abandons the stream.
pub(crate) struct RecordingStream {
    inner: ChunkStream,
    state: Option<StreamRecordState>,
}

impl RecordingStream {
    pub(crate) fn new(
        inner: ChunkStream,
        recorder: InvocationRecorder,
        target: ModelTarget,
        request: &InvokeRequest,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            inner,
            state: Some(StreamRecordState {
                recorder,
                target,
                request_prompt: request.prompt.clone(),
                request_messages: message_snapshots(request),
                request_parameters: request.parameters.clone(),
                started_at,
                text: String::new(),
                usage: None,
                raw_chunks: Vec::new(),
                error_message: None,
                finished_cleanly: false,
            }),
        }
    }

    fn finish(&mut self) {
        if let Some(state) = self.state.take() {
            state.finalize();
        }
    }
}

impl Stream for RecordingStream {
    type Item = Result<StreamChunk, AdapterError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(mut chunk))) => {
                if let Some(state) = this.state.as_mut() {
                    if let Some(text) = &chunk.text {
                        state.text.push_str(text);
                    }
                    if let Some(raw) = &chunk.raw {
                        state.raw_chunks.push(raw.clone());
                    }
                    if let Some(usage) = chunk.usage {
                        state.usage = Some(usage);
                        // Cost rides on the usage chunk when pricing is known
                        chunk.cost = state
                            .target
                            .model
                            .config
                            .cost(usage.prompt_tokens, usage.completion_tokens);
                    }
                    if chunk.is_final {
                        state.finished_cleanly = true;
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(error))) => {
                if let Some(state) = this.state.as_mut() {
                    state.error_message = Some(error.to_string());
                }
                this.finish();
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                if let Some(state) = this.state.as_mut()
                    && state.error_message.is_none()
                {
                    // An upstream that ends without a final marker still
                    // counts as a clean finish
                    state.finished_cleanly = true;
                }
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RecordingStream {
    fn drop(&mut self) {
        self.finish();
    }
}
