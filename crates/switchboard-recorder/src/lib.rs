//! Asynchronous invocation recording
//!
//! Completed calls are enqueued on a bounded channel with a non-blocking
//! try-send; a single background worker drains the queue into the
//! observability store in batches. When the queue is full the record is
//! dropped and counted; observability never back-pressures serving.

mod record;
mod recorder;
mod store;

pub use record::{InvocationRecord, InvocationStatus, MessageSnapshot, RecordDraft};
pub use recorder::{DEFAULT_QUEUE_SIZE, InvocationRecorder, RecorderHandle};
pub use store::{JsonlRecordStore, MemoryRecordStore, RecordStore, StoreError};
