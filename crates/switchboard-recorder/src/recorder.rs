use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::record::RecordDraft;
use crate::store::RecordStore;
use crate::InvocationRecord;

/// Default queue capacity
pub const DEFAULT_QUEUE_SIZE: usize = 1024;
/// Records written per store call, when the queue has them ready
const BATCH_MAX: usize = 32;
/// Default drain budget at shutdown
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Hot-path handle for enqueueing records
///
/// `record` never blocks and never fails the caller; a full queue drops
/// the record and bumps the drop counter.
#[derive(Clone)]
pub struct InvocationRecorder {
    tx: mpsc::Sender<InvocationRecord>,
    dropped: Arc<AtomicU64>,
    next_id: Arc<AtomicU64>,
    full_capture: bool,
}

/// Owns the background worker; shut down to drain and stop
pub struct RecorderHandle {
    worker: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl RecorderHandle {
    /// Signal the worker, wait for it to drain and exit
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.worker.await {
            tracing::warn!(error = %e, "recorder worker did not exit cleanly");
        }
    }
}

impl InvocationRecorder {
    /// Start a recorder with its background worker
    pub fn spawn(store: Arc<dyn RecordStore>, queue_size: usize, full_capture: bool) -> (Self, RecorderHandle) {
        Self::spawn_with_grace(store, queue_size, full_capture, DEFAULT_SHUTDOWN_GRACE)
    }

    /// As `spawn`, with an explicit shutdown drain budget
    pub fn spawn_with_grace(
        store: Arc<dyn RecordStore>,
        queue_size: usize,
        full_capture: bool,
        grace: Duration,
    ) -> (Self, RecorderHandle) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(run_worker(rx, store, shutdown.clone(), grace));

        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
                next_id: Arc::new(AtomicU64::new(1)),
                full_capture,
            },
            RecorderHandle { worker, shutdown },
        )
    }

    /// Enqueue a completed call; non-blocking, fire-and-forget
    pub fn record(&self, draft: RecordDraft) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = draft.finalize(id, self.full_capture);
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped, "record queue full, dropping invocation record");
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("record queue closed, dropping invocation record");
            }
        }
    }

    /// Records dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drain the queue into the store until shutdown, then drain what is left
/// within the grace budget
async fn run_worker(
    mut rx: mpsc::Receiver<InvocationRecord>,
    store: Arc<dyn RecordStore>,
    shutdown: CancellationToken,
    grace: Duration,
) {
    let mut failed_writes: u64 = 0;

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(first) = received else { break };
                let batch = fill_batch(&mut rx, first);
                write_batch(store.as_ref(), batch, &mut failed_writes).await;
            }
            () = shutdown.cancelled() => {
                drain_remaining(&mut rx, store.as_ref(), grace, &mut failed_writes).await;
                break;
            }
        }
    }

    tracing::debug!(failed_writes, "invocation recorder worker stopped");
}

/// Pull whatever else is immediately available, up to the batch cap
fn fill_batch(rx: &mut mpsc::Receiver<InvocationRecord>, first: InvocationRecord) -> Vec<InvocationRecord> {
    let mut batch = vec![first];
    while batch.len() < BATCH_MAX {
        match rx.try_recv() {
            Ok(record) => batch.push(record),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
    }
    batch
}

async fn write_batch(store: &dyn RecordStore, batch: Vec<InvocationRecord>, failed_writes: &mut u64) {
    let len = batch.len();
    if let Err(e) = store.write_batch(batch).await {
        *failed_writes += 1;
        tracing::warn!(error = %e, records = len, "failed to write invocation records");
    }
}

async fn drain_remaining(
    rx: &mut mpsc::Receiver<InvocationRecord>,
    store: &dyn RecordStore,
    grace: Duration,
    failed_writes: &mut u64,
) {
    let deadline = tokio::time::Instant::now() + grace;
    let mut batch = Vec::new();

    loop {
        match rx.try_recv() {
            Ok(record) => {
                batch.push(record);
                if batch.len() >= BATCH_MAX {
                    let flush = std::mem::take(&mut batch);
                    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                    if tokio::time::timeout(remaining, write_batch(store, flush, failed_writes))
                        .await
                        .is_err()
                    {
                        tracing::warn!("shutdown grace elapsed mid-drain");
                        return;
                    }
                }
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(unwritten = batch.len(), "shutdown grace elapsed, abandoning queued records");
            return;
        }
    }

    if !batch.is_empty() {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let _ = tokio::time::timeout(remaining, write_batch(store, batch, failed_writes)).await;
    }
}
