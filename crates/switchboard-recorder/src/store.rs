use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::record::InvocationRecord;

/// Destination for invocation records
///
/// The observability store is external; the core only needs batched,
/// append-only writes. Failures are logged and counted by the worker,
/// never propagated to the serving path.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a batch of records
    async fn write_batch(&self, records: Vec<InvocationRecord>) -> Result<(), StoreError>;
}

/// Store write failure
#[derive(Debug, thiserror::Error)]
#[error("record store write failed: {0}")]
pub struct StoreError(pub String);

/// In-memory store for tests and embedded use
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<InvocationRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn records(&self) -> Vec<InvocationRecord> {
        self.records.lock().expect("record lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("record lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn write_batch(&self, records: Vec<InvocationRecord>) -> Result<(), StoreError> {
        self.records.lock().expect("record lock poisoned").extend(records);
        Ok(())
    }
}

/// Append-only JSON-lines file store
pub struct JsonlRecordStore {
    path: PathBuf,
}

impl JsonlRecordStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl RecordStore for JsonlRecordStore {
    async fn write_batch(&self, records: Vec<InvocationRecord>) -> Result<(), StoreError> {
        let mut buffer = String::new();
        for record in &records {
            let line = serde_json::to_string(record).map_err(|e| StoreError(e.to_string()))?;
            buffer.push_str(&line);
            buffer.push('\n');
        }

        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError(format!("open {}: {e}", self.path.display())))?;
        file.write_all(buffer.as_bytes())
            .await
            .map_err(|e| StoreError(e.to_string()))?;
        Ok(())
    }
}
