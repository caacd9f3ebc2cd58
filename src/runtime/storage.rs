use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::error::{ProcessingError, Result};
use crate::process::{Process, ProcessEvent, ProcessId, RecordedEvent};

// --- Interfaces ---

/// Append-only log of process events, one stream per process.
///
/// Appends made between `begin_transaction` and `commit` become visible at
/// commit; `rollback` drops them. Outside a transaction appends are written
/// immediately.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn begin_transaction(&self) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;

    /// Appends `events` to the stream of `process_id`. Fails with
    /// `ProcessingError::Conflict` when the stream is not at `expected_version`.
    /// Returns the version of the last appended event.
    async fn append(&self, process_id: ProcessId, expected_version: u64, events: Vec<ProcessEvent>) -> Result<u64>;

    /// Loads the committed stream of `process_id`, oldest event first.
    async fn load(&self, process_id: ProcessId) -> Result<Vec<RecordedEvent>>;
}

/// Events waiting for commit, grouped by stream.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub process_id: ProcessId,
    pub expected_version: u64,
    pub events: Vec<RecordedEvent>,
}

/// Pending appends of the open transaction, shared by the store implementations.
#[derive(Debug, Default)]
pub struct TransactionBuffer {
    open: Mutex<Option<Vec<StreamAppend>>>,
}

impl TransactionBuffer {
    pub fn begin(&self) -> Result<()> {
        let mut open = self.lock()?;
        if open.is_some() {
            return Err(ProcessingError::Store("a transaction is already open".to_string()));
        }
        *open = Some(Vec::new());
        Ok(())
    }

    /// Closes the transaction and hands out its appends.
    pub fn finish(&self) -> Result<Vec<StreamAppend>> {
        self.lock()?
            .take()
            .ok_or_else(|| ProcessingError::Store("no open transaction".to_string()))
    }

    pub fn is_open(&self) -> Result<bool> {
        Ok(self.lock()?.is_some())
    }

    /// Version of `process_id` including appends buffered in this transaction,
    /// or `None` if nothing is buffered for it.
    pub fn pending_version(&self, process_id: ProcessId) -> Result<Option<u64>> {
        Ok(self.lock()?.as_ref().and_then(|appends| {
            appends
                .iter()
                .rev()
                .find(|a| a.process_id == process_id)
                .and_then(|a| a.events.last().map(|e| e.version))
        }))
    }

    /// Buffers `append` if a transaction is open. Gives it back otherwise.
    pub fn push(&self, append: StreamAppend) -> Result<Option<StreamAppend>> {
        match self.lock()?.as_mut() {
            Some(appends) => {
                appends.push(append);
                Ok(None)
            }
            None => Ok(Some(append)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Vec<StreamAppend>>>> {
        self.open
            .lock()
            .map_err(|_| ProcessingError::Store("transaction buffer poisoned".to_string()))
    }
}

/// Numbers `events` consecutively after `expected_version`.
pub fn number_events(expected_version: u64, events: Vec<ProcessEvent>) -> Vec<RecordedEvent> {
    events
        .into_iter()
        .enumerate()
        .map(|(idx, event)| RecordedEvent {
            version: expected_version + idx as u64 + 1,
            event,
        })
        .collect()
}

// --- In-Memory Implementation ---

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: DashMap<ProcessId, Vec<RecordedEvent>>,
    transaction: TransactionBuffer,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn committed_version(&self, process_id: ProcessId) -> u64 {
        self.streams
            .get(&process_id)
            .and_then(|stream| stream.last().map(|e| e.version))
            .unwrap_or(0)
    }

    fn write(&self, append: StreamAppend) -> Result<()> {
        let mut stream = self.streams.entry(append.process_id).or_default();
        let actual = stream.last().map(|e| e.version).unwrap_or(0);
        if actual != append.expected_version {
            return Err(ProcessingError::Conflict {
                process_id: append.process_id,
                expected: append.expected_version,
                actual,
            });
        }
        stream.extend(append.events);
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn begin_transaction(&self) -> Result<()> {
        self.transaction.begin()
    }

    async fn commit(&self) -> Result<()> {
        let appends = self.transaction.finish()?;
        trace!(streams = appends.len(), "Committing appends");
        for append in appends {
            self.write(append)?;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let dropped = self.transaction.finish()?;
        debug!(streams = dropped.len(), "Rolled back appends");
        Ok(())
    }

    async fn append(&self, process_id: ProcessId, expected_version: u64, events: Vec<ProcessEvent>) -> Result<u64> {
        let actual = match self.transaction.pending_version(process_id)? {
            Some(version) => version,
            None => self.committed_version(process_id),
        };
        if actual != expected_version {
            return Err(ProcessingError::Conflict {
                process_id,
                expected: expected_version,
                actual,
            });
        }

        let events = number_events(expected_version, events);
        let version = events.last().map(|e| e.version).unwrap_or(expected_version);
        let append = StreamAppend {
            process_id,
            expected_version,
            events,
        };
        if let Some(append) = self.transaction.push(append)? {
            self.write(append)?;
        }
        Ok(version)
    }

    async fn load(&self, process_id: ProcessId) -> Result<Vec<RecordedEvent>> {
        Ok(self
            .streams
            .get(&process_id)
            .map(|stream| stream.value().clone())
            .unwrap_or_default())
    }
}

// --- Repository ---

/// Stores processes as their event streams and rebuilds them by replay.
#[derive(Clone)]
pub struct ProcessRepository {
    store: Arc<dyn EventStore>,
}

impl ProcessRepository {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Appends the events `process` recorded since it was loaded.
    pub async fn add(&self, process: &mut Process) -> Result<()> {
        let events = process.pop_recorded_events();
        if events.is_empty() {
            return Ok(());
        }
        let count = events.len();
        let version = self.store.append(process.id(), process.version(), events).await?;
        process.set_version(version);
        debug!(process_id = %process.id(), events = count, version, "Process events appended");
        Ok(())
    }

    pub async fn get(&self, process_id: ProcessId) -> Result<Option<Process>> {
        let events = self.store.load(process_id).await?;
        if events.is_empty() {
            return Ok(None);
        }
        Process::reconstitute(&events).map(Some)
    }
}
