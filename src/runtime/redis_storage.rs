use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, trace};

use crate::error::{ProcessingError, Result};
use crate::process::{ProcessEvent, ProcessId, RecordedEvent};
use crate::runtime::storage::{EventStore, StreamAppend, TransactionBuffer, number_events};

fn store_error(e: redis::RedisError) -> ProcessingError {
    ProcessingError::Store(e.to_string())
}

/// Event store keeping one Redis list per process stream. The list length is
/// the stream version.
pub struct RedisEventStore {
    client: redis::Client,
    prefix: String,
    transaction: TransactionBuffer,
}

impl RedisEventStore {
    pub fn new(client: redis::Client) -> Self {
        Self::with_prefix(client, "processing")
    }

    pub fn with_prefix(client: redis::Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
            transaction: TransactionBuffer::default(),
        }
    }

    fn stream_key(&self, process_id: ProcessId) -> String {
        format!("{}:process:{}:events", self.prefix, process_id)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await.map_err(store_error)
    }

    async fn committed_version(&self, process_id: ProcessId) -> Result<u64> {
        let mut conn = self.connection().await?;
        conn.llen(self.stream_key(process_id)).await.map_err(store_error)
    }

    /// Appends atomically if the list is still at the expected length.
    async fn write(&self, append: StreamAppend) -> Result<()> {
        // KEYS[1] = stream list, ARGV[1] = expected length, ARGV[2..] = events
        let script = redis::Script::new(
            r#"
            local actual = redis.call("LLEN", KEYS[1])
            if actual ~= tonumber(ARGV[1]) then
                return actual
            end
            for i = 2, #ARGV do
                redis.call("RPUSH", KEYS[1], ARGV[i])
            end
            return -1
        "#,
        );

        let mut invocation = script.key(self.stream_key(append.process_id));
        invocation.arg(append.expected_version);
        for event in &append.events {
            invocation.arg(serde_json::to_string(event)?);
        }

        let mut conn = self.connection().await?;
        let outcome: i64 = invocation.invoke_async(&mut conn).await.map_err(store_error)?;
        if outcome >= 0 {
            return Err(ProcessingError::Conflict {
                process_id: append.process_id,
                expected: append.expected_version,
                actual: outcome as u64,
            });
        }
        trace!(process_id = %append.process_id, events = append.events.len(), "Stream written");
        Ok(())
    }
}

#[async_trait]
impl EventStore for RedisEventStore {
    async fn begin_transaction(&self) -> Result<()> {
        self.transaction.begin()
    }

    async fn commit(&self) -> Result<()> {
        for append in self.transaction.finish()? {
            self.write(append).await?;
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
            None => self.committed_version(process_id).await?,
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
            self.write(append).await?;
        }
        Ok(version)
    }

    async fn load(&self, process_id: ProcessId) -> Result<Vec<RecordedEvent>> {
        let mut conn = self.connection().await?;
        let raw: Vec<String> = conn
            .lrange(self.stream_key(process_id), 0, -1)
            .await
            .map_err(store_error)?;

        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(ProcessingError::from))
            .collect()
    }
}
