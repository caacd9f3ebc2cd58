use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::error::Result;
use crate::message::{LogMessage, WorkflowMessage};
use crate::process::{Process, ProcessEvent};
use crate::runtime::engine::WorkflowEngine;

pub const META_OFFSET: &str = "offset";
pub const META_LIMIT: &str = "limit";
pub const META_TOTAL_ITEMS: &str = "total_items";
pub const META_COUNT_ONLY: &str = "count_only";

/// One sub-process window over the data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

/// Splits `total_items` into windows of `limit` items; the last window holds
/// the remainder.
pub fn windows(total_items: u64, limit: u64) -> Vec<Window> {
    if limit == 0 {
        return Vec::new();
    }
    (0..total_items.div_ceil(limit))
        .map(|idx| {
            let offset = idx * limit;
            Window {
                offset,
                limit: limit.min(total_items - offset),
            }
        })
        .collect()
}

fn read_window_metadata(metadata: &Map<String, Value>) -> std::result::Result<(u64, u64), String> {
    let number = |key: &str| {
        metadata
            .get(key)
            .and_then(Value::as_u64)
            .ok_or_else(|| format!("metadata '{}' must be a non-negative integer", key))
    };

    let offset = number(META_OFFSET)?;
    let limit = number(META_LIMIT)?;
    let total_items = number(META_TOTAL_ITEMS)?;
    if offset != 0 {
        return Err(format!("chunking must start at offset 0, got {}", offset));
    }
    if limit == 0 {
        return Err("limit must be greater than 0".to_string());
    }
    Ok((limit, total_items))
}

impl Process {
    /// Starts one sub-process per offset window. The seed message carries the
    /// counted data set as `offset`, `limit` and `total_items` metadata.
    pub(crate) fn perform_chunk(
        &mut self,
        engine: &dyn WorkflowEngine,
        message: Option<WorkflowMessage>,
    ) -> Result<()> {
        let Some((task, position)) = self.start_single_entry() else {
            return Ok(());
        };

        let Some(message) = message else {
            let log = LogMessage::no_message_received_for(&task, position);
            return self.receive_message(log.into(), engine);
        };

        let (limit, total_items) = match read_window_metadata(message.metadata()) {
            Ok(found) => found,
            Err(reason) => {
                let log = LogMessage::unsupported_message_received(position, &message.name().to_string(), &reason);
                return self.receive_message(log.into(), engine);
            }
        };

        let windows = windows(total_items, limit);
        info!(process_id = %self.id(), total_items, limit, chunks = windows.len(), "Starting sub-process per chunk");
        self.record_that(ProcessEvent::MultiPerformTaskWasStarted {
            position: position.clone(),
            count: windows.len(),
        });

        if windows.is_empty() {
            self.record_that(ProcessEvent::TaskEntryMarkedAsDone { position });
            return Ok(());
        }

        let mut metadata = message.metadata().clone();
        metadata.remove(META_COUNT_ONLY);

        for window in windows {
            debug!(process_id = %self.id(), offset = window.offset, limit = window.limit, "Starting chunk sub-process");
            metadata.insert(META_OFFSET.to_string(), json!(window.offset));
            metadata.insert(META_LIMIT.to_string(), json!(window.limit));
            self.perform_task(&task, &position, engine, Some(message.with_metadata(metadata.clone())))?;
        }
        Ok(())
    }
}

