use tracing::{debug, info};

use crate::error::Result;
use crate::message::{LogMessage, WorkflowMessage};
use crate::process::{Process, ProcessEvent};
use crate::runtime::engine::WorkflowEngine;

impl Process {
    /// Starts one sub-process per element of the collection carried by
    /// `message`. An empty collection completes the task immediately.
    pub(crate) fn perform_for_each(
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

        let Some(items) = message.payload().items() else {
            let log = LogMessage::unsupported_message_received(
                position,
                &message.name().to_string(),
                "for_each needs a collection payload",
            );
            return self.receive_message(log.into(), engine);
        };

        info!(process_id = %self.id(), count = items.len(), "Starting sub-process per item");
        self.record_that(ProcessEvent::MultiPerformTaskWasStarted {
            position: position.clone(),
            count: items.len(),
        });

        if items.is_empty() {
            self.record_that(ProcessEvent::TaskEntryMarkedAsDone { position });
            return Ok(());
        }

        for (idx, item) in items.into_iter().enumerate() {
            debug!(process_id = %self.id(), item = idx, "Starting item sub-process");
            self.perform_task(&task, &position, engine, Some(message.with_payload(item)))?;
        }
        Ok(())
    }
}
