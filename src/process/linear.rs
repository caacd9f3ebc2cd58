use tracing::debug;

use crate::error::Result;
use crate::message::{LogMessage, MessageKind, WorkflowMessage};
use crate::process::{Process, ProcessEvent};
use crate::runtime::engine::WorkflowEngine;
use crate::task::Task;

/// Whether `message` is the answer `task` waits for.
pub(crate) fn is_expected_answer(task: &Task, message: &WorkflowMessage) -> bool {
    match task {
        Task::CollectData { prototype, .. } => {
            message.name().kind() == MessageKind::DataCollected && message.payload().type_name() == prototype
        }
        Task::ProcessData { .. } => message.name().kind() == MessageKind::DataProcessed,
        Task::RunSubProcess { .. } | Task::ManipulatePayload { .. } => true,
    }
}

impl Process {
    /// Starts the next task that has not been started yet. Does nothing once
    /// every entry is started or the process has failed.
    pub(crate) fn perform_linear(
        &mut self,
        engine: &dyn WorkflowEngine,
        message: Option<WorkflowMessage>,
    ) -> Result<()> {
        if self.is_finished() {
            debug!(process_id = %self.id(), "Process already finished");
            return Ok(());
        }
        let Some(entry) = self.task_list().next_not_started_entry() else {
            debug!(process_id = %self.id(), "No task left to start");
            return Ok(());
        };
        let (task, position) = (entry.task().clone(), entry.position().clone());

        self.record_that(ProcessEvent::TaskEntryMarkedAsRunning {
            position: position.clone(),
        });

        if message.is_none() && !matches!(task, Task::CollectData { .. }) {
            let log = LogMessage::no_message_received_for(&task, position);
            return self.receive_message(log.into(), engine);
        }

        self.perform_task(&task, &position, engine, message)
    }
}
