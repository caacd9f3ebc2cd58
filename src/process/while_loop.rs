use tracing::{debug, info};

use crate::error::{ProcessingError, Result};
use crate::message::WorkflowMessage;
use crate::process::{Process, ProcessEvent};
use crate::runtime::engine::WorkflowEngine;
use crate::task::TaskListPosition;

impl Process {
    /// Runs the single sub-process task again after every successful
    /// iteration. A failed iteration leaves the task list completed, which
    /// ends the loop.
    pub(crate) fn perform_while(
        &mut self,
        engine: &dyn WorkflowEngine,
        message: Option<WorkflowMessage>,
    ) -> Result<()> {
        let next = self
            .task_list()
            .next_not_started_entry()
            .map(|entry| (entry.task().clone(), entry.position().clone()));

        let (task, position) = match next {
            Some(found) => found,
            None => {
                let Some(last) = self.task_list().last_entry() else {
                    return Ok(());
                };
                if !last.is_done() {
                    debug!(process_id = %self.id(), "Loop iteration still open or failed");
                    return Ok(());
                }

                let position = TaskListPosition::at(self.task_list().id().clone(), self.task_list().len() + 1);
                info!(process_id = %self.id(), iteration = position.position(), "Re-arming loop");
                self.record_that(ProcessEvent::TaskListRescheduled {
                    position: position.clone(),
                });
                let task = self
                    .task_list()
                    .last_entry()
                    .map(|e| e.task().clone())
                    .ok_or(ProcessingError::EmptyTaskList)?;
                (task, position)
            }
        };

        self.record_that(ProcessEvent::TaskEntryMarkedAsRunning {
            position: position.clone(),
        });
        self.perform_task(&task, &position, engine, message)
    }
}
