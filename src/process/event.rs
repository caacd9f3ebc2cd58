use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProcessingError, Result};
use crate::message::LogMessage;
use crate::process::ProcessKind;
use crate::task::{NodeName, ProcessId, Task, TaskList, TaskListId, TaskListPosition};

/// Everything that ever happens to a process, in recording order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcessEvent {
    ProcessSetUp {
        process_id: ProcessId,
        kind: ProcessKind,
        node_name: NodeName,
        tasks: Vec<Task>,
        #[serde(default)]
        parent_position: Option<TaskListPosition>,
        #[serde(default)]
        sync_log_messages: bool,
        #[serde(default)]
        config: Map<String, Value>,
    },
    TaskEntryMarkedAsRunning {
        position: TaskListPosition,
    },
    TaskEntryMarkedAsDone {
        position: TaskListPosition,
    },
    TaskEntryMarkedAsFailed {
        position: TaskListPosition,
    },
    LogMessageReceived {
        message: LogMessage,
    },
    MultiPerformTaskWasStarted {
        position: TaskListPosition,
        count: usize,
    },
    MultiPerformTaskSucceeded {
        position: TaskListPosition,
    },
    MultiPerformTaskFailed {
        position: TaskListPosition,
    },
    /// A fresh copy of the last task was appended at `position`.
    TaskListRescheduled {
        position: TaskListPosition,
    },
}

impl ProcessEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessEvent::ProcessSetUp { .. } => "process_set_up",
            ProcessEvent::TaskEntryMarkedAsRunning { .. } => "task_entry_marked_as_running",
            ProcessEvent::TaskEntryMarkedAsDone { .. } => "task_entry_marked_as_done",
            ProcessEvent::TaskEntryMarkedAsFailed { .. } => "task_entry_marked_as_failed",
            ProcessEvent::LogMessageReceived { .. } => "log_message_received",
            ProcessEvent::MultiPerformTaskWasStarted { .. } => "multi_perform_task_was_started",
            ProcessEvent::MultiPerformTaskSucceeded { .. } => "multi_perform_task_succeeded",
            ProcessEvent::MultiPerformTaskFailed { .. } => "multi_perform_task_failed",
            ProcessEvent::TaskListRescheduled { .. } => "task_list_rescheduled",
        }
    }
}

/// An event as stored in the log, with its 1-based stream version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub version: u64,
    pub event: ProcessEvent,
}

/// In-memory state of a process, derived exclusively from its events.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessState {
    pub(crate) id: ProcessId,
    pub(crate) kind: ProcessKind,
    pub(crate) task_list: TaskList,
    pub(crate) parent_position: Option<TaskListPosition>,
    pub(crate) sync_log_messages: bool,
    pub(crate) config: Map<String, Value>,
    pub(crate) multi_perform_started: bool,
    pub(crate) started_tasks: usize,
    pub(crate) succeeded_tasks: usize,
    pub(crate) failed_tasks: usize,
}

impl ProcessState {
    /// Builds the initial state from the first event of a stream.
    pub fn initial(event: &ProcessEvent) -> Result<Self> {
        let ProcessEvent::ProcessSetUp {
            process_id,
            kind,
            node_name,
            tasks,
            parent_position,
            sync_log_messages,
            config,
        } = event
        else {
            return Err(ProcessingError::Store(format!(
                "process stream must start with process_set_up, found {}",
                event.name()
            )));
        };

        let task_list = TaskList::schedule_tasks(TaskListId::link(node_name.clone(), *process_id), tasks.clone())?;

        Ok(Self {
            id: *process_id,
            kind: *kind,
            task_list,
            parent_position: parent_position.clone(),
            sync_log_messages: *sync_log_messages,
            config: config.clone(),
            multi_perform_started: false,
            started_tasks: 0,
            succeeded_tasks: 0,
            failed_tasks: 0,
        })
    }

    pub fn task_list(&self) -> &TaskList {
        &self.task_list
    }

    /// Folds an event into the state. This is the only place state changes,
    /// for live recording and replay alike; it performs no I/O.
    pub fn apply(&mut self, event: &ProcessEvent) {
        match event {
            ProcessEvent::ProcessSetUp { .. } => {}
            ProcessEvent::TaskEntryMarkedAsRunning { position } => {
                if let Some(entry) = self.task_list.entry_at_mut(position) {
                    entry.mark_running();
                }
            }
            ProcessEvent::TaskEntryMarkedAsDone { position } => {
                if let Some(entry) = self.task_list.entry_at_mut(position) {
                    entry.mark_done();
                }
            }
            ProcessEvent::TaskEntryMarkedAsFailed { position } => {
                if let Some(entry) = self.task_list.entry_at_mut(position) {
                    entry.mark_failed();
                }
            }
            ProcessEvent::LogMessageReceived { message } => {
                if let Some(entry) = self.task_list.entry_at_mut(message.position()) {
                    entry.attach_log(message.clone());
                }
            }
            ProcessEvent::MultiPerformTaskWasStarted { count, .. } => {
                self.multi_perform_started = true;
                self.started_tasks = *count;
                self.succeeded_tasks = 0;
                self.failed_tasks = 0;
            }
            ProcessEvent::MultiPerformTaskSucceeded { .. } => self.succeeded_tasks += 1,
            ProcessEvent::MultiPerformTaskFailed { .. } => self.failed_tasks += 1,
            ProcessEvent::TaskListRescheduled { .. } => {
                if let Some(task) = self.task_list.last_entry().map(|e| e.task().clone()) {
                    self.task_list.reschedule(task);
                }
            }
        }
    }

    /// Rebuilds the state from a complete event stream.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a ProcessEvent>) -> Result<Self> {
        let mut events = events.into_iter();
        let first = events
            .next()
            .ok_or_else(|| ProcessingError::Store("empty process stream".to_string()))?;
        let mut state = Self::initial(first)?;
        for event in events {
            state.apply(event);
        }
        Ok(state)
    }
}
