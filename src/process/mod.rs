//! Event-sourced process state machine.
//!
//! A `Process` owns one `TaskList`. Every state change is recorded as a
//! `ProcessEvent` and applied through `ProcessState::apply`; recorded events
//! stay pending until the repository persists them. Loading a process replays
//! its stream through the same `apply`.
//!
//! The four execution disciplines live in their own modules:
//! `linear`, `for_each`, `chunk` and `while_loop`.

pub mod chunk;
pub mod event;
pub mod factory;
pub mod for_each;
pub mod linear;
pub mod while_loop;

pub use crate::task::ProcessId;
pub use event::{ProcessEvent, ProcessState, RecordedEvent};
pub use factory::ProcessFactory;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, ProcessingError, Result};
use crate::message::{LogMessage, Message, ProcessMessage, StartSubProcess, WorkflowMessage};
use crate::runtime::engine::WorkflowEngine;
use crate::task::{EntryStatus, NodeName, Task, TaskList, TaskListEntry, TaskListPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    /// Tasks run strictly one after another.
    Linear,
    /// One sub-process per element of a collection payload.
    ForEach,
    /// One sub-process per offset window of a counted data set.
    Chunk,
    /// The same sub-process again and again until an iteration fails.
    While,
}

impl ProcessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::Linear => "linear",
            ProcessKind::ForEach => "for_each",
            ProcessKind::Chunk => "chunk",
            ProcessKind::While => "while",
        }
    }

    /// Fan-out kinds and `While` drive a single `run_sub_process` task.
    pub fn requires_single_sub_process(&self) -> bool {
        !matches!(self, ProcessKind::Linear)
    }

    fn tallies_answers(&self) -> bool {
        matches!(self, ProcessKind::ForEach | ProcessKind::Chunk)
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessKind {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" | "linear_messaging" => Ok(ProcessKind::Linear),
            "for_each" | "parallel_for_each" => Ok(ProcessKind::ForEach),
            "chunk" | "parallel_chunk" => Ok(ProcessKind::Chunk),
            "while" | "while_loop" => Ok(ProcessKind::While),
            other => Err(ProcessingError::Definition(format!("unknown process_type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Process {
    state: ProcessState,
    version: u64,
    pending_events: Vec<ProcessEvent>,
    /// Latest answer accepted since the process was loaded. Not persisted.
    last_answer: Option<WorkflowMessage>,
}

impl Process {
    pub fn set_up(
        kind: ProcessKind,
        node_name: NodeName,
        tasks: Vec<Task>,
        config: Map<String, Value>,
    ) -> Result<Self> {
        Self::record_set_up(kind, node_name, tasks, config, None, false)
    }

    pub fn set_up_as_sub_process(
        kind: ProcessKind,
        node_name: NodeName,
        tasks: Vec<Task>,
        config: Map<String, Value>,
        parent_position: TaskListPosition,
        sync_log_messages: bool,
    ) -> Result<Self> {
        Self::record_set_up(kind, node_name, tasks, config, Some(parent_position), sync_log_messages)
    }

    fn record_set_up(
        kind: ProcessKind,
        node_name: NodeName,
        tasks: Vec<Task>,
        config: Map<String, Value>,
        parent_position: Option<TaskListPosition>,
        sync_log_messages: bool,
    ) -> Result<Self> {
        let event = ProcessEvent::ProcessSetUp {
            process_id: ProcessId::generate(),
            kind,
            node_name,
            tasks,
            parent_position,
            sync_log_messages,
            config,
        };
        let state = ProcessState::initial(&event)?;
        debug!(process_id = %state.id, kind = %kind, "Process set up");

        Ok(Self {
            state,
            version: 0,
            pending_events: vec![event],
            last_answer: None,
        })
    }

    /// Rebuilds a persisted process from its stream.
    pub fn reconstitute(events: &[RecordedEvent]) -> Result<Self> {
        let state = ProcessState::replay(events.iter().map(|r| &r.event))?;
        Ok(Self {
            state,
            version: events.last().map(|r| r.version).unwrap_or(0),
            pending_events: Vec::new(),
            last_answer: None,
        })
    }

    pub(crate) fn record_that(&mut self, event: ProcessEvent) {
        self.state.apply(&event);
        self.pending_events.push(event);
    }

    /// Hands the not yet persisted events to the caller.
    pub fn pop_recorded_events(&mut self) -> Vec<ProcessEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn recorded_events(&self) -> &[ProcessEvent] {
        &self.pending_events
    }

    /// Version of the last persisted event.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn last_answer(&self) -> Option<&WorkflowMessage> {
        self.last_answer.as_ref()
    }

    pub fn id(&self) -> ProcessId {
        self.state.id
    }

    pub fn kind(&self) -> ProcessKind {
        self.state.kind
    }

    pub fn node_name(&self) -> &NodeName {
        &self.state.task_list.id().node_name
    }

    pub fn task_list(&self) -> &TaskList {
        &self.state.task_list
    }

    pub fn config(&self) -> &Map<String, Value> {
        &self.state.config
    }

    pub fn parent_position(&self) -> Option<&TaskListPosition> {
        self.state.parent_position.as_ref()
    }

    pub fn is_sub_process(&self) -> bool {
        self.state.parent_position.is_some()
    }

    pub fn sync_log_messages(&self) -> bool {
        self.state.sync_log_messages
    }

    pub fn started_tasks(&self) -> usize {
        self.state.started_tasks
    }

    pub fn succeeded_tasks(&self) -> usize {
        self.state.succeeded_tasks
    }

    pub fn failed_tasks(&self) -> usize {
        self.state.failed_tasks
    }

    pub fn is_started(&self) -> bool {
        self.state.task_list.is_started()
    }

    pub fn is_finished(&self) -> bool {
        self.state.task_list.is_completed()
    }

    pub fn is_successful_done(&self) -> bool {
        self.state.task_list.is_successful_done()
    }

    /// Most recent error log attached to any entry.
    pub fn last_error_log(&self) -> Option<&LogMessage> {
        self.state
            .task_list
            .entries()
            .iter()
            .flat_map(|e| e.logs())
            .filter(|l| l.is_error())
            .last()
    }

    /// Error log a failed process reports to its parent: its own last error
    /// log, or a generic sub-process failure naming `last_message_name`.
    pub fn failure_report(&self, last_message_name: &str) -> LogMessage {
        if let Some(log) = self.last_error_log() {
            return log.clone();
        }
        let position = self
            .state
            .task_list
            .last_entry()
            .map(|e| e.position().clone())
            .unwrap_or_else(|| TaskListPosition::at(self.state.task_list.id().clone(), 1));
        LogMessage::sub_process_failed(self.node_name().as_str(), position, self.state.id, last_message_name)
    }

    fn entry(&self, position: &TaskListPosition) -> Result<&TaskListEntry> {
        self.state
            .task_list
            .entry_at(position)
            .ok_or_else(|| ProcessingError::TaskEntryNotFound(position.clone()))
    }

    /// Advances the process according to its kind. `message` is the message
    /// that triggered the step, if any.
    pub fn perform(&mut self, engine: &dyn WorkflowEngine, message: Option<WorkflowMessage>) -> Result<()> {
        match self.state.kind {
            ProcessKind::Linear => self.perform_linear(engine, message),
            ProcessKind::ForEach => self.perform_for_each(engine, message),
            ProcessKind::Chunk => self.perform_chunk(engine, message),
            ProcessKind::While => self.perform_while(engine, message),
        }
    }

    /// Entry point for every message addressed to this process.
    ///
    /// Uncorrelated workflow messages advance the process directly. A
    /// correlated message must address an existing entry; workflow messages
    /// complete it, error logs fail it, other logs are attached to it.
    pub fn receive_message(&mut self, message: ProcessMessage, engine: &dyn WorkflowEngine) -> Result<()> {
        match message {
            ProcessMessage::Workflow(message) => {
                let Some(position) = message.position().cloned() else {
                    return self.perform(engine, Some(message));
                };
                if self.state.kind.tallies_answers() {
                    self.last_answer = Some(message);
                    return self.tally_sub_process_answer(&position, true);
                }

                let entry = self.entry(&position)?;
                if !entry.is_running() {
                    warn!(
                        process_id = %self.state.id,
                        position = %position,
                        status = ?entry.status(),
                        message = %message.name(),
                        "Ignoring answer for a task that is not running"
                    );
                    return Ok(());
                }

                if self.state.kind == ProcessKind::Linear && !linear::is_expected_answer(entry.task(), &message) {
                    let log =
                        LogMessage::wrong_message_received_for(entry.task(), position, &message.name().to_string());
                    warn!(process_id = %self.state.id, message = %message.name(), "{}", log.text());
                    self.record_that(ProcessEvent::LogMessageReceived { message: log });
                    return Ok(());
                }

                self.record_that(ProcessEvent::TaskEntryMarkedAsDone { position });
                self.last_answer = Some(message.clone());
                self.perform(engine, Some(message))
            }
            ProcessMessage::Log(log) => {
                let position = log.position().clone();
                self.entry(&position)?;
                let is_error = log.is_error();
                let forward = (!is_error && self.state.sync_log_messages)
                    .then(|| self.state.parent_position.clone())
                    .flatten()
                    .map(|parent| log.connect_to_process_task(parent));

                self.record_that(ProcessEvent::LogMessageReceived { message: log });

                if is_error {
                    if self.state.kind.tallies_answers() {
                        return self.tally_sub_process_answer(&position, false);
                    }
                    info!(process_id = %self.state.id, position = %position, "Task failed");
                    self.record_that(ProcessEvent::TaskEntryMarkedAsFailed { position });
                } else if let Some(forward) = forward {
                    // error logs reach the parent through the finish protocol only
                    if let Err(e) = engine.dispatch(forward.into()) {
                        warn!(process_id = %self.state.id, "Forwarding log to parent failed: {}", e);
                    }
                }
                Ok(())
            }
        }
    }

    /// Executes `task` for the entry at `position`. Dispatch problems are
    /// turned into error logs and fed back into `receive_message`.
    pub(crate) fn perform_task(
        &mut self,
        task: &Task,
        position: &TaskListPosition,
        engine: &dyn WorkflowEngine,
        previous: Option<WorkflowMessage>,
    ) -> Result<()> {
        let node = self.node_name().to_string();

        match task {
            Task::CollectData {
                source,
                prototype,
                metadata,
            } => {
                let command = WorkflowMessage::collect_data_of(prototype, &node, source, metadata.clone())
                    .connect_to_process_task(position.clone());
                self.dispatch_for_task(task, position, engine, command.into())
            }
            Task::ProcessData {
                target,
                allowed_types,
                preferred_type,
                metadata,
            } => {
                let Some(mut previous) = previous else {
                    let log = LogMessage::no_message_received_for(task, position.clone());
                    return self.receive_message(log.into(), engine);
                };

                let current_type = previous.payload().type_name().to_string();
                if !allowed_types.iter().any(|t| *t == current_type) {
                    let preferred = preferred_type.as_deref().or(allowed_types.first().map(String::as_str));
                    let converted = match preferred {
                        Some(preferred) => previous.payload().convert_to(preferred),
                        None => Err("task allows no types".to_string()),
                    };
                    match converted {
                        Ok(payload) => {
                            debug!(from = %current_type, to = %payload.type_name(), "Converted payload");
                            previous = previous.with_payload(payload);
                        }
                        Err(reason) => {
                            let log = LogMessage::type_conversion_failed(
                                task,
                                position.clone(),
                                &current_type,
                                preferred,
                                &reason,
                            );
                            return self.receive_message(log.into(), engine);
                        }
                    }
                }

                let command = previous.prepare_data_processing(position.clone(), &node, target, metadata);
                self.dispatch_for_task(task, position, engine, command.into())
            }
            Task::RunSubProcess {
                target_node,
                process_definition,
            } => {
                let command =
                    StartSubProcess::at(position.clone(), target_node.clone(), process_definition.clone(), previous);
                self.dispatch_for_task(task, position, engine, command.into())
            }
            Task::ManipulatePayload { manipulator } => {
                let Some(previous) = previous else {
                    let log = LogMessage::no_message_received_for(task, position.clone());
                    return self.receive_message(log.into(), engine);
                };
                let Some(m) = engine.manipulator(manipulator) else {
                    let reason = DispatchError::UnknownManipulator(manipulator.clone()).to_string();
                    let log = LogMessage::dispatch_failed(task, position.clone(), &reason);
                    return self.receive_message(log.into(), engine);
                };

                let mut payload = previous.payload().clone();
                if let Err(e) = m.manipulate(&mut payload) {
                    let reason = DispatchError::Manipulation(e.to_string()).to_string();
                    let log = LogMessage::dispatch_failed(task, position.clone(), &reason);
                    return self.receive_message(log.into(), engine);
                }

                let result = previous.with_payload(payload).connect_to_process_task(position.clone());
                self.receive_message(result.into(), engine)
            }
        }
    }

    fn dispatch_for_task(
        &mut self,
        task: &Task,
        position: &TaskListPosition,
        engine: &dyn WorkflowEngine,
        message: Message,
    ) -> Result<()> {
        debug!(process_id = %self.state.id, position = %position, message = %message.name(), "Dispatching task");
        match engine.dispatch(message) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(process_id = %self.state.id, position = %position, error = %e, "Task dispatch failed");
                let log = LogMessage::dispatch_failed(task, position.clone(), &e.to_string());
                self.receive_message(log.into(), engine)
            }
        }
    }

    /// Counts one sub-process answer for a fan-out entry and closes the entry
    /// once every started sub-process has answered.
    fn tally_sub_process_answer(&mut self, position: &TaskListPosition, succeeded: bool) -> Result<()> {
        let entry = self.entry(position)?;
        if entry.is_finished() {
            warn!(process_id = %self.state.id, position = %position, "Ignoring answer for a finished task");
            return Ok(());
        }

        if !self.state.multi_perform_started {
            if succeeded {
                warn!(
                    process_id = %self.state.id,
                    position = %position,
                    "Answer received before any sub-process was started"
                );
            } else {
                self.record_that(ProcessEvent::TaskEntryMarkedAsFailed { position: position.clone() });
            }
            return Ok(());
        }

        if succeeded {
            self.record_that(ProcessEvent::MultiPerformTaskSucceeded { position: position.clone() });
        } else {
            self.record_that(ProcessEvent::MultiPerformTaskFailed { position: position.clone() });
        }

        let answered = self.state.succeeded_tasks + self.state.failed_tasks;
        if answered < self.state.started_tasks {
            return Ok(());
        }

        if self.state.failed_tasks == 0 {
            info!(process_id = %self.state.id, count = answered, "All sub-processes succeeded");
            self.record_that(ProcessEvent::TaskEntryMarkedAsDone { position: position.clone() });
        } else {
            let log = LogMessage::items_processing_failed(
                position.clone(),
                self.state.succeeded_tasks,
                self.state.failed_tasks,
            );
            info!(process_id = %self.state.id, "{}", log.text());
            self.record_that(ProcessEvent::LogMessageReceived { message: log });
            self.record_that(ProcessEvent::TaskEntryMarkedAsFailed { position: position.clone() });
        }
        Ok(())
    }

    /// Marks the single fan-out entry running and returns it, or `None` when
    /// it was already started.
    fn start_single_entry(&mut self) -> Option<(Task, TaskListPosition)> {
        let entry = self.state.task_list.entries().first()?;
        if entry.status() != EntryStatus::NotStarted {
            debug!(process_id = %self.state.id, "Fan-out task already started");
            return None;
        }
        let (task, position) = (entry.task().clone(), entry.position().clone());
        self.record_that(ProcessEvent::TaskEntryMarkedAsRunning { position: position.clone() });
        Some((task, position))
    }
}
