use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};
use crate::message::LogMessage;
use crate::task::Task;
use crate::task::position::{TaskListId, TaskListPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    NotStarted,
    Running,
    Done,
    Failed,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Done | EntryStatus::Failed)
    }
}

/// A task scheduled at a fixed position of a task list.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskListEntry {
    task: Task,
    position: TaskListPosition,
    status: EntryStatus,
    logs: Vec<LogMessage>,
}

impl TaskListEntry {
    fn new(task: Task, position: TaskListPosition) -> Self {
        Self {
            task,
            position,
            status: EntryStatus::NotStarted,
            logs: Vec::new(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn position(&self) -> &TaskListPosition {
        &self.position
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn logs(&self) -> &[LogMessage] {
        &self.logs
    }

    pub fn is_running(&self) -> bool {
        self.status == EntryStatus::Running
    }

    pub fn is_done(&self) -> bool {
        self.status == EntryStatus::Done
    }

    pub fn is_failed(&self) -> bool {
        self.status == EntryStatus::Failed
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    // Transitions out of a terminal state are ignored, so replaying the same
    // event twice leaves the entry unchanged.

    pub(crate) fn mark_running(&mut self) {
        if !self.status.is_terminal() {
            self.status = EntryStatus::Running;
        }
    }

    pub(crate) fn mark_done(&mut self) {
        if !self.status.is_terminal() {
            self.status = EntryStatus::Done;
        }
    }

    pub(crate) fn mark_failed(&mut self) {
        if !self.status.is_terminal() {
            self.status = EntryStatus::Failed;
        }
    }

    pub(crate) fn attach_log(&mut self, log: LogMessage) {
        self.logs.push(log);
    }
}

/// Ordered tasks of one process run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskList {
    id: TaskListId,
    entries: Vec<TaskListEntry>,
}

impl TaskList {
    /// Assigns positions `1..=N` in declaration order.
    pub fn schedule_tasks(id: TaskListId, tasks: Vec<Task>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(ProcessingError::EmptyTaskList);
        }

        let entries = tasks
            .into_iter()
            .enumerate()
            .map(|(idx, task)| TaskListEntry::new(task, TaskListPosition::at(id.clone(), idx + 1)))
            .collect();

        Ok(Self { id, entries })
    }

    /// Appends a fresh `NotStarted` copy of `task` at the next unused position.
    /// Existing entries keep their positions and states.
    pub(crate) fn reschedule(&mut self, task: Task) -> TaskListPosition {
        let position = TaskListPosition::at(self.id.clone(), self.entries.len() + 1);
        self.entries.push(TaskListEntry::new(task, position.clone()));
        position
    }

    pub fn id(&self) -> &TaskListId {
        &self.id
    }

    pub fn entries(&self) -> &[TaskListEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_entry(&self) -> Option<&TaskListEntry> {
        self.entries.last()
    }

    pub fn next_not_started_entry(&self) -> Option<&TaskListEntry> {
        self.entries.iter().find(|e| e.status == EntryStatus::NotStarted)
    }

    pub fn entry_at(&self, position: &TaskListPosition) -> Option<&TaskListEntry> {
        if position.task_list_id() != &self.id {
            return None;
        }
        self.entries.get(position.position().checked_sub(1)?)
    }

    pub(crate) fn entry_at_mut(&mut self, position: &TaskListPosition) -> Option<&mut TaskListEntry> {
        if position.task_list_id() != &self.id {
            return None;
        }
        self.entries.get_mut(position.position().checked_sub(1)?)
    }

    pub fn is_started(&self) -> bool {
        self.entries.iter().any(|e| e.status != EntryStatus::NotStarted)
    }

    /// Every entry is terminal, or an entry failed and nothing is running
    /// anymore. Entries behind a failed one are never started.
    pub fn is_completed(&self) -> bool {
        if self.entries.iter().all(|e| e.status.is_terminal()) {
            return true;
        }
        self.entries.iter().any(|e| e.status == EntryStatus::Failed)
            && !self.entries.iter().any(|e| e.status == EntryStatus::Running)
    }

    pub fn is_successful_done(&self) -> bool {
        self.entries.iter().all(|e| e.status == EntryStatus::Done)
    }
}
