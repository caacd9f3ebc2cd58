use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::process::{ProcessId, ProcessKind};
use crate::task::TaskListPosition;

/// Lifecycle events of processes run by a `WorkflowProcessor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessingEvent {
    ProcessStarted {
        process_id: ProcessId,
        kind: ProcessKind,
        parent_position: Option<TaskListPosition>,
    },
    ProcessFinished {
        process_id: ProcessId,
        succeed: bool,
        parent_position: Option<TaskListPosition>,
    },
}

impl ProcessingEvent {
    pub fn process_id(&self) -> ProcessId {
        match self {
            ProcessingEvent::ProcessStarted { process_id, .. }
            | ProcessingEvent::ProcessFinished { process_id, .. } => *process_id,
        }
    }
}

/// Receives processing events after the work that caused them was committed.
pub trait ProcessingNotifier: Send + Sync {
    fn notify(&self, event: ProcessingEvent);
}

#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ProcessingNotifier for NoopNotifier {
    fn notify(&self, _event: ProcessingEvent) {}
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<ProcessingEvent>,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::UnboundedSender<ProcessingEvent>) -> Self {
        Self { sender }
    }
}

impl ProcessingNotifier for ChannelNotifier {
    fn notify(&self, event: ProcessingEvent) {
        if let Err(mpsc::error::SendError(event)) = self.sender.send(event) {
            debug!(process_id = %event.process_id(), "Dropped processing event, receiver is gone");
        }
    }
}
