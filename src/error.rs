use thiserror::Error;

use crate::task::TaskListPosition;
use crate::process::ProcessId;

/// Infrastructure failures. These abort the current message: the open
/// transaction is rolled back and the error is returned to the caller.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("store error: {0}")]
    Store(String),

    #[error("version conflict on process {process_id}: expected {expected}, found {actual}")]
    Conflict {
        process_id: ProcessId,
        expected: u64,
        actual: u64,
    },

    #[error("process not found: {0}")]
    ProcessNotFound(ProcessId),

    #[error("task list entry not found at position {0}")]
    TaskEntryNotFound(TaskListPosition),

    #[error("unsupported message: {0}")]
    UnsupportedMessage(String),

    #[error("invalid definition: {0}")]
    Definition(String),

    #[error("invalid node name '{0}': must be at least 3 characters")]
    InvalidNodeName(String),

    #[error("invalid task list position '{0}'")]
    InvalidPosition(String),

    #[error("a task list needs at least one task")]
    EmptyTaskList,

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure while handing a message to a channel.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error("no channel registered for target '{0}'")]
    NoChannel(String),

    #[error("channel '{channel}' rejected the message: {reason}")]
    Rejected { channel: String, reason: String },

    #[error("manipulator '{0}' is not registered")]
    UnknownManipulator(String),

    #[error("payload manipulation failed: {0}")]
    Manipulation(String),
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
