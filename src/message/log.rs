use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::process::ProcessId;
use crate::task::{Task, TaskListPosition};

/// Numeric log codes. The hundreds digit selects the category:
/// 1xx debug, 2xx info, 3xx warning, 4xx and 5xx error.
pub mod codes {
    pub const DEBUG: u16 = 100;
    pub const INFO: u16 = 200;
    pub const WARNING: u16 = 300;
    pub const WRONG_MESSAGE_RECEIVED: u16 = 310;
    pub const ERROR: u16 = 400;
    pub const NO_MESSAGE_RECEIVED: u16 = 412;
    pub const TYPE_CONVERSION_FAILED: u16 = 413;
    pub const ITEMS_PROCESSING_FAILED: u16 = 414;
    pub const UNSUPPORTED_MESSAGE_RECEIVED: u16 = 415;
    pub const SUB_PROCESS_FAILED: u16 = 416;
    pub const HANDLER_FAILED: u16 = 420;
    pub const DISPATCH_FAILED: u16 = 500;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogCategory {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogCategory {
    pub fn from_code(code: u16) -> Self {
        match code {
            0..=199 => LogCategory::Debug,
            200..=299 => LogCategory::Info,
            300..=399 => LogCategory::Warning,
            _ => LogCategory::Error,
        }
    }
}

/// Immutable log entry addressed to a task list position.
///
/// Error log messages mark the addressed task as failed; the others are
/// attached to the entry for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    uuid: Uuid,
    origin: String,
    #[serde(default)]
    target: Option<String>,
    position: TaskListPosition,
    version: u32,
    code: u16,
    text: String,
    #[serde(default)]
    params: Map<String, Value>,
}

impl LogMessage {
    pub fn new(
        origin: &str,
        position: TaskListPosition,
        code: u16,
        text: impl Into<String>,
        params: Map<String, Value>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            origin: origin.to_string(),
            target: Some(position.node_name().to_string()),
            position,
            version: 1,
            code,
            text: text.into(),
            params,
        }
    }

    pub fn debug(origin: &str, position: TaskListPosition, text: impl Into<String>) -> Self {
        Self::new(origin, position, codes::DEBUG, text, Map::new())
    }

    pub fn info(origin: &str, position: TaskListPosition, text: impl Into<String>) -> Self {
        Self::new(origin, position, codes::INFO, text, Map::new())
    }

    pub fn warning(origin: &str, position: TaskListPosition, text: impl Into<String>) -> Self {
        Self::new(origin, position, codes::WARNING, text, Map::new())
    }

    pub fn error(origin: &str, position: TaskListPosition, text: impl Into<String>) -> Self {
        Self::new(origin, position, codes::ERROR, text, Map::new())
    }

    fn process_params(position: &TaskListPosition) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("process_id".to_string(), json!(position.process_id().to_string()));
        params.insert("position".to_string(), json!(position.to_string()));
        params
    }

    fn task_params(task: &Task, position: &TaskListPosition) -> Map<String, Value> {
        let mut params = Self::process_params(position);
        params.insert("task".to_string(), json!(task.to_string()));
        params.insert("task_type".to_string(), json!(task.kind()));
        params
    }

    pub fn no_message_received_for(task: &Task, position: TaskListPosition) -> Self {
        let params = Self::task_params(task, &position);
        let origin = position.node_name().to_string();
        Self::new(
            &origin,
            position,
            codes::NO_MESSAGE_RECEIVED,
            format!("Task '{}' needs a previous message but none was received", task),
            params,
        )
    }

    pub fn wrong_message_received_for(task: &Task, position: TaskListPosition, message_name: &str) -> Self {
        let mut params = Self::task_params(task, &position);
        params.insert("message_name".to_string(), json!(message_name));
        let origin = position.node_name().to_string();
        Self::new(
            &origin,
            position,
            codes::WRONG_MESSAGE_RECEIVED,
            format!("Task '{}' received unexpected message '{}'", task, message_name),
            params,
        )
    }

    pub fn type_conversion_failed(
        task: &Task,
        position: TaskListPosition,
        from: &str,
        to: Option<&str>,
        reason: &str,
    ) -> Self {
        let mut params = Self::task_params(task, &position);
        params.insert("from_type".to_string(), json!(from));
        params.insert("to_type".to_string(), json!(to));
        let origin = position.node_name().to_string();
        Self::new(
            &origin,
            position,
            codes::TYPE_CONVERSION_FAILED,
            format!("Payload of type '{}' could not be converted: {}", from, reason),
            params,
        )
    }

    pub fn unsupported_message_received(position: TaskListPosition, message_name: &str, reason: &str) -> Self {
        let mut params = Self::process_params(&position);
        params.insert("message_name".to_string(), json!(message_name));
        let origin = position.node_name().to_string();
        Self::new(
            &origin,
            position,
            codes::UNSUPPORTED_MESSAGE_RECEIVED,
            format!("Message '{}' is not supported here: {}", message_name, reason),
            params,
        )
    }

    pub fn items_processing_failed(position: TaskListPosition, succeeded: usize, failed: usize) -> Self {
        let mut params = Self::process_params(&position);
        params.insert("succeeded".to_string(), json!(succeeded));
        params.insert("failed".to_string(), json!(failed));
        let origin = position.node_name().to_string();
        Self::new(
            &origin,
            position,
            codes::ITEMS_PROCESSING_FAILED,
            format!("{} of {} sub-processes failed", failed, succeeded + failed),
            params,
        )
    }

    pub fn sub_process_failed(
        origin: &str,
        position: TaskListPosition,
        sub_process_id: ProcessId,
        last_message_name: &str,
    ) -> Self {
        let mut params = Self::process_params(&position);
        params.insert("sub_process_id".to_string(), json!(sub_process_id.to_string()));
        params.insert("message_name".to_string(), json!(last_message_name));
        Self::new(
            origin,
            position,
            codes::SUB_PROCESS_FAILED,
            format!("Sub-process {} failed after '{}'", sub_process_id, last_message_name),
            params,
        )
    }

    pub fn dispatch_failed(task: &Task, position: TaskListPosition, reason: &str) -> Self {
        let mut params = Self::task_params(task, &position);
        params.insert("reason".to_string(), json!(reason));
        let origin = position.node_name().to_string();
        Self::new(
            &origin,
            position,
            codes::DISPATCH_FAILED,
            format!("Dispatching task '{}' failed: {}", task, reason),
            params,
        )
    }

    /// Error raised by a handler while working on a message for `position`.
    pub fn handler_failed(origin: &str, position: TaskListPosition, message_name: &str, reason: &str) -> Self {
        let mut params = Self::process_params(&position);
        params.insert("message_name".to_string(), json!(message_name));
        params.insert("reason".to_string(), json!(reason));
        Self::new(
            origin,
            position,
            codes::HANDLER_FAILED,
            format!("Handler '{}' failed on '{}': {}", origin, message_name, reason),
            params,
        )
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn position(&self) -> &TaskListPosition {
        &self.position
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn category(&self) -> LogCategory {
        LogCategory::from_code(self.code)
    }

    pub fn is_error(&self) -> bool {
        self.category() == LogCategory::Error
    }

    pub fn is_warning(&self) -> bool {
        self.category() == LogCategory::Warning
    }

    pub fn name(&self) -> String {
        format!("log-message:{}", self.code)
    }

    /// Re-addresses the log to another task, e.g. a parent process waiting on
    /// the sub-process that produced it.
    pub fn connect_to_process_task(&self, position: TaskListPosition) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            target: Some(position.node_name().to_string()),
            position,
            version: self.version + 1,
            ..self.clone()
        }
    }
}
