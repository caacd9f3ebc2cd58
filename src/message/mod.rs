pub mod log;
pub mod payload;
pub mod sub_process;
pub mod workflow;

pub use log::{LogCategory, LogMessage};
pub use payload::Payload;
pub use sub_process::{StartSubProcess, SubProcessFinished};
pub use workflow::WorkflowMessage;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProcessingError;
use crate::task::TaskListPosition;

/// What a workflow message asks for or reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    CollectData,
    DataCollected,
    ProcessData,
    DataProcessed,
}

impl MessageKind {
    pub fn is_command(&self) -> bool {
        matches!(self, MessageKind::CollectData | MessageKind::ProcessData)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::CollectData => "collect-data",
            MessageKind::DataCollected => "data-collected",
            MessageKind::ProcessData => "process-data",
            MessageKind::DataProcessed => "data-processed",
        }
    }
}

/// `<kind>:<type>`, e.g. `data-collected:Article`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageName {
    kind: MessageKind,
    type_name: String,
}

impl MessageName {
    pub fn new(kind: MessageKind, type_name: &str) -> Self {
        Self {
            kind,
            type_name: type_name.to_string(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_command(&self) -> bool {
        self.kind.is_command()
    }
}

impl fmt::Display for MessageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.type_name)
    }
}

impl FromStr for MessageName {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, type_name) = s
            .split_once(':')
            .ok_or_else(|| ProcessingError::UnsupportedMessage(format!("malformed message name '{}'", s)))?;
        let kind = match kind {
            "collect-data" => MessageKind::CollectData,
            "data-collected" => MessageKind::DataCollected,
            "process-data" => MessageKind::ProcessData,
            "data-processed" => MessageKind::DataProcessed,
            other => {
                return Err(ProcessingError::UnsupportedMessage(format!("unknown message kind '{}'", other)));
            }
        };
        if type_name.is_empty() {
            return Err(ProcessingError::UnsupportedMessage(format!("message name '{}' has no type", s)));
        }
        Ok(Self::new(kind, type_name))
    }
}

impl TryFrom<String> for MessageName {
    type Error = ProcessingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MessageName> for String {
    fn from(value: MessageName) -> Self {
        value.to_string()
    }
}

/// The two message kinds a `Process` consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum ProcessMessage {
    Workflow(WorkflowMessage),
    Log(LogMessage),
}

impl ProcessMessage {
    pub fn position(&self) -> Option<&TaskListPosition> {
        match self {
            ProcessMessage::Workflow(m) => m.position(),
            ProcessMessage::Log(l) => Some(l.position()),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ProcessMessage::Workflow(m) => m.name().to_string(),
            ProcessMessage::Log(l) => l.name(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProcessMessage::Log(l) if l.is_error())
    }

    pub fn connect_to_process_task(&self, position: TaskListPosition) -> ProcessMessage {
        match self {
            ProcessMessage::Workflow(m) => ProcessMessage::Workflow(m.connect_to_process_task(position)),
            ProcessMessage::Log(l) => ProcessMessage::Log(l.connect_to_process_task(position)),
        }
    }
}

impl From<WorkflowMessage> for ProcessMessage {
    fn from(message: WorkflowMessage) -> Self {
        ProcessMessage::Workflow(message)
    }
}

impl From<LogMessage> for ProcessMessage {
    fn from(message: LogMessage) -> Self {
        ProcessMessage::Log(message)
    }
}

/// Everything that can travel through a `WorkflowEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum Message {
    Workflow(WorkflowMessage),
    Log(LogMessage),
    StartSubProcess(StartSubProcess),
    SubProcessFinished(SubProcessFinished),
}

impl Message {
    /// Commands ask a handler or node to do something; everything else is an
    /// event reporting what happened.
    pub fn is_command(&self) -> bool {
        match self {
            Message::Workflow(m) => m.name().is_command(),
            Message::Log(_) => false,
            Message::StartSubProcess(_) => true,
            Message::SubProcessFinished(_) => false,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Message::Workflow(m) => m.target(),
            Message::Log(l) => l.target(),
            Message::StartSubProcess(c) => Some(c.target_node().as_str()),
            Message::SubProcessFinished(e) => Some(e.parent_position().node_name().as_str()),
        }
    }

    pub fn origin(&self) -> &str {
        match self {
            Message::Workflow(m) => m.origin(),
            Message::Log(l) => l.origin(),
            Message::StartSubProcess(c) => c.parent_position().node_name().as_str(),
            Message::SubProcessFinished(e) => e.node_name().as_str(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Message::Workflow(m) => m.name().to_string(),
            Message::Log(l) => l.name(),
            Message::StartSubProcess(_) => StartSubProcess::NAME.to_string(),
            Message::SubProcessFinished(_) => SubProcessFinished::NAME.to_string(),
        }
    }
}

impl From<WorkflowMessage> for Message {
    fn from(message: WorkflowMessage) -> Self {
        Message::Workflow(message)
    }
}

impl From<LogMessage> for Message {
    fn from(message: LogMessage) -> Self {
        Message::Log(message)
    }
}

impl From<ProcessMessage> for Message {
    fn from(message: ProcessMessage) -> Self {
        match message {
            ProcessMessage::Workflow(m) => Message::Workflow(m),
            ProcessMessage::Log(l) => Message::Log(l),
        }
    }
}

impl From<StartSubProcess> for Message {
    fn from(command: StartSubProcess) -> Self {
        Message::StartSubProcess(command)
    }
}

impl From<SubProcessFinished> for Message {
    fn from(event: SubProcessFinished) -> Self {
        Message::SubProcessFinished(event)
    }
}
