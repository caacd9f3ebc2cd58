use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::message::{MessageKind, MessageName, Payload};
use crate::task::TaskListPosition;

/// Immutable data-carrying message exchanged between processes and handlers.
///
/// Every transformation returns a new message with the version incremented,
/// so a handler can always tell a derived message from the one it answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMessage {
    uuid: Uuid,
    name: MessageName,
    payload: Payload,
    origin: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    position: Option<TaskListPosition>,
    version: u32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl WorkflowMessage {
    /// A command asking `target` to collect data of `type_name`.
    pub fn collect_data_of(type_name: &str, origin: &str, target: &str, metadata: Map<String, Value>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: MessageName::new(MessageKind::CollectData, type_name),
            payload: Payload::prototype(type_name),
            origin: origin.to_string(),
            target: Some(target.to_string()),
            position: None,
            version: 1,
            metadata,
        }
    }

    /// An uncorrelated event announcing collected data; usually starts a process.
    pub fn new_data_collected(payload: Payload, origin: &str, target: Option<&str>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: MessageName::new(MessageKind::DataCollected, payload.type_name()),
            payload,
            origin: origin.to_string(),
            target: target.map(str::to_string),
            position: None,
            version: 1,
            metadata: Map::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &MessageName {
        &self.name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn position(&self) -> Option<&TaskListPosition> {
        self.position.as_ref()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn is_command(&self) -> bool {
        self.name.is_command()
    }

    fn derive(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            version: self.version + 1,
            ..self.clone()
        }
    }

    /// Answers a collect-data command with the collected payload. Origin and
    /// target swap so the answer travels back to the requester.
    pub fn answer_with(&self, payload: Payload) -> Self {
        let mut answer = self.derive();
        answer.name = MessageName::new(MessageKind::DataCollected, payload.type_name());
        answer.payload = payload;
        answer.origin = self.target.clone().unwrap_or_default();
        answer.target = Some(self.origin.clone());
        answer
    }

    /// Turns collected data into a process-data command for `target`.
    pub fn prepare_data_processing(
        &self,
        position: TaskListPosition,
        origin: &str,
        target: &str,
        metadata: &Map<String, Value>,
    ) -> Self {
        let mut command = self.derive();
        command.name = MessageName::new(MessageKind::ProcessData, self.payload.type_name());
        command.origin = origin.to_string();
        command.target = Some(target.to_string());
        command.position = Some(position);
        for (k, v) in metadata {
            command.metadata.insert(k.clone(), v.clone());
        }
        command
    }

    /// Acknowledges a process-data command.
    pub fn answer_with_data_processing_completed(&self) -> Self {
        let mut answer = self.derive();
        answer.name = MessageName::new(MessageKind::DataProcessed, self.payload.type_name());
        answer.origin = self.target.clone().unwrap_or_default();
        answer.target = Some(self.origin.clone());
        answer
    }

    pub fn connect_to_process_task(&self, position: TaskListPosition) -> Self {
        let mut message = self.derive();
        message.position = Some(position);
        message
    }

    pub fn with_payload(&self, payload: Payload) -> Self {
        let mut message = self.derive();
        message.name = MessageName::new(self.name.kind(), payload.type_name());
        message.payload = payload;
        message
    }

    pub fn with_metadata(&self, metadata: Map<String, Value>) -> Self {
        let mut message = self.derive();
        message.metadata = metadata;
        message
    }

    pub fn with_target(&self, target: &str) -> Self {
        let mut message = self.derive();
        message.target = Some(target.to_string());
        message
    }
}
