use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ProcessingError;

/// Name of a logical runtime hosting one `WorkflowProcessor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeName(String);

impl NodeName {
    pub const MIN_LENGTH: usize = 3;

    pub fn new(name: impl Into<String>) -> Result<Self, ProcessingError> {
        let name = name.into();
        if name.chars().count() < Self::MIN_LENGTH {
            return Err(ProcessingError::InvalidNodeName(name));
        }
        Ok(Self(name))
    }

    /// Default node name used when a configuration does not provide one.
    pub fn local() -> Self {
        Self("localhost".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeName {
    type Error = ProcessingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeName> for String {
    fn from(value: NodeName) -> Self {
        value.0
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(Uuid);

impl ProcessId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies the task list of one process run on one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskListId {
    pub node_name: NodeName,
    pub process_id: ProcessId,
}

impl TaskListId {
    pub fn link(node_name: NodeName, process_id: ProcessId) -> Self {
        Self { node_name, process_id }
    }
}

impl fmt::Display for TaskListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_name, self.process_id)
    }
}

/// Stable address of one task within one process run.
///
/// Every message exchanged on behalf of a task carries its position, so an
/// answer can be routed back to the exact entry waiting for it. The string
/// form `<node>:<process-id>:<position>` round-trips through `FromStr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskListPosition {
    task_list_id: TaskListId,
    position: usize,
}

impl TaskListPosition {
    pub fn at(task_list_id: TaskListId, position: usize) -> Self {
        debug_assert!(position >= 1, "task list positions are 1-based");
        Self { task_list_id, position }
    }

    pub fn task_list_id(&self) -> &TaskListId {
        &self.task_list_id
    }

    pub fn process_id(&self) -> ProcessId {
        self.task_list_id.process_id
    }

    pub fn node_name(&self) -> &NodeName {
        &self.task_list_id.node_name
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for TaskListPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task_list_id, self.position)
    }
}

impl FromStr for TaskListPosition {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProcessingError::InvalidPosition(s.to_string());

        // node names may contain ':', so split from the right
        let mut parts = s.rsplitn(3, ':');
        let position = parts.next().ok_or_else(invalid)?;
        let process_id = parts.next().ok_or_else(invalid)?;
        let node_name = parts.next().ok_or_else(invalid)?;

        let position: usize = position.parse().map_err(|_| invalid())?;
        if position == 0 {
            return Err(invalid());
        }
        let process_id = Uuid::parse_str(process_id).map_err(|_| invalid())?;

        Ok(Self {
            task_list_id: TaskListId::link(NodeName::new(node_name)?, ProcessId::from_uuid(process_id)),
            position,
        })
    }
}

impl TryFrom<String> for TaskListPosition {
    type Error = ProcessingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskListPosition> for String {
    fn from(value: TaskListPosition) -> Self {
        value.to_string()
    }
}
