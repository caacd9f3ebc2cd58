use serde::{Deserialize, Serialize};

use crate::dsl::ProcessDefinition;
use crate::message::{ProcessMessage, WorkflowMessage};
use crate::process::ProcessId;
use crate::task::{NodeName, TaskListPosition};

/// Command asking `target_node` to start a sub-process for the task at
/// `parent_position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartSubProcess {
    parent_position: TaskListPosition,
    target_node: NodeName,
    process_definition: ProcessDefinition,
    #[serde(default)]
    previous_message: Option<WorkflowMessage>,
}

impl StartSubProcess {
    pub const NAME: &'static str = "start-sub-process";

    pub fn at(
        parent_position: TaskListPosition,
        target_node: NodeName,
        process_definition: ProcessDefinition,
        previous_message: Option<WorkflowMessage>,
    ) -> Self {
        Self {
            parent_position,
            target_node,
            process_definition,
            previous_message,
        }
    }

    pub fn parent_position(&self) -> &TaskListPosition {
        &self.parent_position
    }

    pub fn target_node(&self) -> &NodeName {
        &self.target_node
    }

    pub fn process_definition(&self) -> &ProcessDefinition {
        &self.process_definition
    }

    pub fn previous_message(&self) -> Option<&WorkflowMessage> {
        self.previous_message.as_ref()
    }
}

/// Event reporting that a sub-process reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProcessFinished {
    node_name: NodeName,
    sub_process_id: ProcessId,
    succeed: bool,
    last_message: ProcessMessage,
    parent_position: TaskListPosition,
}

impl SubProcessFinished {
    pub const NAME: &'static str = "sub-process-finished";

    pub fn record(
        node_name: NodeName,
        sub_process_id: ProcessId,
        succeed: bool,
        last_message: ProcessMessage,
        parent_position: TaskListPosition,
    ) -> Self {
        Self {
            node_name,
            sub_process_id,
            succeed,
            last_message,
            parent_position,
        }
    }

    pub fn node_name(&self) -> &NodeName {
        &self.node_name
    }

    pub fn sub_process_id(&self) -> ProcessId {
        self.sub_process_id
    }

    pub fn succeed(&self) -> bool {
        self.succeed
    }

    pub fn last_message(&self) -> &ProcessMessage {
        &self.last_message
    }

    pub fn parent_position(&self) -> &TaskListPosition {
        &self.parent_position
    }
}
