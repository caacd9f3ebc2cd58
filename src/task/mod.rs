pub mod list;
pub mod position;

pub use list::{EntryStatus, TaskList, TaskListEntry};
pub use position::{NodeName, ProcessId, TaskListId, TaskListPosition};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::dsl::{ProcessDefinition, TaskDefinition};
use crate::error::{ProcessingError, Result};

/// Declarative step of a process. Tasks describe what should happen; they carry
/// no runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "snake_case")]
pub enum Task {
    /// Ask `source` for data of type `prototype`.
    CollectData {
        source: String,
        prototype: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },
    /// Hand the previous payload to `target`, converting it to `preferred_type`
    /// when its type is not one of `allowed_types`.
    ProcessData {
        target: String,
        allowed_types: Vec<String>,
        #[serde(default)]
        preferred_type: Option<String>,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        metadata: Map<String, Value>,
    },
    /// Start the nested definition as a sub-process on `target_node`.
    RunSubProcess {
        target_node: NodeName,
        process_definition: ProcessDefinition,
    },
    /// Transform the payload in place with a manipulator registered on the engine.
    ManipulatePayload { manipulator: String },
}

impl Task {
    pub fn collect_data(source: &str, prototype: &str) -> Self {
        Task::CollectData {
            source: source.to_string(),
            prototype: prototype.to_string(),
            metadata: Map::new(),
        }
    }

    pub fn process_data(target: &str, allowed_types: &[&str], preferred_type: Option<&str>) -> Self {
        Task::ProcessData {
            target: target.to_string(),
            allowed_types: allowed_types.iter().map(|t| t.to_string()).collect(),
            preferred_type: preferred_type.map(str::to_string),
            metadata: Map::new(),
        }
    }

    pub fn run_sub_process(target_node: NodeName, process_definition: ProcessDefinition) -> Self {
        Task::RunSubProcess {
            target_node,
            process_definition,
        }
    }

    pub fn manipulate_payload(manipulator: &str) -> Self {
        Task::ManipulatePayload {
            manipulator: manipulator.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::CollectData { .. } => "collect_data",
            Task::ProcessData { .. } => "process_data",
            Task::RunSubProcess { .. } => "run_sub_process",
            Task::ManipulatePayload { .. } => "manipulate_payload",
        }
    }

    /// Builds a task from its declarative form. Unknown task types and missing
    /// parameters are rejected.
    pub fn from_definition(definition: &TaskDefinition) -> Result<Self> {
        let missing = |param: &str| {
            ProcessingError::Definition(format!(
                "task '{}' is missing parameter '{}'",
                definition.task_type, param
            ))
        };
        let metadata = match definition.param("metadata") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(ProcessingError::Definition(format!(
                    "task '{}' has non-object metadata",
                    definition.task_type
                )));
            }
        };

        match definition.task_type.as_str() {
            "collect_data" => Ok(Task::CollectData {
                source: definition.str_param("source").ok_or_else(|| missing("source"))?.to_string(),
                prototype: definition.str_param("prototype").ok_or_else(|| missing("prototype"))?.to_string(),
                metadata,
            }),
            "process_data" => {
                let allowed_types = definition
                    .param("allowed_types")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| missing("allowed_types"))?
                    .iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect();
                Ok(Task::ProcessData {
                    target: definition.str_param("target").ok_or_else(|| missing("target"))?.to_string(),
                    allowed_types,
                    preferred_type: definition.str_param("preferred_type").map(str::to_string),
                    metadata,
                })
            }
            "run_sub_process" => {
                let target_node = NodeName::new(
                    definition.str_param("target_node").ok_or_else(|| missing("target_node"))?,
                )?;
                let nested = definition
                    .param("process_definition")
                    .cloned()
                    .ok_or_else(|| missing("process_definition"))?;
                let process_definition: ProcessDefinition = serde_json::from_value(nested)
                    .map_err(|e| ProcessingError::Definition(format!("invalid nested process definition: {}", e)))?;
                Ok(Task::RunSubProcess {
                    target_node,
                    process_definition,
                })
            }
            "manipulate_payload" => Ok(Task::ManipulatePayload {
                manipulator: definition
                    .str_param("manipulator")
                    .ok_or_else(|| missing("manipulator"))?
                    .to_string(),
            }),
            other => Err(ProcessingError::Definition(format!("unknown task_type '{}'", other))),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::CollectData { source, prototype, .. } => write!(f, "collect {} from {}", prototype, source),
            Task::ProcessData { target, .. } => write!(f, "process data at {}", target),
            Task::RunSubProcess { target_node, process_definition } => {
                write!(f, "run {} sub-process on {}", process_definition.process_type, target_node)
            }
            Task::ManipulatePayload { manipulator } => write!(f, "manipulate payload with {}", manipulator),
        }
    }
}
