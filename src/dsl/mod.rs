pub mod builder;
pub mod loader;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declarative process definition, as written in YAML or carried inside a
/// `run_sub_process` task.
///
/// Definitions are deliberately loose: `process_type` and `task_type` are plain
/// strings and are only checked when the `ProcessFactory` turns the definition
/// into a `Process`. Unknown values fail there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessDefinition {
    pub process_type: String,
    pub tasks: Vec<TaskDefinition>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
    /// Forward non-error log messages of a sub-process to its parent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sync_log_messages: bool,
}

/// One task entry of a definition. Everything besides `task_type` is kept as
/// parameters and interpreted by the factory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDefinition {
    pub task_type: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl TaskDefinition {
    pub fn new(task_type: &str) -> Self {
        Self {
            task_type: task_type.to_string(),
            params: Map::new(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}
