use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::dsl::ProcessDefinition;
use crate::manipulators::{ExpressionManipulator, KeepFields, PayloadManipulator};
use crate::message::Payload;
use crate::process::ProcessFactory;
use crate::task::NodeName;

/// Data a static source answers collect-data requests with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl SourceConfig {
    pub fn payload(&self) -> Payload {
        match (&self.item_type, &self.data) {
            (Some(item_type), Value::Array(items)) => Payload::collection(&self.type_name, item_type, items.clone()),
            _ => Payload::new(&self.type_name, self.data.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManipulatorConfig {
    Expression { assignments: Vec<String> },
    KeepFields { keep_fields: Vec<String> },
}

/// Configuration of one processing node, read from YAML.
///
/// ```yaml
/// node_name: local-node
/// processes:
///   "data-collected:Article":
///     process_type: linear
///     tasks:
///       - task_type: process_data
///         target: article-sink
///         allowed_types: [Article]
/// sinks: [article-sink]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_name: String,
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Process definitions keyed by the name of their start message.
    #[serde(default)]
    pub processes: HashMap<String, ProcessDefinition>,
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,
    #[serde(default)]
    pub sinks: Vec<String>,
    #[serde(default)]
    pub manipulators: HashMap<String, ManipulatorConfig>,
}

impl NodeConfig {
    pub fn load(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        let yaml_content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file from {}", file_path.display()))?;

        serde_yaml::from_str(&yaml_content)
            .with_context(|| format!("Failed to deserialize node config from {}", file_path.display()))
    }

    pub fn node_name(&self) -> Result<NodeName> {
        NodeName::new(self.node_name.as_str()).context("Invalid node_name")
    }

    /// Factory over the configured definitions, validated up front.
    pub fn factory(&self) -> Result<ProcessFactory> {
        let factory = ProcessFactory::new(self.processes.clone());
        factory.validate().context("Invalid process definitions")?;
        Ok(factory)
    }

    pub fn build_manipulators(&self) -> Result<Vec<Arc<dyn PayloadManipulator>>> {
        self.manipulators
            .iter()
            .map(|(name, config)| -> Result<Arc<dyn PayloadManipulator>> {
                Ok(match config {
                    ManipulatorConfig::Expression { assignments } => Arc::new(
                        ExpressionManipulator::new(name, assignments)
                            .with_context(|| format!("Invalid manipulator '{}'", name))?,
                    ),
                    ManipulatorConfig::KeepFields { keep_fields } => {
                        Arc::new(KeepFields::new(name, keep_fields.clone()))
                    }
                })
            })
            .collect()
    }
}
