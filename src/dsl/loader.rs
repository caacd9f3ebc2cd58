use anyhow::{Context as AnyhowContext, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::dsl::ProcessDefinition;

/// Loads a map of `start message name -> process definition` from a YAML file.
pub fn load_definitions_from_yaml(file_path: impl AsRef<Path>) -> Result<HashMap<String, ProcessDefinition>> {
    let file_path = file_path.as_ref();
    let yaml_content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read YAML file from {}", file_path.display()))?;

    let definitions: HashMap<String, ProcessDefinition> = serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to deserialize process definitions from {}", file_path.display()))?;

    Ok(definitions)
}
