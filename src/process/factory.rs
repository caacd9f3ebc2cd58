use std::collections::HashMap;
use tracing::debug;

use crate::dsl::ProcessDefinition;
use crate::error::{ProcessingError, Result};
use crate::message::WorkflowMessage;
use crate::process::{Process, ProcessKind};
use crate::task::{NodeName, Task, TaskListPosition};

/// Turns process definitions into runnable processes.
///
/// Start definitions are keyed by the name of the message that starts them,
/// e.g. `data-collected:Article`.
#[derive(Debug, Clone, Default)]
pub struct ProcessFactory {
    definitions: HashMap<String, ProcessDefinition>,
}

impl ProcessFactory {
    pub fn new(definitions: HashMap<String, ProcessDefinition>) -> Self {
        Self { definitions }
    }

    pub fn register(&mut self, start_message: &str, definition: ProcessDefinition) {
        self.definitions.insert(start_message.to_string(), definition);
    }

    pub fn definitions(&self) -> &HashMap<String, ProcessDefinition> {
        &self.definitions
    }

    /// Creates the process started by an uncorrelated `message`.
    pub fn derive_process_from_message(&self, message: &WorkflowMessage, node_name: &NodeName) -> Result<Process> {
        let name = message.name().to_string();
        let definition = self
            .definitions
            .get(&name)
            .ok_or_else(|| ProcessingError::UnsupportedMessage(format!("no process is started by '{}'", name)))?;
        debug!(message = %name, process_type = %definition.process_type, "Deriving process from message");
        Self::create_process_from_definition(definition, node_name.clone(), None)
    }

    /// Builds a process. With `parent_position` the process is set up as a
    /// sub-process of the task at that position.
    pub fn create_process_from_definition(
        definition: &ProcessDefinition,
        node_name: NodeName,
        parent_position: Option<TaskListPosition>,
    ) -> Result<Process> {
        let (kind, tasks) = Self::parse(definition)?;
        let config = definition.config.clone();

        match parent_position {
            Some(parent) => {
                Process::set_up_as_sub_process(kind, node_name, tasks, config, parent, definition.sync_log_messages)
            }
            None => Process::set_up(kind, node_name, tasks, config),
        }
    }

    /// Checks every registered definition, nested ones included.
    pub fn validate(&self) -> Result<()> {
        for (name, definition) in &self.definitions {
            Self::parse(definition)
                .map_err(|e| ProcessingError::Definition(format!("process for '{}': {}", name, e)))?;
        }
        Ok(())
    }

    fn parse(definition: &ProcessDefinition) -> Result<(ProcessKind, Vec<Task>)> {
        let kind: ProcessKind = definition.process_type.parse()?;
        let tasks = definition
            .tasks
            .iter()
            .map(Task::from_definition)
            .collect::<Result<Vec<_>>>()?;

        if tasks.is_empty() {
            return Err(ProcessingError::EmptyTaskList);
        }

        if kind.requires_single_sub_process()
            && !(tasks.len() == 1 && matches!(tasks[0], Task::RunSubProcess { .. }))
        {
            return Err(ProcessingError::Definition(format!(
                "a {} process needs exactly one run_sub_process task",
                kind
            )));
        }

        for task in &tasks {
            if let Task::RunSubProcess { process_definition, .. } = task {
                Self::parse(process_definition)?;
            }
        }

        Ok((kind, tasks))
    }
}
