use crate::dsl::{ProcessDefinition, TaskDefinition};
use serde_json::{Map, Value, json};

pub struct ProcessDefinitionBuilder {
    process_type: String,
    tasks: Vec<TaskDefinition>,
    config: Map<String, Value>,
    sync_log_messages: bool,
}

impl ProcessDefinitionBuilder {
    pub fn new(process_type: &str) -> Self {
        Self {
            process_type: process_type.to_string(),
            tasks: Vec::new(),
            config: Map::new(),
            sync_log_messages: false,
        }
    }

    pub fn linear() -> Self {
        Self::new("linear")
    }

    pub fn for_each() -> Self {
        Self::new("for_each")
    }

    pub fn chunk() -> Self {
        Self::new("chunk")
    }

    pub fn while_loop() -> Self {
        Self::new("while")
    }

    pub fn config(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    pub fn sync_log_messages(mut self, sync: bool) -> Self {
        self.sync_log_messages = sync;
        self
    }

    pub fn collect_data(self, source: &str, prototype: &str) -> TaskBuilder {
        TaskBuilder::new(self, "collect_data")
            .param("source", source)
            .param("prototype", prototype)
    }

    pub fn process_data(self, target: &str, allowed_types: &[&str]) -> TaskBuilder {
        TaskBuilder::new(self, "process_data")
            .param("target", target)
            .param("allowed_types", json!(allowed_types))
    }

    pub fn run_sub_process(self, target_node: &str, definition: ProcessDefinition) -> TaskBuilder {
        let definition = serde_json::to_value(definition).unwrap_or(Value::Null);
        TaskBuilder::new(self, "run_sub_process")
            .param("target_node", target_node)
            .param("process_definition", definition)
    }

    pub fn manipulate_payload(self, manipulator: &str) -> TaskBuilder {
        TaskBuilder::new(self, "manipulate_payload").param("manipulator", manipulator)
    }

    pub fn build(self) -> ProcessDefinition {
        ProcessDefinition {
            process_type: self.process_type,
            tasks: self.tasks,
            config: self.config,
            sync_log_messages: self.sync_log_messages,
        }
    }
}

pub struct TaskBuilder {
    definition_builder: ProcessDefinitionBuilder,
    task: TaskDefinition,
}

impl TaskBuilder {
    fn new(definition_builder: ProcessDefinitionBuilder, task_type: &str) -> Self {
        Self {
            definition_builder,
            task: TaskDefinition::new(task_type),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.task.params.insert(key.to_string(), value.into());
        self
    }

    pub fn metadata(self, metadata: Value) -> Self {
        self.param("metadata", metadata)
    }

    pub fn build(mut self) -> ProcessDefinitionBuilder {
        self.definition_builder.tasks.push(self.task);
        self.definition_builder
    }
}
