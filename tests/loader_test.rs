use processing::config::NodeConfig;
use processing::dsl::builder::ProcessDefinitionBuilder;
use processing::dsl::loader;
use processing::process::ProcessFactory;
use serde_json::json;
use std::collections::HashMap;
use std::fs;

#[test]
fn test_load_process_definitions_from_yaml() {
    let yaml_content = r#"
"data-collected:ArticleList":
  process_type: for_each
  tasks:
    - task_type: run_sub_process
      target_node: worker-node
      process_definition:
        process_type: linear
        tasks:
          - task_type: manipulate_payload
            manipulator: add-total
          - task_type: process_data
            target: article-sink
            allowed_types: [Article]
"#;

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("processes.yaml");
    fs::write(&file_path, yaml_content).expect("Failed to write temp file");

    let loaded = loader::load_definitions_from_yaml(&file_path).expect("Failed to load definitions from YAML");

    let item_definition = ProcessDefinitionBuilder::linear()
        .manipulate_payload("add-total")
        .build()
        .process_data("article-sink", &["Article"])
        .build()
        .build();
    let expected = ProcessDefinitionBuilder::for_each()
        .run_sub_process("worker-node", item_definition)
        .build()
        .build();

    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded["data-collected:ArticleList"], expected);

    let factory = ProcessFactory::new(loaded);
    factory.validate().expect("Loaded definitions should be valid");
}

#[test]
fn test_load_missing_file_fails() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let result = loader::load_definitions_from_yaml(temp_dir.path().join("missing.yaml"));
    assert!(result.is_err());
}

#[test]
fn test_validate_rejects_unknown_task_type() {
    let definition = ProcessDefinitionBuilder::linear()
        .collect_data("source", "Article")
        .build()
        .build();
    let mut broken = definition.clone();
    broken.tasks[0].task_type = "send_email".to_string();

    let mut definitions = HashMap::new();
    definitions.insert("data-collected:Article".to_string(), broken);
    let factory = ProcessFactory::new(definitions);

    let err = factory.validate().unwrap_err();
    assert!(err.to_string().contains("send_email"));
}

#[test]
fn test_validate_rejects_unknown_process_type() {
    let mut definitions = HashMap::new();
    definitions.insert(
        "data-collected:Article".to_string(),
        ProcessDefinitionBuilder::new("round_robin")
            .collect_data("source", "Article")
            .build()
            .build(),
    );

    assert!(ProcessFactory::new(definitions).validate().is_err());
}

#[test]
fn test_load_node_config() {
    let yaml_content = r#"
node_name: local-node
processes:
  "data-collected:Order":
    process_type: linear
    tasks:
      - task_type: manipulate_payload
        manipulator: totals
      - task_type: manipulate_payload
        manipulator: slim
      - task_type: process_data
        target: order-sink
        allowed_types: [Order]
sources:
  order-source:
    type: OrderList
    item_type: Order
    data:
      - { id: 1, price: 2, quantity: 3 }
      - { id: 2, price: 5, quantity: 1 }
sinks: [order-sink]
manipulators:
  totals:
    assignments: ["total = price * quantity"]
  slim:
    keep_fields: [id, total]
"#;

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("node.yaml");
    fs::write(&file_path, yaml_content).expect("Failed to write temp file");

    let config = NodeConfig::load(&file_path).expect("Failed to load node config");

    assert_eq!(config.node_name().unwrap().as_str(), "local-node");
    assert_eq!(config.sinks, vec!["order-sink".to_string()]);
    assert!(config.redis_url.is_none());

    let payload = config.sources["order-source"].payload();
    assert!(payload.is_collection());
    assert_eq!(payload.items().unwrap().len(), 2);
    assert_eq!(payload.items().unwrap()[0].type_name(), "Order");

    let factory = config.factory().expect("Definitions should validate");
    assert!(factory.definitions().contains_key("data-collected:Order"));

    let mut names: Vec<_> = config
        .build_manipulators()
        .expect("Manipulators should compile")
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["slim".to_string(), "totals".to_string()]);

    let mut order = processing::message::Payload::new("Order", json!({"id": 1, "price": 2, "quantity": 3}));
    for manipulator in config.build_manipulators().unwrap().iter().filter(|m| m.name() == "totals") {
        manipulator.manipulate(&mut order).unwrap();
    }
    assert_eq!(order.data()["total"], json!(6));
}

#[test]
fn test_node_config_rejects_short_node_name() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let file_path = temp_dir.path().join("node.yaml");
    fs::write(&file_path, "node_name: ab\n").expect("Failed to write temp file");

    let config = NodeConfig::load(&file_path).expect("Failed to load node config");
    assert!(config.node_name().is_err());
}
