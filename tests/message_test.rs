use processing::message::log::codes;
use processing::message::{LogCategory, LogMessage, Message, MessageKind, MessageName, Payload, WorkflowMessage};
use processing::task::{NodeName, ProcessId, TaskListId, TaskListPosition};
use serde_json::{Map, json};

fn position() -> TaskListPosition {
    TaskListPosition::at(
        TaskListId::link(NodeName::new("main-node").unwrap(), ProcessId::generate()),
        1,
    )
}

#[test]
fn test_answer_swaps_origin_and_target() {
    let command = WorkflowMessage::collect_data_of("Article", "main-node", "article-source", Map::new())
        .connect_to_process_task(position());

    let answer = command.answer_with(Payload::new("Article", json!({"id": 7})));

    assert_eq!(answer.name().to_string(), "data-collected:Article");
    assert_eq!(answer.origin(), "article-source");
    assert_eq!(answer.target(), Some("main-node"));
    assert_eq!(answer.position(), command.position());
    assert_eq!(answer.version(), command.version() + 1);
    assert_ne!(answer.uuid(), command.uuid());
}

#[test]
fn test_prepare_data_processing_merges_metadata() {
    let mut original_meta = Map::new();
    original_meta.insert("source".to_string(), json!("archive"));
    let collected = WorkflowMessage::new_data_collected(Payload::new("Article", json!({})), "importer", None)
        .with_metadata(original_meta);

    let mut task_meta = Map::new();
    task_meta.insert("batch".to_string(), json!(3));
    let command = collected.prepare_data_processing(position(), "main-node", "article-sink", &task_meta);

    assert!(command.is_command());
    assert_eq!(command.name().to_string(), "process-data:Article");
    assert_eq!(command.target(), Some("article-sink"));
    assert_eq!(command.metadata()["source"], json!("archive"));
    assert_eq!(command.metadata()["batch"], json!(3));

    let done = command.answer_with_data_processing_completed();
    assert_eq!(done.name().kind(), MessageKind::DataProcessed);
    assert_eq!(done.target(), Some("main-node"));
}

#[test]
fn test_message_name_parsing() {
    let name: MessageName = "collect-data:Article".parse().unwrap();
    assert_eq!(name.kind(), MessageKind::CollectData);
    assert_eq!(name.type_name(), "Article");
    assert!(name.is_command());

    assert!("collect-data".parse::<MessageName>().is_err());
    assert!("fetch-data:Article".parse::<MessageName>().is_err());
    assert!("data-collected:".parse::<MessageName>().is_err());
}

#[test]
fn test_log_categories_follow_code_ranges() {
    assert_eq!(LogCategory::from_code(codes::DEBUG), LogCategory::Debug);
    assert_eq!(LogCategory::from_code(250), LogCategory::Info);
    assert_eq!(LogCategory::from_code(codes::WRONG_MESSAGE_RECEIVED), LogCategory::Warning);
    assert_eq!(LogCategory::from_code(codes::NO_MESSAGE_RECEIVED), LogCategory::Error);
    assert_eq!(LogCategory::from_code(codes::DISPATCH_FAILED), LogCategory::Error);

    let log = LogMessage::warning("worker", position(), "slow");
    assert!(log.is_warning());
    assert!(!log.is_error());
    assert_eq!(log.target(), Some("main-node"));
}

#[test]
fn test_collection_items_carry_item_type() {
    let payload = Payload::collection("ArticleList", "Article", vec![json!({"id": 1}), json!({"id": 2})]);
    let items = payload.items().unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[1].type_name(), "Article");
    assert_eq!(items[1].data(), &json!({"id": 2}));
    assert!(Payload::new("Article", json!([1, 2])).items().is_none());
}

#[test]
fn test_payload_conversion() {
    let payload = Payload::new("Quantity", json!("42"));
    assert_eq!(payload.convert_to("integer").unwrap().data(), &json!(42));
    assert_eq!(payload.convert_to("string").unwrap().data(), &json!("42"));
    assert!(Payload::new("Name", json!("abc")).convert_to("integer").is_err());

    let retagged = payload.convert_to("Amount").unwrap();
    assert_eq!(retagged.type_name(), "Amount");
    assert_eq!(retagged.data(), payload.data());
}

#[test]
fn test_messages_serialize_with_type_tag() {
    let message: Message = LogMessage::info("worker", position(), "started").into();
    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value["message_type"], json!("log"));

    let back: Message = serde_json::from_value(value).unwrap();
    assert_eq!(back, message);
}
