use processing::dsl::builder::ProcessDefinitionBuilder;
use processing::error::DispatchError;
use processing::message::log::codes;
use processing::message::{Message, Payload, StartSubProcess, WorkflowMessage};
use processing::process::chunk::{Window, windows};
use processing::process::{Process, ProcessFactory};
use processing::runtime::engine::RegistryWorkflowEngine;
use processing::task::{EntryStatus, NodeName};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};

fn recording_engine() -> (RegistryWorkflowEngine, Arc<Mutex<Vec<Message>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let sink = sent.clone();
    let engine = RegistryWorkflowEngine::new(Arc::new(move |message: Message| -> Result<(), DispatchError> {
        sink.lock().unwrap().push(message);
        Ok(())
    }));
    (engine, sent)
}

fn started_sub_processes(sent: &Arc<Mutex<Vec<Message>>>) -> Vec<StartSubProcess> {
    sent.lock()
        .unwrap()
        .iter()
        .filter_map(|m| match m {
            Message::StartSubProcess(command) => Some(command.clone()),
            _ => None,
        })
        .collect()
}

fn chunk_process() -> Process {
    let item_definition = ProcessDefinitionBuilder::linear()
        .collect_data("article-source", "ArticleList")
        .build()
        .build();
    let definition = ProcessDefinitionBuilder::chunk()
        .run_sub_process("worker-node", item_definition)
        .build()
        .build();
    ProcessFactory::create_process_from_definition(&definition, NodeName::new("main-node").unwrap(), None)
        .expect("Failed to create process")
}

fn counted(total_items: u64, limit: u64, offset: u64) -> WorkflowMessage {
    let mut metadata = Map::new();
    metadata.insert("offset".to_string(), json!(offset));
    metadata.insert("limit".to_string(), json!(limit));
    metadata.insert("total_items".to_string(), json!(total_items));
    metadata.insert("count_only".to_string(), json!(true));
    metadata.insert("source".to_string(), json!("archive"));
    WorkflowMessage::new_data_collected(Payload::new("ArticleCount", json!(total_items)), "importer", None)
        .with_metadata(metadata)
}

fn window_of(command: &StartSubProcess) -> (Value, Value) {
    let metadata = command.previous_message().unwrap().metadata();
    (metadata["offset"].clone(), metadata["limit"].clone())
}

#[test]
fn test_windows_split_evenly() {
    assert_eq!(
        windows(6, 2),
        vec![
            Window { offset: 0, limit: 2 },
            Window { offset: 2, limit: 2 },
            Window { offset: 4, limit: 2 },
        ]
    );
}

#[test]
fn test_windows_last_one_is_partial() {
    let w = windows(5, 2);
    assert_eq!(w.len(), 3);
    assert_eq!(w[2], Window { offset: 4, limit: 1 });
    assert!(windows(0, 10).is_empty());
}

#[test]
fn test_chunk_starts_sub_process_per_window() {
    let (engine, sent) = recording_engine();
    let mut process = chunk_process();

    process.perform(&engine, Some(counted(6, 2, 0))).unwrap();

    let commands = started_sub_processes(&sent);
    assert_eq!(commands.len(), 3);
    assert_eq!(process.started_tasks(), 3);
    let offsets: Vec<_> = commands.iter().map(window_of).collect();
    assert_eq!(
        offsets,
        vec![(json!(0), json!(2)), (json!(2), json!(2)), (json!(4), json!(2))]
    );

    for command in &commands {
        let metadata = command.previous_message().unwrap().metadata();
        assert!(!metadata.contains_key("count_only"));
        assert_eq!(metadata["source"], json!("archive"));
    }
}

#[test]
fn test_chunk_last_window_holds_remainder() {
    let (engine, sent) = recording_engine();
    let mut process = chunk_process();

    process.perform(&engine, Some(counted(5, 2, 0))).unwrap();

    let commands = started_sub_processes(&sent);
    assert_eq!(commands.len(), 3);
    assert_eq!(window_of(&commands[2]), (json!(4), json!(1)));
}

#[test]
fn test_chunk_done_after_every_window_answered() {
    let (engine, sent) = recording_engine();
    let mut process = chunk_process();
    process.perform(&engine, Some(counted(4, 2, 0))).unwrap();

    for command in started_sub_processes(&sent) {
        let answer = command
            .previous_message()
            .unwrap()
            .connect_to_process_task(command.parent_position().clone());
        process.receive_message(answer.into(), &engine).unwrap();
    }

    assert!(process.is_successful_done());
}

#[test]
fn test_chunk_requires_zero_offset() {
    let (engine, sent) = recording_engine();
    let mut process = chunk_process();

    process.perform(&engine, Some(counted(6, 2, 2))).unwrap();

    assert!(started_sub_processes(&sent).is_empty());
    let entry = &process.task_list().entries()[0];
    assert_eq!(entry.status(), EntryStatus::Failed);
    assert_eq!(entry.logs()[0].code(), codes::UNSUPPORTED_MESSAGE_RECEIVED);
}

#[test]
fn test_chunk_requires_positive_limit() {
    let (engine, _sent) = recording_engine();
    let mut process = chunk_process();

    process.perform(&engine, Some(counted(6, 0, 0))).unwrap();

    assert_eq!(process.task_list().entries()[0].status(), EntryStatus::Failed);
}

#[test]
fn test_chunk_requires_total_items() {
    let (engine, _sent) = recording_engine();
    let mut process = chunk_process();

    let seed = WorkflowMessage::new_data_collected(Payload::new("ArticleCount", json!(3)), "importer", None);
    process.perform(&engine, Some(seed)).unwrap();

    assert_eq!(process.task_list().entries()[0].status(), EntryStatus::Failed);
}
