use processing::dsl::builder::ProcessDefinitionBuilder;
use processing::error::DispatchError;
use processing::message::{LogMessage, Message, Payload, StartSubProcess, WorkflowMessage};
use processing::process::{Process, ProcessFactory};
use processing::runtime::engine::RegistryWorkflowEngine;
use processing::runtime::storage::number_events;
use processing::task::{EntryStatus, NodeName};
use serde_json::json;
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

fn last_start(sent: &Arc<Mutex<Vec<Message>>>) -> StartSubProcess {
    match sent.lock().unwrap().last().cloned() {
        Some(Message::StartSubProcess(command)) => command,
        other => panic!("expected a start-sub-process command, got {:?}", other),
    }
}

fn polling_process() -> Process {
    let page = ProcessDefinitionBuilder::linear()
        .collect_data("feed", "Page")
        .build()
        .build();
    let definition = ProcessDefinitionBuilder::while_loop()
        .run_sub_process("worker-node", page)
        .build()
        .build();
    ProcessFactory::create_process_from_definition(&definition, NodeName::new("main-node").unwrap(), None)
        .expect("Failed to create process")
}

fn seed() -> WorkflowMessage {
    WorkflowMessage::new_data_collected(Payload::new("Cursor", json!(0)), "scheduler", None)
}

#[test]
fn test_while_reruns_sub_process_after_success() {
    let (engine, sent) = recording_engine();
    let mut process = polling_process();
    process.perform(&engine, Some(seed())).unwrap();

    let first = last_start(&sent);
    assert_eq!(first.parent_position().position(), 1);
    assert_eq!(process.task_list().entries()[0].status(), EntryStatus::Running);

    let page = WorkflowMessage::new_data_collected(Payload::new("Cursor", json!(1)), "worker-node", None)
        .connect_to_process_task(first.parent_position().clone());
    process.receive_message(page.into(), &engine).unwrap();

    let second = last_start(&sent);
    assert_eq!(second.parent_position().position(), 2);
    assert_eq!(second.previous_message().unwrap().payload().data(), &json!(1));
    assert_eq!(process.task_list().len(), 2);
    assert_eq!(process.task_list().entries()[0].status(), EntryStatus::Done);
    assert_eq!(process.task_list().entries()[1].status(), EntryStatus::Running);
    assert!(!process.is_finished());
}

#[test]
fn test_while_stops_on_failed_iteration() {
    let (engine, sent) = recording_engine();
    let mut process = polling_process();
    process.perform(&engine, Some(seed())).unwrap();

    let first = last_start(&sent);
    let page = seed().connect_to_process_task(first.parent_position().clone());
    process.receive_message(page.into(), &engine).unwrap();

    let second = last_start(&sent);
    let failure = LogMessage::error("worker-node", second.parent_position().clone(), "feed exhausted");
    process.receive_message(failure.into(), &engine).unwrap();

    assert!(process.is_finished());
    assert!(!process.is_successful_done());
    assert_eq!(process.task_list().len(), 2);
    assert_eq!(sent.lock().unwrap().len(), 2);
}

#[test]
fn test_while_replay_keeps_rescheduled_entries() {
    let (engine, sent) = recording_engine();
    let mut process = polling_process();
    process.perform(&engine, Some(seed())).unwrap();
    for _ in 0..3 {
        let command = last_start(&sent);
        let page = seed().connect_to_process_task(command.parent_position().clone());
        process.receive_message(page.into(), &engine).unwrap();
    }

    let events = number_events(0, process.pop_recorded_events());
    let replayed = Process::reconstitute(&events).unwrap();

    assert_eq!(replayed.task_list().len(), 4);
    assert_eq!(replayed.task_list(), process.task_list());
    let positions: Vec<_> = replayed.task_list().entries().iter().map(|e| e.position().position()).collect();
    assert_eq!(positions, vec![1, 2, 3, 4]);
}
