use processing::error::ProcessingError;
use processing::process::{ProcessEvent, ProcessKind, ProcessState};
use processing::task::{EntryStatus, NodeName, ProcessId, Task, TaskList, TaskListId, TaskListPosition};
use serde_json::Map;

fn task_list_id() -> TaskListId {
    TaskListId::link(NodeName::new("test-node").unwrap(), ProcessId::generate())
}

fn three_tasks() -> Vec<Task> {
    vec![
        Task::collect_data("source", "Article"),
        Task::process_data("sink", &["Article"], None),
        Task::manipulate_payload("cleanup"),
    ]
}

fn set_up_state(tasks: Vec<Task>) -> (ProcessState, TaskListId) {
    let id = task_list_id();
    let event = ProcessEvent::ProcessSetUp {
        process_id: id.process_id,
        kind: ProcessKind::Linear,
        node_name: id.node_name.clone(),
        tasks,
        parent_position: None,
        sync_log_messages: false,
        config: Map::new(),
    };
    (ProcessState::initial(&event).unwrap(), id)
}

#[test]
fn test_positions_follow_declaration_order() {
    let id = task_list_id();
    let list = TaskList::schedule_tasks(id.clone(), three_tasks()).unwrap();

    let positions: Vec<_> = list.entries().iter().map(|e| e.position().position()).collect();
    assert_eq!(positions, vec![1, 2, 3]);
    assert!(list.entries().iter().all(|e| e.status() == EntryStatus::NotStarted));
    assert!(!list.is_started());
    assert!(!list.is_completed());
    assert_eq!(list.entry_at(&TaskListPosition::at(id, 2)).unwrap().task(), &three_tasks()[1]);
}

#[test]
fn test_empty_task_list_is_rejected() {
    let result = TaskList::schedule_tasks(task_list_id(), Vec::new());
    assert!(matches!(result, Err(ProcessingError::EmptyTaskList)));
}

#[test]
fn test_next_not_started_entry_is_fifo() {
    let (mut state, id) = set_up_state(three_tasks());
    let first = TaskListPosition::at(id.clone(), 1);
    let second = TaskListPosition::at(id.clone(), 2);

    state.apply(&ProcessEvent::TaskEntryMarkedAsRunning { position: second.clone() });
    assert_eq!(state.task_list().next_not_started_entry().unwrap().position(), &first);

    state.apply(&ProcessEvent::TaskEntryMarkedAsRunning { position: first });
    assert_eq!(state.task_list().next_not_started_entry().unwrap().position().position(), 3);
}

#[test]
fn test_terminal_entries_ignore_transitions() {
    let (mut state, id) = set_up_state(three_tasks());
    let first = TaskListPosition::at(id, 1);

    state.apply(&ProcessEvent::TaskEntryMarkedAsRunning { position: first.clone() });
    state.apply(&ProcessEvent::TaskEntryMarkedAsDone { position: first.clone() });
    let snapshot = state.clone();

    state.apply(&ProcessEvent::TaskEntryMarkedAsFailed { position: first.clone() });
    state.apply(&ProcessEvent::TaskEntryMarkedAsRunning { position: first.clone() });
    state.apply(&ProcessEvent::TaskEntryMarkedAsDone { position: first });

    assert_eq!(state, snapshot);
}

#[test]
fn test_completion_and_success() {
    let (mut state, id) = set_up_state(three_tasks()[..2].to_vec());
    let first = TaskListPosition::at(id.clone(), 1);
    let second = TaskListPosition::at(id, 2);

    state.apply(&ProcessEvent::TaskEntryMarkedAsDone { position: first });
    assert!(state.task_list().is_started());
    assert!(!state.task_list().is_completed());

    state.apply(&ProcessEvent::TaskEntryMarkedAsFailed { position: second });
    assert!(state.task_list().is_completed());
    assert!(!state.task_list().is_successful_done());
}

#[test]
fn test_failed_entry_completes_list_once_nothing_runs() {
    let (mut state, id) = set_up_state(three_tasks());
    let first = TaskListPosition::at(id.clone(), 1);
    let second = TaskListPosition::at(id, 2);

    state.apply(&ProcessEvent::TaskEntryMarkedAsRunning { position: first.clone() });
    state.apply(&ProcessEvent::TaskEntryMarkedAsRunning { position: second.clone() });
    state.apply(&ProcessEvent::TaskEntryMarkedAsFailed { position: first });
    assert!(!state.task_list().is_completed());

    state.apply(&ProcessEvent::TaskEntryMarkedAsFailed { position: second });
    assert!(state.task_list().is_completed());
    assert!(!state.task_list().is_successful_done());
    assert_eq!(state.task_list().entries()[2].status(), EntryStatus::NotStarted);
}

#[test]
fn test_events_for_other_task_lists_are_ignored() {
    let (mut state, _) = set_up_state(three_tasks());
    let snapshot = state.clone();

    let foreign = TaskListPosition::at(task_list_id(), 1);
    state.apply(&ProcessEvent::TaskEntryMarkedAsDone { position: foreign });

    assert_eq!(state, snapshot);
}

#[test]
fn test_position_string_round_trip() {
    let id = task_list_id();
    let position = TaskListPosition::at(id.clone(), 12);

    let text = position.to_string();
    assert_eq!(text, format!("test-node:{}:12", id.process_id));
    assert_eq!(text.parse::<TaskListPosition>().unwrap(), position);

    let json = serde_json::to_string(&position).unwrap();
    assert_eq!(json, format!("\"{}\"", text));
}

#[test]
fn test_malformed_positions_are_rejected() {
    assert!("test-node:not-a-uuid:1".parse::<TaskListPosition>().is_err());
    assert!(format!("test-node:{}:zero", ProcessId::generate()).parse::<TaskListPosition>().is_err());
    assert!("nonsense".parse::<TaskListPosition>().is_err());
}

#[test]
fn test_node_name_minimum_length() {
    assert!(NodeName::new("ab").is_err());
    assert_eq!(NodeName::new("abc").unwrap().as_str(), "abc");
    assert!(serde_json::from_str::<NodeName>("\"x\"").is_err());
}
