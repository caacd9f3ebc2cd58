use processing::error::DispatchError;
use processing::message::{Message, Payload, WorkflowMessage};
use processing::runtime::channel::MessageChannel;
use processing::runtime::engine::{ChannelRoute, RegistryWorkflowEngine, WorkflowEngine};
use serde_json::Map;
use std::sync::{Arc, Mutex};

type Hits = Arc<Mutex<Vec<&'static str>>>;

fn channel(name: &'static str, hits: &Hits) -> Arc<dyn MessageChannel> {
    let hits = hits.clone();
    Arc::new(move |_message: Message| -> Result<(), DispatchError> {
        hits.lock().unwrap().push(name);
        Ok(())
    })
}

fn article() -> Payload {
    Payload::new("Article", serde_json::json!({}))
}

fn command() -> Message {
    WorkflowMessage::collect_data_of("Article", "origin-node", "target-node", Map::new()).into()
}

#[test]
fn test_most_specific_route_wins() {
    let hits = Hits::default();
    let mut engine = RegistryWorkflowEngine::new(channel("local", &hits)).with_sender("me");
    engine.register_command_channel(ChannelRoute::target("target-node"), channel("target", &hits));
    engine.register_command_channel(ChannelRoute::target("target-node").sender("me"), channel("target+sender", &hits));
    engine.register_command_channel(
        ChannelRoute::target("target-node").origin("origin-node"),
        channel("target+origin", &hits),
    );
    engine.register_command_channel(
        ChannelRoute::target("target-node").origin("origin-node").sender("me"),
        channel("target+origin+sender", &hits),
    );

    engine.dispatch(command()).unwrap();

    assert_eq!(*hits.lock().unwrap(), vec!["target+origin+sender"]);
}

#[test]
fn test_origin_beats_sender() {
    let hits = Hits::default();
    let mut engine = RegistryWorkflowEngine::new(channel("local", &hits)).with_sender("me");
    engine.register_command_channel(ChannelRoute::target("target-node").sender("me"), channel("target+sender", &hits));
    engine.register_command_channel(
        ChannelRoute::target("target-node").origin("origin-node"),
        channel("target+origin", &hits),
    );

    engine.dispatch(command()).unwrap();

    assert_eq!(*hits.lock().unwrap(), vec!["target+origin"]);
}

#[test]
fn test_sender_route_needs_matching_sender() {
    let hits = Hits::default();
    let mut engine = RegistryWorkflowEngine::new(channel("local", &hits)).with_sender("someone-else");
    engine.register_command_channel(ChannelRoute::target("target-node").sender("me"), channel("target+sender", &hits));
    engine.register_command_channel(ChannelRoute::target("target-node"), channel("target", &hits));

    engine.dispatch(command()).unwrap();

    assert_eq!(*hits.lock().unwrap(), vec!["target"]);
}

#[test]
fn test_first_registered_route_wins_ties() {
    let hits = Hits::default();
    let mut engine = RegistryWorkflowEngine::new(channel("local", &hits));
    engine.register_command_channel(ChannelRoute::target("target-node"), channel("first", &hits));
    engine.register_command_channel(ChannelRoute::target("target-node"), channel("second", &hits));

    engine.dispatch(command()).unwrap();

    assert_eq!(*hits.lock().unwrap(), vec!["first"]);
}

#[test]
fn test_unrouted_messages_use_local_channel() {
    let hits = Hits::default();
    let mut engine = RegistryWorkflowEngine::new(channel("local", &hits));
    engine.register_command_channel(ChannelRoute::target("elsewhere"), channel("elsewhere", &hits));
    // events never use command channels
    engine.register_command_channel(ChannelRoute::target("target-node"), channel("command", &hits));

    engine.dispatch(command()).unwrap();
    let event = WorkflowMessage::new_data_collected(article(), "me", Some("target-node"));
    engine.dispatch(event.into()).unwrap();
    let uncorrelated = WorkflowMessage::new_data_collected(article(), "me", None);
    engine.dispatch(uncorrelated.into()).unwrap();

    assert_eq!(*hits.lock().unwrap(), vec!["command", "local", "local"]);
}

#[test]
fn test_event_channels_route_events() {
    let hits = Hits::default();
    let mut engine = RegistryWorkflowEngine::new(channel("local", &hits));
    engine.register_event_channel(ChannelRoute::target("target-node"), channel("events", &hits));

    let event = WorkflowMessage::new_data_collected(article(), "me", Some("target-node"));
    engine.dispatch(event.into()).unwrap();
    engine.dispatch(command()).unwrap();

    assert_eq!(*hits.lock().unwrap(), vec!["events", "local"]);
}

#[test]
fn test_channel_errors_are_returned() {
    let mut engine = RegistryWorkflowEngine::new(Arc::new(|_m: Message| -> Result<(), DispatchError> { Ok(()) }));
    engine.register_command_channel(
        ChannelRoute::target("target-node"),
        Arc::new(|_m: Message| -> Result<(), DispatchError> {
            Err(DispatchError::NoChannel("target-node".to_string()))
        }),
    );

    let result = engine.dispatch(command());
    assert!(matches!(result, Err(DispatchError::NoChannel(_))));
}
