use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::DispatchError;
use crate::manipulators::PayloadManipulator;
use crate::message::Message;
use crate::runtime::channel::MessageChannel;

/// The process' only window to the outside world.
pub trait WorkflowEngine: Send + Sync {
    /// Routes `message` to a transport channel.
    fn dispatch(&self, message: Message) -> Result<(), DispatchError>;

    /// Looks up an in-process payload manipulator by name.
    fn manipulator(&self, _name: &str) -> Option<Arc<dyn PayloadManipulator>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Command,
    Event,
}

/// Selector of a registered channel. `origin` and `sender` narrow the route;
/// `None` matches anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelRoute {
    pub target: String,
    pub origin: Option<String>,
    pub sender: Option<String>,
}

impl ChannelRoute {
    pub fn target(target: &str) -> Self {
        Self {
            target: target.to_string(),
            origin: None,
            sender: None,
        }
    }

    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }

    pub fn sender(mut self, sender: &str) -> Self {
        self.sender = Some(sender.to_string());
        self
    }

    /// Higher is more specific. `None` if the route does not match at all.
    fn score(&self, target: &str, origin: &str, sender: Option<&str>) -> Option<u8> {
        if self.target != target {
            return None;
        }
        let origin_matches = match &self.origin {
            Some(o) if o == origin => true,
            Some(_) => return None,
            None => false,
        };
        let sender_matches = match (&self.sender, sender) {
            (Some(s), Some(current)) if s == current => true,
            (Some(_), _) => return None,
            (None, _) => false,
        };

        Some(match (origin_matches, sender_matches) {
            (true, true) => 4,
            (true, false) => 3,
            (false, true) => 2,
            (false, false) => 1,
        })
    }
}

/// `WorkflowEngine` backed by a registry of channels.
///
/// Resolution priority for a message's kind: target+origin+sender,
/// target+origin, target+sender, target only, then the local channel.
pub struct RegistryWorkflowEngine {
    sender: Option<String>,
    channels: HashMap<ChannelKind, Vec<(ChannelRoute, Arc<dyn MessageChannel>)>>,
    local: Arc<dyn MessageChannel>,
    manipulators: HashMap<String, Arc<dyn PayloadManipulator>>,
}

impl RegistryWorkflowEngine {
    pub fn new(local: Arc<dyn MessageChannel>) -> Self {
        Self {
            sender: None,
            channels: HashMap::new(),
            local,
            manipulators: HashMap::new(),
        }
    }

    /// Name this engine sends as, usually the node name.
    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = Some(sender.to_string());
        self
    }

    pub fn register_command_channel(&mut self, route: ChannelRoute, channel: Arc<dyn MessageChannel>) {
        self.channels.entry(ChannelKind::Command).or_default().push((route, channel));
    }

    pub fn register_event_channel(&mut self, route: ChannelRoute, channel: Arc<dyn MessageChannel>) {
        self.channels.entry(ChannelKind::Event).or_default().push((route, channel));
    }

    pub fn register_manipulator(&mut self, manipulator: Arc<dyn PayloadManipulator>) {
        self.manipulators.insert(manipulator.name().to_string(), manipulator);
    }

    pub fn resolve(&self, kind: ChannelKind, target: Option<&str>, origin: &str) -> Arc<dyn MessageChannel> {
        let Some(target) = target else {
            return self.local.clone();
        };

        self.channels
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(|(route, channel)| {
                route
                    .score(target, origin, self.sender.as_deref())
                    .map(|score| (score, channel))
            })
            // ties go to the route registered first
            .fold(None::<(u8, &Arc<dyn MessageChannel>)>, |best, (score, channel)| match best {
                Some((best_score, _)) if best_score >= score => best,
                _ => Some((score, channel)),
            })
            .map(|(_, channel)| channel.clone())
            .unwrap_or_else(|| self.local.clone())
    }
}

impl WorkflowEngine for RegistryWorkflowEngine {
    fn dispatch(&self, message: Message) -> Result<(), DispatchError> {
        let kind = if message.is_command() {
            ChannelKind::Command
        } else {
            ChannelKind::Event
        };
        let channel = self.resolve(kind, message.target(), message.origin());
        debug!(
            message = %message.name(),
            target = message.target().unwrap_or("-"),
            channel = channel.name(),
            "Dispatching message"
        );
        trace!(?message, "Dispatch payload");
        channel.send(message)
    }

    fn manipulator(&self, name: &str) -> Option<Arc<dyn PayloadManipulator>> {
        self.manipulators.get(name).cloned()
    }
}
