use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

use crate::message::{MessageKind, Payload, ProcessMessage, WorkflowMessage};
use crate::runtime::channel::WorkflowMessageHandler;

/// Answers every collect-data request with a fixed payload.
#[derive(Debug)]
pub struct StaticSource {
    name: String,
    payload: Payload,
}

impl StaticSource {
    pub fn new(name: &str, payload: Payload) -> Self {
        Self {
            name: name.to_string(),
            payload,
        }
    }
}

#[async_trait]
impl WorkflowMessageHandler for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, message: WorkflowMessage) -> Result<Option<ProcessMessage>> {
        if message.name().kind() != MessageKind::CollectData {
            bail!("source '{}' cannot handle '{}'", self.name, message.name());
        }
        Ok(Some(message.answer_with(self.payload.clone()).into()))
    }
}

/// Accepts process-data commands, keeps the payloads and acknowledges them.
#[derive(Debug, Default)]
pub struct CollectingSink {
    name: String,
    received: Mutex<Vec<Payload>>,
}

impl CollectingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<Payload> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WorkflowMessageHandler for CollectingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, message: WorkflowMessage) -> Result<Option<ProcessMessage>> {
        if message.name().kind() != MessageKind::ProcessData {
            bail!("sink '{}' cannot handle '{}'", self.name, message.name());
        }
        info!(sink = %self.name, payload = %message.payload().data(), "Data received");
        if let Ok(mut received) = self.received.lock() {
            received.push(message.payload().clone());
        }
        Ok(Some(message.answer_with_data_processing_completed().into()))
    }
}
