use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::DispatchError;
use crate::message::{LogMessage, Message, ProcessMessage, WorkflowMessage};
use crate::runtime::processor::ProcessorHandle;

/// Transport route for messages. Implementations must not block: a channel
/// either enqueues the message or hands it to a task that runs later.
pub trait MessageChannel: Send + Sync {
    fn name(&self) -> &str {
        "anonymous"
    }

    fn send(&self, message: Message) -> Result<(), DispatchError>;
}

/// Closures act as synchronous channels. A closure may answer right away by
/// pushing into a `ProcessorHandle`; the answer is processed once the current
/// transaction has been committed.
impl<F> MessageChannel for F
where
    F: Fn(Message) -> Result<(), DispatchError> + Send + Sync,
{
    fn send(&self, message: Message) -> Result<(), DispatchError> {
        self(message)
    }
}

/// Business logic behind a target name: answers collect-data and
/// process-data commands.
#[async_trait]
pub trait WorkflowMessageHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the answer for `message`, or `None` when the handler answers
    /// later on its own.
    async fn handle(&self, message: WorkflowMessage) -> anyhow::Result<Option<ProcessMessage>>;
}

/// Runs a `WorkflowMessageHandler` on the tokio runtime and routes its answer
/// back to the processor. Handler errors come back as error log messages so
/// the waiting task fails instead of hanging.
pub struct HandlerChannel {
    handler: Arc<dyn WorkflowMessageHandler>,
    processor: ProcessorHandle,
}

impl HandlerChannel {
    pub fn new(handler: Arc<dyn WorkflowMessageHandler>, processor: ProcessorHandle) -> Self {
        Self { handler, processor }
    }
}

impl MessageChannel for HandlerChannel {
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn send(&self, message: Message) -> Result<(), DispatchError> {
        let Message::Workflow(message) = message else {
            return Err(DispatchError::Rejected {
                channel: self.handler.name().to_string(),
                reason: "handlers only accept workflow messages".to_string(),
            });
        };

        let handler = self.handler.clone();
        let processor = self.processor.clone();
        tokio::spawn(async move {
            let position = message.position().cloned();
            let message_name = message.name().to_string();
            let answer = match handler.handle(message).await {
                Ok(Some(answer)) => answer,
                Ok(None) => {
                    debug!(handler = handler.name(), message = %message_name, "Handler will answer later");
                    return;
                }
                Err(e) => {
                    error!(handler = handler.name(), message = %message_name, error = ?e, "Handler failed");
                    let Some(position) = position else {
                        warn!(handler = handler.name(), "Cannot report failure of an uncorrelated message");
                        return;
                    };
                    ProcessMessage::Log(LogMessage::handler_failed(
                        handler.name(),
                        position,
                        &message_name,
                        &e.to_string(),
                    ))
                }
            };

            if let Err(e) = processor.receive_message(answer.into()) {
                error!(handler = handler.name(), "Failed to route answer back: {}", e);
            }
        });

        Ok(())
    }
}
