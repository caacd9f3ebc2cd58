use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{DispatchError, ProcessingError, Result};
use crate::message::{Message, ProcessMessage, SubProcessFinished};
use crate::process::{Process, ProcessFactory, ProcessId};
use crate::runtime::channel::MessageChannel;
use crate::runtime::engine::WorkflowEngine;
use crate::runtime::notifier::{NoopNotifier, ProcessingEvent, ProcessingNotifier};
use crate::runtime::storage::ProcessRepository;
use crate::task::NodeName;

/// Clonable entry point of a `WorkflowProcessor`. Messages are queued in the
/// processor's mailbox and handled one at a time, in arrival order.
#[derive(Debug, Clone)]
pub struct ProcessorHandle {
    node_name: NodeName,
    sender: mpsc::UnboundedSender<Message>,
}

impl ProcessorHandle {
    pub fn node_name(&self) -> &NodeName {
        &self.node_name
    }

    pub fn receive_message(&self, message: Message) -> std::result::Result<(), DispatchError> {
        self.sender.send(message).map_err(|_| DispatchError::Rejected {
            channel: self.node_name.to_string(),
            reason: "processor mailbox is closed".to_string(),
        })
    }
}

/// The processor's own node is its default channel.
impl MessageChannel for ProcessorHandle {
    fn name(&self) -> &str {
        "local"
    }

    fn send(&self, message: Message) -> std::result::Result<(), DispatchError> {
        self.receive_message(message)
    }
}

/// Receiving side of a processor, created before the processor so the engine
/// can use the handle as its local channel.
pub struct Mailbox {
    handle: ProcessorHandle,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl Mailbox {
    pub fn new(node_name: NodeName) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            handle: ProcessorHandle { node_name, sender },
            receiver,
        }
    }

    pub fn handle(&self) -> ProcessorHandle {
        self.handle.clone()
    }
}

/// A process touched by one unit of work.
struct Touched {
    process: Process,
    started: bool,
    was_finished: bool,
    /// The message that made the process advance, reported to the parent if
    /// this step finishes a sub-process.
    trigger: Option<ProcessMessage>,
}

/// Single entry point for messages addressed to one node.
///
/// Each message is one unit of work: locate or create the process, let it
/// react, persist its events and commit. Messages produced while a unit is
/// running (including synchronous handler answers) wait in the mailbox, so
/// at most one transaction is ever open.
pub struct WorkflowProcessor {
    node_name: NodeName,
    repository: ProcessRepository,
    factory: ProcessFactory,
    engine: Arc<dyn WorkflowEngine>,
    notifier: Arc<dyn ProcessingNotifier>,
    mailbox: Mailbox,
}

impl WorkflowProcessor {
    pub fn new(
        mailbox: Mailbox,
        repository: ProcessRepository,
        factory: ProcessFactory,
        engine: Arc<dyn WorkflowEngine>,
    ) -> Self {
        Self {
            node_name: mailbox.handle.node_name.clone(),
            repository,
            factory,
            engine,
            notifier: Arc::new(NoopNotifier),
            mailbox,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ProcessingNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn handle(&self) -> ProcessorHandle {
        self.mailbox.handle()
    }

    pub fn node_name(&self) -> &NodeName {
        &self.node_name
    }

    pub async fn load_process(&self, process_id: ProcessId) -> Result<Option<Process>> {
        self.repository.get(process_id).await
    }

    /// Queues `message` behind anything already waiting and works off the
    /// whole mailbox. Every queued message is attempted; the first failure is
    /// returned.
    pub async fn receive_message(&mut self, message: Message) -> Result<()> {
        self.mailbox.handle.receive_message(message)?;
        self.drain().await
    }

    /// Works off queued messages until the mailbox is empty.
    pub async fn drain(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Ok(message) = self.mailbox.receiver.try_recv() {
            if let Err(e) = self.process(message).await {
                error!(node = %self.node_name, error = %e, "Message processing failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Serves the mailbox until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(node = %self.node_name, "Processor started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = self.mailbox.receiver.recv() => {
                    let Some(message) = message else { break };
                    if let Err(e) = self.process(message).await {
                        error!(node = %self.node_name, error = %e, "Message processing failed");
                    }
                }
            }
        }
        info!(node = %self.node_name, "Processor stopped");
    }

    async fn process(&mut self, message: Message) -> Result<()> {
        let name = message.name();
        debug!(node = %self.node_name, message = %name, "Processing message");

        let store = self.repository.store().clone();
        store.begin_transaction().await?;

        let touched = match self.execute(message).await {
            Ok(touched) => touched,
            Err(e) => {
                warn!(node = %self.node_name, message = %name, error = %e, "Rolling back");
                store.rollback().await?;
                return Err(e);
            }
        };

        store.commit().await?;
        self.after_commit(touched)
    }

    /// Runs one unit of work and persists the touched process inside the open
    /// transaction.
    async fn execute(&mut self, message: Message) -> Result<Touched> {
        let mut touched = self.react(message).await?;
        self.repository.add(&mut touched.process).await?;
        Ok(touched)
    }

    async fn react(&mut self, message: Message) -> Result<Touched> {
        let engine = self.engine.clone();

        match message {
            Message::Workflow(message) if message.position().is_none() => {
                let mut process = self.factory.derive_process_from_message(&message, &self.node_name)?;
                info!(
                    process_id = %process.id(),
                    kind = %process.kind(),
                    message = %message.name(),
                    "Starting process"
                );
                process.perform(engine.as_ref(), Some(message.clone()))?;
                Ok(Touched {
                    process,
                    started: true,
                    was_finished: false,
                    trigger: Some(message.into()),
                })
            }
            Message::Workflow(message) if message.is_command() => Err(ProcessingError::UnsupportedMessage(format!(
                "command '{}' cannot be handled by node {}",
                message.name(),
                self.node_name
            ))),
            Message::Workflow(message) => self.continue_process(message.into()).await,
            Message::Log(log) => self.continue_process(log.into()).await,
            Message::StartSubProcess(command) => {
                if command.target_node() != &self.node_name {
                    return Err(ProcessingError::UnsupportedMessage(format!(
                        "sub-process for node {} received by node {}",
                        command.target_node(),
                        self.node_name
                    )));
                }
                let mut process = ProcessFactory::create_process_from_definition(
                    command.process_definition(),
                    self.node_name.clone(),
                    Some(command.parent_position().clone()),
                )?;
                info!(
                    process_id = %process.id(),
                    parent = %command.parent_position(),
                    kind = %process.kind(),
                    "Starting sub-process"
                );
                let previous = command.previous_message().cloned();
                process.perform(engine.as_ref(), previous.clone())?;
                Ok(Touched {
                    process,
                    started: true,
                    was_finished: false,
                    trigger: previous.map(Into::into),
                })
            }
            Message::SubProcessFinished(event) => {
                let reports_success_with_log =
                    matches!(event.last_message(), ProcessMessage::Log(log) if !log.is_error()) && event.succeed();
                if reports_success_with_log {
                    return Err(ProcessingError::UnsupportedMessage(format!(
                        "sub-process {} reported success with log message {}",
                        event.sub_process_id(),
                        event.last_message().name()
                    )));
                }
                debug!(
                    sub_process_id = %event.sub_process_id(),
                    succeed = event.succeed(),
                    parent = %event.parent_position(),
                    "Sub-process finished"
                );
                let answer = event.last_message().connect_to_process_task(event.parent_position().clone());
                self.continue_process(answer).await
            }
        }
    }

    async fn continue_process(&mut self, message: ProcessMessage) -> Result<Touched> {
        let position = message
            .position()
            .cloned()
            .ok_or_else(|| ProcessingError::UnsupportedMessage(format!("'{}' is not correlated", message.name())))?;
        let process_id = position.process_id();
        let mut process = self
            .repository
            .get(process_id)
            .await?
            .ok_or(ProcessingError::ProcessNotFound(process_id))?;

        let was_finished = process.is_finished();
        process.receive_message(message.clone(), self.engine.as_ref())?;

        Ok(Touched {
            process,
            started: false,
            was_finished,
            trigger: Some(message),
        })
    }

    fn after_commit(&self, touched: Touched) -> Result<()> {
        let Touched {
            process,
            started,
            was_finished,
            trigger,
        } = touched;

        if started {
            self.notifier.notify(ProcessingEvent::ProcessStarted {
                process_id: process.id(),
                kind: process.kind(),
                parent_position: process.parent_position().cloned(),
            });
        }
        if was_finished || !process.is_finished() {
            return Ok(());
        }

        let succeed = process.is_successful_done();
        info!(process_id = %process.id(), succeed, "Process finished");
        self.notifier.notify(ProcessingEvent::ProcessFinished {
            process_id: process.id(),
            succeed,
            parent_position: process.parent_position().cloned(),
        });

        let Some(parent_position) = process.parent_position().cloned() else {
            return Ok(());
        };
        let trigger = process.last_answer().cloned().map(ProcessMessage::from).or(trigger);
        let (succeed, last_message) = Self::last_answer(&process, succeed, trigger);
        let finished = SubProcessFinished::record(
            self.node_name.clone(),
            process.id(),
            succeed,
            last_message,
            parent_position.clone(),
        );
        if let Err(e) = self.engine.dispatch(finished.into()) {
            // already committed as finished, so nothing will resend it
            error!(
                process_id = %process.id(),
                parent = %parent_position,
                succeed,
                error = %e,
                "Lost sub-process finished notification"
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// The answer reported to the parent. A failed process always reports an
    /// error log.
    fn last_answer(process: &Process, succeed: bool, trigger: Option<ProcessMessage>) -> (bool, ProcessMessage) {
        match trigger {
            Some(message @ ProcessMessage::Workflow(_)) if succeed => (true, message),
            Some(ProcessMessage::Log(log)) if log.is_error() => (false, log.into()),
            trigger => {
                let last_name = trigger.map(|m| m.name()).unwrap_or_else(|| "none".to_string());
                (false, process.failure_report(&last_name).into())
            }
        }
    }
}
