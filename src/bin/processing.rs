use anyhow::{Context as AnyhowContext, Result, bail};
use clap::{Parser, Subcommand};
use processing::config::NodeConfig;
use processing::message::{Message, Payload, WorkflowMessage};
use processing::runtime::channel::HandlerChannel;
use processing::runtime::engine::{ChannelRoute, RegistryWorkflowEngine};
use processing::runtime::handlers::{CollectingSink, StaticSource};
use processing::runtime::notifier::{ChannelNotifier, ProcessingEvent};
use processing::runtime::processor::{Mailbox, WorkflowProcessor};
use processing::runtime::redis_storage::RedisEventStore;
use processing::runtime::storage::{EventStore, InMemoryEventStore, ProcessRepository};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a process on a node and wait until it finishes
    Run {
        /// Path to the node config YAML file
        #[arg(long, short)]
        config: PathBuf,

        /// Type of the data-collected message that starts the process
        #[arg(long, short = 't')]
        message_type: String,

        /// JSON payload of the start message
        #[arg(long, short, default_value = "null")]
        data: String,

        /// Item type, if the payload is a collection
        #[arg(long)]
        item_type: Option<String>,

        /// Seconds to wait for the process to finish
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Check the process definitions of a node config
    Validate {
        /// Path to the node config YAML file
        #[arg(long, short)]
        config: PathBuf,
    },
}

fn build_payload(type_name: &str, data: &str, item_type: Option<&str>) -> Result<Payload> {
    let data: serde_json::Value = serde_json::from_str(data).context("Payload data is not valid JSON")?;
    Ok(match (item_type, data) {
        (Some(item_type), serde_json::Value::Array(items)) => Payload::collection(type_name, item_type, items),
        (Some(_), _) => bail!("a collection payload needs a JSON array"),
        (None, data) => Payload::new(type_name, data),
    })
}

async fn run(config: NodeConfig, payload: Payload, timeout: Duration) -> Result<()> {
    let node_name = config.node_name()?;
    let factory = config.factory()?;

    let store: Arc<dyn EventStore> = match &config.redis_url {
        Some(url) => {
            info!("Using Redis event store at {}", url);
            let client = redis::Client::open(url.as_str()).context("Invalid Redis URL")?;
            Arc::new(RedisEventStore::new(client))
        }
        None => {
            info!("Using in-memory event store");
            Arc::new(InMemoryEventStore::new())
        }
    };

    let mailbox = Mailbox::new(node_name.clone());
    let handle = mailbox.handle();

    let mut engine = RegistryWorkflowEngine::new(Arc::new(handle.clone())).with_sender(node_name.as_str());
    for manipulator in config.build_manipulators()? {
        engine.register_manipulator(manipulator);
    }
    for (name, source) in &config.sources {
        let handler = Arc::new(StaticSource::new(name, source.payload()));
        let channel = Arc::new(HandlerChannel::new(handler, handle.clone()));
        engine.register_command_channel(ChannelRoute::target(name), channel);
    }
    for name in &config.sinks {
        let handler = Arc::new(CollectingSink::new(name));
        let channel = Arc::new(HandlerChannel::new(handler, handle.clone()));
        engine.register_command_channel(ChannelRoute::target(name), channel);
    }

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let processor = WorkflowProcessor::new(mailbox, ProcessRepository::new(store), factory, Arc::new(engine))
        .with_notifier(Arc::new(ChannelNotifier::new(events_tx)));

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(processor.run(cancel.clone()));

    let start = WorkflowMessage::new_data_collected(payload, "cli", Some(node_name.as_str()));
    info!(message = %start.name(), "Sending start message");
    handle.receive_message(Message::Workflow(start))?;

    let outcome = tokio::time::timeout(timeout, async {
        while let Some(event) = events_rx.recv().await {
            if let ProcessingEvent::ProcessFinished {
                process_id,
                succeed,
                parent_position: None,
            } = event
            {
                return Some((process_id, succeed));
            }
        }
        None
    })
    .await;

    cancel.cancel();
    worker.await?;

    match outcome {
        Ok(Some((process_id, true))) => {
            info!("Process {} finished successfully", process_id);
            Ok(())
        }
        Ok(Some((process_id, false))) => bail!("process {} failed", process_id),
        Ok(None) => bail!("processor stopped before the process finished"),
        Err(_) => bail!("process did not finish within {:?}", timeout),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            message_type,
            data,
            item_type,
            timeout,
        } => {
            let node_config = NodeConfig::load(&config)?;
            let payload = build_payload(&message_type, &data, item_type.as_deref())?;
            if let Err(e) = run(node_config, payload, Duration::from_secs(timeout)).await {
                error!("{:#}", e);
                return Err(e);
            }
        }
        Commands::Validate { config } => {
            let node_config = NodeConfig::load(&config)?;
            node_config.node_name()?;
            node_config.factory()?;
            node_config.build_manipulators()?;
            info!("{} process definition(s) are valid", node_config.processes.len());
        }
    }

    Ok(())
}
