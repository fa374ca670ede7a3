//! # SQS Producer CLI
//!
//! Command-line interface for sending messages to Amazon SQS queues.
//!
//! This module provides CLI commands for:
//! - Sending a single message (`send`)
//! - Sending up to ten messages in one batch call (`send-batch`)
//!
//! The connection comes from `--dsn` (or `SQS_DSN`), or else from an optional
//! configuration file layered with `SQS__*` environment variables. Results
//! are printed to stdout as JSON; logs go to stderr.

use clap::{Args, Parser, Subcommand};
use sqs_producer::{
    ConfigurationError, ProducerError, SqsConnectionConfig, SqsContext, SqsDestination,
    SqsMessage, TransportError,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// sqs-send - Send messages to Amazon SQS queues
#[derive(Parser, Debug)]
#[command(name = "sqs-send")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send messages to Amazon SQS queues")]
pub struct Cli {
    /// Connection DSN, e.g. sqs:?key=AKIA...&secret=...&region=eu-west-1
    #[arg(long, env = "SQS_DSN", conflicts_with = "config")]
    pub dsn: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "SQS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a single message
    Send {
        #[command(flatten)]
        target: TargetOptions,

        #[command(flatten)]
        message: MessageOptions,

        /// Message body
        body: String,
    },

    /// Send several messages in one batch call
    SendBatch {
        #[command(flatten)]
        target: TargetOptions,

        #[command(flatten)]
        message: MessageOptions,

        /// Message bodies, one message per body
        #[arg(required = true)]
        bodies: Vec<String>,
    },
}

/// Where and how messages are sent
#[derive(Args, Debug, Clone)]
pub struct TargetOptions {
    /// Queue name
    #[arg(short, long)]
    pub queue: String,

    /// Region override for this queue
    #[arg(long)]
    pub region: Option<String>,

    /// Queue URL, skipping the lookup by name
    #[arg(long)]
    pub queue_url: Option<String>,

    /// Producer-wide delivery delay in milliseconds
    #[arg(long)]
    pub delivery_delay_ms: Option<u64>,
}

/// Options applied to every message sent by a command
///
/// `--deduplication-id` is accepted by `send-batch` only with a single body.
#[derive(Args, Debug, Clone, Default)]
pub struct MessageOptions {
    /// Per-message delay in seconds; overrides the delivery delay
    #[arg(long)]
    pub delay_seconds: Option<u32>,

    /// Message group ID (FIFO queues)
    #[arg(long)]
    pub group_id: Option<String>,

    /// Message deduplication ID (FIFO queues)
    #[arg(long)]
    pub deduplication_id: Option<String>,

    /// Message header as key=value; may be repeated
    #[arg(long = "header", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Message property as key=value; may be repeated
    #[arg(long = "property", value_parser = parse_key_value)]
    pub properties: Vec<(String, String)>,
}

impl MessageOptions {
    /// Build a message with these options applied
    pub fn build(&self, body: &str) -> SqsMessage {
        let mut message = SqsMessage::new(body);

        for (key, value) in &self.headers {
            message = message.with_header(key.as_str(), value.as_str());
        }
        for (key, value) in &self.properties {
            message = message.with_property(key.as_str(), value.as_str());
        }
        if let Some(delay_seconds) = self.delay_seconds {
            message = message.with_delay_seconds(delay_seconds);
        }
        if let Some(id) = &self.group_id {
            message = message.with_message_group_id(id.as_str());
        }
        if let Some(id) = &self.deduplication_id {
            message = message.with_message_deduplication_id(id.as_str());
        }

        message
    }

    /// Build one message per body
    ///
    /// # Errors
    ///
    /// Returns [`CliError::InvalidArgument`] when a deduplication ID would be
    /// shared by several messages; FIFO queues would silently drop all but
    /// the first.
    pub fn build_batch(&self, bodies: &[String]) -> Result<Vec<SqsMessage>, CliError> {
        if self.deduplication_id.is_some() && bodies.len() > 1 {
            return Err(CliError::InvalidArgument {
                arg: "deduplication-id".to_string(),
                message: "cannot be shared by several messages in one batch".to_string(),
            });
        }

        Ok(bodies.iter().map(|body| self.build(body)).collect())
    }
}

impl TargetOptions {
    /// Build the destination described by these options
    pub fn destination(&self) -> SqsDestination {
        let mut destination = SqsDestination::new(self.queue.as_str());
        if let Some(region) = &self.region {
            destination = destination.with_region(region.as_str());
        }
        if let Some(queue_url) = &self.queue_url {
            destination = destination.with_queue_url(queue_url.as_str());
        }
        destination
    }
}

/// Parse a `key=value` pair; the value may contain further `=` characters
pub fn parse_key_value(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", value)),
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Producer(#[from] ProducerError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Transport(_) => 2,
            Self::Producer(_) => 3,
            Self::InvalidArgument { .. } => 4,
            Self::Output(_) => 5,
        }
    }
}

// ============================================================================
// Command Execution
// ============================================================================

/// Parse the command line and run it
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    run(cli).await
}

/// Run a parsed command line
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_configuration(&cli)?;
    let context = SqsContext::from_config(config)?;

    match cli.command {
        Commands::Send {
            target,
            message,
            body,
        } => {
            let mut producer = context.create_producer();
            producer.set_delivery_delay(target.delivery_delay_ms);

            let sent = producer
                .send(&target.destination(), &message.build(&body))
                .await?;

            info!(message_id = %sent.message_id, "Message sent");
            println!("{}", serde_json::to_string_pretty(&sent)?);
        }
        Commands::SendBatch {
            target,
            message,
            bodies,
        } => {
            let messages = message.build_batch(&bodies)?;

            let mut producer = context.create_producer();
            producer.set_delivery_delay(target.delivery_delay_ms);

            let sent = producer.send_all(&target.destination(), &messages).await?;

            info!(count = sent.len(), "Batch sent");
            println!("{}", serde_json::to_string_pretty(&sent)?);
        }
    }

    Ok(())
}

/// Resolve the connection configuration from the DSN or the config sources
fn load_configuration(cli: &Cli) -> Result<SqsConnectionConfig, CliError> {
    let config = match &cli.dsn {
        Some(dsn) => SqsConnectionConfig::from_dsn(dsn)?,
        None => SqsConnectionConfig::load(cli.config.as_deref())?,
    };

    debug!(
        region = ?config.region,
        endpoint = ?config.endpoint,
        has_credentials = config.has_credentials(),
        "Loaded connection configuration"
    );

    Ok(config)
}

/// Initialize logging based on CLI arguments
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = tracing_subscriber::EnvFilter::try_new(&cli.log_level).map_err(|e| {
        CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        }
    })?;

    let json_layer = cli.json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!cli.json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        })
}
