//! MCP server that exposes the GitHub Copilot CLI as a set of tools.
//!
//! Transport is newline-delimited JSON-RPC over stdio. Three tasks connect
//! through channels: a stdin reader, the message processor and a stdout
//! writer. Tool calls run on their own tasks, each holding a handle to the
//! writer, so stdin EOF lets in-flight calls finish before shutdown.

#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::io::Result as IoResult;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use copilot_core::CommandOrchestrator;
use copilot_core::Config;
use copilot_core::ConfigOverrides;
use copilot_core::SessionRegistry;
use mcp_types::JSONRPCMessage;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod message_processor;
mod outgoing_message;
pub mod resources;
pub mod tool_registry;
pub mod tools;

use crate::message_processor::MessageProcessor;
use crate::outgoing_message::OutgoingMessageSender;
use crate::tool_registry::ToolContext;
use crate::tool_registry::ToolRegistry;

pub use crate::message_processor::SERVER_NAME;

/// Size of the bounded channel for parsed incoming messages.
const CHANNEL_CAPACITY: usize = 128;

const LOG_FILE_PREFIX: &str = "copilot-mcp-server.log";

/// Loads configuration, prepares directories and logging, opens the initial
/// session and serves MCP on stdio until stdin closes.
pub async fn run_main(overrides: ConfigOverrides) -> anyhow::Result<()> {
    let config = Config::load(overrides).context("failed to load configuration")?;
    config
        .paths
        .ensure_dirs()
        .await
        .context("failed to create data directories")?;
    let _log_guard = init_logging(&config.paths.logs_dir)?;
    serve_stdio(&config).await.inspect_err(|err| error!("{err:#}"))
}

async fn serve_stdio(config: &Config) -> anyhow::Result<()> {
    info!(
        program = config.program,
        home = %config.paths.home.display(),
        preference = %config.model_preference,
        "starting {SERVER_NAME}"
    );

    let sessions = SessionRegistry::new();
    let initial = sessions.create_session();
    info!(session_id = %initial, "initial session created");

    let registry = build_tool_registry(config, sessions);

    tokio::select! {
        result = run_server(tokio::io::stdin(), tokio::io::stdout(), registry) => {
            result.context("stdio transport failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted; shutting down");
        }
    }
    Ok(())
}

/// Registry with every tool registered against a fresh orchestrator.
pub fn build_tool_registry(config: &Config, sessions: SessionRegistry) -> ToolRegistry {
    let mut registry = ToolRegistry::new(ToolContext {
        orchestrator: CommandOrchestrator::new(config, sessions),
        model_preference: config.model_preference,
    });
    tools::register_all(&mut registry);
    registry
}

/// Stderr plus a daily-rolled file in `logs_dir`. Stdout is reserved for
/// protocol traffic. The returned guard flushes the file writer on drop.
fn init_logging(logs_dir: &Path) -> anyhow::Result<WorkerGuard> {
    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(env_filter()),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(guard)
}

/// `RUST_LOG` when set, else `info`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Serves MCP over any byte stream pair. Returns once `input` reaches EOF
/// and every queued response has been written.
pub async fn run_server<R, W>(input: R, mut output: W, registry: ToolRegistry) -> IoResult<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (incoming_tx, mut incoming_rx) = mpsc::channel::<JSONRPCMessage>(CHANNEL_CAPACITY);
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<JSONRPCMessage>();

    let reader_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(input).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<JSONRPCMessage>(&line) {
                        Ok(message) => {
                            if incoming_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => error!(error = %err, "failed to deserialize JSON-RPC message"),
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    error!(error = %err, "failed to read from stdin");
                    break;
                }
            }
        }
        debug!("stdin reader finished (EOF)");
    });

    let processor_handle = tokio::spawn({
        let outgoing = OutgoingMessageSender::new(outgoing_tx);
        let mut processor = MessageProcessor::new(outgoing, Arc::new(registry));
        async move {
            while let Some(message) = incoming_rx.recv().await {
                match message {
                    JSONRPCMessage::Request(request) => processor.process_request(request),
                    JSONRPCMessage::Notification(notification) => {
                        processor.process_notification(notification)
                    }
                    JSONRPCMessage::Response(response) => processor.process_response(response),
                    JSONRPCMessage::Error(err) => processor.process_error(err),
                }
            }
            info!("processor task exited (channel closed)");
        }
    });

    // Ends once the processor and every in-flight tool call have dropped
    // their senders.
    let writer_handle = tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(err) => {
                    error!(error = %err, "failed to serialize JSON-RPC message");
                    continue;
                }
            };
            if let Err(err) = write_line(&mut output, &json).await {
                error!(error = %err, "failed to write to stdout");
                return Err(err);
            }
        }
        info!("stdout writer exited (channel closed)");
        Ok(())
    });

    let (reader, processor, writer) =
        tokio::join!(reader_handle, processor_handle, writer_handle);
    reader.map_err(std::io::Error::other)?;
    processor.map_err(std::io::Error::other)?;
    writer.map_err(std::io::Error::other)?
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> IoResult<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
