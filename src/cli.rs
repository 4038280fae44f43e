//! Command-line interface.

use crate::config::Config;
use crate::gateway::{Gateway, ResponseHead, ResponseSink, SinkError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncWriteExt, Stdout};

/// OpenAI-compatible gateway in front of interchangeable LLM backends
#[derive(Parser, Debug)]
#[command(name = "llm-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: $LLM_GATEWAY_CONFIG, then the user config dir)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve(ServeArgs),
    /// Send one prompt through the gateway and print the raw response
    Chat(ChatArgs),
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides `listen` in the config)
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Configured backend id
    pub backend: String,

    /// The prompt to send
    pub prompt: String,

    /// Request a single JSON response instead of an event stream
    #[arg(long)]
    pub no_stream: bool,

    /// Model override
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Sink writing the response body to stdout as it arrives.
pub struct StdoutSink {
    out: Stdout,
    status: Option<u16>,
}

impl StdoutSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            out: tokio::io::stdout(),
            status: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseSink for StdoutSink {
    async fn start(&mut self, head: ResponseHead) -> Result<(), SinkError> {
        if self.status.is_some() {
            return Err(SinkError::AlreadyStarted);
        }
        tracing::debug!(status = head.status, content_type = head.content_type, "Response started");
        self.status = Some(head.status);
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.out.write_all(&chunk).await?;
        self.out.flush().await?;
        Ok(())
    }

    async fn end(&mut self) -> Result<(), SinkError> {
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }
}

/// Run the parsed command line.
pub async fn run(cli: Cli) -> ExitCode {
    match run_inner(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run_inner(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let gateway = Gateway::from_config(&config).context("Invalid backend configuration")?;

    match cli.command {
        Commands::Serve(args) => {
            let listen = args.listen.unwrap_or_else(|| config.listen.clone());
            crate::server::serve(gateway, &listen).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Chat(args) => {
            let path = format!("/{}/v1/chat/completions", args.backend);
            let body = chat_body(&args);
            let mut sink = StdoutSink::new();
            gateway.handle(&path, &body, &mut sink).await;

            Ok(match sink.status() {
                Some(status) if status < 400 => ExitCode::SUCCESS,
                _ => ExitCode::from(2),
            })
        }
    }
}

fn chat_body(args: &ChatArgs) -> String {
    let mut body = serde_json::json!({
        "messages": [{"role": "user", "content": args.prompt}],
        "stream": !args.no_stream,
    });
    if let Some(model) = &args.model {
        body["model"] = serde_json::Value::String(model.clone());
    }
    body.to_string()
}
