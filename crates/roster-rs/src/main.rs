//! `roster` command-line entry point: serve the API, run one command, purge
//! a collection or inspect a session context.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::{debug, info};
use roster_rs::config::{LayeredConfigOptions, RosterConfig};
use roster_rs::core::{Orchestrator, QueryExecutor};
use roster_rs::protocol::CommandRequest;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line options for the roster binary.
#[derive(Parser)]
#[command(name = "roster", version, about = "Conversational queries over employee records")]
struct Cli {
    /// Optional path to a roster.json5 config file, applied over the
    /// system, user and working directory layers
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve,
    /// Run a single command and print the JSON response
    Ask {
        /// Natural-language request
        prompt: String,
        /// Session id carrying follow-up context
        #[arg(long)]
        session: Option<String>,
        /// Text file attached as reference data
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Delete every record of a collection
    Purge {
        #[arg(long)]
        collection: String,
        /// Must repeat the collection name
        #[arg(long)]
        confirm: String,
    },
    /// Print the stored context of a session
    Context {
        session: String,
        /// Forget the context instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

/// Entry point for the roster CLI.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    roster_rs::init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => {
            let orchestrator = Orchestrator::from_config(config)
                .context("failed to initialize orchestrator")?;
            roster_rs::server::serve(Arc::new(orchestrator))
                .await
                .context("http server failed")?;
        }
        Command::Ask {
            prompt,
            session,
            file,
        } => {
            let orchestrator = Orchestrator::from_config(config)
                .context("failed to initialize orchestrator")?;
            let mut request = CommandRequest::prompt(prompt);
            if let Some(session) = session {
                request = request.in_session(session);
            }
            if let Some(path) = file {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {} as UTF-8 text", path.display()))?;
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                request = request.with_file(name, content);
            }
            let response = orchestrator.handle(request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if let Some(kind) = response.error_kind() {
                bail!("command failed ({kind}): {}", response.text());
            }
        }
        Command::Purge {
            collection,
            confirm,
        } => {
            let executor = QueryExecutor::from_config(&config)
                .context("failed to initialize record store")?;
            let removed = executor
                .purge(&collection, &confirm)
                .await
                .context("purge failed")?;
            println!("removed {removed} record(s) from {collection}");
        }
        Command::Context { session, clear } => {
            // Context access needs no language model.
            let orchestrator = Orchestrator::new(config, Arc::new(NoClassifier), None, None)
                .context("failed to initialize orchestrator")?;
            if clear {
                let cleared = orchestrator.clear_session_context(&session)?;
                println!("{}", serde_json::json!({ "cleared": cleared }));
            } else {
                match orchestrator.session_context(&session)? {
                    Some(context) => println!("{}", serde_json::to_string_pretty(&context)?),
                    None => println!("no context for session {session}"),
                }
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RosterConfig> {
    let cwd = std::env::current_dir().context("cwd")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = path {
        info!("loading config with runtime layer: {}", path.display());
        options = options.with_runtime_path(path);
    }
    let layered = RosterConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

/// Classifier for subcommands that never classify.
struct NoClassifier;

#[async_trait::async_trait]
impl roster_rs::core::IntentClassifier for NoClassifier {
    async fn classify(
        &self,
        _prompt: &str,
        _context: &serde_json::Value,
    ) -> Vec<roster_rs::protocol::Intent> {
        vec![roster_rs::protocol::Intent::error("classification is not available here")]
    }
}
