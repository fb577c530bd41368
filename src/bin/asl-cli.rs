//! ASL CLI - Command-line interface for the ASL runtime
//!
//! Provides subcommands for validating state machine definitions and running
//! single executions.

use anyhow::{Context, Result};
use asl_runtime::{ExecutionStatus, Runtime, RuntimeConfig, StateMachine};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "asl")]
#[command(about = "Execution runtime for Amazon States Language workflows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a definition loads
    Validate {
        /// Path to the state machine definition
        definition: PathBuf,
    },

    /// Run one execution to completion
    Run {
        /// Path to the state machine definition
        definition: PathBuf,

        /// Execution input as JSON
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Runtime configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory receiving the execution history
        #[arg(long)]
        history_root: Option<PathBuf>,
    },
}

fn load_definition(path: &Path) -> Result<StateMachine> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definition: {:?}", path))?;
    StateMachine::from_json(&source).with_context(|| format!("Invalid definition: {:?}", path))
}

fn load_config(path: Option<&Path>, history_root: Option<PathBuf>) -> Result<RuntimeConfig> {
    let mut config = match path {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    if history_root.is_some() {
        config.history_root = history_root;
    }
    Ok(config)
}

fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { definition } => {
            init_tracing(false);
            let machine = load_definition(&definition)?;
            println!(
                "Definition is valid: {} states, starting at '{}'",
                machine.states().count(),
                machine.start_at()
            );
        }

        Commands::Run {
            definition,
            input,
            config,
            history_root,
        } => {
            let config = load_config(config.as_deref(), history_root)?;
            init_tracing(config.debug);

            let machine = Arc::new(load_definition(&definition)?);
            let input: Value =
                serde_json::from_str(&input).context("Execution input is not valid JSON")?;

            let runtime = Runtime::new(config)?;
            let handle = runtime.start_execution(machine, input);
            let stop = handle.stop_handle();
            let execution_id = handle.id().clone();

            // Ctrl-C aborts the execution instead of killing the process
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop.stop();
                }
            });

            let report = handle.join().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if let Some(storage) = runtime.storage() {
                eprintln!("History: {:?}", storage.history_path(&execution_id));
            }
            if report.status != ExecutionStatus::Succeeded {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
