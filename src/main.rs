mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod services;
mod workflow;

use std::io;

use clap::{Args, Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cmd::call::{self, CallCommandArgs};
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::error::AppResult;

const LOG_ENV_VAR: &str = "BUGBRIDGE_LOG";

#[derive(Parser)]
#[command(
    name = "bugbridge",
    author,
    version,
    about = "Bridge a fixed catalog of issue operations onto a Bugzilla REST API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available operations and their input schemas as JSON.
    Operations,
    /// Invoke one operation and print its JSON result.
    Call(CallArgs),
    /// Show the resolved configuration (API key masked).
    Config,
}

#[derive(Args)]
struct CallArgs {
    /// Operation name, e.g. search_issues or create_issue.
    operation: String,
    /// Arguments as a JSON object, or '-' to read them from stdin.
    #[arg(short, long)]
    args: Option<String>,
}

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if let Err(err) = dotenv {
        if !err.not_found() {
            warn!(error = %err, "ignoring unreadable .env file");
        }
    }

    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            eprintln!("Error: {error}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Returns whether the command succeeded.
async fn run() -> AppResult<bool> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Operations => {
            cmd::operations::run()?;
            Ok(true)
        }
        Commands::Config => {
            let config = AppConfig::load()?;
            cmd::config::run(&config)?;
            Ok(true)
        }
        Commands::Call(args) => run_call(args).await,
    }
}

async fn run_call(args: CallArgs) -> AppResult<bool> {
    let config = AppConfig::load()?;
    let context = AppContext::connect(config)?;

    let response = call::run(
        &context,
        CallCommandArgs {
            operation: args.operation,
            arguments: args.args,
        },
    )
    .await;

    let stdout = io::stdout().lock();
    serde_json::to_writer_pretty(stdout, &response).map_err(io::Error::from)?;
    println!();

    Ok(response.ok)
}
