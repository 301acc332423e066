//! Second CLI: the main entry point.
//!
//! Commands:
//! - `run`: Start the Telegram bot
//! - `ask`: Send one message through the pipeline, no transport
//! - `status`: Probe dependencies and print the composite health
//! - `config`: Print the resolved configuration (secrets redacted)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod wiring;

#[derive(Parser)]
#[command(
    name = "second",
    about = "Second — a local-first assistant with retrieval-augmented memory",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ~/.second/config.toml)
    #[arg(short, long, global = true, env = "SECOND_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (long polling until Ctrl-C)
    Run,

    /// Send a single message through the pipeline and print the reply
    Ask {
        /// The message text
        #[arg(short, long)]
        message: String,

        /// Conversation to use for history
        #[arg(long, default_value = "local")]
        chat: String,
    },

    /// Probe Ollama, Watcher and LOR
    Status,

    /// Show the resolved configuration
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run => commands::run::run(config_path).await?,
        Commands::Ask { message, chat } => commands::ask::run(config_path, &message, &chat).await?,
        Commands::Status => commands::status::run(config_path).await?,
        Commands::Config { default } => commands::config_cmd::show(config_path, default)?,
    }

    Ok(())
}
