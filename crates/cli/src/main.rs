//! Switchyard CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway (with background ingestion)
//! - `chat`: Interactive chat or single-message mode
//! - `ingest`: Crawl and index the help center once
//! - `status`: Show configuration and knowledge base state
//! - `config`: Show, validate or initialize configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switchyard_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "switchyard",
    about = "Switchyard — multi-agent customer support chat",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Use this config file instead of ~/.switchyard/config.toml
    #[arg(short, long, global = true, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the agents
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        #[arg(long, default_value = "cli_user")]
        user: String,

        /// Conversation to continue (a new one is started if omitted)
        #[arg(long)]
        conversation: Option<String>,

        /// Do not index the help center before answering
        #[arg(long)]
        skip_ingest: bool,

        /// Print the routing decision and sources with each answer
        #[arg(long)]
        trace: bool,
    },

    /// Crawl the help center and update the vector index
    Ingest {
        /// Override the crawl root URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Show system status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref());
    init_tracing(&cli, config.as_ref().ok());

    match cli.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config?),
            ConfigAction::Validate => commands::config_cmd::validate(config),
            ConfigAction::Path => commands::config_cmd::path(cli.config.as_deref()),
            ConfigAction::Init => commands::config_cmd::init(cli.config.as_deref()),
        },
        Commands::Serve { port } => commands::serve::run(config?, port).await,
        Commands::Chat {
            message,
            user,
            conversation,
            skip_ingest,
            trace,
        } => {
            let options = commands::chat::ChatOptions {
                user,
                conversation,
                skip_ingest,
                trace,
            };
            commands::chat::run(config?, message, options).await
        }
        Commands::Ingest { url } => commands::ingest::run(config?, url).await,
        Commands::Status => commands::status::run(config?).await,
    }
}

/// `--verbose` wins, then `RUST_LOG`, then `logging.level` from the config.
fn init_tracing(cli: &Cli, config: Option<&AppConfig>) {
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|| "info".to_string())
    };
    let env_filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new(level)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
    };

    let json = cli.json_logs || config.is_some_and(|c| c.logging.json);
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}
