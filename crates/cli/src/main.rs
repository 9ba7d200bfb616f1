//! Slo CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  Write a default config to ~/.slo/config.toml
//! - `agent`    Interactive chat or single-message mode
//! - `status`   Show configuration and storage status

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "slo",
    about = "Slo: study planning assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Chat with the study agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Act as this user id
        #[arg(short, long, default_value_t = 1, env = "SLO_USER_ID")]
        user: i64,

        /// Let the agent perform more than the confirmation threshold of writes
        #[arg(long)]
        no_confirm: bool,

        /// Print the tool-call trace after each reply
        #[arg(long)]
        trace: bool,
    },

    /// Show configuration and storage status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Agent {
            message,
            user,
            no_confirm,
            trace,
        } => {
            let options = commands::agent::AgentOptions {
                user_id: user,
                confirm_writes: !no_confirm,
                show_trace: trace,
            };
            commands::agent::run(message, options).await?
        }
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
