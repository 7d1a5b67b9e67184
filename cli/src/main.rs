use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::{
    admin::AdminCommands, auth::AuthCommands, letter::LetterCommands, queue::QueueCommands,
};

#[derive(Parser)]
#[command(
    name = "warmline",
    version,
    about = "Warmline staff CLI for mailbox intake, queue triage, and admin tasks"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "WARMLINE_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Print responses as compact single-line JSON (for scripting)
    #[arg(long, global = true)]
    raw: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Session management
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Letter operations: intake, lookup, responding
    Letter {
        #[command(subcommand)]
        command: LetterCommands,
    },
    /// Volunteer and admin triage queues
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Administration: accounts, roles, letter removal
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url, cli.raw).await,
        Commands::Auth { command } => commands::auth::run(&cli.api_url, command).await,
        Commands::Letter { command } => commands::letter::run(&cli.api_url, cli.raw, command).await,
        Commands::Queue { command } => commands::queue::run(&cli.api_url, cli.raw, command).await,
        Commands::Admin { command } => commands::admin::run(&cli.api_url, cli.raw, command).await,
    };

    std::process::exit(exit_code);
}
