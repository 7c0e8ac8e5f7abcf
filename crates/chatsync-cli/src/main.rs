use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod commands;

use bootstrap::{AppBootstrap, BootstrapOptions};

#[derive(Parser)]
#[command(name = "chatsync")]
#[command(about = "chatsync - conversation client for remote chat backends", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/chatsync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding stored conversations
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Treat the host as offline: sends fail fast without touching the network
    #[arg(long, global = true)]
    offline: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the chat backend is reachable
    Health,
    /// Send a message and wait for the reply
    Send {
        /// Conversation id, or "new" to start one
        #[arg(short, long, default_value = "new")]
        conversation: String,
        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Re-request the reply to the last unanswered message
    Retry {
        conversation: String,
    },
    /// Print a conversation
    Show {
        conversation: String,
        /// Keep printing as the conversation changes
        #[arg(short, long)]
        follow: bool,
    },
    /// List conversations
    List {
        /// Include archived conversations
        #[arg(long)]
        archived: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Rename a conversation
    Rename {
        conversation: String,
        title: String,
    },
    /// Pin a conversation to the top of the list
    Pin {
        conversation: String,
        /// Unpin instead
        #[arg(long)]
        off: bool,
    },
    /// Archive a conversation
    Archive {
        conversation: String,
        /// Unarchive instead
        #[arg(long)]
        off: bool,
    },
    /// Delete a conversation
    Delete {
        conversation: String,
    },
    /// Rate an assistant reply
    Feedback {
        conversation: String,
        message: String,
        #[arg(value_enum)]
        score: Score,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Score {
    Up,
    Down,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "chatsync=debug" } else { "chatsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let app = AppBootstrap::new(BootstrapOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
        offline: cli.offline,
    })?;

    match cli.command {
        Commands::Health => commands::health::run(&app).await?,
        Commands::Send { conversation, text } => {
            commands::conversation::send(&app, &conversation, &text.join(" ")).await?
        }
        Commands::Retry { conversation } => commands::health::retry(&app, &conversation).await?,
        Commands::Show {
            conversation,
            follow,
        } => commands::conversation::show(&app, &conversation, follow).await?,
        Commands::List { archived, json } => {
            commands::conversation::list(&app, archived, json).await?
        }
        Commands::Rename {
            conversation,
            title,
        } => commands::conversation::rename(&app, &conversation, &title).await?,
        Commands::Pin { conversation, off } => {
            commands::conversation::pin(&app, &conversation, !off).await?
        }
        Commands::Archive { conversation, off } => {
            commands::conversation::archive(&app, &conversation, !off).await?
        }
        Commands::Delete { conversation } => {
            commands::conversation::delete(&app, &conversation).await?
        }
        Commands::Feedback {
            conversation,
            message,
            score,
        } => {
            let score = match score {
                Score::Up => chatsync_core::feedback::FeedbackScore::Positive,
                Score::Down => chatsync_core::feedback::FeedbackScore::Negative,
            };
            commands::feedback::rate(&app, &conversation, &message, score).await?
        }
    }

    Ok(())
}
