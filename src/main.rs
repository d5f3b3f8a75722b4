mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jiyi::config::JiyiConfig;

#[derive(Parser)]
#[command(name = "jiyi", version, about = "Spaced-repetition review for captured Chinese phrases")]
struct Cli {
    /// Use the device collection even when a cloud session is configured
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Memorize a phrase
    Add {
        text: String,
        /// Where the phrase came from
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        translation: Option<String>,
    },
    /// List items due for review
    Due,
    /// List the whole collection
    List,
    /// Record a review result for one item
    Review {
        id: String,
        /// Mark the item as forgotten instead of remembered
        #[arg(long)]
        forgot: bool,
    },
    /// Walk through due items interactively
    Study,
    /// Show collection statistics
    Stats,
    /// Move device items into the signed-in cloud account
    Migrate {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Print a JSON backup of the device collection
    Export,
    /// Restore the device collection from a JSON backup (overwrites it)
    Import {
        file: PathBuf,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = JiyiConfig::load()?;

    // Log to stderr so stdout stays clean for exported JSON.
    let filter = EnvFilter::try_new(&config.logging.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let session = cli::open_session(&config, cli.local).await?;

    match cli.command {
        Command::Add {
            text,
            context,
            translation,
        } => cli::add::add(&session, &text, context.as_deref(), translation.as_deref()).await?,
        Command::Due => cli::list::due(&session),
        Command::List => cli::list::list(&session),
        Command::Review { id, forgot } => cli::review::review(&session, &id, !forgot).await?,
        Command::Study => cli::review::study(&session).await?,
        Command::Stats => cli::stats::stats(&session),
        Command::Migrate { yes } => cli::migrate::migrate(&session, yes).await?,
        Command::Export => cli::backup::export(&session).await?,
        Command::Import { file, yes } => cli::backup::import(&session, &file, yes).await?,
    }

    Ok(())
}
