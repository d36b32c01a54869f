use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gleaner_core::ArticleStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod fixture;

#[derive(Parser)]
#[command(name = "gleaner")]
#[command(version)]
#[command(about = "Incremental harvester for paginated article lists")]
struct Cli {
    /// Store file path (defaults to ~/.gleaner/collected_articles.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect articles from a scripted source fixture
    Run {
        /// JSON fixture describing the scripted source
        #[arg(long)]
        fixture: PathBuf,
        /// Skip records published before this date (YYYY-MM-DD)
        #[arg(long)]
        cutoff: Option<NaiveDate>,
        /// Timing configuration file (defaults to ~/.gleaner/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the stored account label and record count
    Status,
    /// Export stored records as CSV
    Export {
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Delete all stored records
    Clear {
        /// Confirm destruction of the stored data
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gleaner_core=info,gleaner_cli=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let store = open_store(cli.store)?;

    match cli.command {
        Commands::Run {
            fixture,
            cutoff,
            config,
        } => commands::run::execute(store, &fixture, cutoff, config).await,
        Commands::Status => commands::status::execute(&store),
        Commands::Export { out } => commands::export::execute(&store, &out),
        Commands::Clear { yes } => commands::clear::execute(&store, yes),
    }
}

fn open_store(path: Option<PathBuf>) -> Result<ArticleStore> {
    match path {
        Some(path) => Ok(ArticleStore::new(path)),
        None => ArticleStore::default_location().map_err(Into::into),
    }
}
