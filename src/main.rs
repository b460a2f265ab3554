//! # Umesao CLI (`ume`)
//!
//! ```bash
//! ume --config ./config/ume.toml <command>
//! ```
//!
//! Secrets (`OPENAI_KEY`, `AZURE_ENDPOINT`, `AZURE_KEY`, `MISTRAL_KEY`,
//! `MINIO_USER`, `MINIO_PASSWORD`) are read from the environment or from a
//! `.env` file in the working directory.

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use umesao::{chunk_cmd, config, delete, edit, lookup, migrate, show, stats, upload};
use umesao_core::models::CardId;

/// Umesao: a searchable archive of photographed note cards.
#[derive(Parser)]
#[command(
    name = "ume",
    about = "Photograph note cards, extract their text, and look them up again by meaning",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ume.toml")]
    config: PathBuf,

    /// Increase log verbosity on stderr (-v info, -vv debug). `RUST_LOG`
    /// takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema. Safe to run repeatedly.
    Init,

    /// Upload a card photo: extract text, store markdown, index chunks.
    Upload {
        /// Image file.
        image: PathBuf,

        /// Extraction method: `ocr` (Azure Read), `mistral`, or `vision`.
        /// Defaults to `extraction.default_method`.
        #[arg(long)]
        method: Option<String>,

        /// OCR language hint, e.g. `ja` or `en`.
        #[arg(long)]
        language: Option<String>,
    },

    /// Edit a card's latest markdown, creating a new version if it changed.
    Edit {
        card: CardId,

        /// Take the edited markdown from this file instead of an editor.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Find the cards closest in meaning to a query.
    Lookup {
        query: String,

        /// Number of results to consider (overrides `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,

        /// `chunk-first` or `card-best` (overrides `retrieval.policy`).
        #[arg(long)]
        policy: Option<String>,
    },

    /// Delete a card with all of its versions, chunks, and blobs.
    Delete {
        card: CardId,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Print a card's markdown and image location.
    Show {
        card: CardId,

        /// Version to show; latest when omitted.
        #[arg(long)]
        version: Option<i64>,

        /// Translate the markdown into this language before printing.
        #[arg(long)]
        lang: Option<String>,
    },

    /// Save a card's markdown to a file.
    Download {
        card: CardId,

        /// Version to save; latest when omitted.
        #[arg(long)]
        version: Option<i64>,

        /// Output path; defaults to `{card}_{version}.md`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract and chunk an image without storing anything.
    DryRun {
        image: PathBuf,

        #[arg(long)]
        method: Option<String>,
    },

    /// Show how a markdown or text file would be chunked.
    Chunk {
        file: PathBuf,

        /// `structural` (default) or `flat`.
        #[arg(long)]
        method: Option<String>,
    },

    /// Show card, version, and chunk counts.
    Stats,

    /// Print a shell completion script.
    Completions { shell: Shell },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();
    init_tracing(cli.verbose);

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "ume", &mut io::stdout());
            return Ok(());
        }
        Commands::Chunk { file, method } => {
            return chunk_cmd::run_chunk(file, method.as_deref());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload {
            image,
            method,
            language,
        } => {
            upload::run_upload(&cfg, &image, method.as_deref(), language.as_deref()).await?;
        }
        Commands::Edit { card, file } => {
            edit::run_edit(&cfg, card, file.as_deref()).await?;
        }
        Commands::Lookup {
            query,
            limit,
            policy,
        } => {
            lookup::run_lookup(&cfg, &query, limit, policy.as_deref()).await?;
        }
        Commands::Delete { card, yes } => {
            delete::run_delete(&cfg, card, yes).await?;
        }
        Commands::Show {
            card,
            version,
            lang,
        } => {
            show::run_show(&cfg, card, version, lang.as_deref()).await?;
        }
        Commands::Download {
            card,
            version,
            output,
        } => {
            show::run_download(&cfg, card, version, output.as_deref()).await?;
        }
        Commands::DryRun { image, method } => {
            upload::run_dry_run(&cfg, &image, method.as_deref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Completions { .. } | Commands::Chunk { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
