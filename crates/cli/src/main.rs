mod commands;

use std::path::PathBuf;

use anyhow::Result;
use autocull_core::Library;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

/// autocull: photo quality scoring and near-duplicate grouping
#[derive(Parser)]
#[command(name = "autocull", version, about)]
struct Cli {
    /// Path to the catalog database
    #[arg(long, default_value_t = default_catalog_path())]
    catalog: String,

    /// Log per-photo and per-cluster decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage collections
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// List collections with photo and group counts
    Collections,
    /// Import and score every photo under a folder
    Import {
        /// Collection name
        collection: String,
        /// Folder to scan recursively
        folder: PathBuf,
    },
    /// Group near-duplicate photos of a collection
    Duplicates {
        /// Collection name
        collection: String,
        /// Hamming distance threshold (bits of 64)
        #[arg(long)]
        threshold: Option<u32>,
        /// Method label stored on created groups
        #[arg(long)]
        method: Option<String>,
    },
    /// List the duplicate groups of a collection
    Groups {
        /// Collection name
        collection: String,
    },
    /// Show details of a specific duplicate group
    Group {
        /// Group ID
        id: i64,
    },
    /// Show photos grouped with a given photo
    Similar {
        /// Photo ID
        photo: i64,
    },
    /// Show the quality metrics of a photo
    Scores {
        /// Photo ID
        photo: i64,
    },
    /// Manage persistent settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Create a new collection
    Add {
        /// Collection name
        name: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Store a setting in the catalog
    Set {
        /// One of: near_dup_threshold, near_dup_method, min_cluster_size, chunk_size, time_budget_ms
        key: String,
        value: String,
    },
    /// Show every setting with its resolved value
    Show,
}

fn default_catalog_path() -> String {
    dirs_path().to_string_lossy().to_string()
}

fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".autocull").join("catalog.db")
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "warn,autocull_core=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let catalog_path = PathBuf::from(&cli.catalog);
    let library = Library::open(&catalog_path)?;

    match cli.command {
        Commands::Collection { action } => match action {
            CollectionAction::Add { name } => commands::collection::add(&library, &name)?,
        },
        Commands::Collections => commands::collections::run(&library)?,
        Commands::Import { collection, folder } => {
            commands::import::run(&library, &collection, &folder)?
        }
        Commands::Duplicates {
            collection,
            threshold,
            method,
        } => commands::duplicates::run(&library, &collection, threshold, method)?,
        Commands::Groups { collection } => commands::groups::run(&library, &collection)?,
        Commands::Group { id } => commands::group::run(&library, id)?,
        Commands::Similar { photo } => commands::similar::run(&library, photo)?,
        Commands::Scores { photo } => commands::scores::run(&library, photo)?,
        Commands::Config { action } => match action {
            ConfigAction::Set { key, value } => commands::config::set(&library, &key, &value)?,
            ConfigAction::Show => commands::config::show(&library)?,
        },
    }

    Ok(())
}
