//! # bibfiles CLI
//!
//! Command-line interface for the bibfiles personal library manager.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;

use bibfiles_cas::BlobStore;
use bibfiles_config::StorageConfig;
use bibfiles_meta::{Catalog, JsonCatalog};
use bibfiles_migrate::{
    migrate_library_with, needs_migration, MigrateOptions, CONTENT_STORE_SCHEMA_VERSION,
};

/// Personal bibliographic library with a content-addressed file store
#[derive(Parser)]
#[command(name = "bibfiles")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Library root directory (defaults to the configured library)
    #[arg(long, value_name = "DIR", global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report schema version and blob store totals
    Status,

    /// Migrate the legacy per-record layout into the content-addressed store
    Migrate {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    bibfiles_config::logging::init_logging("warn");

    let cli = Cli::parse();
    let (library_root, catalog_path) =
        resolve_paths(cli.library, bibfiles_config::config().storage.clone());

    match cli.command {
        Commands::Status => cmd_status(&library_root, &catalog_path),
        Commands::Migrate { json } => cmd_migrate(&library_root, &catalog_path, json),
    }
}

/// Apply the `--library` override, then resolve the catalog file against
/// the effective root per the storage config.
fn resolve_paths(
    override_root: Option<PathBuf>,
    mut storage: StorageConfig,
) -> (PathBuf, PathBuf) {
    if let Some(dir) = override_root {
        storage.library_root = dir;
    }
    let catalog_path = storage.catalog_path();
    (storage.library_root, catalog_path)
}

fn cmd_status(library_root: &Path, catalog_path: &Path) -> Result<()> {
    let catalog = JsonCatalog::open(catalog_path)
        .with_context(|| format!("opening catalog {}", catalog_path.display()))?;
    let store = BlobStore::new(library_root)
        .with_context(|| format!("opening library {}", library_root.display()))?;
    let stats = store.stats()?;

    println!("Library:        {}", library_root.display());
    println!(
        "Schema version: {} (current: {})",
        catalog.schema_version()?,
        CONTENT_STORE_SCHEMA_VERSION
    );
    println!("Stored blobs:   {}", stats.blob_count);
    println!("Stored bytes:   {}", human_bytes(stats.total_bytes));
    println!("Shard dirs:     {}", stats.shard_dirs);

    if needs_migration(&catalog)? {
        println!(
            "{} legacy layout detected, run {}",
            style("!").yellow().bold(),
            style("bibfiles migrate").cyan()
        );
    } else {
        println!("{} content store up to date", style("✓").green().bold());
    }
    Ok(())
}

fn cmd_migrate(library_root: &Path, catalog_path: &Path, json: bool) -> Result<()> {
    let mut catalog = JsonCatalog::open(catalog_path)
        .with_context(|| format!("opening catalog {}", catalog_path.display()))?;

    let options = MigrateOptions {
        hash_buffer_size: bibfiles_config::config().migrate.hash_buffer_size,
    };
    let summary = migrate_library_with(&mut catalog, library_root, &options)
        .with_context(|| format!("migrating library {}", library_root.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "{} migrated, {} skipped",
        style(summary.migrated).green().bold(),
        style(summary.skipped).yellow()
    );
    if summary.errors.is_empty() {
        println!("{} no errors", style("✓").green().bold());
    } else {
        println!(
            "{} {} file(s) failed:",
            style("✗").red().bold(),
            summary.errors.len()
        );
        for err in &summary.errors {
            println!("  {err}");
        }
    }
    Ok(())
}

fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
