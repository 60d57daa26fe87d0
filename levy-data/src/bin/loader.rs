use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use levy_data::LevyRateLoader;
use levy_db_sqlite::SqliteRepository;

/// Load a levy rate table from a CSV file into the database.
///
/// The CSV file should have the following columns:
/// - name: levy display name (existing levies are matched by name)
/// - category: flat_levy or vat
/// - rate: percentage out of 100 (e.g., 2.5)
/// - calculation_order: ascending; VAT conventionally last
/// - effective_date: YYYY-MM-DD, may be empty
///
/// New levies are created active. A different rate for an existing levy is
/// recorded as a proposal by `--submitted-by` and needs checker approval.
#[derive(Parser, Debug)]
#[command(name = "levy-data-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing levy rates
    #[arg(short, long)]
    file: PathBuf,

    /// Maker recorded on rate changes proposed by this load
    #[arg(long)]
    submitted_by: String,

    /// SQLite database path or URL; created if missing
    #[arg(short, long, default_value = "levies.db")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,

    /// Seed an empty database from the specified directory after migrations
    #[arg(short, long)]
    seeds: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    if let Some(seeds_dir) = &args.seeds {
        println!("Running seeds from: {}", seeds_dir.display());
        let applied = repo
            .run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
        println!("Seeds complete ({} files applied).", applied);
    }

    println!("Loading levy rates from: {}", args.file.display());

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open: {}", args.file.display()))?;

    let records = LevyRateLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", args.file.display()))?;

    println!("Parsed {} records from CSV", records.len());

    let outcomes = LevyRateLoader::load(&repo, &records, &args.submitted_by)
        .await
        .context("Failed to load levy rates into database")?;

    println!("Loaded {} levy rates:", outcomes.len());
    for (action, count) in LevyRateLoader::summarize(&outcomes) {
        println!("  {}: {}", action.as_str(), count);
    }

    Ok(())
}
