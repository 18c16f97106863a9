use anyhow::Context;
use clap::Parser;
use serde_json::json;

use merlin_ingest::constants::ENV_DATABASE_URL;
use merlin_ingest::storage::SqliteStore;

/// Print every ingestion cursor and the most recent job runs as JSON.
#[derive(Parser)]
#[command(name = "show-progress")]
struct Args {
    /// Database to inspect; defaults to DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    /// Number of job runs to show
    #[arg(long, default_value_t = 20)]
    runs: u32,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let database_url = match args.database_url {
        Some(url) => url,
        None => std::env::var(ENV_DATABASE_URL)
            .with_context(|| format!("{} is not set", ENV_DATABASE_URL))?,
    };
    let store = SqliteStore::open(&database_url)?;

    let out = json!({
        "cursors": store.cursors()?,
        "job_runs": store.recent_job_runs(args.runs)?,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
