use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use merlin_ingest::app::ports::{Clock, SystemClock};
use merlin_ingest::config::Config;
use merlin_ingest::constants::{
    DEFAULT_PAGE_SIZE, DEFAULT_TOKEN_DECIMALS, HOLDERS_MAX_PAGES, WALLET_TX_MAX_PAGES,
};
use merlin_ingest::infra::http_client::ReqwestHttp;
use merlin_ingest::jobs::{self, HoldersRequest, WalletTransfersRequest};
use merlin_ingest::logging::init_logging;
use merlin_ingest::metrics::init_metrics;
use merlin_ingest::pipeline::ingestion::{RateLimiter, ResilientClient, RetryPolicy};
use merlin_ingest::storage::SqliteStore;
use merlin_ingest::types::Closest;

#[derive(Parser)]
#[command(name = "merlin_ingest")]
#[command(about = "MerlinScan explorer ingestion into SQLite")]
#[command(version)]
struct Cli {
    /// Optional TOML file with HTTP tunables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the block closest to a unix timestamp
    BlockByTime {
        #[arg(long)]
        unix_ts: i64,
        #[arg(long, value_enum, default_value_t = Closest::After)]
        closest: Closest,
    },
    /// Snapshot the holder list of a token into a 6-hour bucket
    HoldersSnapshot {
        /// Token contract address
        #[arg(long)]
        token: String,
        /// Bucket start, e.g. 2025-09-16T12:00:00Z. Defaults to the current bucket
        #[arg(long)]
        bucket_start_utc: Option<DateTime<Utc>>,
        /// Human-friendly bucket id, e.g. 2025/09/16-12:00
        #[arg(long)]
        trigger_id: Option<String>,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
        #[arg(long, default_value_t = HOLDERS_MAX_PAGES)]
        max_pages: u32,
        #[arg(long, default_value_t = DEFAULT_TOKEN_DECIMALS)]
        default_decimals: u32,
    },
    /// Ingest token transfers of a wallet, resuming from the stored cursor
    WalletTokentx {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        token: String,
        #[arg(long, default_value_t = 0)]
        startblock: u64,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
        #[arg(long, default_value_t = WALLET_TX_MAX_PAGES)]
        max_pages: u32,
    },
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _guard = init_logging();
    init_metrics();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    info!(base_url = %config.base_url, qps = config.qps, "configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limiter = Arc::new(RateLimiter::from_qps(
        config.qps,
        config.http.min_qps,
        clock.clone(),
    ));
    let transport = ReqwestHttp::new(config.http.timeout())?;
    let api = ResilientClient::new(
        config.base_url.clone(),
        config.api_key.clone(),
        Box::new(transport),
        limiter,
        clock,
        RetryPolicy::from(&config.http),
    );
    let mut store = SqliteStore::open(&config.database_url)
        .with_context(|| format!("opening database {}", config.database_url))?;

    let out = match cli.command {
        Commands::BlockByTime { unix_ts, closest } => {
            jobs::block_by_time(&api, &mut store, unix_ts, closest)?
        }
        Commands::HoldersSnapshot {
            token,
            bucket_start_utc,
            trigger_id,
            page_size,
            max_pages,
            default_decimals,
        } => {
            let req = HoldersRequest {
                token,
                bucket_start_utc,
                trigger_id,
                page_size,
                max_pages,
                default_decimals,
            };
            jobs::holders_snapshot(&api, &mut store, req)?
        }
        Commands::WalletTokentx {
            wallet,
            token,
            startblock,
            page_size,
            max_pages,
        } => {
            let req = WalletTransfersRequest {
                wallet,
                token,
                start_block: startblock,
                page_size,
                max_pages,
            };
            jobs::wallet_tokentx(&api, &mut store, req)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
