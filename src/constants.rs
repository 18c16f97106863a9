/// Provider, job and default constants shared across the crate.

// Environment variables
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_API_KEY: &str = "MERLINSCAN_API_KEY";
pub const ENV_BASE_URL: &str = "MERLINSCAN_BASE_URL";
pub const ENV_RATE_LIMIT_QPS: &str = "ETL_RATE_LIMIT_QPS";
pub const ENV_LOG_DIR: &str = "ETL_LOG_DIR";
pub const ENV_METRICS_ADDR: &str = "ETL_METRICS_ADDR";

pub const DEFAULT_BASE_URL: &str = "https://scan.merlinchain.io/api";
pub const DEFAULT_QPS: f64 = 3.0;
pub const MIN_QPS: f64 = 0.1;

// Provider protocol
pub const API_KEY_PARAM: &str = "api_key";
pub const STATUS_OK: &str = "1";
pub const END_BLOCK: u64 = 99_999_999;

// Job names recorded in job_runs
pub const BLOCK_CHECK_JOB: &str = "block_check_hourly";
pub const HOLDERS_JOB: &str = "holders_6h";
pub const WALLET_TX_JOB: &str = "wallet_tx_hourly";

// Paging defaults
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const HOLDERS_MAX_PAGES: u32 = 10_000;
pub const WALLET_TX_MAX_PAGES: u32 = 100_000;
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;
