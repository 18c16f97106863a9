//! SQLite persistence: entity sink, ingestion cursors and the job-run audit.

pub mod audit;
pub mod cursor;
pub mod sink;

pub use audit::{JobRun, JobRunId, JobStatus};
pub use cursor::{Cursor, CursorAdvance};
pub use sink::{ConflictPolicy, Merge, Record};

use crate::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_runs (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    job_name       TEXT NOT NULL,
    scheduled_for  TEXT NOT NULL,
    started_at     TEXT NOT NULL,
    finished_at    TEXT,
    status         TEXT NOT NULL,
    stats          TEXT NOT NULL DEFAULT '{}',
    error          TEXT
);
CREATE INDEX IF NOT EXISTS job_runs_name_started ON job_runs (job_name, started_at);

CREATE TABLE IF NOT EXISTS ingestion_cursors (
    stream              TEXT PRIMARY KEY,
    last_scanned_block  INTEGER,
    last_page           INTEGER,
    metadata            TEXT NOT NULL DEFAULT '{}',
    updated_at_utc      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS block_check (
    unix_ts       INTEGER NOT NULL,
    ts_utc        TEXT NOT NULL,
    closest       TEXT NOT NULL,
    block_number  INTEGER,
    api_status    TEXT,
    api_message   TEXT,
    inserted_at   TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS block_check_key ON block_check (unix_ts, closest);

CREATE TABLE IF NOT EXISTS holders_raw (
    trigger_id        TEXT NOT NULL,
    bucket_start_utc  TEXT NOT NULL,
    contract_address  TEXT NOT NULL,
    holder_address    TEXT NOT NULL,
    token_decimal     INTEGER NOT NULL,
    quantity_raw      TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS holders_raw_key
    ON holders_raw (bucket_start_utc, contract_address, holder_address);

CREATE TABLE IF NOT EXISTS wallet_transactions (
    wallet_address       TEXT NOT NULL,
    wallet_name          TEXT,
    wallet_tag           TEXT,
    contract_address     TEXT NOT NULL,
    block_number         INTEGER NOT NULL,
    block_time_unix      INTEGER NOT NULL,
    block_time_utc       TEXT NOT NULL,
    tx_hash              TEXT NOT NULL,
    nonce                INTEGER,
    block_hash           TEXT,
    from_address         TEXT NOT NULL,
    to_address           TEXT NOT NULL,
    value_raw            TEXT NOT NULL,
    token_name           TEXT,
    token_symbol         TEXT,
    token_decimal        INTEGER NOT NULL,
    transaction_index    INTEGER NOT NULL DEFAULT 0,
    gas                  INTEGER,
    gas_price            INTEGER,
    gas_used             INTEGER,
    cumulative_gas_used  INTEGER,
    input                TEXT,
    confirmations        INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS wallet_transactions_key
    ON wallet_transactions
       (tx_hash, contract_address, wallet_address, value_raw, transaction_index);
CREATE INDEX IF NOT EXISTS wallet_transactions_block
    ON wallet_transactions (wallet_address, contract_address, block_number);
"#;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a store from a file path, a `sqlite://` URL or `:memory:`, creating the schema.
    pub fn open(database_url: &str) -> Result<Self> {
        let target = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        if target.starts_with("postgres://") || target.starts_with("postgresql://") {
            return Err(EtlError::Config(
                "only SQLite databases are supported (file path, sqlite:// URL or :memory:)".into(),
            ));
        }
        if target.is_empty() || target == ":memory:" {
            return Self::open_in_memory();
        }

        if let Some(parent) = Path::new(target).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(target)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!(path = target, "opened SQLite store");
        Self::with_schema(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        debug!("schema ready");
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start the transaction that holds one page's rows and its cursor advance.
    pub fn begin_page(&mut self) -> Result<PageTx<'_>> {
        Ok(PageTx {
            tx: self.conn.transaction()?,
        })
    }

    pub fn cursor(&self, stream: &str) -> Result<Option<Cursor>> {
        cursor::load(&self.conn, stream)
    }

    pub fn cursors(&self) -> Result<Vec<Cursor>> {
        cursor::load_all(&self.conn)
    }

    pub fn start_job(
        &self,
        job_name: &str,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<JobRunId> {
        audit::start(&self.conn, job_name, scheduled_for)
    }

    pub fn finish_job(
        &self,
        id: JobRunId,
        status: JobStatus,
        stats: &Value,
        error: Option<&str>,
    ) -> Result<bool> {
        audit::finish(&self.conn, id, status, stats, error)
    }

    pub fn job_run(&self, id: JobRunId) -> Result<Option<JobRun>> {
        audit::get(&self.conn, id)
    }

    pub fn recent_job_runs(&self, limit: u32) -> Result<Vec<JobRun>> {
        audit::recent(&self.conn, limit)
    }

    pub fn count_rows<R: Record>(&self) -> Result<u64> {
        sink::count::<R>(&self.conn)
    }
}

/// One page's unit of work. Dropping it without `commit` rolls everything back.
pub struct PageTx<'a> {
    tx: Transaction<'a>,
}

impl PageTx<'_> {
    pub fn upsert<R: Record>(&self, rows: &[R]) -> Result<usize> {
        sink::upsert(&self.tx, rows)
    }

    pub fn advance_cursor(&self, stream: &str, advance: CursorAdvance) -> Result<Cursor> {
        cursor::advance(&self.tx, stream, advance)
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}
