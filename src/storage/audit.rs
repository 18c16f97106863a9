//! Job-run audit trail.

use crate::convert::{format_ts, parse_ts};
use crate::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "success" => Ok(JobStatus::Success),
            "error" => Ok(JobStatus::Error),
            other => Err(EtlError::Config(format!("unknown job status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobRunId(pub i64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRun {
    pub id: i64,
    pub job_name: String,
    pub scheduled_for: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub stats: Value,
    pub error: Option<String>,
}

/// Open a run, optimistically marked `success`. Committed immediately, outside any page
/// transaction.
pub fn start(
    conn: &Connection,
    job_name: &str,
    scheduled_for: Option<DateTime<Utc>>,
) -> Result<JobRunId> {
    let started_at = Utc::now();
    let scheduled_for = scheduled_for.unwrap_or(started_at);
    conn.execute(
        "INSERT INTO job_runs (job_name, scheduled_for, started_at, status, stats)
         VALUES (?1, ?2, ?3, ?4, '{}')",
        params![
            job_name,
            format_ts(&scheduled_for),
            format_ts(&started_at),
            JobStatus::Success.as_str(),
        ],
    )?;
    Ok(JobRunId(conn.last_insert_rowid()))
}

/// Record the outcome. Only the first call for a run has any effect.
pub fn finish(
    conn: &Connection,
    id: JobRunId,
    status: JobStatus,
    stats: &Value,
    error: Option<&str>,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE job_runs SET finished_at = ?2, status = ?3, stats = ?4, error = ?5
         WHERE id = ?1 AND finished_at IS NULL",
        params![
            id.0,
            format_ts(&Utc::now()),
            status.as_str(),
            stats.to_string(),
            error,
        ],
    )?;
    Ok(updated == 1)
}

pub fn get(conn: &Connection, id: JobRunId) -> Result<Option<JobRun>> {
    let run = conn
        .query_row(
            "SELECT id, job_name, scheduled_for, started_at, finished_at, status, stats, error
             FROM job_runs WHERE id = ?1",
            params![id.0],
            from_row,
        )
        .optional()?;
    Ok(run)
}

pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<JobRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, job_name, scheduled_for, started_at, finished_at, status, stats, error
         FROM job_runs ORDER BY id DESC LIMIT ?1",
    )?;
    let runs = stmt
        .query_map(params![limit], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(runs)
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<JobRun> {
    let ts = |raw: String| parse_ts(&raw).unwrap_or_default();
    let finished_at: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let stats: String = row.get(6)?;
    Ok(JobRun {
        id: row.get(0)?,
        job_name: row.get(1)?,
        scheduled_for: ts(row.get(2)?),
        started_at: ts(row.get(3)?),
        finished_at: finished_at.map(ts),
        status: status.parse().unwrap_or(JobStatus::Error),
        stats: serde_json::from_str(&stats).unwrap_or(Value::Null),
        error: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use serde_json::json;

    #[test]
    fn test_start_defaults_schedule_to_start_time() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = start(store.connection(), "wallet_tx_hourly", None).unwrap();

        let run = get(store.connection(), id).unwrap().unwrap();
        assert_eq!(run.job_name, "wallet_tx_hourly");
        assert_eq!(run.status, JobStatus::Success);
        assert_eq!(run.scheduled_for, run.started_at);
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_finish_only_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let bucket = parse_ts("2025-09-16T12:00:00Z").unwrap();
        let id = start(store.connection(), "holders_6h", Some(bucket)).unwrap();

        let first = finish(
            store.connection(),
            id,
            JobStatus::Error,
            &json!({"rows": 3}),
            Some("boom"),
        )
        .unwrap();
        let second = finish(store.connection(), id, JobStatus::Success, &json!({}), None).unwrap();

        assert!(first);
        assert!(!second);
        let run = get(store.connection(), id).unwrap().unwrap();
        assert_eq!(run.scheduled_for, bucket);
        assert_eq!(run.status, JobStatus::Error);
        assert_eq!(run.stats, json!({"rows": 3}));
        assert_eq!(run.error.as_deref(), Some("boom"));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_recent_is_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        for name in ["a", "b", "c"] {
            start(store.connection(), name, None).unwrap();
        }
        let names: Vec<_> = recent(store.connection(), 2)
            .unwrap()
            .into_iter()
            .map(|r| r.job_name)
            .collect();
        assert_eq!(names, vec!["c", "b"]);
    }
}
