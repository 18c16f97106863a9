//! Generic page-by-page ingestion driver.
//!
//! Each page is fetched, transformed, upserted and the stream cursor advanced;
//! rows and cursor commit together or not at all.

use crate::app::ports::ExplorerApi;
use crate::error::{EtlError, Result};
use crate::metrics::IngestMetrics;
use crate::storage::{CursorAdvance, JobRunId, JobStatus, Record, SqliteStore};
use crate::types::{ApiParams, ApiResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

/// Why a paged run stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Provider reported a non-success status or returned no items.
    EndOfData,
    /// A page came back with fewer items than requested.
    ShortPage,
    /// `max_pages` pages were written.
    PageCeiling,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::EndOfData => "end_of_data",
            StopReason::ShortPage => "short_page",
            StopReason::PageCeiling => "page_ceiling",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub rows: usize,
    pub pages: u32,
    pub last_position: Option<u64>,
    pub last_page: Option<u32>,
    pub stop: Option<StopReason>,
    pub status: Option<String>,
    pub message: Option<String>,
}

impl IngestSummary {
    fn starting_at(position: Option<u64>) -> Self {
        Self {
            rows: 0,
            pages: 0,
            last_position: position,
            last_page: None,
            stop: None,
            status: None,
            message: None,
        }
    }

    fn observe(&mut self, resp: &ApiResponse) {
        self.status = resp.status.clone();
        self.message = resp.message.clone();
    }
}

/// One resumable, paged stream of provider items.
pub trait PagedSource {
    type Row: Record;

    fn job_name(&self) -> &'static str;

    /// Scheduled instant recorded on the job run; defaults to the start time.
    fn scheduled_for(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn stream_id(&self) -> String;

    /// Caller-supplied starting position, if the stream is positional.
    fn start_position(&self) -> Option<u64> {
        None
    }

    fn page_size(&self) -> u32;

    fn max_pages(&self) -> u32;

    /// Request for `page` (1-based). `anchor` is the position resolved at run start and stays
    /// fixed for the run; moving it while `page` advances would skip rows.
    fn page_params(&self, anchor: Option<u64>, page: u32) -> ApiParams;

    /// Provider items to rows. Items missing mandatory fields are left out.
    fn transform(&mut self, items: &[Value]) -> Vec<Self::Row>;

    fn row_position(_row: &Self::Row) -> Option<u64> {
        None
    }

    /// JSON stats stored on the job run and returned to the caller.
    fn report(&self, summary: &IngestSummary) -> Value;
}

/// `max(caller start, stored position)`; the stored value only applies when present.
pub fn resolve_start(caller: Option<u64>, stored: Option<u64>) -> Option<u64> {
    caller.max(stored)
}

pub struct PagedIngestor<'a> {
    api: &'a dyn ExplorerApi,
    store: &'a mut SqliteStore,
}

impl<'a> PagedIngestor<'a> {
    pub fn new(api: &'a dyn ExplorerApi, store: &'a mut SqliteStore) -> Self {
        Self { api, store }
    }

    #[instrument(skip_all, fields(job = source.job_name()))]
    pub fn run<S: PagedSource>(&mut self, source: &mut S) -> Result<Value> {
        let stream = source.stream_id();
        let stored = self.store.cursor(&stream)?;
        let anchor = resolve_start(
            source.start_position(),
            stored.as_ref().and_then(|c| c.last_scanned_position),
        );
        info!(
            stream = %stream,
            start = ?anchor,
            resumed = stored.is_some(),
            "starting paged ingestion"
        );

        let job = self.store.start_job(source.job_name(), source.scheduled_for())?;
        let mut summary = IngestSummary::starting_at(anchor);
        let outcome = self.pages(source, &stream, anchor, &mut summary);
        let stats = source.report(&summary);

        close_run(self.store, job, source.job_name(), &stats, outcome.as_ref().err())?;
        outcome.map(|()| stats)
    }

    fn pages<S: PagedSource>(
        &mut self,
        source: &mut S,
        stream: &str,
        anchor: Option<u64>,
        summary: &mut IngestSummary,
    ) -> Result<()> {
        let page_size = source.page_size();

        for page in 1..=source.max_pages() {
            let resp = self.api.fetch(&source.page_params(anchor, page))?;
            summary.observe(&resp);

            let Some(items) = resp.page_items() else {
                let tx = self.store.begin_page()?;
                tx.advance_cursor(
                    stream,
                    CursorAdvance {
                        position: summary.last_position,
                        page: Some(0),
                        metadata: resp.status_metadata(),
                    },
                )?;
                tx.commit()?;
                debug!(page, status = ?resp.status, message = ?resp.message, "end of data");
                summary.stop = Some(StopReason::EndOfData);
                return Ok(());
            };

            let rows = source.transform(items);
            let dropped = items.len().saturating_sub(rows.len());
            if dropped > 0 {
                debug!(page, dropped, "skipped items missing mandatory fields");
            }
            let position = rows
                .iter()
                .fold(summary.last_position, |pos, row| pos.max(S::row_position(row)));

            let tx = self.store.begin_page()?;
            tx.upsert(&rows)?;
            tx.advance_cursor(
                stream,
                CursorAdvance {
                    position,
                    page: Some(page),
                    metadata: resp.status_metadata(),
                },
            )?;
            tx.commit()?;

            // only committed pages move the reported position
            summary.last_position = position;
            summary.rows += rows.len();
            summary.pages += 1;
            summary.last_page = Some(page);
            IngestMetrics::page_written(rows.len(), dropped);
            info!(
                page,
                rows_added = rows.len(),
                total_rows = summary.rows,
                last_position = ?summary.last_position,
                "page written"
            );

            if items.len() < page_size as usize {
                summary.stop = Some(StopReason::ShortPage);
                return Ok(());
            }
        }

        warn!(
            max_pages = source.max_pages(),
            total_rows = summary.rows,
            "page ceiling reached, stopping"
        );
        summary.stop = Some(StopReason::PageCeiling);
        Ok(())
    }
}

/// Record the final state of a job run.
///
/// On failure the original error stays authoritative: a failed audit write is only logged.
pub(crate) fn close_run(
    store: &SqliteStore,
    job: JobRunId,
    job_name: &str,
    stats: &Value,
    failure: Option<&EtlError>,
) -> Result<()> {
    match failure {
        None => {
            store.finish_job(job, JobStatus::Success, stats, None)?;
            IngestMetrics::job_finished(JobStatus::Success.as_str());
            info!(job = job_name, stats = %stats, "job finished");
        }
        Some(err) => {
            error!(job = job_name, "job failed: {}", err);
            let message = err.to_string();
            if let Err(audit_err) =
                store.finish_job(job, JobStatus::Error, stats, Some(message.as_str()))
            {
                error!(job = job_name, "could not record job failure: {}", audit_err);
            }
            IngestMetrics::job_finished(JobStatus::Error.as_str());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_start_prefers_larger_known_position() {
        assert_eq!(resolve_start(Some(0), None), Some(0));
        assert_eq!(resolve_start(Some(0), Some(500)), Some(500));
        assert_eq!(resolve_start(Some(1000), Some(500)), Some(1000));
        assert_eq!(resolve_start(None, None), None);
    }

    #[test]
    fn test_stop_reason_wire_names() {
        assert_eq!(StopReason::PageCeiling.as_str(), "page_ceiling");
        assert_eq!(
            serde_json::to_value(StopReason::ShortPage).unwrap(),
            serde_json::json!("short_page")
        );
    }
}
