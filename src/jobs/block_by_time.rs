use crate::app::ports::ExplorerApi;
use crate::constants::BLOCK_CHECK_JOB;
use crate::convert::{parse_int, ts_to_utc};
use crate::domain::BlockCheck;
use crate::error::Result;
use crate::pipeline::ingestor::close_run;
use crate::storage::SqliteStore;
use crate::types::{ApiParams, ApiResponse, Closest};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, instrument};

/// Resolve the block closest to `unix_ts` and upsert it into `block_check`.
///
/// Output: `{block_number, status, message}`.
#[instrument(skip(api, store))]
pub fn block_by_time(
    api: &dyn ExplorerApi,
    store: &mut SqliteStore,
    unix_ts: i64,
    closest: Closest,
) -> Result<Value> {
    let job = store.start_job(BLOCK_CHECK_JOB, None)?;
    let mut stats = json!({ "unix_ts": unix_ts, "closest": closest.as_str() });

    let outcome = lookup(api, store, unix_ts, closest).map(|out| {
        stats = out.clone();
        out
    });
    close_run(store, job, BLOCK_CHECK_JOB, &stats, outcome.as_ref().err())?;
    outcome
}

fn lookup(
    api: &dyn ExplorerApi,
    store: &mut SqliteStore,
    unix_ts: i64,
    closest: Closest,
) -> Result<Value> {
    let params = ApiParams::new("block", "getblocknobytime")
        .with("timestamp", unix_ts)
        .with("closest", closest);
    let resp = api.fetch(&params)?;
    let row = to_block_check(unix_ts, closest, &resp);

    let tx = store.begin_page()?;
    tx.upsert(std::slice::from_ref(&row))?;
    tx.commit()?;

    info!(block_number = ?row.block_number, status = ?resp.status, "block check stored");
    Ok(json!({
        "block_number": row.block_number,
        "status": resp.status,
        "message": resp.message,
    }))
}

pub fn to_block_check(unix_ts: i64, closest: Closest, resp: &ApiResponse) -> BlockCheck {
    BlockCheck {
        unix_ts,
        ts_utc: ts_to_utc(unix_ts),
        closest,
        block_number: parse_int(resp.result.as_ref()),
        api_status: resp.status.clone(),
        api_message: resp.message.clone(),
        inserted_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unparseable_result_leaves_block_absent() {
        let resp = ApiResponse {
            status: Some("0".into()),
            message: Some("NOTOK".into()),
            result: Some(json!("Error! No closest block found")),
        };
        let row = to_block_check(1726224000, Closest::After, &resp);
        assert_eq!(row.block_number, None);
        assert_eq!(row.api_message.as_deref(), Some("NOTOK"));
    }

    #[test]
    fn test_numeric_string_result_is_parsed() {
        let resp = ApiResponse {
            status: Some("1".into()),
            message: Some("OK".into()),
            result: Some(json!("12345678")),
        };
        let row = to_block_check(1726224000, Closest::Before, &resp);
        assert_eq!(row.block_number, Some(12345678));
        assert_eq!(row.ts_utc.timestamp(), 1726224000);
    }
}
