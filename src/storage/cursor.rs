//! Durable per-stream resume positions.
//!
//! Positions and pages only ever move forward: every advance is merged with the
//! stored cursor by taking the maximum of each field independently, while the
//! metadata is replaced wholesale.

use crate::convert::{format_ts, parse_ts};
use crate::error::Result;
use crate::storage::sink::int;
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cursor {
    pub stream: String,
    pub last_scanned_position: Option<u64>,
    pub last_page: Option<u32>,
    pub metadata: Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorAdvance {
    pub position: Option<u64>,
    pub page: Option<u32>,
    pub metadata: Value,
}

/// Merge an incoming advance into the stored cursor. An absent value sorts below any present one.
pub fn merge(
    existing: Option<&Cursor>,
    stream: &str,
    incoming: CursorAdvance,
    now: DateTime<Utc>,
) -> Cursor {
    let (position, page) = match existing {
        Some(cur) => (
            cur.last_scanned_position.max(incoming.position),
            cur.last_page.max(incoming.page),
        ),
        None => (incoming.position, incoming.page),
    };
    Cursor {
        stream: stream.to_string(),
        last_scanned_position: position,
        last_page: page,
        metadata: incoming.metadata,
        updated_at: now,
    }
}

pub fn load(conn: &Connection, stream: &str) -> Result<Option<Cursor>> {
    let cursor = conn
        .query_row(
            "SELECT stream, last_scanned_block, last_page, metadata, updated_at_utc
             FROM ingestion_cursors WHERE stream = ?1",
            params![stream],
            from_row,
        )
        .optional()?;
    Ok(cursor)
}

pub fn load_all(conn: &Connection) -> Result<Vec<Cursor>> {
    let mut stmt = conn.prepare(
        "SELECT stream, last_scanned_block, last_page, metadata, updated_at_utc
         FROM ingestion_cursors ORDER BY stream",
    )?;
    let cursors = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cursors)
}

/// Read, merge and write the cursor for `stream`. Returns the stored result.
pub fn advance(conn: &Connection, stream: &str, incoming: CursorAdvance) -> Result<Cursor> {
    let existing = load(conn, stream)?;
    let merged = merge(existing.as_ref(), stream, incoming, Utc::now());
    conn.execute(
        "INSERT INTO ingestion_cursors
             (stream, last_scanned_block, last_page, metadata, updated_at_utc)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (stream) DO UPDATE SET
             last_scanned_block = excluded.last_scanned_block,
             last_page = excluded.last_page,
             metadata = excluded.metadata,
             updated_at_utc = excluded.updated_at_utc",
        params![
            merged.stream,
            merged.last_scanned_position.map(int).unwrap_or(SqlValue::Null),
            merged.last_page,
            merged.metadata.to_string(),
            format_ts(&merged.updated_at),
        ],
    )?;
    Ok(merged)
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Cursor> {
    let position: Option<i64> = row.get(1)?;
    let metadata: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    Ok(Cursor {
        stream: row.get(0)?,
        last_scanned_position: position.map(|p| p.max(0) as u64),
        last_page: row.get(2)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
        updated_at: parse_ts(&updated_at).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use serde_json::json;

    fn adv(position: Option<u64>, page: Option<u32>, tag: &str) -> CursorAdvance {
        CursorAdvance {
            position,
            page,
            metadata: json!({ "tag": tag }),
        }
    }

    #[test]
    fn test_merge_creates_when_absent() {
        let now = Utc::now();
        let cur = merge(None, "s", adv(Some(10), Some(1), "a"), now);
        assert_eq!(cur.last_scanned_position, Some(10));
        assert_eq!(cur.last_page, Some(1));
        assert_eq!(cur.updated_at, now);
    }

    #[test]
    fn test_merge_never_regresses_fields_independently() {
        let now = Utc::now();
        let first = merge(None, "s", adv(Some(100), Some(2), "a"), now);
        let second = merge(Some(&first), "s", adv(Some(50), Some(7), "b"), now);

        assert_eq!(second.last_scanned_position, Some(100));
        assert_eq!(second.last_page, Some(7));
        assert_eq!(second.metadata, json!({"tag": "b"}));

        let third = merge(Some(&second), "s", adv(None, None, "c"), now);
        assert_eq!(third.last_scanned_position, Some(100));
        assert_eq!(third.last_page, Some(7));
    }

    #[test]
    fn test_final_position_is_max_for_any_order() {
        let positions = [5u64, 99, 3, 42, 99, 0, 17];
        let orders: Vec<Vec<u64>> = vec![
            positions.to_vec(),
            positions.iter().rev().copied().collect(),
            {
                let mut sorted = positions.to_vec();
                sorted.sort();
                sorted
            },
        ];

        for order in orders {
            let store = SqliteStore::open_in_memory().unwrap();
            for (i, p) in order.iter().enumerate() {
                advance(
                    store.connection(),
                    "tokentx:w:t",
                    adv(Some(*p), Some(i as u32), "x"),
                )
                .unwrap();
            }
            let stored = load(store.connection(), "tokentx:w:t").unwrap().unwrap();
            assert_eq!(stored.last_scanned_position, Some(99));
            assert_eq!(stored.last_page, Some(order.len() as u32 - 1));
        }
    }

    #[test]
    fn test_load_missing_and_load_all() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(load(store.connection(), "nope").unwrap().is_none());

        advance(store.connection(), "b", adv(None, Some(1), "x")).unwrap();
        advance(store.connection(), "a", adv(Some(3), Some(1), "y")).unwrap();

        let all = load_all(store.connection()).unwrap();
        let streams: Vec<_> = all.iter().map(|c| c.stream.as_str()).collect();
        assert_eq!(streams, vec!["a", "b"]);
        assert_eq!(all[1].last_scanned_position, None);
        assert_eq!(all[0].metadata, json!({"tag": "y"}));
    }
}
