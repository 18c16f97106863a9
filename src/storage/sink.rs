use crate::error::Result;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// What to do when a row's natural key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// Overwrite the named refreshable columns with the incoming values.
    Refresh(&'static [&'static str]),
    /// Keep the stored row; re-delivery is a no-op.
    Ignore,
}

#[derive(Debug, Clone, Copy)]
pub struct ConflictPolicy {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub natural_key: &'static [&'static str],
    pub merge: Merge,
}

impl ConflictPolicy {
    pub fn upsert_sql(&self) -> String {
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        let conflict = match self.merge {
            Merge::Ignore => "DO NOTHING".to_string(),
            Merge::Refresh(fields) => {
                let sets = fields
                    .iter()
                    .map(|f| format!("{f} = excluded.{f}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("DO UPDATE SET {sets}")
            }
        };
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            self.table,
            self.columns.join(", "),
            placeholders,
            self.natural_key.join(", "),
            conflict
        )
    }
}

/// A row that can be written through the generic sink.
pub trait Record {
    const POLICY: ConflictPolicy;

    /// Column values, in `POLICY.columns` order.
    fn values(&self) -> Vec<Value>;
}

/// Upsert `rows` into their table. Returns the number of rows inserted or refreshed.
///
/// Callers run this inside the page transaction; an empty slice issues no statement.
pub fn upsert<R: Record>(conn: &Connection, rows: &[R]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let sql = R::POLICY.upsert_sql();
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut affected = 0;
    for row in rows {
        affected += stmt.execute(params_from_iter(row.values()))?;
    }
    Ok(affected)
}

pub fn count<R: Record>(conn: &Connection) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", R::POLICY.table);
    let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

pub(crate) fn int(v: u64) -> Value {
    Value::Integer(i64::try_from(v).unwrap_or(i64::MAX))
}

pub(crate) fn opt_int(v: Option<i64>) -> Value {
    v.map(Value::Integer).unwrap_or(Value::Null)
}

pub(crate) fn opt_text(v: &Option<String>) -> Value {
    v.clone().map(Value::Text).unwrap_or(Value::Null)
}
