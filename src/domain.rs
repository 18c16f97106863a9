//! Rows persisted by the ingestion jobs and their conflict policies.

use crate::convert::format_ts;
use crate::storage::sink::{int, opt_int, opt_text};
use crate::storage::{ConflictPolicy, Merge, Record};
use crate::types::Closest;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::Serialize;

/// Result of one timestamp-to-block lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockCheck {
    pub unix_ts: i64,
    pub ts_utc: DateTime<Utc>,
    pub closest: Closest,
    pub block_number: Option<i64>,
    pub api_status: Option<String>,
    pub api_message: Option<String>,
    pub inserted_at: DateTime<Utc>,
}

impl Record for BlockCheck {
    const POLICY: ConflictPolicy = ConflictPolicy {
        table: "block_check",
        columns: &[
            "unix_ts",
            "ts_utc",
            "closest",
            "block_number",
            "api_status",
            "api_message",
            "inserted_at",
        ],
        natural_key: &["unix_ts", "closest"],
        merge: Merge::Refresh(&["block_number", "api_status", "api_message"]),
    };

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.unix_ts),
            Value::Text(format_ts(&self.ts_utc)),
            Value::Text(self.closest.as_str().to_string()),
            opt_int(self.block_number),
            opt_text(&self.api_status),
            opt_text(&self.api_message),
            Value::Text(format_ts(&self.inserted_at)),
        ]
    }
}

/// One holder balance inside a 6-hour snapshot bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolderSnapshot {
    pub trigger_id: String,
    pub bucket_start_utc: DateTime<Utc>,
    pub contract_address: String,
    pub holder_address: String,
    pub token_decimal: u32,
    /// Raw integer quantity as delivered; never scaled.
    pub quantity_raw: String,
    pub updated_at: DateTime<Utc>,
}

impl Record for HolderSnapshot {
    const POLICY: ConflictPolicy = ConflictPolicy {
        table: "holders_raw",
        columns: &[
            "trigger_id",
            "bucket_start_utc",
            "contract_address",
            "holder_address",
            "token_decimal",
            "quantity_raw",
            "updated_at",
        ],
        natural_key: &["bucket_start_utc", "contract_address", "holder_address"],
        merge: Merge::Refresh(&["token_decimal", "quantity_raw", "updated_at"]),
    };

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.trigger_id.clone()),
            Value::Text(format_ts(&self.bucket_start_utc)),
            Value::Text(self.contract_address.clone()),
            Value::Text(self.holder_address.clone()),
            Value::Integer(i64::from(self.token_decimal)),
            Value::Text(self.quantity_raw.clone()),
            Value::Text(format_ts(&self.updated_at)),
        ]
    }
}

/// A token transfer touching a tracked wallet. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletTransfer {
    pub wallet_address: String,
    pub wallet_name: Option<String>,
    pub wallet_tag: Option<String>,
    pub contract_address: String,
    pub block_number: u64,
    pub block_time_unix: i64,
    pub block_time_utc: DateTime<Utc>,
    pub tx_hash: String,
    pub nonce: Option<i64>,
    pub block_hash: Option<String>,
    pub from_address: String,
    pub to_address: String,
    pub value_raw: String,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_decimal: u32,
    pub transaction_index: i64,
    pub gas: Option<i64>,
    pub gas_price: Option<i64>,
    pub gas_used: Option<i64>,
    pub cumulative_gas_used: Option<i64>,
    pub input: Option<String>,
    pub confirmations: Option<i64>,
}

impl Record for WalletTransfer {
    const POLICY: ConflictPolicy = ConflictPolicy {
        table: "wallet_transactions",
        columns: &[
            "wallet_address",
            "wallet_name",
            "wallet_tag",
            "contract_address",
            "block_number",
            "block_time_unix",
            "block_time_utc",
            "tx_hash",
            "nonce",
            "block_hash",
            "from_address",
            "to_address",
            "value_raw",
            "token_name",
            "token_symbol",
            "token_decimal",
            "transaction_index",
            "gas",
            "gas_price",
            "gas_used",
            "cumulative_gas_used",
            "input",
            "confirmations",
        ],
        natural_key: &[
            "tx_hash",
            "contract_address",
            "wallet_address",
            "value_raw",
            "transaction_index",
        ],
        merge: Merge::Ignore,
    };

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.wallet_address.clone()),
            opt_text(&self.wallet_name),
            opt_text(&self.wallet_tag),
            Value::Text(self.contract_address.clone()),
            int(self.block_number),
            Value::Integer(self.block_time_unix),
            Value::Text(format_ts(&self.block_time_utc)),
            Value::Text(self.tx_hash.clone()),
            opt_int(self.nonce),
            opt_text(&self.block_hash),
            Value::Text(self.from_address.clone()),
            Value::Text(self.to_address.clone()),
            Value::Text(self.value_raw.clone()),
            opt_text(&self.token_name),
            opt_text(&self.token_symbol),
            Value::Integer(i64::from(self.token_decimal)),
            Value::Integer(self.transaction_index),
            opt_int(self.gas),
            opt_int(self.gas_price),
            opt_int(self.gas_used),
            opt_int(self.cumulative_gas_used),
            opt_text(&self.input),
            opt_int(self.confirmations),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_follow_column_order() {
        fn check<R: Record>(row: &R) {
            assert_eq!(row.values().len(), R::POLICY.columns.len());
            for key in R::POLICY.natural_key {
                assert!(R::POLICY.columns.contains(key), "{key} is not a column");
            }
            if let Merge::Refresh(fields) = R::POLICY.merge {
                for f in fields {
                    assert!(!R::POLICY.natural_key.contains(f), "{f} is part of the key");
                }
            }
        }

        let now = Utc::now();
        check(&BlockCheck {
            unix_ts: 1,
            ts_utc: now,
            closest: Closest::Before,
            block_number: None,
            api_status: None,
            api_message: None,
            inserted_at: now,
        });
        check(&HolderSnapshot {
            trigger_id: "t".into(),
            bucket_start_utc: now,
            contract_address: "0xt".into(),
            holder_address: "0xh".into(),
            token_decimal: 18,
            quantity_raw: "1".into(),
            updated_at: now,
        });
        check(&WalletTransfer {
            wallet_address: "0xw".into(),
            wallet_name: None,
            wallet_tag: None,
            contract_address: "0xt".into(),
            block_number: 1,
            block_time_unix: 0,
            block_time_utc: now,
            tx_hash: "0x1".into(),
            nonce: None,
            block_hash: None,
            from_address: String::new(),
            to_address: String::new(),
            value_raw: "0".into(),
            token_name: None,
            token_symbol: None,
            token_decimal: 18,
            transaction_index: 0,
            gas: None,
            gas_price: None,
            gas_used: None,
            cumulative_gas_used: None,
            input: None,
            confirmations: None,
        });
    }
}
