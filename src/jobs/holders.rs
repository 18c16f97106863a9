use crate::app::ports::ExplorerApi;
use crate::constants::{DEFAULT_PAGE_SIZE, DEFAULT_TOKEN_DECIMALS, HOLDERS_JOB, HOLDERS_MAX_PAGES};
use crate::convert::{first_text, floor_to_6h, format_ts, parse_int, trigger_id_for};
use crate::domain::HolderSnapshot;
use crate::error::Result;
use crate::pipeline::ingestor::{IngestSummary, PagedIngestor, PagedSource};
use crate::storage::SqliteStore;
use crate::types::ApiParams;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

const HOLDER_KEYS: &[&str] = &[
    "TokenHolderAddress",
    "tokenHolderAddress",
    "HolderAddress",
    "holderAddress",
    "address",
];
const QUANTITY_KEYS: &[&str] = &["TokenHolderQuantity", "quantity", "balance"];
const DECIMALS_KEYS: &[&str] = &["decimals", "tokenDecimal"];

#[derive(Debug, Clone)]
pub struct HoldersRequest {
    pub token: String,
    pub bucket_start_utc: Option<DateTime<Utc>>,
    pub trigger_id: Option<String>,
    pub page_size: u32,
    pub max_pages: u32,
    pub default_decimals: u32,
}

impl HoldersRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            bucket_start_utc: None,
            trigger_id: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: HOLDERS_MAX_PAGES,
            default_decimals: DEFAULT_TOKEN_DECIMALS,
        }
    }
}

/// Holder list of one token for one 6-hour bucket.
pub struct HoldersSource {
    token: String,
    contract_address: String,
    bucket_start: DateTime<Utc>,
    trigger_id: String,
    page_size: u32,
    max_pages: u32,
    /// Last decimals value seen on any item; carried to items that omit it.
    decimals: u32,
}

impl HoldersSource {
    pub fn new(req: HoldersRequest, now: DateTime<Utc>) -> Self {
        let bucket_start = req.bucket_start_utc.unwrap_or_else(|| floor_to_6h(now));
        let trigger_id = req
            .trigger_id
            .unwrap_or_else(|| trigger_id_for(bucket_start));
        Self {
            contract_address: req.token.to_lowercase(),
            token: req.token,
            bucket_start,
            trigger_id,
            page_size: req.page_size.max(1),
            max_pages: req.max_pages,
            decimals: req.default_decimals,
        }
    }

    pub fn bucket_start(&self) -> DateTime<Utc> {
        self.bucket_start
    }

    pub fn trigger_id(&self) -> &str {
        &self.trigger_id
    }
}

impl PagedSource for HoldersSource {
    type Row = HolderSnapshot;

    fn job_name(&self) -> &'static str {
        HOLDERS_JOB
    }

    fn scheduled_for(&self) -> Option<DateTime<Utc>> {
        Some(self.bucket_start)
    }

    fn stream_id(&self) -> String {
        format!(
            "holders:{}:{}",
            self.contract_address,
            format_ts(&self.bucket_start)
        )
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn max_pages(&self) -> u32 {
        self.max_pages
    }

    fn page_params(&self, _anchor: Option<u64>, page: u32) -> ApiParams {
        ApiParams::new("token", "tokenholderlist")
            .with("contractaddress", &self.token)
            .with("page", page)
            .with("offset", self.page_size)
    }

    fn transform(&mut self, items: &[Value]) -> Vec<HolderSnapshot> {
        let now = Utc::now();
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            if let Some(dec) = DECIMALS_KEYS
                .iter()
                .find_map(|k| parse_int(item.get(*k)))
                .and_then(|d| u32::try_from(d).ok())
            {
                self.decimals = dec;
            }

            let (Some(holder), Some(quantity)) = (
                first_text(item, HOLDER_KEYS),
                first_text(item, QUANTITY_KEYS),
            ) else {
                continue;
            };

            rows.push(HolderSnapshot {
                trigger_id: self.trigger_id.clone(),
                bucket_start_utc: self.bucket_start,
                contract_address: self.contract_address.clone(),
                holder_address: holder.to_lowercase(),
                token_decimal: self.decimals,
                quantity_raw: quantity,
                updated_at: now,
            });
        }
        rows
    }

    fn report(&self, summary: &IngestSummary) -> Value {
        json!({
            "rows": summary.rows,
            "pages": summary.pages,
            "token": self.token,
            "decimals": self.decimals,
            "stop": summary.stop.map(|s| s.as_str()),
        })
    }
}

/// Page through the holder list of `req.token` into `holders_raw`.
///
/// Output: `{rows, pages, token, decimals, stop}`.
pub fn holders_snapshot(
    api: &dyn ExplorerApi,
    store: &mut SqliteStore,
    req: HoldersRequest,
) -> Result<Value> {
    let mut source = HoldersSource::new(req, Utc::now());
    PagedIngestor::new(api, store).run(&mut source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::parse_ts;

    fn source() -> HoldersSource {
        let mut req = HoldersRequest::new("0xTOKEN");
        req.bucket_start_utc = parse_ts("2025-09-16T12:00:00Z");
        HoldersSource::new(req, Utc::now())
    }

    #[test]
    fn test_defaults_bucket_and_trigger_from_now() {
        let now = parse_ts("2025-09-16T17:42:10Z").unwrap();
        let src = HoldersSource::new(HoldersRequest::new("0xT"), now);
        assert_eq!(format_ts(&src.bucket_start()), "2025-09-16T12:00:00.000Z");
        assert_eq!(src.trigger_id(), "2025/09/16-12:00");
        assert_eq!(src.scheduled_for(), Some(src.bucket_start()));
    }

    #[test]
    fn test_stream_id_and_params() {
        let src = source();
        assert_eq!(src.stream_id(), "holders:0xtoken:2025-09-16T12:00:00.000Z");

        let params = src.page_params(None, 3);
        assert_eq!(params.get("module"), Some("token"));
        assert_eq!(params.get("action"), Some("tokenholderlist"));
        assert_eq!(params.get("contractaddress"), Some("0xTOKEN"));
        assert_eq!(params.get("page"), Some("3"));
        assert_eq!(params.get("offset"), Some("100"));
    }

    #[test]
    fn test_transform_aliases_and_decimals_carry_forward() {
        let mut src = source();
        let items = vec![
            json!({"TokenHolderAddress": "0xAAA", "TokenHolderQuantity": "100"}),
            json!({"holderAddress": "0xBBB", "balance": "5", "tokenDecimal": "6"}),
            json!({"address": "0xCCC", "quantity": 7}),
            json!({"address": "0xDDD"}),
            json!({"TokenHolderQuantity": "9"}),
        ];

        let rows = src.transform(&items);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].holder_address, "0xaaa");
        assert_eq!(rows[0].token_decimal, 18);
        assert_eq!(rows[1].token_decimal, 6);
        assert_eq!(rows[2].token_decimal, 6);
        assert_eq!(rows[2].quantity_raw, "7");
        assert_eq!(rows[0].contract_address, "0xtoken");
        assert!(rows.iter().all(|r| r.trigger_id == "2025/09/16-12:00"));
    }
}
