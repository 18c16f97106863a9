use crate::app::ports::ExplorerApi;
use crate::constants::{
    DEFAULT_PAGE_SIZE, DEFAULT_TOKEN_DECIMALS, END_BLOCK, WALLET_TX_JOB, WALLET_TX_MAX_PAGES,
};
use crate::convert::{lower_address, parse_int, parse_int_or, text, ts_to_utc};
use crate::domain::WalletTransfer;
use crate::error::Result;
use crate::pipeline::ingestor::{IngestSummary, PagedIngestor, PagedSource};
use crate::storage::SqliteStore;
use crate::types::ApiParams;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct WalletTransfersRequest {
    pub wallet: String,
    pub token: String,
    pub start_block: u64,
    pub page_size: u32,
    pub max_pages: u32,
}

impl WalletTransfersRequest {
    pub fn new(wallet: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            token: token.into(),
            start_block: 0,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: WALLET_TX_MAX_PAGES,
        }
    }
}

/// Token transfers of one wallet for one token contract, ascending by block.
pub struct WalletTransfersSource {
    req: WalletTransfersRequest,
    wallet_address: String,
    contract_address: String,
}

impl WalletTransfersSource {
    pub fn new(mut req: WalletTransfersRequest) -> Self {
        req.page_size = req.page_size.max(1);
        Self {
            wallet_address: req.wallet.to_lowercase(),
            contract_address: req.token.to_lowercase(),
            req,
        }
    }

    fn to_transfer(&self, item: &Value) -> Option<WalletTransfer> {
        let tx_hash = text(item.get("hash"))?;
        let block_number = parse_int(item.get("blockNumber"))
            .and_then(|b| u64::try_from(b).ok())
            .unwrap_or(0);
        let block_time_unix = parse_int_or(item.get("timeStamp"), 0);
        let token_decimal = parse_int(item.get("tokenDecimal"))
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(DEFAULT_TOKEN_DECIMALS);

        Some(WalletTransfer {
            wallet_address: self.wallet_address.clone(),
            wallet_name: None,
            wallet_tag: None,
            contract_address: self.contract_address.clone(),
            block_number,
            block_time_unix,
            block_time_utc: ts_to_utc(block_time_unix),
            tx_hash,
            nonce: parse_int(item.get("nonce")),
            block_hash: text(item.get("blockHash")),
            from_address: lower_address(item.get("from")),
            to_address: lower_address(item.get("to")),
            value_raw: text(item.get("value")).unwrap_or_else(|| "0".to_string()),
            token_name: text(item.get("tokenName")),
            token_symbol: text(item.get("tokenSymbol")),
            token_decimal,
            transaction_index: parse_int_or(item.get("transactionIndex"), 0),
            gas: parse_int(item.get("gas")),
            gas_price: parse_int(item.get("gasPrice")),
            gas_used: parse_int(item.get("gasUsed")),
            cumulative_gas_used: parse_int(item.get("cumulativeGasUsed")),
            input: text(item.get("input")),
            confirmations: parse_int(item.get("confirmations")),
        })
    }
}

impl PagedSource for WalletTransfersSource {
    type Row = WalletTransfer;

    fn job_name(&self) -> &'static str {
        WALLET_TX_JOB
    }

    fn stream_id(&self) -> String {
        format!("tokentx:{}:{}", self.wallet_address, self.contract_address)
    }

    fn start_position(&self) -> Option<u64> {
        Some(self.req.start_block)
    }

    fn page_size(&self) -> u32 {
        self.req.page_size
    }

    fn max_pages(&self) -> u32 {
        self.req.max_pages
    }

    fn page_params(&self, anchor: Option<u64>, page: u32) -> ApiParams {
        ApiParams::new("account", "tokentx")
            .with("address", &self.req.wallet)
            .with("contractaddress", &self.req.token)
            .with("startblock", anchor.unwrap_or(self.req.start_block))
            .with("endblock", END_BLOCK)
            .with("sort", "asc")
            .with("page", page)
            .with("offset", self.req.page_size)
    }

    fn transform(&mut self, items: &[Value]) -> Vec<WalletTransfer> {
        items.iter().filter_map(|it| self.to_transfer(it)).collect()
    }

    fn row_position(row: &WalletTransfer) -> Option<u64> {
        Some(row.block_number)
    }

    fn report(&self, summary: &IngestSummary) -> Value {
        json!({
            "rows": summary.rows,
            "pages": summary.pages,
            "wallet": self.req.wallet,
            "token": self.req.token,
            "last_block": summary.last_position,
            "stop": summary.stop.map(|s| s.as_str()),
        })
    }
}

/// Page through the token transfers of `req.wallet` into `wallet_transactions`, resuming
/// from the stored cursor of the `(wallet, token)` stream.
///
/// Output: `{rows, pages, wallet, token, last_block, stop}`.
pub fn wallet_tokentx(
    api: &dyn ExplorerApi,
    store: &mut SqliteStore,
    req: WalletTransfersRequest,
) -> Result<Value> {
    let mut source = WalletTransfersSource::new(req);
    PagedIngestor::new(api, store).run(&mut source)
}
