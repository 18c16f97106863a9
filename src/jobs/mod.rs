//! The three ingestion workflows exposed on the command line.

pub mod block_by_time;
pub mod holders;
pub mod wallet_transfers;

pub use block_by_time::block_by_time;
pub use holders::{holders_snapshot, HoldersRequest, HoldersSource};
pub use wallet_transfers::{wallet_tokentx, WalletTransfersRequest, WalletTransfersSource};
