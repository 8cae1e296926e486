pub mod balance_repository;
pub mod codec;
pub mod database;
pub mod memory;
pub mod models;
pub mod progress_repository;
pub mod snapshot_repository;
pub mod token_repository;
pub mod transfer_repository;

pub use balance_repository::BalanceRepository;
pub use codec::{pad_amount, parse_amount};
pub use database::Database;
pub use memory::MemoryLedger;
pub use models::{
    AccountBalance, AccountBalanceDailySnapshot, BridgeDirection, BridgeTransferEvent, Token, TokenMetadata,
    TokenSnapshot, TransferEvent,
};
pub use progress_repository::ProgressRepository;
pub use snapshot_repository::SnapshotRepository;
pub use token_repository::TokenRepository;
pub use transfer_repository::TransferRepository;
