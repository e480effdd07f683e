// StrataDB transactional storage engine

pub mod common;
pub mod database;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use common::types::{BlockId, Lsn, TxnId};
pub use database::{Database, DatabaseConfig, DatabaseError};
pub use storage::buffer::{BufferPoolError, BufferPoolManager, ReplacementPolicy};
pub use storage::disk::{DiskManager, DiskManagerError};
pub use storage::page::{Page, PageError};
pub use transaction::{LockMode, LockTable, Transaction, TransactionError, TransactionManager};
pub use transaction::wal::{LogManager, LogRecord};
