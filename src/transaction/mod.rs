// Transaction management: logging, locking, recovery and the transaction API

pub mod buffer_list;
pub mod concurrency;
pub mod recovery;
pub mod transaction;
pub mod transaction_manager;
pub mod wal;

// Public exports
pub use concurrency::{ConcurrencyManager, LockError, LockMode, LockTable};
pub use recovery::{RecoveryError, RecoveryManager};
pub use transaction::{Transaction, TransactionError};
pub use transaction_manager::TransactionManager;
pub use wal::{LogManager, LogRecord, LogRecordType};
