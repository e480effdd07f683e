pub mod concurrency_manager;
pub mod error;
pub mod lock_table;

pub use concurrency_manager::ConcurrencyManager;
pub use error::LockError;
pub use lock_table::{LockMode, LockTable};
