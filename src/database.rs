//! Database bootstrap: opens the storage stack and recovers before the
//! first transaction is handed out.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use log::info;
use thiserror::Error;

use crate::common::types::{DEFAULT_BLOCK_SIZE, DEFAULT_LOG_FILE, DEFAULT_MAX_WAIT, DEFAULT_POOL_SIZE};
use crate::storage::buffer::{BufferPoolConfig, BufferPoolManager, ReplacementPolicy};
use crate::storage::disk::{DiskManager, DiskManagerError};
use crate::transaction::concurrency::LockTable;
use crate::transaction::wal::{LogManager, LogManagerError};
use crate::transaction::{Transaction, TransactionError, TransactionManager};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),

    #[error("Log manager error: {0}")]
    LogManagerError(#[from] LogManagerError),

    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Parameters recognized when opening a database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub db_dir: PathBuf,
    pub block_size: usize,
    pub pool_size: usize,
    pub log_file: String,
    /// Bound on pin and lock waits
    pub max_wait: Duration,
    pub replacement: ReplacementPolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from("stratadb"),
            block_size: DEFAULT_BLOCK_SIZE,
            pool_size: DEFAULT_POOL_SIZE,
            log_file: DEFAULT_LOG_FILE.to_string(),
            max_wait: DEFAULT_MAX_WAIT,
            replacement: ReplacementPolicy::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn new(db_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_dir: db_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_log_file(mut self, log_file: impl Into<String>) -> Self {
        self.log_file = log_file.into();
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_replacement(mut self, replacement: ReplacementPolicy) -> Self {
        self.replacement = replacement;
        self
    }

    fn buffer_pool_config(&self) -> BufferPoolConfig {
        BufferPoolConfig {
            pool_size: self.pool_size,
            max_wait: self.max_wait,
            replacement: self.replacement,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(DatabaseError::InvalidConfig("buffer pool needs at least one frame".to_string()));
        }
        if self.log_file.is_empty() {
            return Err(DatabaseError::InvalidConfig("log file name is empty".to_string()));
        }
        Ok(())
    }
}

/// An open database: the shared storage components plus the transaction
/// factory built over them.
pub struct Database {
    config: DatabaseConfig,
    is_new: bool,
    txn_manager: TransactionManager,
}

impl Database {
    /// Open or create the database in `config.db_dir`.
    ///
    /// An existing directory is recovered before this returns.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let disk_manager = Arc::new(DiskManager::new(&config.db_dir, config.block_size)?);
        let log_manager = Arc::new(LogManager::new(Arc::clone(&disk_manager), config.log_file.clone())?);
        let buffer_pool = Arc::new(BufferPoolManager::new(
            config.buffer_pool_config(),
            Arc::clone(&disk_manager),
            Arc::clone(&log_manager),
        ));
        let lock_table = Arc::new(LockTable::new(config.max_wait));

        let is_new = disk_manager.is_new();
        let txn_manager = TransactionManager::new(disk_manager, log_manager, buffer_pool, lock_table);

        if is_new {
            info!("Creating new database in {}", config.db_dir.display());
        } else {
            info!("Recovering existing database in {}", config.db_dir.display());
            txn_manager.recover()?;
        }

        Ok(Self {
            config,
            is_new,
            txn_manager,
        })
    }

    /// Open `db_dir` with default settings
    pub fn open_default(db_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(DatabaseConfig::new(db_dir.as_ref()))
    }

    pub fn new_transaction(&self) -> std::result::Result<Transaction, TransactionError> {
        self.txn_manager.begin()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Whether the directory was created by this open
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn transaction_manager(&self) -> &TransactionManager {
        &self.txn_manager
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.txn_manager.disk_manager()
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        self.txn_manager.log_manager()
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        self.txn_manager.buffer_pool()
    }

    pub fn lock_table(&self) -> &Arc<LockTable> {
        self.txn_manager.lock_table()
    }
}
