use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use log::info;

use crate::common::types::TxnId;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::disk::DiskManager;
use crate::transaction::concurrency::LockTable;
use crate::transaction::transaction::{Result, Transaction};
use crate::transaction::wal::LogManager;

/// Transaction manager - hands out transaction IDs and the shared handles
/// every transaction is built from
pub struct TransactionManager {
    /// Next transaction ID to assign
    next_txn_id: AtomicU32,

    disk_manager: Arc<DiskManager>,
    log_manager: Arc<LogManager>,
    buffer_pool: Arc<BufferPoolManager>,
    lock_table: Arc<LockTable>,
}

impl TransactionManager {
    pub fn new(
        disk_manager: Arc<DiskManager>,
        log_manager: Arc<LogManager>,
        buffer_pool: Arc<BufferPoolManager>,
        lock_table: Arc<LockTable>,
    ) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
            disk_manager,
            log_manager,
            buffer_pool,
            lock_table,
        }
    }

    /// Begin a new transaction
    pub fn begin(&self) -> Result<Transaction> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        Transaction::new(
            txn_id,
            Arc::clone(&self.disk_manager),
            Arc::clone(&self.log_manager),
            Arc::clone(&self.buffer_pool),
            Arc::clone(&self.lock_table),
        )
    }

    /// Run crash recovery in a dedicated transaction and commit it
    pub fn recover(&self) -> Result<()> {
        let mut txn = self.begin()?;
        info!("Running recovery as transaction {}", txn.id());
        txn.recover()?;
        txn.commit()
    }

    /// ID the next call to `begin` will use
    pub fn next_txn_id(&self) -> TxnId {
        self.next_txn_id.load(Ordering::SeqCst)
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.buffer_pool
    }

    pub fn lock_table(&self) -> &Arc<LockTable> {
        &self.lock_table
    }
}
