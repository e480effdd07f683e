use std::sync::Arc;
use log::{debug, error, warn};
use thiserror::Error;

use crate::common::types::{BlockId, TxnId};
use crate::storage::buffer::{BufferPoolError, BufferPoolManager, FramePtr};
use crate::storage::disk::{DiskManager, DiskManagerError};
use crate::storage::page::{Page, PageError, INT_SIZE};
use crate::transaction::buffer_list::BufferList;
use crate::transaction::concurrency::{ConcurrencyManager, LockError, LockTable};
use crate::transaction::recovery::{RecoveryError, RecoveryManager};
use crate::transaction::wal::LogManager;

/// Transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Buffer pool error: {0}")]
    BufferPoolError(#[from] BufferPoolError),

    #[error("Lock error: {0}")]
    LockError(#[from] LockError),

    #[error("Recovery error: {0}")]
    RecoveryError(#[from] RecoveryError),

    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),

    #[error("Page error: {0}")]
    PageError(#[from] PageError),

    #[error("{block} is not pinned by transaction {txn_id}")]
    BlockNotPinned { txn_id: TxnId, block: BlockId },
}

impl TransactionError {
    /// Whether a pin or lock wait ran out of time. The transaction must be
    /// rolled back; retrying the same call is not expected to help.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            TransactionError::BufferPoolError(BufferPoolError::Timeout { .. })
                | TransactionError::LockError(LockError::Timeout { .. })
                | TransactionError::RecoveryError(RecoveryError::BufferPoolError(BufferPoolError::Timeout { .. }))
                | TransactionError::RecoveryError(RecoveryError::LockError(LockError::Timeout { .. }))
        )
    }
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// A unit of work over pinned blocks.
///
/// Reads take shared locks and writes take exclusive locks, held until the
/// transaction ends. `commit` and `rollback` consume the transaction;
/// dropping one that is still active rolls it back.
pub struct Transaction {
    /// Transaction ID
    txn_id: TxnId,

    state: TransactionState,

    recovery: RecoveryManager,

    /// Locks held by this transaction
    concurrency: ConcurrencyManager,

    /// Blocks pinned by this transaction, with local pin counts
    buffers: BufferList,

    disk_manager: Arc<DiskManager>,
    buffer_pool: Arc<BufferPoolManager>,
}

impl Transaction {
    /// Start a transaction, writing its START record
    pub(crate) fn new(
        txn_id: TxnId,
        disk_manager: Arc<DiskManager>,
        log_manager: Arc<LogManager>,
        buffer_pool: Arc<BufferPoolManager>,
        lock_table: Arc<LockTable>,
    ) -> Result<Self> {
        let recovery = RecoveryManager::new(txn_id, log_manager, Arc::clone(&buffer_pool))?;
        debug!("Transaction {} started", txn_id);

        Ok(Self {
            txn_id,
            state: TransactionState::Active,
            recovery,
            concurrency: ConcurrencyManager::new(txn_id, lock_table),
            buffers: BufferList::new(Arc::clone(&buffer_pool)),
            disk_manager,
            buffer_pool,
        })
    }

    pub fn id(&self) -> TxnId {
        self.txn_id
    }

    /// Force this transaction's changes and its COMMIT record, then release
    /// every pin and lock
    pub fn commit(mut self) -> Result<()> {
        self.recovery.commit()?;
        self.state = TransactionState::Committed;
        debug!("Transaction {} committed", self.txn_id);
        self.release()
    }

    /// Undo this transaction's changes, then release every pin and lock
    pub fn rollback(mut self) -> Result<()> {
        self.abort()
    }

    /// Undo the work of every transaction left unfinished by a crash.
    ///
    /// Must run before any other transaction starts. The transaction stays
    /// active and is normally committed right after.
    pub fn recover(&mut self) -> Result<()> {
        self.recovery.recover(&mut self.concurrency, &mut self.buffers)?;
        Ok(())
    }

    pub fn pin(&mut self, block: &BlockId) -> Result<()> {
        self.buffers.pin(block)?;
        Ok(())
    }

    pub fn unpin(&mut self, block: &BlockId) -> Result<()> {
        if !self.buffers.unpin(block)? {
            return Err(self.not_pinned(block));
        }
        Ok(())
    }

    pub fn get_int(&mut self, block: &BlockId, offset: usize) -> Result<i32> {
        self.concurrency.s_lock(block)?;
        let frame = self.pinned_frame(block)?;
        let value = frame.read().page().get_int(offset)?;
        Ok(value)
    }

    pub fn get_string(&mut self, block: &BlockId, offset: usize) -> Result<String> {
        self.concurrency.s_lock(block)?;
        let frame = self.pinned_frame(block)?;
        let value = frame.read().page().get_string(offset)?;
        Ok(value)
    }

    /// Write an integer into a pinned block.
    ///
    /// With `ok_to_log` the before-image is logged first; without it the
    /// write cannot be undone.
    pub fn set_int(&mut self, block: &BlockId, offset: usize, value: i32, ok_to_log: bool) -> Result<()> {
        self.concurrency.x_lock(block)?;
        let frame = self.pinned_frame(block)?;
        let mut contents = frame.write();
        check_fits(contents.page(), offset, INT_SIZE)?;

        let lsn = if ok_to_log {
            Some(self.recovery.log_set_int(&contents, offset)?)
        } else {
            None
        };
        contents.page_mut().set_int(offset, value)?;
        contents.set_modified(self.txn_id, lsn);
        Ok(())
    }

    /// Write a string into a pinned block; see [`Transaction::set_int`]
    pub fn set_string(&mut self, block: &BlockId, offset: usize, value: &str, ok_to_log: bool) -> Result<()> {
        self.concurrency.x_lock(block)?;
        let frame = self.pinned_frame(block)?;
        let mut contents = frame.write();
        check_fits(contents.page(), offset, INT_SIZE + value.len())?;

        let lsn = if ok_to_log {
            Some(self.recovery.log_set_string(&contents, offset)?)
        } else {
            None
        };
        contents.page_mut().set_string(offset, value)?;
        contents.set_modified(self.txn_id, lsn);
        Ok(())
    }

    /// Number of blocks in `file_name`, under a shared lock on its end-of-file marker
    pub fn size(&mut self, file_name: &str) -> Result<u32> {
        self.concurrency.s_lock(&BlockId::end_of_file(file_name))?;
        Ok(self.disk_manager.length(file_name)?)
    }

    /// Extend `file_name` by one zeroed block, under an exclusive lock on its
    /// end-of-file marker
    pub fn append(&mut self, file_name: &str) -> Result<BlockId> {
        self.concurrency.x_lock(&BlockId::end_of_file(file_name))?;
        Ok(self.disk_manager.append(file_name)?)
    }

    pub fn block_size(&self) -> usize {
        self.disk_manager.block_size()
    }

    /// Unpinned frames in the shared buffer pool
    pub fn available_buffers(&self) -> usize {
        self.buffer_pool.available()
    }

    /// How many times this transaction has pinned `block`
    pub fn pin_count(&self, block: &BlockId) -> usize {
        self.buffers.pins(block)
    }

    fn pinned_frame(&self, block: &BlockId) -> Result<FramePtr> {
        self.buffers
            .frame(block)
            .cloned()
            .ok_or_else(|| self.not_pinned(block))
    }

    fn not_pinned(&self, block: &BlockId) -> TransactionError {
        TransactionError::BlockNotPinned {
            txn_id: self.txn_id,
            block: block.clone(),
        }
    }

    fn abort(&mut self) -> Result<()> {
        self.recovery.rollback(&mut self.concurrency, &mut self.buffers)?;
        self.state = TransactionState::Aborted;
        debug!("Transaction {} rolled back", self.txn_id);
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let unpinned = self.buffers.unpin_all();
        self.concurrency.release_all();
        unpinned?;
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state != TransactionState::Active {
            return;
        }

        warn!("Transaction {} dropped while active, rolling back", self.txn_id);
        if let Err(e) = self.abort() {
            error!("Rollback of dropped transaction {} failed: {}", self.txn_id, e);
            let _ = self.release();
        }
    }
}

fn check_fits(page: &Page, offset: usize, len: usize) -> std::result::Result<(), PageError> {
    match offset.checked_add(len) {
        Some(end) if end <= page.capacity() => Ok(()),
        _ => Err(PageError::OutOfBounds {
            offset,
            len,
            capacity: page.capacity(),
        }),
    }
}
