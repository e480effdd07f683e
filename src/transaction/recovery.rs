//! Per-transaction logging, rollback and crash recovery.
//!
//! Update records hold before-images only. Commit forces the transaction's
//! modified frames to disk before its COMMIT record, so recovery is a single
//! backward undo pass that stops at the newest checkpoint.

use std::collections::HashSet;
use std::sync::Arc;
use log::{debug, info};
use thiserror::Error;

use crate::common::types::{BlockId, Lsn, TxnId};
use crate::storage::buffer::{BufferPoolError, BufferPoolManager, FrameContents};
use crate::storage::page::PageError;
use crate::transaction::buffer_list::BufferList;
use crate::transaction::concurrency::{ConcurrencyManager, LockError};
use crate::transaction::wal::{LogManager, LogManagerError, LogRecord, LogRecordError};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Log manager error: {0}")]
    LogManagerError(#[from] LogManagerError),

    #[error("Buffer pool error: {0}")]
    BufferPoolError(#[from] BufferPoolError),

    #[error("Lock error: {0}")]
    LockError(#[from] LockError),

    #[error("Page error: {0}")]
    PageError(#[from] PageError),

    #[error("Malformed log record: {0}")]
    MalformedRecord(#[from] LogRecordError),

    #[error("Cannot log an update to a frame that holds no block")]
    UnboundFrame,
}

pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Writes one transaction's log records and undoes its work.
pub struct RecoveryManager {
    txn_id: TxnId,
    log_manager: Arc<LogManager>,
    buffer_pool: Arc<BufferPoolManager>,
}

impl RecoveryManager {
    /// Create the manager and log the transaction's START record
    pub fn new(txn_id: TxnId, log_manager: Arc<LogManager>, buffer_pool: Arc<BufferPoolManager>) -> Result<Self> {
        LogRecord::Start { txn_id }.write_to_log(&log_manager)?;
        Ok(Self {
            txn_id,
            log_manager,
            buffer_pool,
        })
    }

    /// Force modified frames, then write and force COMMIT
    pub fn commit(&self) -> Result<()> {
        self.buffer_pool.flush_all(self.txn_id)?;
        let lsn = LogRecord::Commit { txn_id: self.txn_id }.write_to_log(&self.log_manager)?;
        self.log_manager.flush(lsn)?;
        Ok(())
    }

    /// Undo this transaction's updates, then write and force ROLLBACK
    pub fn rollback(&self, concurrency: &mut ConcurrencyManager, buffers: &mut BufferList) -> Result<()> {
        let mut undone = 0;
        for bytes in self.log_manager.iterator()? {
            let record = LogRecord::from_bytes(&bytes?)?;
            if record.txn_id() != Some(self.txn_id) {
                continue;
            }
            if matches!(record, LogRecord::Start { .. }) {
                break;
            }
            if self.undo(&record, concurrency, buffers)? {
                undone += 1;
            }
        }
        debug!("Transaction {} undid {} updates", self.txn_id, undone);

        self.buffer_pool.flush_all(self.txn_id)?;
        let lsn = LogRecord::Rollback { txn_id: self.txn_id }.write_to_log(&self.log_manager)?;
        self.log_manager.flush(lsn)?;
        Ok(())
    }

    /// Undo every update of transactions unfinished at the last shutdown,
    /// then write and force a CHECKPOINT
    pub fn recover(&self, concurrency: &mut ConcurrencyManager, buffers: &mut BufferList) -> Result<()> {
        let mut finished = HashSet::new();
        let mut unfinished = HashSet::new();
        let mut undone = 0;

        for bytes in self.log_manager.iterator()? {
            let record = LogRecord::from_bytes(&bytes?)?;
            match &record {
                LogRecord::Checkpoint => break,
                LogRecord::Commit { txn_id } | LogRecord::Rollback { txn_id } => {
                    finished.insert(*txn_id);
                }
                LogRecord::SetInt { txn_id, .. } | LogRecord::SetString { txn_id, .. } => {
                    if !finished.contains(txn_id) {
                        unfinished.insert(*txn_id);
                        self.undo(&record, concurrency, buffers)?;
                        undone += 1;
                    }
                }
                LogRecord::Start { .. } => {}
            }
        }

        self.buffer_pool.flush_all(self.txn_id)?;
        let lsn = LogRecord::Checkpoint.write_to_log(&self.log_manager)?;
        self.log_manager.flush(lsn)?;

        info!(
            "Recovery undid {} updates from {} unfinished transactions",
            undone,
            unfinished.len()
        );
        Ok(())
    }

    /// Log the integer about to be overwritten at `offset`
    pub fn log_set_int(&self, contents: &FrameContents, offset: usize) -> Result<Lsn> {
        let block = Self::bound_block(contents)?;
        let old_value = contents.page().get_int(offset)?;
        let record = LogRecord::SetInt {
            txn_id: self.txn_id,
            block,
            offset,
            old_value,
        };
        Ok(record.write_to_log(&self.log_manager)?)
    }

    /// Log the string about to be overwritten at `offset`
    pub fn log_set_string(&self, contents: &FrameContents, offset: usize) -> Result<Lsn> {
        let block = Self::bound_block(contents)?;
        let old_value = contents.page().get_string(offset)?;
        let record = LogRecord::SetString {
            txn_id: self.txn_id,
            block,
            offset,
            old_value,
        };
        Ok(record.write_to_log(&self.log_manager)?)
    }

    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    fn bound_block(contents: &FrameContents) -> Result<BlockId> {
        contents.block().cloned().ok_or(RecoveryError::UnboundFrame)
    }

    /// Restore the before-image of an update record without logging it.
    /// Returns false for records that carry nothing to undo.
    fn undo(&self, record: &LogRecord, concurrency: &mut ConcurrencyManager, buffers: &mut BufferList) -> Result<bool> {
        let block = match record {
            LogRecord::SetInt { block, .. } | LogRecord::SetString { block, .. } => block,
            _ => return Ok(false),
        };

        concurrency.x_lock(block)?;
        let frame = buffers.pin(block)?;
        {
            let mut contents = frame.write();
            match record {
                LogRecord::SetInt { offset, old_value, .. } => contents.page_mut().set_int(*offset, *old_value)?,
                LogRecord::SetString { offset, old_value, .. } => contents.page_mut().set_string(*offset, old_value)?,
                _ => {}
            }
            contents.set_modified(self.txn_id, None);
        }
        buffers.unpin(block)?;
        Ok(true)
    }
}
