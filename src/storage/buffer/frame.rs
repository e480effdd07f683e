use std::sync::Arc;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::types::{BlockId, FrameId, Lsn, TxnId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::disk::DiskManager;
use crate::storage::page::Page;
use crate::transaction::wal::LogManager;

/// One buffer pool frame: a page image plus the block it currently holds.
///
/// The pin count lives in the pool, not here, so that victim selection never
/// has to take a frame lock.
#[derive(Debug)]
pub struct Frame {
    frame_id: FrameId,
    contents: RwLock<FrameContents>,
}

/// Smart pointer to a frame
pub type FramePtr = Arc<Frame>;

#[derive(Debug)]
pub struct FrameContents {
    page: Page,
    block: Option<BlockId>,
    modified_by: Option<TxnId>,
    lsn: Option<Lsn>,
}

impl Frame {
    pub fn new(frame_id: FrameId, block_size: usize) -> Self {
        Self {
            frame_id,
            contents: RwLock::new(FrameContents {
                page: Page::new(block_size),
                block: None,
                modified_by: None,
                lsn: None,
            }),
        }
    }

    pub fn id(&self) -> FrameId {
        self.frame_id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, FrameContents> {
        self.contents.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, FrameContents> {
        self.contents.write()
    }
}

impl FrameContents {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    /// Block currently held, or `None` for an unbound frame
    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    /// Transaction that last modified the page since it was loaded or flushed
    pub fn modifying_txn(&self) -> Option<TxnId> {
        self.modified_by
    }

    /// LSN of the newest log record describing an unflushed modification
    pub fn lsn(&self) -> Option<Lsn> {
        self.lsn
    }

    pub fn is_modified(&self) -> bool {
        self.modified_by.is_some()
    }

    /// Record a modification by `txn_id`.
    ///
    /// Unlogged modifications pass `None` and keep any LSN already recorded.
    pub fn set_modified(&mut self, txn_id: TxnId, lsn: Option<Lsn>) {
        self.modified_by = Some(txn_id);
        if lsn.is_some() {
            self.lsn = lsn;
        }
    }

    /// Write the page back if it is modified, forcing the log first
    pub(crate) fn flush(
        &mut self,
        disk_manager: &DiskManager,
        log_manager: &LogManager,
    ) -> Result<(), BufferPoolError> {
        if self.modified_by.is_none() {
            return Ok(());
        }

        // WAL rule: the log records describing this page reach disk first.
        if let Some(lsn) = self.lsn {
            log_manager.flush(lsn)?;
        }
        if let Some(block) = &self.block {
            disk_manager.write(block, &self.page)?;
        }

        self.modified_by = None;
        self.lsn = None;
        Ok(())
    }

    /// Bind the frame to `block`, reading its contents from disk.
    ///
    /// The caller must have flushed the previous contents.
    pub(crate) fn load(&mut self, block: BlockId, disk_manager: &DiskManager) -> Result<(), BufferPoolError> {
        self.block = None;
        self.modified_by = None;
        self.lsn = None;
        disk_manager.read(&block, &mut self.page)?;
        self.block = Some(block);
        Ok(())
    }
}
