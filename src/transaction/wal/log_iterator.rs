use std::sync::Arc;

use crate::common::types::BlockId;
use crate::storage::disk::DiskManager;
use crate::storage::page::{Page, INT_SIZE};
use crate::transaction::wal::log_manager::{read_boundary, LogManagerError, Result};

/// Backward iterator over raw log records, newest first.
///
/// Starts at the fill boundary of the last log block and walks toward the end
/// of that block, then loads the previous block, until block 0 is exhausted.
/// It is finite and cannot be restarted; ask the log manager for a new one.
pub struct LogIterator {
    disk_manager: Arc<DiskManager>,
    block: BlockId,
    page: Page,
    current_pos: usize,
    finished: bool,
}

impl LogIterator {
    pub(crate) fn new(disk_manager: Arc<DiskManager>, block: BlockId) -> Result<Self> {
        let page = Page::new(disk_manager.block_size());
        let mut iter = Self {
            disk_manager,
            block: block.clone(),
            page,
            current_pos: 0,
            finished: false,
        };
        iter.move_to_block(block)?;
        Ok(iter)
    }

    /// Iterate over the log file as it is on disk, without a log manager.
    ///
    /// Nothing is written: records still buffered by a running log manager are
    /// not seen. Fails with `LogManagerError::MissingLog` if the file does not
    /// exist or holds no blocks.
    pub fn open(disk_manager: Arc<DiskManager>, log_file: &str) -> Result<Self> {
        if !disk_manager.exists(log_file) {
            return Err(LogManagerError::MissingLog(log_file.to_string()));
        }
        let log_size = disk_manager.length(log_file)?;
        if log_size == 0 {
            return Err(LogManagerError::MissingLog(log_file.to_string()));
        }
        Self::new(disk_manager, BlockId::new(log_file, log_size - 1))
    }

    fn move_to_block(&mut self, block: BlockId) -> Result<()> {
        self.disk_manager.read(&block, &mut self.page)?;
        self.current_pos = read_boundary(&self.page, &block)?;
        self.block = block;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Vec<u8>>> {
        while self.current_pos >= self.page.capacity() {
            if self.block.number() == 0 {
                return Ok(None);
            }
            let previous = BlockId::new(self.block.file_name(), self.block.number() - 1);
            self.move_to_block(previous)?;
        }

        let record = self.page.get_bytes(self.current_pos)?.to_vec();
        self.current_pos += INT_SIZE + record.len();
        Ok(Some(record))
    }
}

impl Iterator for LogIterator {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
