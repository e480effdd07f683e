// StrataDB WAL Log Manager
//
// The log is a single append-only file of fixed-size blocks. Each block keeps
// its own fill boundary at offset 0 and packs records from the end of the block
// toward the front, so the newest record in a block is always at the boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{BlockId, Lsn};
use crate::storage::disk::{DiskManager, DiskManagerError};
use crate::storage::page::{Page, PageError, INT_SIZE};
use crate::transaction::wal::log_iterator::LogIterator;
use crate::transaction::wal::log_record::LogRecordError;

/// Error type for log manager operations
#[derive(Error, Debug)]
pub enum LogManagerError {
    #[error("Disk error: {0}")]
    DiskError(#[from] DiskManagerError),

    #[error("Page error: {0}")]
    PageError(#[from] PageError),

    #[error("Log record error: {0}")]
    LogRecordError(#[from] LogRecordError),

    #[error("Log record of {size} bytes does not fit in a {block_size}-byte log block")]
    RecordTooLarge { size: usize, block_size: usize },

    #[error("Log file {0} is missing or empty")]
    MissingLog(String),

    #[error("Corrupt log block {block}: boundary {boundary}")]
    CorruptBlock { block: BlockId, boundary: i32 },
}

/// Result type for log manager operations
pub type Result<T> = std::result::Result<T, LogManagerError>;

/// Mutable log state, guarded by the manager's append lock
struct LogState {
    /// In-memory image of the block currently being filled
    log_page: Page,

    /// Address of that block
    current_block: BlockId,

    /// Highest LSN known to be on disk
    last_saved_lsn: Lsn,
}

/// Manager for write-ahead logging operations
pub struct LogManager {
    disk_manager: Arc<DiskManager>,
    log_file: String,
    state: Mutex<LogState>,

    /// LSN of the most recently appended record
    latest_lsn: AtomicU64,
}

impl LogManager {
    /// Open the log file, creating its first block if the file is empty
    pub fn new(disk_manager: Arc<DiskManager>, log_file: impl Into<String>) -> Result<Self> {
        let log_file = log_file.into();
        let block_size = disk_manager.block_size();
        let mut log_page = Page::new(block_size);

        let log_size = disk_manager.length(&log_file)?;
        let current_block = if log_size == 0 {
            Self::append_new_block(&disk_manager, &log_file, &mut log_page)?
        } else {
            let block = BlockId::new(log_file.as_str(), log_size - 1);
            disk_manager.read(&block, &mut log_page)?;
            // A block appended but never written still reads as zeros.
            if log_page.get_int(0)? == 0 {
                log_page.set_int(0, block_size as i32)?;
            }
            read_boundary(&log_page, &block)?;
            block
        };

        debug!("Opened log file {} at {}", log_file, current_block);

        Ok(Self {
            disk_manager,
            log_file,
            state: Mutex::new(LogState {
                log_page,
                current_block,
                last_saved_lsn: 0,
            }),
            latest_lsn: AtomicU64::new(0),
        })
    }

    /// Append a raw record and return the LSN assigned to it.
    ///
    /// The record is only durable once `flush` has been called with an LSN at
    /// least as large as the returned one.
    pub fn append(&self, record: &[u8]) -> Result<Lsn> {
        let block_size = self.disk_manager.block_size();
        let bytes_needed = record.len() + INT_SIZE;
        if bytes_needed + INT_SIZE > block_size {
            return Err(LogManagerError::RecordTooLarge {
                size: record.len(),
                block_size,
            });
        }

        let mut state = self.state.lock();
        let mut boundary = read_boundary(&state.log_page, &state.current_block)?;

        if boundary < bytes_needed + INT_SIZE {
            // Record doesn't fit: seal the current block and move to a new one.
            self.flush_locked(&mut state)?;
            state.current_block =
                Self::append_new_block(&self.disk_manager, &self.log_file, &mut state.log_page)?;
            debug!("Log rolled over to {}", state.current_block);
            boundary = block_size;
        }

        let record_pos = boundary - bytes_needed;
        state.log_page.set_bytes(record_pos, record)?;
        state.log_page.set_int(0, record_pos as i32)?;

        Ok(self.latest_lsn.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Make every record up to and including `lsn` durable
    pub fn flush(&self, lsn: Lsn) -> Result<()> {
        let mut state = self.state.lock();
        if lsn > state.last_saved_lsn {
            self.flush_locked(&mut state)?;
        }
        Ok(())
    }

    /// Iterate over all records, newest first.
    ///
    /// The log is flushed first so the iterator sees every appended record.
    pub fn iterator(&self) -> Result<LogIterator> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)?;
        LogIterator::new(Arc::clone(&self.disk_manager), state.current_block.clone())
    }

    /// LSN of the most recently appended record (0 if none this session)
    pub fn current_lsn(&self) -> Lsn {
        self.latest_lsn.load(Ordering::SeqCst)
    }

    /// Highest LSN known to be durable
    pub fn last_saved_lsn(&self) -> Lsn {
        self.state.lock().last_saved_lsn
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    /// Number of blocks in the log file
    pub fn block_count(&self) -> Result<u32> {
        Ok(self.disk_manager.length(&self.log_file)?)
    }

    fn flush_locked(&self, state: &mut LogState) -> Result<()> {
        self.disk_manager.write(&state.current_block, &state.log_page)?;
        state.last_saved_lsn = self.latest_lsn.load(Ordering::SeqCst);
        Ok(())
    }

    fn append_new_block(
        disk_manager: &DiskManager,
        log_file: &str,
        log_page: &mut Page,
    ) -> Result<BlockId> {
        let block = disk_manager.append(log_file)?;
        log_page.clear();
        log_page.set_int(0, disk_manager.block_size() as i32)?;
        disk_manager.write(&block, log_page)?;
        Ok(block)
    }
}

/// Read and validate the fill boundary stored at the start of a log block.
///
/// A zero boundary means the block was appended but never written, which is
/// the same as an empty block.
pub(crate) fn read_boundary(page: &Page, block: &BlockId) -> Result<usize> {
    let boundary = page.get_int(0)?;
    if boundary == 0 {
        return Ok(page.capacity());
    }
    if boundary < INT_SIZE as i32 || boundary as usize > page.capacity() {
        return Err(LogManagerError::CorruptBlock {
            block: block.clone(),
            boundary,
        });
    }
    Ok(boundary as usize)
}
