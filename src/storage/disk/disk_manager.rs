use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use log::{debug, info};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::BlockId;
use crate::storage::page::Page;

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),
    #[error("Page of {actual} bytes does not match block size {expected}")]
    PageSizeMismatch { expected: usize, actual: usize },
    #[error("Block {0} is not a real block")]
    InvalidBlock(BlockId),
    #[error("Database directory {0:?} does not exist")]
    MissingDirectory(PathBuf),
    #[error("Database is open read-only")]
    ReadOnly,
}

/// Block read/write counters since startup or the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    pub blocks_read: u64,
    pub blocks_written: u64,
}

/// DiskManager performs whole-block I/O on the files of one database directory
pub struct DiskManager {
    db_dir: PathBuf,
    block_size: usize,
    is_new: bool,
    read_only: bool,
    open_files: Mutex<HashMap<String, File>>,
    blocks_read: AtomicU64,
    blocks_written: AtomicU64,
}

impl DiskManager {
    /// Open (creating if needed) the database directory `db_dir`
    pub fn new(db_dir: impl AsRef<Path>, block_size: usize) -> Result<Self, DiskManagerError> {
        if block_size < 2 * crate::storage::page::INT_SIZE {
            return Err(DiskManagerError::InvalidBlockSize(block_size));
        }

        let db_dir = db_dir.as_ref().to_path_buf();
        let is_new = !db_dir.exists();
        if is_new {
            fs::create_dir_all(&db_dir)?;
        }

        // Leftover scratch files from an earlier run are never valid.
        for entry in fs::read_dir(&db_dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with("temp") {
                debug!("Removing stale temporary file {:?}", entry.path());
                fs::remove_file(entry.path())?;
            }
        }

        info!("Opened database directory {:?} (new: {})", db_dir, is_new);
        Ok(Self::with_mode(db_dir, block_size, is_new, false))
    }

    /// Open an existing database directory for inspection.
    ///
    /// Nothing is created or removed; `write` and `append` fail with
    /// `DiskManagerError::ReadOnly`, and files are opened without write access.
    pub fn open_read_only(db_dir: impl AsRef<Path>, block_size: usize) -> Result<Self, DiskManagerError> {
        if block_size < 2 * crate::storage::page::INT_SIZE {
            return Err(DiskManagerError::InvalidBlockSize(block_size));
        }

        let db_dir = db_dir.as_ref().to_path_buf();
        if !db_dir.is_dir() {
            return Err(DiskManagerError::MissingDirectory(db_dir));
        }

        debug!("Opened database directory {:?} read-only", db_dir);
        Ok(Self::with_mode(db_dir, block_size, false, true))
    }

    fn with_mode(db_dir: PathBuf, block_size: usize, is_new: bool, read_only: bool) -> Self {
        Self {
            db_dir,
            block_size,
            is_new,
            read_only,
            open_files: Mutex::new(HashMap::new()),
            blocks_read: AtomicU64::new(0),
            blocks_written: AtomicU64::new(0),
        }
    }

    /// Read a block into `page`; bytes past the end of the file read as zero
    pub fn read(&self, block: &BlockId, page: &mut Page) -> Result<(), DiskManagerError> {
        self.check_page(block, page)?;

        let mut files = self.open_files.lock();
        let file = self.file_for(&mut files, block.file_name())?;
        file.seek(SeekFrom::Start(self.block_offset(block)))?;

        let buffer = page.contents_mut();
        let mut filled = 0;
        while filled < buffer.len() {
            let n = file.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer[filled..].fill(0);

        self.blocks_read.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Write `page` to a block and sync it to stable storage
    pub fn write(&self, block: &BlockId, page: &Page) -> Result<(), DiskManagerError> {
        self.check_page(block, page)?;
        self.check_writable()?;

        let mut files = self.open_files.lock();
        let file = self.file_for(&mut files, block.file_name())?;
        file.seek(SeekFrom::Start(self.block_offset(block)))?;
        file.write_all(page.contents())?;
        file.sync_data()?;

        self.blocks_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Extend `file_name` by one zero-filled block and return its address
    pub fn append(&self, file_name: &str) -> Result<BlockId, DiskManagerError> {
        self.check_writable()?;
        let mut files = self.open_files.lock();
        let file = self.file_for(&mut files, file_name)?;

        let number = (file.metadata()?.len() / self.block_size as u64) as u32;
        let block = BlockId::new(file_name, number);

        file.seek(SeekFrom::Start(self.block_offset(&block)))?;
        file.write_all(&vec![0u8; self.block_size])?;
        file.sync_data()?;

        self.blocks_written.fetch_add(1, Ordering::Relaxed);
        Ok(block)
    }

    /// Number of blocks in `file_name`
    pub fn length(&self, file_name: &str) -> Result<u32, DiskManagerError> {
        let mut files = self.open_files.lock();
        let file = self.file_for(&mut files, file_name)?;
        Ok((file.metadata()?.len() / self.block_size as u64) as u32)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whether the database directory was created by this process
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether `file_name` exists in the database directory
    pub fn exists(&self, file_name: &str) -> bool {
        self.open_files.lock().contains_key(file_name) || self.db_dir.join(file_name).is_file()
    }

    pub fn db_dir(&self) -> &Path {
        &self.db_dir
    }

    pub fn stats(&self) -> IoStats {
        IoStats {
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.blocks_read.store(0, Ordering::Relaxed);
        self.blocks_written.store(0, Ordering::Relaxed);
    }

    fn file_for<'a>(
        &self,
        files: &'a mut HashMap<String, File>,
        file_name: &str,
    ) -> Result<&'a mut File, DiskManagerError> {
        match files.entry(file_name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let path = self.db_dir.join(file_name);
                let file = if self.read_only {
                    OpenOptions::new().read(true).open(path)?
                } else {
                    OpenOptions::new()
                        .read(true)
                        .write(true)
                        .create(true)
                        .truncate(false)
                        .open(path)?
                };
                Ok(entry.insert(file))
            }
        }
    }

    fn check_page(&self, block: &BlockId, page: &Page) -> Result<(), DiskManagerError> {
        if block.is_end_of_file() {
            return Err(DiskManagerError::InvalidBlock(block.clone()));
        }
        if page.capacity() != self.block_size {
            return Err(DiskManagerError::PageSizeMismatch {
                expected: self.block_size,
                actual: page.capacity(),
            });
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), DiskManagerError> {
        if self.read_only {
            return Err(DiskManagerError::ReadOnly);
        }
        Ok(())
    }

    fn block_offset(&self, block: &BlockId) -> u64 {
        block.number() as u64 * self.block_size as u64
    }
}
