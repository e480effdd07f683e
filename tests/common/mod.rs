#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use tempfile::TempDir;

use stratadb::storage::buffer::{BufferPoolConfig, BufferPoolManager, ReplacementPolicy};
use stratadb::{BlockId, Database, DatabaseConfig, DiskManager, LogManager};

pub const TEST_FILE: &str = "testfile";

// Configuration with a short wait bound so timeout tests stay fast
pub fn test_config(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig::new(dir.path().join("db"))
        .with_block_size(400)
        .with_pool_size(8)
        .with_max_wait(Duration::from_millis(300))
}

// Open a fresh database in a temporary directory
pub fn open_test_db() -> Result<(TempDir, Database)> {
    let dir = tempfile::tempdir()?;
    let db = Database::open(test_config(&dir))?;
    Ok((dir, db))
}

// Make sure `file` has at least `count` blocks
pub fn ensure_blocks(db: &Database, file: &str, count: u32) -> Result<()> {
    let mut tx = db.new_transaction()?;
    while tx.size(file)? < count {
        tx.append(file)?;
    }
    tx.commit()?;
    Ok(())
}

// Read one integer in its own committed transaction
pub fn read_int(db: &Database, block: &BlockId, offset: usize) -> Result<i32> {
    let mut tx = db.new_transaction()?;
    tx.pin(block)?;
    let value = tx.get_int(block, offset)?;
    tx.commit()?;
    Ok(value)
}

// Write one integer in its own committed transaction
pub fn write_int(db: &Database, block: &BlockId, offset: usize, value: i32) -> Result<()> {
    let mut tx = db.new_transaction()?;
    tx.pin(block)?;
    tx.set_int(block, offset, value, true)?;
    tx.commit()?;
    Ok(())
}

// Abandon the database as a crash would: the transaction is neither
// committed nor rolled back and nothing else is written on its behalf
pub fn crash(db: Database, abandoned: Vec<stratadb::Transaction>) {
    for tx in abandoned {
        std::mem::forget(tx);
    }
    drop(db);
}

// Disk and log managers over a temporary directory
pub fn create_storage(block_size: usize) -> Result<(TempDir, Arc<DiskManager>, Arc<LogManager>)> {
    let dir = tempfile::tempdir()?;
    let disk_manager = Arc::new(DiskManager::new(dir.path(), block_size)?);
    let log_manager = Arc::new(LogManager::new(Arc::clone(&disk_manager), "test.log")?);
    Ok((dir, disk_manager, log_manager))
}

// Buffer pool over temporary storage
pub fn create_test_buffer_pool(
    pool_size: usize,
    replacement: ReplacementPolicy,
) -> Result<(TempDir, Arc<BufferPoolManager>)> {
    let (dir, disk_manager, log_manager) = create_storage(400)?;
    let config = BufferPoolConfig {
        pool_size,
        max_wait: Duration::from_millis(200),
        replacement,
    };
    let buffer_pool = Arc::new(BufferPoolManager::new(config, disk_manager, log_manager));
    Ok((dir, buffer_pool))
}
