// Transaction Integration Tests

use anyhow::Result;

#[path = "../common/mod.rs"]
mod common;

use common::{ensure_blocks, open_test_db, read_int, write_int, TEST_FILE};
use stratadb::{BlockId, Database, LockMode, LogRecord, PageError, TransactionError};

#[test]
fn test_commit_visible_to_later_transactions() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    ensure_blocks(&db, TEST_FILE, 2)?;
    let block = BlockId::new(TEST_FILE, 1);

    let mut tx1 = db.new_transaction()?;
    tx1.pin(&block)?;
    tx1.set_int(&block, 80, 1, true)?;
    tx1.set_string(&block, 40, "one", true)?;
    tx1.commit()?;

    let mut tx2 = db.new_transaction()?;
    tx2.pin(&block)?;
    assert_eq!(tx2.get_int(&block, 80)?, 1);
    assert_eq!(tx2.get_string(&block, 40)?, "one");
    tx2.commit()?;
    Ok(())
}

#[test]
fn test_rollback_restores_every_touched_offset() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    ensure_blocks(&db, TEST_FILE, 2)?;
    let first = BlockId::new(TEST_FILE, 0);
    let second = BlockId::new(TEST_FILE, 1);

    let mut setup = db.new_transaction()?;
    setup.pin(&first)?;
    setup.pin(&second)?;
    setup.set_int(&first, 0, 10, true)?;
    setup.set_string(&second, 100, "original", true)?;
    setup.commit()?;

    let mut tx = db.new_transaction()?;
    tx.pin(&first)?;
    tx.pin(&second)?;
    tx.set_int(&first, 0, 11, true)?;
    tx.set_int(&first, 0, 12, true)?;
    tx.set_int(&first, 200, 99, true)?;
    tx.set_string(&second, 100, "changed", true)?;
    tx.set_string(&second, 100, "changed again", true)?;
    tx.rollback()?;

    let mut check = db.new_transaction()?;
    check.pin(&first)?;
    check.pin(&second)?;
    assert_eq!(check.get_int(&first, 0)?, 10);
    assert_eq!(check.get_int(&first, 200)?, 0);
    assert_eq!(check.get_string(&second, 100)?, "original");
    check.commit()?;
    Ok(())
}

#[test]
fn test_unlogged_write_is_not_undone() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    ensure_blocks(&db, TEST_FILE, 1)?;
    let block = BlockId::new(TEST_FILE, 0);

    let lsn_before = db.log_manager().current_lsn();
    let mut tx = db.new_transaction()?;
    tx.pin(&block)?;
    tx.set_int(&block, 8, 42, false)?;
    // Only the START record was logged
    assert_eq!(db.log_manager().current_lsn(), lsn_before + 1);
    tx.rollback()?;

    assert_eq!(read_int(&db, &block, 8)?, 42);
    Ok(())
}

#[test]
fn test_pin_reference_counting() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    ensure_blocks(&db, TEST_FILE, 1)?;
    let block = BlockId::new(TEST_FILE, 0);
    let pool = db.buffer_pool();

    let mut tx = db.new_transaction()?;
    tx.pin(&block)?;
    tx.pin(&block)?;
    assert_eq!(tx.pin_count(&block), 2);

    tx.unpin(&block)?;
    assert!(pool.pin_count(&block) >= 1);
    assert_eq!(tx.get_int(&block, 0)?, 0);

    tx.unpin(&block)?;
    assert_eq!(pool.pin_count(&block), 0);
    assert_eq!(pool.available(), pool.pool_size());

    let err = tx.unpin(&block).unwrap_err();
    assert!(matches!(err, TransactionError::BlockNotPinned { .. }));
    tx.commit()?;
    Ok(())
}

#[test]
fn test_access_requires_pin() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    let block = BlockId::new(TEST_FILE, 0);

    let mut tx = db.new_transaction()?;
    let err = tx.get_int(&block, 0).unwrap_err();
    assert!(matches!(err, TransactionError::BlockNotPinned { .. }));
    let err = tx.set_string(&block, 0, "x", true).unwrap_err();
    assert!(matches!(err, TransactionError::BlockNotPinned { .. }));
    tx.rollback()?;
    Ok(())
}

#[test]
fn test_write_past_block_end_is_rejected_before_logging() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    ensure_blocks(&db, TEST_FILE, 1)?;
    let block = BlockId::new(TEST_FILE, 0);

    let mut tx = db.new_transaction()?;
    tx.pin(&block)?;
    tx.set_int(&block, 396, 5, true)?;
    let lsn = db.log_manager().current_lsn();

    let err = tx.set_int(&block, 397, 6, true).unwrap_err();
    assert!(matches!(err, TransactionError::PageError(PageError::OutOfBounds { .. })));
    let err = tx.set_string(&block, 390, "too long", true).unwrap_err();
    assert!(matches!(err, TransactionError::PageError(PageError::OutOfBounds { .. })));

    assert_eq!(db.log_manager().current_lsn(), lsn);
    assert_eq!(tx.get_int(&block, 396)?, 5);
    tx.commit()?;
    Ok(())
}

#[test]
fn test_size_and_append() -> Result<()> {
    let (_dir, db) = open_test_db()?;

    let mut tx = db.new_transaction()?;
    assert_eq!(tx.size("grow")?, 0);
    assert_eq!(tx.append("grow")?, BlockId::new("grow", 0));
    assert_eq!(tx.append("grow")?, BlockId::new("grow", 1));
    assert_eq!(tx.size("grow")?, 2);
    assert_eq!(tx.block_size(), 400);

    let eof = BlockId::end_of_file("grow");
    assert_eq!(db.lock_table().lock_mode(&eof), Some(LockMode::Exclusive));
    tx.commit()?;
    assert_eq!(db.lock_table().lock_mode(&eof), None);
    Ok(())
}

#[test]
fn test_end_releases_pins_and_locks() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    ensure_blocks(&db, TEST_FILE, 3)?;
    let blocks: Vec<_> = (0..3).map(|n| BlockId::new(TEST_FILE, n)).collect();

    let mut tx = db.new_transaction()?;
    for block in &blocks {
        tx.pin(block)?;
        tx.set_int(block, 0, 1, true)?;
    }
    assert_eq!(tx.available_buffers(), 5);
    tx.commit()?;

    assert_eq!(db.buffer_pool().available(), 8);
    for block in &blocks {
        assert_eq!(db.lock_table().lock_mode(block), None);
    }
    Ok(())
}

#[test]
fn test_dropped_transaction_rolls_back() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    ensure_blocks(&db, TEST_FILE, 1)?;
    let block = BlockId::new(TEST_FILE, 0);
    write_int(&db, &block, 12, 7)?;

    {
        let mut tx = db.new_transaction()?;
        tx.pin(&block)?;
        tx.set_int(&block, 12, 8, true)?;
    }

    assert_eq!(db.lock_table().lock_mode(&block), None);
    assert_eq!(read_int(&db, &block, 12)?, 7);
    Ok(())
}

fn newest_records(db: &Database, count: usize) -> Result<Vec<LogRecord>> {
    db.log_manager()
        .iterator()?
        .take(count)
        .map(|bytes| -> Result<LogRecord> { Ok(LogRecord::from_bytes(&bytes?)?) })
        .collect()
}

#[test]
fn test_finished_transaction_is_not_rolled_back_on_drop() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    ensure_blocks(&db, TEST_FILE, 1)?;
    let block = BlockId::new(TEST_FILE, 0);

    let mut committed = db.new_transaction()?;
    let committed_id = committed.id();
    committed.pin(&block)?;
    committed.set_int(&block, 0, 5, true)?;
    committed.commit()?;
    assert_eq!(newest_records(&db, 1)?, vec![LogRecord::Commit { txn_id: committed_id }]);
    assert_eq!(read_int(&db, &block, 0)?, 5);

    let mut rolled_back = db.new_transaction()?;
    let rolled_back_id = rolled_back.id();
    rolled_back.pin(&block)?;
    rolled_back.set_int(&block, 0, 6, true)?;
    rolled_back.rollback()?;
    let records = newest_records(&db, 2)?;
    assert_eq!(records[0], LogRecord::Rollback { txn_id: rolled_back_id });
    assert!(matches!(records[1], LogRecord::SetInt { .. }));
    assert_eq!(read_int(&db, &block, 0)?, 5);
    Ok(())
}

#[test]
fn test_transaction_ids_increase() -> Result<()> {
    let (_dir, db) = open_test_db()?;
    let tx1 = db.new_transaction()?;
    let tx2 = db.new_transaction()?;
    assert!(tx2.id() > tx1.id());
    tx2.commit()?;
    tx1.commit()?;
    Ok(())
}
