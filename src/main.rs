use anyhow::Result;
use log::info;

use stratadb::{BlockId, Database, DatabaseConfig};

const DATA_FILE: &str = "testfile";
const OFFSET: usize = 80;

/// Commit a value, leave an overwrite of it unfinished, then reopen the
/// database and show that recovery restored the committed value.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let db_dir = std::env::args().nth(1).unwrap_or_else(|| "stratadb-demo".to_string());
    let config = DatabaseConfig::new(&db_dir).with_block_size(400).with_pool_size(8);
    let block = BlockId::new(DATA_FILE, 1);

    let db = Database::open(config.clone())?;

    let mut tx1 = db.new_transaction()?;
    while tx1.size(DATA_FILE)? <= block.number() {
        tx1.append(DATA_FILE)?;
    }
    tx1.pin(&block)?;
    tx1.set_int(&block, OFFSET, 1, true)?;
    tx1.commit()?;
    info!("Committed 1 at offset {} of {}", OFFSET, block);

    let mut tx2 = db.new_transaction()?;
    tx2.pin(&block)?;
    println!("tx2 reads {}", tx2.get_int(&block, OFFSET)?);
    tx2.commit()?;

    let mut tx3 = db.new_transaction()?;
    tx3.pin(&block)?;
    tx3.set_int(&block, OFFSET, 9999, true)?;
    println!("tx3 wrote {} without committing", tx3.get_int(&block, OFFSET)?);

    // Push the uncommitted page to disk and abandon tx3 without rolling
    // back, as a killed process would.
    db.buffer_pool().flush_all(tx3.id())?;
    std::mem::forget(tx3);
    drop(db);

    let db = Database::open(config)?;
    let mut tx4 = db.new_transaction()?;
    tx4.pin(&block)?;
    println!("after recovery tx4 reads {}", tx4.get_int(&block, OFFSET)?);
    tx4.commit()?;

    Ok(())
}
