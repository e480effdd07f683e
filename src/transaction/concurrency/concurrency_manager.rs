use std::collections::HashMap;
use std::sync::Arc;

use crate::common::types::{BlockId, TxnId};
use crate::transaction::concurrency::error::LockError;
use crate::transaction::concurrency::lock_table::{LockMode, LockTable};

/// Locks held by one transaction, kept until it ends (strict 2PL).
pub struct ConcurrencyManager {
    txn_id: TxnId,
    lock_table: Arc<LockTable>,
    locks: HashMap<BlockId, LockMode>,
}

impl ConcurrencyManager {
    pub fn new(txn_id: TxnId, lock_table: Arc<LockTable>) -> Self {
        Self {
            txn_id,
            lock_table,
            locks: HashMap::new(),
        }
    }

    pub fn s_lock(&mut self, block: &BlockId) -> Result<(), LockError> {
        if !self.locks.contains_key(block) {
            self.lock_table.s_lock(self.txn_id, block)?;
            self.locks.insert(block.clone(), LockMode::Shared);
        }
        Ok(())
    }

    /// Acquire or escalate to an exclusive lock; never downgrades
    pub fn x_lock(&mut self, block: &BlockId) -> Result<(), LockError> {
        if self.holds(block) != Some(LockMode::Exclusive) {
            self.lock_table.x_lock(self.txn_id, block)?;
            self.locks.insert(block.clone(), LockMode::Exclusive);
        }
        Ok(())
    }

    pub fn release_all(&mut self) {
        for (block, _) in self.locks.drain() {
            self.lock_table.unlock(self.txn_id, &block);
        }
    }

    pub fn holds(&self, block: &BlockId) -> Option<LockMode> {
        self.locks.get(block).copied()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }
}
