//! Process-wide shared/exclusive locks on blocks.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::common::types::{BlockId, TxnId};
use crate::transaction::concurrency::error::LockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
enum LockEntry {
    Shared(HashSet<TxnId>),
    Exclusive(TxnId),
}

impl LockEntry {
    /// Whether a request by `txn_id` in `mode` conflicts with another holder
    fn conflicts(&self, txn_id: TxnId, mode: LockMode) -> bool {
        match (self, mode) {
            (LockEntry::Exclusive(holder), _) => *holder != txn_id,
            (LockEntry::Shared(_), LockMode::Shared) => false,
            (LockEntry::Shared(holders), LockMode::Exclusive) => holders.iter().any(|&h| h != txn_id),
        }
    }
}

/// Lock entries keyed by block, with one condition variable shared by every
/// waiter. Entries disappear once their last holder releases.
#[derive(Debug)]
pub struct LockTable {
    entries: Mutex<HashMap<BlockId, LockEntry>>,
    lock_released: Condvar,
    max_wait: Duration,
}

impl LockTable {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            lock_released: Condvar::new(),
            max_wait,
        }
    }

    /// Acquire a shared lock, waiting while another transaction holds it exclusively
    pub fn s_lock(&self, txn_id: TxnId, block: &BlockId) -> Result<(), LockError> {
        self.acquire(txn_id, block, LockMode::Shared)
    }

    /// Acquire an exclusive lock, waiting while any other transaction holds a lock.
    ///
    /// A transaction that is the sole shared holder upgrades without waiting.
    pub fn x_lock(&self, txn_id: TxnId, block: &BlockId) -> Result<(), LockError> {
        self.acquire(txn_id, block, LockMode::Exclusive)
    }

    /// Drop whatever lock `txn_id` holds on `block` and wake waiters
    pub fn unlock(&self, txn_id: TxnId, block: &BlockId) {
        let mut entries = self.entries.lock();
        let now_empty = match entries.get_mut(block) {
            Some(LockEntry::Shared(holders)) => {
                holders.remove(&txn_id);
                holders.is_empty()
            }
            Some(LockEntry::Exclusive(holder)) => *holder == txn_id,
            None => false,
        };
        if now_empty {
            entries.remove(block);
        }
        trace!("Transaction {} released {}", txn_id, block);
        self.lock_released.notify_all();
    }

    /// Mode currently held on `block` by anyone
    pub fn lock_mode(&self, block: &BlockId) -> Option<LockMode> {
        self.entries.lock().get(block).map(|entry| match entry {
            LockEntry::Shared(_) => LockMode::Shared,
            LockEntry::Exclusive(_) => LockMode::Exclusive,
        })
    }

    /// Number of transactions holding a shared lock on `block`
    pub fn shared_holders(&self, block: &BlockId) -> usize {
        match self.entries.lock().get(block) {
            Some(LockEntry::Shared(holders)) => holders.len(),
            _ => 0,
        }
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    fn acquire(&self, txn_id: TxnId, block: &BlockId, mode: LockMode) -> Result<(), LockError> {
        let start = Instant::now();
        let deadline = start + self.max_wait;
        let mut entries = self.entries.lock();

        while entries.get(block).is_some_and(|entry| entry.conflicts(txn_id, mode)) {
            if Instant::now() >= deadline {
                warn!("Transaction {} timed out waiting for {:?} lock on {}", txn_id, mode, block);
                return Err(LockError::Timeout {
                    txn_id,
                    block: block.clone(),
                    waited: start.elapsed(),
                });
            }
            debug!("Transaction {} waiting for {:?} lock on {}", txn_id, mode, block);
            self.lock_released.wait_until(&mut entries, deadline);
        }

        match (entries.get_mut(block), mode) {
            (Some(LockEntry::Shared(holders)), LockMode::Shared) => {
                holders.insert(txn_id);
            }
            // Already held exclusively by this transaction
            (Some(LockEntry::Exclusive(_)), _) => {}
            (_, LockMode::Shared) => {
                entries.insert(block.clone(), LockEntry::Shared(HashSet::from([txn_id])));
            }
            (_, LockMode::Exclusive) => {
                entries.insert(block.clone(), LockEntry::Exclusive(txn_id));
            }
        }
        trace!("Transaction {} acquired {:?} lock on {}", txn_id, mode, block);
        Ok(())
    }
}
