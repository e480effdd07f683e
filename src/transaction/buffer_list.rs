use std::collections::HashMap;
use std::sync::Arc;

use crate::common::types::BlockId;
use crate::storage::buffer::{BufferPoolError, BufferPoolManager, FramePtr};

struct PinnedBlock {
    frame: FramePtr,
    pins: usize,
}

/// Blocks pinned by one transaction.
///
/// The first local pin of a block takes one pool-level pin; further local
/// pins only count, and the pool pin is released when the local count
/// drops back to zero.
pub struct BufferList {
    buffer_pool: Arc<BufferPoolManager>,
    pinned: HashMap<BlockId, PinnedBlock>,
}

impl BufferList {
    pub fn new(buffer_pool: Arc<BufferPoolManager>) -> Self {
        Self {
            buffer_pool,
            pinned: HashMap::new(),
        }
    }

    pub fn pin(&mut self, block: &BlockId) -> Result<FramePtr, BufferPoolError> {
        if let Some(entry) = self.pinned.get_mut(block) {
            entry.pins += 1;
            return Ok(Arc::clone(&entry.frame));
        }

        let frame = self.buffer_pool.pin(block)?;
        self.pinned.insert(block.clone(), PinnedBlock { frame: Arc::clone(&frame), pins: 1 });
        Ok(frame)
    }

    /// Drop one local pin; returns false if the block was not pinned
    pub fn unpin(&mut self, block: &BlockId) -> Result<bool, BufferPoolError> {
        let Some(entry) = self.pinned.get_mut(block) else {
            return Ok(false);
        };

        entry.pins -= 1;
        if entry.pins == 0 {
            if let Some(entry) = self.pinned.remove(block) {
                self.buffer_pool.unpin(&entry.frame)?;
            }
        }
        Ok(true)
    }

    /// Release every pool pin held through this list
    pub fn unpin_all(&mut self) -> Result<(), BufferPoolError> {
        let mut result = Ok(());
        for (_, entry) in self.pinned.drain() {
            if let Err(e) = self.buffer_pool.unpin(&entry.frame) {
                result = Err(e);
            }
        }
        result
    }

    pub fn frame(&self, block: &BlockId) -> Option<&FramePtr> {
        self.pinned.get(block).map(|entry| &entry.frame)
    }

    /// Local pin count of `block`
    pub fn pins(&self, block: &BlockId) -> usize {
        self.pinned.get(block).map_or(0, |entry| entry.pins)
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}
