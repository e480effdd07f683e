use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::common::types::{BlockId, FrameId, TxnId, DEFAULT_MAX_WAIT, DEFAULT_POOL_SIZE};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::frame::{Frame, FramePtr};
use crate::storage::buffer::replacer::{ReplacementPolicy, Replacer};
use crate::storage::disk::DiskManager;
use crate::transaction::wal::LogManager;

/// Buffer pool sizing and waiting behavior
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    pub pool_size: usize,
    pub max_wait: Duration,
    pub replacement: ReplacementPolicy,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_wait: DEFAULT_MAX_WAIT,
            replacement: ReplacementPolicy::default(),
        }
    }
}

struct PoolState {
    page_table: HashMap<BlockId, FrameId>,
    pin_counts: Vec<u32>,
    num_available: usize,
    replacer: Box<dyn Replacer>,
}

/// Fixed set of frames caching disk blocks.
///
/// Pinning, unpinning and victim selection are serialized by one pool
/// mutex; a pin that finds no unpinned frame waits on `frame_unpinned`
/// up to `max_wait`. Lock order is pool, then frame, then log.
pub struct BufferPoolManager {
    frames: Vec<FramePtr>,
    state: Mutex<PoolState>,
    frame_unpinned: Condvar,
    disk_manager: Arc<DiskManager>,
    log_manager: Arc<LogManager>,
    max_wait: Duration,
}

impl BufferPoolManager {
    pub fn new(
        config: BufferPoolConfig,
        disk_manager: Arc<DiskManager>,
        log_manager: Arc<LogManager>,
    ) -> Self {
        let block_size = disk_manager.block_size();
        let frames = (0..config.pool_size)
            .map(|frame_id| Arc::new(Frame::new(frame_id, block_size)))
            .collect();

        debug!(
            "Buffer pool: {} frames of {} bytes, {} replacement, max wait {:?}",
            config.pool_size, block_size, config.replacement, config.max_wait
        );

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(config.pool_size),
                pin_counts: vec![0; config.pool_size],
                num_available: config.pool_size,
                replacer: config.replacement.build(config.pool_size),
            }),
            frame_unpinned: Condvar::new(),
            disk_manager,
            log_manager,
            max_wait: config.max_wait,
        }
    }

    /// Pin `block` into a frame, loading it from disk if it is not resident.
    ///
    /// Waits up to the configured maximum for a frame to be unpinned when
    /// every frame is in use.
    pub fn pin(&self, block: &BlockId) -> Result<FramePtr, BufferPoolError> {
        if block.is_end_of_file() {
            return Err(BufferPoolError::InvalidOperation(format!(
                "cannot pin end-of-file marker for {}",
                block.file_name()
            )));
        }

        let start = Instant::now();
        let deadline = start + self.max_wait;
        let mut state = self.state.lock();

        loop {
            if let Some(frame) = self.try_to_pin(&mut state, block)? {
                return Ok(frame);
            }
            if Instant::now() >= deadline {
                warn!("Gave up pinning {} after {:?}: all frames pinned", block, start.elapsed());
                return Err(BufferPoolError::Timeout {
                    block: block.clone(),
                    waited: start.elapsed(),
                });
            }
            trace!("All frames pinned, waiting to pin {}", block);
            self.frame_unpinned.wait_until(&mut state, deadline);
        }
    }

    /// Release one pin on `frame`; waiters are woken when it becomes unpinned
    pub fn unpin(&self, frame: &Frame) -> Result<(), BufferPoolError> {
        let frame_id = frame.id();
        let mut state = self.state.lock();

        let count = state
            .pin_counts
            .get_mut(frame_id)
            .filter(|count| **count > 0)
            .ok_or(BufferPoolError::NotPinned(frame_id))?;
        *count -= 1;

        if *count == 0 {
            state.num_available += 1;
            state.replacer.record_unpin(frame_id);
            self.frame_unpinned.notify_all();
        }
        Ok(())
    }

    /// Write back every frame last modified by `txn_id`
    pub fn flush_all(&self, txn_id: TxnId) -> Result<(), BufferPoolError> {
        let _state = self.state.lock();
        for frame in &self.frames {
            let mut contents = frame.write();
            if contents.modifying_txn() == Some(txn_id) {
                contents.flush(&self.disk_manager, &self.log_manager)?;
            }
        }
        Ok(())
    }

    /// Number of frames with a zero pin count
    pub fn available(&self) -> usize {
        self.state.lock().num_available
    }

    /// Current pin count of `block`, zero when it is not resident
    pub fn pin_count(&self, block: &BlockId) -> u32 {
        let state = self.state.lock();
        state
            .page_table
            .get(block)
            .map_or(0, |&frame_id| state.pin_counts[frame_id])
    }

    pub fn is_resident(&self, block: &BlockId) -> bool {
        self.state.lock().page_table.contains_key(block)
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    fn try_to_pin(&self, state: &mut PoolState, block: &BlockId) -> Result<Option<FramePtr>, BufferPoolError> {
        let frame_id = match state.page_table.get(block) {
            Some(&frame_id) => frame_id,
            None => {
                let Some(frame_id) = state.replacer.victim(&state.pin_counts) else {
                    return Ok(None);
                };
                self.assign_frame(state, frame_id, block)?;
                frame_id
            }
        };

        if state.pin_counts[frame_id] == 0 {
            state.num_available -= 1;
            state.replacer.record_pin(frame_id);
        }
        state.pin_counts[frame_id] += 1;

        Ok(Some(Arc::clone(&self.frames[frame_id])))
    }

    fn assign_frame(&self, state: &mut PoolState, frame_id: FrameId, block: &BlockId) -> Result<(), BufferPoolError> {
        let mut contents = self.frames[frame_id].write();

        // A failed flush leaves the frame bound to its old block.
        contents.flush(&self.disk_manager, &self.log_manager)?;
        if let Some(previous) = contents.block().cloned() {
            debug!("Evicting {} from frame {}", previous, frame_id);
            state.page_table.remove(&previous);
        }

        contents.load(block.clone(), &self.disk_manager)?;
        state.page_table.insert(block.clone(), frame_id);
        Ok(())
    }
}
