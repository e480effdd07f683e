use linked_hash_map::LinkedHashMap;

use crate::common::types::FrameId;
use super::Replacer;

/// Least-recently-unpinned replacement.
///
/// Holds exactly the frames whose pin count is zero, oldest unpin first.
pub struct LRUReplacer {
    lru_list: LinkedHashMap<FrameId, ()>,
}

impl LRUReplacer {
    pub fn new(pool_size: usize) -> Self {
        let mut lru_list = LinkedHashMap::with_capacity(pool_size);
        for frame_id in 0..pool_size {
            lru_list.insert(frame_id, ());
        }
        Self { lru_list }
    }
}

impl Replacer for LRUReplacer {
    fn record_pin(&mut self, frame_id: FrameId) {
        self.lru_list.remove(&frame_id);
    }

    fn record_unpin(&mut self, frame_id: FrameId) {
        self.lru_list.remove(&frame_id);
        self.lru_list.insert(frame_id, ());
    }

    fn victim(&mut self, pin_counts: &[u32]) -> Option<FrameId> {
        self.lru_list
            .keys()
            .find(|&&frame_id| pin_counts.get(frame_id) == Some(&0))
            .copied()
    }
}
