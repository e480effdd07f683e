use crate::common::types::FrameId;
use super::Replacer;

/// Linear scan for the first unpinned frame. No recency tracking.
#[derive(Debug, Default)]
pub struct NaiveReplacer;

impl Replacer for NaiveReplacer {
    fn record_pin(&mut self, _frame_id: FrameId) {}

    fn record_unpin(&mut self, _frame_id: FrameId) {}

    fn victim(&mut self, pin_counts: &[u32]) -> Option<FrameId> {
        pin_counts.iter().position(|&count| count == 0)
    }
}
