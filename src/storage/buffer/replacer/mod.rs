mod lru;
mod naive;

use std::fmt;
use std::str::FromStr;

use crate::common::types::FrameId;

pub use lru::LRUReplacer;
pub use naive::NaiveReplacer;

/// Victim selection policy for frames whose pin count is zero.
///
/// The pool calls `record_pin` when a frame's pin count leaves zero and
/// `record_unpin` when it returns to zero.
pub trait Replacer: Send {
    fn record_pin(&mut self, frame_id: FrameId);

    fn record_unpin(&mut self, frame_id: FrameId);

    /// Choose an unpinned frame to reuse; `pin_counts` is indexed by frame ID
    fn victim(&mut self, pin_counts: &[u32]) -> Option<FrameId>;
}

/// Which replacer a buffer pool is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacementPolicy {
    /// First unpinned frame in frame order
    #[default]
    Naive,
    /// Frame that has been unpinned the longest
    Lru,
}

impl ReplacementPolicy {
    pub fn build(self, pool_size: usize) -> Box<dyn Replacer> {
        match self {
            ReplacementPolicy::Naive => Box::new(NaiveReplacer),
            ReplacementPolicy::Lru => Box::new(LRUReplacer::new(pool_size)),
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementPolicy::Naive => write!(f, "naive"),
            ReplacementPolicy::Lru => write!(f, "lru"),
        }
    }
}

impl FromStr for ReplacementPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "naive" => Ok(ReplacementPolicy::Naive),
            "lru" => Ok(ReplacementPolicy::Lru),
            other => Err(format!("unknown replacement policy '{}' (expected naive or lru)", other)),
        }
    }
}
