pub mod error;
pub mod frame;
pub mod manager;
pub mod replacer;

pub use error::BufferPoolError;
pub use frame::{Frame, FrameContents, FramePtr};
pub use manager::{BufferPoolConfig, BufferPoolManager};
pub use replacer::ReplacementPolicy;
