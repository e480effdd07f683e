use std::time::Duration;
use thiserror::Error;

use crate::common::types::{BlockId, FrameId};
use crate::storage::disk::DiskManagerError;
use crate::transaction::wal::LogManagerError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("No buffer became available for {block} within {waited:?}")]
    Timeout { block: BlockId, waited: Duration },
    #[error("Frame {0} is not pinned")]
    NotPinned(FrameId),
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),
    #[error("Log manager error: {0}")]
    LogManagerError(#[from] LogManagerError),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}
