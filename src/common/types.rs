use std::fmt;
use std::time::Duration;

/// Default block size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 400;

/// Default number of frames in the buffer pool
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Default name of the log file inside the database directory
pub const DEFAULT_LOG_FILE: &str = "stratadb.log";

/// Default bound on how long a pin or lock request waits before failing
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// Transaction ID type
pub type TxnId = u32;

/// LSN (Log Sequence Number) type
pub type Lsn = u64;

/// Buffer pool frame ID type
pub type FrameId = usize;

/// Block number reserved as the lock target for a file's end-of-file marker
const END_OF_FILE: u32 = u32::MAX;

/// Address of a fixed-size block within a named file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    file_name: String,
    number: u32,
}

impl BlockId {
    pub fn new(file_name: impl Into<String>, number: u32) -> Self {
        Self {
            file_name: file_name.into(),
            number,
        }
    }

    /// Pseudo-block that stands for the end of `file_name`.
    ///
    /// Locking it serializes file growth (`append`) against readers of the
    /// file length (`size`). It never refers to real storage.
    pub fn end_of_file(file_name: impl Into<String>) -> Self {
        Self::new(file_name, END_OF_FILE)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_end_of_file(&self) -> bool {
        self.number == END_OF_FILE
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.number)
    }
}
