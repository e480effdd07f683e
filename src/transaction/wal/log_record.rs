use std::fmt;
use thiserror::Error;

use crate::common::types::{BlockId, Lsn, TxnId};
use crate::storage::page::{Page, PageError, INT_SIZE};
use crate::transaction::wal::log_manager::{LogManager, LogManagerError};

/// Error type for log record operations
#[derive(Error, Debug)]
pub enum LogRecordError {
    #[error("Unknown log record opcode {0}")]
    UnknownOpcode(i32),

    #[error("Truncated or corrupt log record: {0}")]
    PageError(#[from] PageError),

    #[error("Invalid {field} value {value} in log record")]
    InvalidField { field: &'static str, value: i32 },

    #[error("Log record has {0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

/// Result type for log record operations
pub type Result<T> = std::result::Result<T, LogRecordError>;

/// Types of log records supported by the WAL system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogRecordType {
    /// Marks a quiescent point: every earlier transaction has finished
    Checkpoint,
    /// Marks the beginning of a transaction
    Start,
    /// Marks the successful completion of a transaction
    Commit,
    /// Marks the completed rollback of a transaction
    Rollback,
    /// Before-image of an integer overwritten in place
    SetInt,
    /// Before-image of a string overwritten in place
    SetString,
}

impl LogRecordType {
    /// Integer tag written as the first field of every record
    pub fn opcode(self) -> i32 {
        match self {
            LogRecordType::Checkpoint => 0,
            LogRecordType::Start => 1,
            LogRecordType::Commit => 2,
            LogRecordType::Rollback => 3,
            LogRecordType::SetInt => 4,
            LogRecordType::SetString => 5,
        }
    }

    pub fn from_opcode(opcode: i32) -> Result<Self> {
        match opcode {
            0 => Ok(LogRecordType::Checkpoint),
            1 => Ok(LogRecordType::Start),
            2 => Ok(LogRecordType::Commit),
            3 => Ok(LogRecordType::Rollback),
            4 => Ok(LogRecordType::SetInt),
            5 => Ok(LogRecordType::SetString),
            other => Err(LogRecordError::UnknownOpcode(other)),
        }
    }
}

/// A single write-ahead log record.
///
/// Update records carry only the before-image: the log is used for undo and
/// never for redo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Checkpoint,
    Start {
        txn_id: TxnId,
    },
    Commit {
        txn_id: TxnId,
    },
    Rollback {
        txn_id: TxnId,
    },
    SetInt {
        txn_id: TxnId,
        block: BlockId,
        offset: usize,
        old_value: i32,
    },
    SetString {
        txn_id: TxnId,
        block: BlockId,
        offset: usize,
        old_value: String,
    },
}

impl LogRecord {
    pub fn record_type(&self) -> LogRecordType {
        match self {
            LogRecord::Checkpoint => LogRecordType::Checkpoint,
            LogRecord::Start { .. } => LogRecordType::Start,
            LogRecord::Commit { .. } => LogRecordType::Commit,
            LogRecord::Rollback { .. } => LogRecordType::Rollback,
            LogRecord::SetInt { .. } => LogRecordType::SetInt,
            LogRecord::SetString { .. } => LogRecordType::SetString,
        }
    }

    /// Transaction that wrote the record; checkpoints belong to none
    pub fn txn_id(&self) -> Option<TxnId> {
        match self {
            LogRecord::Checkpoint => None,
            LogRecord::Start { txn_id }
            | LogRecord::Commit { txn_id }
            | LogRecord::Rollback { txn_id }
            | LogRecord::SetInt { txn_id, .. }
            | LogRecord::SetString { txn_id, .. } => Some(*txn_id),
        }
    }

    /// Serialize the record into the flat field layout stored in the log
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = 2 * INT_SIZE;
        let size = match self {
            LogRecord::SetInt { block, .. } => {
                header + Self::block_field_size(block) + 2 * INT_SIZE
            }
            LogRecord::SetString { block, old_value, .. } => {
                header + Self::block_field_size(block) + 2 * INT_SIZE + old_value.len()
            }
            _ => header,
        };

        let mut writer = RecordWriter::new(size);
        writer.put_int(self.record_type().opcode())?;
        writer.put_int(self.txn_id().unwrap_or(0) as i32)?;

        match self {
            LogRecord::SetInt { block, offset, old_value, .. } => {
                writer.put_block(block)?;
                writer.put_int(*offset as i32)?;
                writer.put_int(*old_value)?;
            }
            LogRecord::SetString { block, offset, old_value, .. } => {
                writer.put_block(block)?;
                writer.put_int(*offset as i32)?;
                writer.put_string(old_value)?;
            }
            LogRecord::Checkpoint
            | LogRecord::Start { .. }
            | LogRecord::Commit { .. }
            | LogRecord::Rollback { .. } => {}
        }

        Ok(writer.finish())
    }

    /// Parse a record produced by `to_bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = RecordReader::new(bytes);
        let record_type = LogRecordType::from_opcode(reader.get_int()?)?;
        let txn_id = reader.get_unsigned("txnum")?;

        let record = match record_type {
            LogRecordType::Checkpoint => LogRecord::Checkpoint,
            LogRecordType::Start => LogRecord::Start { txn_id },
            LogRecordType::Commit => LogRecord::Commit { txn_id },
            LogRecordType::Rollback => LogRecord::Rollback { txn_id },
            LogRecordType::SetInt => LogRecord::SetInt {
                txn_id,
                block: reader.get_block()?,
                offset: reader.get_unsigned("offset")? as usize,
                old_value: reader.get_int()?,
            },
            LogRecordType::SetString => LogRecord::SetString {
                txn_id,
                block: reader.get_block()?,
                offset: reader.get_unsigned("offset")? as usize,
                old_value: reader.get_string()?,
            },
        };

        match reader.remaining() {
            0 => Ok(record),
            extra => Err(LogRecordError::TrailingBytes(extra)),
        }
    }

    /// Serialize the record and append it to the log, returning its LSN
    pub fn write_to_log(&self, log_manager: &LogManager) -> std::result::Result<Lsn, LogManagerError> {
        let bytes = self.to_bytes()?;
        log_manager.append(&bytes)
    }

    fn block_field_size(block: &BlockId) -> usize {
        2 * INT_SIZE + block.file_name().len()
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Checkpoint => write!(f, "<CHECKPOINT>"),
            LogRecord::Start { txn_id } => write!(f, "<START {}>", txn_id),
            LogRecord::Commit { txn_id } => write!(f, "<COMMIT {}>", txn_id),
            LogRecord::Rollback { txn_id } => write!(f, "<ROLLBACK {}>", txn_id),
            LogRecord::SetInt { txn_id, block, offset, old_value } => {
                write!(f, "<SETINT {} {} {} {}>", txn_id, block, offset, old_value)
            }
            LogRecord::SetString { txn_id, block, offset, old_value } => {
                write!(f, "<SETSTRING {} {} {} {}>", txn_id, block, offset, old_value)
            }
        }
    }
}

/// Sequential field writer over an exactly-sized page
struct RecordWriter {
    page: Page,
    pos: usize,
}

impl RecordWriter {
    fn new(size: usize) -> Self {
        Self {
            page: Page::new(size),
            pos: 0,
        }
    }

    fn put_int(&mut self, value: i32) -> Result<()> {
        self.page.set_int(self.pos, value)?;
        self.pos += INT_SIZE;
        Ok(())
    }

    fn put_string(&mut self, value: &str) -> Result<()> {
        self.page.set_string(self.pos, value)?;
        self.pos += INT_SIZE + value.len();
        Ok(())
    }

    fn put_block(&mut self, block: &BlockId) -> Result<()> {
        self.put_string(block.file_name())?;
        self.put_int(block.number() as i32)
    }

    fn finish(self) -> Vec<u8> {
        self.page.contents().to_vec()
    }
}

/// Sequential field reader; every read is bounds-checked by `Page`
struct RecordReader {
    page: Page,
    pos: usize,
}

impl RecordReader {
    fn new(bytes: &[u8]) -> Self {
        Self {
            page: Page::from_bytes(bytes.to_vec()),
            pos: 0,
        }
    }

    fn get_int(&mut self) -> Result<i32> {
        let value = self.page.get_int(self.pos)?;
        self.pos += INT_SIZE;
        Ok(value)
    }

    fn get_unsigned(&mut self, field: &'static str) -> Result<u32> {
        let value = self.get_int()?;
        u32::try_from(value).map_err(|_| LogRecordError::InvalidField { field, value })
    }

    fn get_string(&mut self) -> Result<String> {
        let value = self.page.get_string(self.pos)?;
        self.pos += INT_SIZE + value.len();
        Ok(value)
    }

    fn get_block(&mut self) -> Result<BlockId> {
        let file_name = self.get_string()?;
        let number = self.get_int()? as u32;
        Ok(BlockId::new(file_name, number))
    }

    fn remaining(&self) -> usize {
        self.page.capacity().saturating_sub(self.pos)
    }
}
