use byteorder::{ByteOrder, LittleEndian};

use crate::storage::page::error::PageError;

/// Size in bytes of an encoded integer and of a length prefix
pub const INT_SIZE: usize = 4;

/// Widest UTF-8 encoding of a single character
const MAX_BYTES_PER_CHAR: usize = 4;

/// Fixed-length in-memory image of one block.
///
/// Integers are stored little-endian. Byte strings and strings are stored as a
/// 4-byte length followed by the bytes. A write that would not fit fails
/// before touching the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    data: Vec<u8>,
}

impl Page {
    /// Create a zero-filled page of `block_size` bytes
    pub fn new(block_size: usize) -> Self {
        Self {
            data: vec![0; block_size],
        }
    }

    /// Wrap existing bytes, e.g. a serialized log record
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { data: bytes }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn get_int(&self, offset: usize) -> Result<i32, PageError> {
        let range = self.range(offset, INT_SIZE)?;
        Ok(LittleEndian::read_i32(&self.data[range]))
    }

    pub fn set_int(&mut self, offset: usize, value: i32) -> Result<(), PageError> {
        let range = self.range(offset, INT_SIZE)?;
        LittleEndian::write_i32(&mut self.data[range], value);
        Ok(())
    }

    pub fn get_bytes(&self, offset: usize) -> Result<&[u8], PageError> {
        let prefix = self.range(offset, INT_SIZE)?;
        let len = LittleEndian::read_u32(&self.data[prefix]) as usize;
        let range = self.range(offset + INT_SIZE, len)?;
        Ok(&self.data[range])
    }

    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), PageError> {
        if !self.fits(offset, bytes.len()) {
            return Err(PageError::OutOfBounds {
                offset,
                len: INT_SIZE + bytes.len(),
                capacity: self.capacity(),
            });
        }

        let start = offset + INT_SIZE;
        LittleEndian::write_u32(&mut self.data[offset..start], bytes.len() as u32);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn get_string(&self, offset: usize) -> Result<String, PageError> {
        let bytes = self.get_bytes(offset)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PageError::InvalidString(offset))
    }

    pub fn set_string(&mut self, offset: usize, value: &str) -> Result<(), PageError> {
        self.set_bytes(offset, value.as_bytes())
    }

    /// Whether a length-prefixed value of `len` bytes fits at `offset`
    pub fn fits(&self, offset: usize, len: usize) -> bool {
        offset
            .checked_add(INT_SIZE + len)
            .is_some_and(|end| end <= self.capacity())
    }

    /// Worst-case number of bytes needed to store a string of `strlen` characters
    pub fn max_length(strlen: usize) -> usize {
        INT_SIZE + strlen * MAX_BYTES_PER_CHAR
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero the whole page
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    fn range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>, PageError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity() => Ok(offset..end),
            _ => Err(PageError::OutOfBounds {
                offset,
                len,
                capacity: self.capacity(),
            }),
        }
    }
}
