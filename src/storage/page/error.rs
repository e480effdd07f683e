use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Access of {len} bytes at offset {offset} exceeds page capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    #[error("Invalid string at offset {0}: not valid UTF-8")]
    InvalidString(usize),
}
