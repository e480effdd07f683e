pub mod error;
pub mod page;

pub use error::PageError;
pub use page::{Page, INT_SIZE};
