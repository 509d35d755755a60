//! Disk access for table files.
//!
//! A table file is a plain concatenation of `PAGE_SIZE` blocks with no file
//! header: page `k` lives at byte offset `k * PAGE_SIZE`.

pub mod page_manager;

pub use page_manager::{PageManager, PAGE_SIZE};
