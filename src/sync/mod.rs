//! Incremental synchronization
//!
//! Size/mtime based skip decisions for files whose destination already exists.

mod skip;

pub use skip::*;
