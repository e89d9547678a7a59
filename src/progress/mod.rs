//! Progress reporting module
//!
//! Run summaries and the append-only error log.

mod error_log;
mod reporter;

pub use error_log::*;
pub use reporter::*;
