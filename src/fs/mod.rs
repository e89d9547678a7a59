//! File system layer
//!
//! Directory enumeration behind the [`DirectoryLister`] capability, the
//! buffered [`FileCopier`], and per-commit [`ExclusionSet`] rules.

mod exclusion;
mod lister;
mod operations;

pub use exclusion::*;
pub use lister::*;
pub use operations::*;
