//! Hard input errors.
//!
//! These are the only conditions that abort an analysis. Everything else
//! (missing scale, no rooms, implausible values, slow extraction) degrades to a
//! default with a recorded issue.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {0}")]
    FileMissing(PathBuf),

    #[error("input file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("page index {index} out of range (document has {page_count} pages)")]
    PageOutOfRange { index: usize, page_count: usize },

    #[error("invalid user input: {0}")]
    InvalidUserInput(String),
}
