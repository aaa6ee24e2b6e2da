//! Format decoders for flpinfo.
//!
//! Decodes FL Studio project files (`.flp`) into the IR.

mod flp_format;

pub use flp_format::load_flp;

use thiserror::Error;

/// Error type for format parsing.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    #[error("invalid file header")]
    InvalidHeader,
    /// Unexpected end of file
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Variable-length size prefix longer than five bytes
    #[error("invalid event length at byte {0}")]
    InvalidLength(usize),
}
