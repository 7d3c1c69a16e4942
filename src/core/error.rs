//! Error types for the navigation engine.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NaviError {
    /// Rejected at construction or setter time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A per-tick input the engine cannot integrate.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// NaN or infinity reached a decoder. The run cannot continue.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

pub type Result<T> = std::result::Result<T, NaviError>;

pub(crate) fn check_index(what: &'static str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(NaviError::IndexOutOfRange { what, index, len })
    }
}
