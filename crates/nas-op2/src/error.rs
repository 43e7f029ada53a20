//! Error types for nas-op2

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Fatal decoding failure; nothing is consumed from the input when returned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported element type {element_type} in complex stress/strain table")]
    UnsupportedElement { element_type: u32 },

    #[error("{name} (element type {element_type}): num_wide={num_wide}, expected {expected}")]
    WidthMismatch {
        element_type: u32,
        name: &'static str,
        num_wide: usize,
        expected: usize,
    },
}
