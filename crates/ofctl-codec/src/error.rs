//! Error types for wire encoding and decoding.

use thiserror::Error;

/// Result type alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while decoding wire bytes.
///
/// Every variant is scoped to the message or frame being decoded; callers
/// drop the offending event and continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes than the structure requires.
    #[error("truncated {what}: need {need} bytes, have {have}")]
    Truncated {
        /// What was being decoded.
        what: &'static str,
        /// Bytes required.
        need: usize,
        /// Bytes available.
        have: usize,
    },

    /// A length field is inconsistent with the surrounding structure.
    #[error("bad {what} length: {len}")]
    BadLength {
        /// What carried the length field.
        what: &'static str,
        /// The offending length value.
        len: usize,
    },

    /// A required field was absent from a decoded structure.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl CodecError {
    /// Creates a truncation error.
    pub(crate) fn truncated(what: &'static str, need: usize, have: usize) -> Self {
        CodecError::Truncated { what, need, have }
    }
}
