//! Error types for reading parsing in airbox-types.

use thiserror::Error;

/// Errors that can occur when parsing a PM2.5 reading line.
///
/// This error type is transport-agnostic and does not include serial
/// errors (those belong in airbox-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The line did not contain a number.
    #[error("invalid reading '{raw}': {reason}")]
    InvalidReading {
        /// The trimmed text that failed to parse.
        raw: String,
        /// Why the text was rejected.
        reason: String,
    },

    /// The line parsed to NaN or infinity.
    #[error("non-finite reading '{raw}'")]
    NonFinite {
        /// The trimmed text that failed to parse.
        raw: String,
    },
}

impl ParseError {
    /// The offending text, as received after trimming.
    pub fn raw(&self) -> &str {
        match self {
            ParseError::InvalidReading { raw, .. } | ParseError::NonFinite { raw } => raw,
        }
    }
}

/// Result type alias using airbox-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
