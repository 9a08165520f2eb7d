//! Centralized error types for retswire.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the retswire decoders.
///
/// Every variant is reported synchronously from the decode call that hit it.
/// A decode that fails never hands back a partially filled part or record list.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The tabular payload has no COLUMNS block, so no record can be keyed.
    #[error("Compact payload has no COLUMNS block")]
    MissingColumns,

    /// The delimiter could not be resolved (empty, odd-length or non-hex value).
    #[error("No usable delimiter specified")]
    MissingDelimiter,

    /// A multipart part declared a Content-Transfer-Encoding we cannot decode.
    #[error("Unsupported Content-Transfer-Encoding: {0}")]
    UnsupportedTransferEncoding(String),

    /// The boundary token is unusable, or (in strict mode) never occurs in the body.
    #[error("Malformed multipart boundary: {0}")]
    MalformedBoundary(String),

    /// A base64 part body contained characters outside the base64 alphabet.
    #[error("Invalid base64 in part #{part}: {reason}")]
    InvalidBase64 { part: usize, reason: String },

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, DecodeError>`.
pub type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
