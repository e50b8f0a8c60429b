//! Error types for the vocoder's fallible surface.
//!
//! Only model loading can fail; the synthesis path itself is total over
//! well-formed inputs and enforces its caller contract with assertions.

use thiserror::Error;

/// Errors returned by weight-blob parsing and model initialization.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Error)]
pub enum Error {
    /// The weight blob is not in the expected binary format.
    #[error("malformed weight blob")]
    InvalidBlob,
    /// A required weight array is missing or has the wrong size.
    #[error("missing or mismatched weight array")]
    IncompleteModel,
}

/// A specialized [`Result`](std::result::Result) type for vocoder operations.
pub type Result<T> = std::result::Result<T, Error>;
