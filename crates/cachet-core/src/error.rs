//! Error types for the core crate.

use thiserror::Error;

/// Errors from core primitive operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A public key could not be parsed or used.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// A signature failed verification.
    #[error("invalid signature")]
    InvalidSignature,

    /// Canonical decoding failed.
    #[error("decoding failed: {0}")]
    Decoding(String),

    /// A document decoded, but violated a structural rule.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
