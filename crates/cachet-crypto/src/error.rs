//! Error types for the crypto module.

use thiserror::Error;

/// Errors that can occur during encryption, delegation, and recovery.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The envelope names a scheme this build does not implement.
    /// Raised before any key material is touched.
    #[error("unsupported encryption scheme: {0}")]
    UnsupportedScheme(u8),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption failed. Deliberately carries no detail: wrong key,
    /// tampered ciphertext, and malformed capability material are
    /// indistinguishable to the caller.
    #[error("decryption failed")]
    DecryptionError,

    /// Threshold exceeds share count, or either is zero.
    #[error("invalid threshold configuration: {threshold}-of-{shares}")]
    ThresholdConfigError { threshold: u8, shares: u8 },

    /// Not enough shares submitted to reconstruct.
    #[error("insufficient shares: have {have}, need {need}")]
    InsufficientShares { have: u8, need: u8 },

    /// A submitted share failed verification against the public key
    /// recorded at split time.
    #[error("share verification failed")]
    ShareVerificationFailed,

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] cachet_core::CoreError),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
