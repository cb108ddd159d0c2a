//! Error types for the vault.

use cachet_core::{PrincipalId, ResourceId};
use cachet_crypto::CryptoError;
use cachet_registry::RegistryError;
use cachet_store::StoreError;
use thiserror::Error;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Crypto error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// No usable key material for the principal. Covers unknown
    /// principals, escrowed seeds, and hard-deleted keys alike.
    #[error("key not found for principal {0}")]
    KeyNotFound(PrincipalId),

    /// Resource not found.
    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceId),

    /// A resource with this ID is already registered.
    #[error("resource already exists: {0}")]
    ResourceExists(ResourceId),

    /// No backup was recorded for the principal.
    #[error("no backup recorded for principal {0}")]
    BackupNotFound(PrincipalId),

    /// No commitment of the needed kind is attached to the resource.
    #[error("no commitment recorded for resource {0}")]
    CommitmentNotFound(ResourceId),
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
