//! Error types for the registry module.

use cachet_core::{PrincipalId, ResourceId};
use cachet_crypto::CryptoError;
use cachet_store::StoreError;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The resource has no ownership record.
    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceId),

    /// The grant window closed before the read.
    #[error("grant for {grantee} on {resource} expired at {expired_at}")]
    GrantExpired {
        resource: ResourceId,
        grantee: PrincipalId,
        expired_at: i64,
    },

    /// The principal has no standing on the resource: never granted,
    /// or revoked.
    #[error("principal {principal} is not authorized on resource {resource}")]
    Unauthorized {
        resource: ResourceId,
        principal: PrincipalId,
    },

    /// A transfer named a prior owner that no longer holds the resource.
    #[error("transfer of {resource} claimed owner {claimed}, current owner is {actual}")]
    InvalidTransfer {
        resource: ResourceId,
        claimed: PrincipalId,
        actual: PrincipalId,
    },

    /// The compare-and-swap kept losing; the caller should back off
    /// and retry.
    #[error("gave up on contended resource {0}")]
    Contention(ResourceId),

    /// Cryptographic failure while re-keying during a transfer.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
