//! Persisted record types.
//!
//! Every record here is an immutable value: state transitions produce a
//! new record that replaces the stored one atomically, they never mutate
//! in place. Storage backends serialize these with ordinary `ciborium`;
//! only payloads that are hashed, signed, or committed go through the
//! canonical encoder.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::crypto::{AttestationPublicKey, Blake3Hash};
use crate::document::AccessLevel;
use crate::keys::{KeySeed, PrincipalKeyPair, PrincipalPublicKey};
use crate::types::{GrantId, PrincipalId, ResourceId};

/// Lifecycle state of a principal's key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyState {
    /// Seed is held locally; all operations available.
    Active,
    /// Seed was split into recovery shares and dropped locally.
    /// Private-key operations fail until recovery completes.
    Escrowed,
    /// Hard-revoked. The seed is gone and is never regenerated for
    /// this principal.
    Deleted,
}

/// A principal and its key material as persisted.
///
/// The seed is present only while the state is [`KeyState::Active`].
/// Public keys survive escrow and deletion so that signatures made
/// before the transition still verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub principal_id: PrincipalId,
    pub public: PrincipalPublicKey,
    pub seed: Option<KeySeed>,
    pub state: KeyState,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PrincipalRecord {
    /// Create an active record from a freshly generated or restored
    /// key pair.
    pub fn new_active(principal_id: PrincipalId, keys: &PrincipalKeyPair, now: i64) -> Self {
        Self {
            principal_id,
            public: keys.public(),
            seed: Some(keys.seed().clone()),
            state: KeyState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the seed is held and private-key operations may run.
    pub fn is_usable(&self) -> bool {
        self.state == KeyState::Active && self.seed.is_some()
    }

    /// Copy with the seed dropped and the state set to escrowed.
    pub fn escrowed(&self, now: i64) -> Self {
        Self {
            seed: None,
            state: KeyState::Escrowed,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Copy with the seed restored from recovery.
    pub fn restored(&self, seed: KeySeed, now: i64) -> Self {
        Self {
            seed: Some(seed),
            state: KeyState::Active,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Copy hard-revoked. Deletion is terminal.
    pub fn deleted(&self, now: i64) -> Self {
        Self {
            seed: None,
            state: KeyState::Deleted,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Why a grant stopped being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevocationCause {
    /// The granter revoked it directly.
    Explicit,
    /// The resource changed owner and all prior grants were invalidated.
    OwnerChanged,
}

/// Revocation metadata retained on the grant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub revoked_at: i64,
    pub cause: RevocationCause,
}

/// A delegation of access from a resource owner to another principal.
///
/// The sealed capability travels with the grant record so the two are
/// persisted in one write. Verification-only grants carry no capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub grant_id: GrantId,
    pub resource_id: ResourceId,
    pub granter: PrincipalId,
    pub grantee: PrincipalId,
    pub level: AccessLevel,
    /// Sealed capability bytes, opaque at this layer.
    pub capability: Option<Bytes>,
    pub created_at: i64,
    /// Milliseconds since epoch; `None` means no expiry.
    pub expires_at: Option<i64>,
    pub revoked: Option<Revocation>,
}

impl AccessGrant {
    pub fn is_revoked(&self) -> bool {
        self.revoked.is_some()
    }

    /// A grant expires at the instant `now == expires_at`; it is valid
    /// strictly before that.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    pub fn is_valid(&self, now: i64) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }

    /// Copy marked revoked, retaining the full original record as
    /// audit metadata.
    pub fn revoked(&self, at: i64, cause: RevocationCause) -> Self {
        Self {
            revoked: Some(Revocation {
                revoked_at: at,
                cause,
            }),
            ..self.clone()
        }
    }
}

/// External evidence for an ownership transfer, opaque to this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProof(pub Bytes);

impl TransferProof {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One completed hand-off in a resource's ownership history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub from: PrincipalId,
    pub to: PrincipalId,
    pub proof: TransferProof,
    pub transferred_at: i64,
}

/// Current owner of a resource plus its full transfer history.
///
/// The version counter increments on every applied transfer and backs
/// the compare-and-swap that serializes per-resource updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub resource_id: ResourceId,
    pub owner: PrincipalId,
    pub version: u64,
    pub created_at: i64,
    pub history: Vec<TransferEntry>,
}

impl OwnershipRecord {
    pub fn new(resource_id: ResourceId, owner: PrincipalId, now: i64) -> Self {
        Self {
            resource_id,
            owner,
            version: 1,
            created_at: now,
            history: Vec::new(),
        }
    }

    /// Copy with ownership handed to `to` and the version bumped.
    pub fn transferred(&self, to: PrincipalId, proof: TransferProof, now: i64) -> Self {
        let mut history = self.history.clone();
        history.push(TransferEntry {
            from: self.owner,
            to,
            proof,
            transferred_at: now,
        });
        Self {
            resource_id: self.resource_id,
            owner: to,
            version: self.version + 1,
            created_at: self.created_at,
            history,
        }
    }
}

/// Metadata recorded when a principal's seed is split for backup.
///
/// Shares themselves are handed to custodians and never persisted here.
/// The attestation key lets submitted shares be verified during
/// recovery; the fingerprint confirms a reconstructed seed matches the
/// one that was split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub principal_id: PrincipalId,
    pub fingerprint: Blake3Hash,
    pub attestation: AttestationPublicKey,
    pub threshold: u8,
    pub share_count: u8,
    pub created_at: i64,
}
