//! Hybrid encryption of receipt documents.
//!
//! Sealing a document generates a fresh content key, encrypts the
//! canonical document bytes under it, and wraps the content key to the
//! owner's agreement key. The unsplit content key exists only inside
//! the sealing call; afterwards it is reachable only through a wrap.

use serde::{Deserialize, Serialize};

use cachet_core::{AgreementPublicKey, PrincipalKeyPair, ReceiptDocument, ResourceId};

use crate::cipher::ContentKey;
use crate::envelope::SealedEnvelope;
use crate::error::{CryptoError, Result};
use crate::wrap::KeyWrap;

/// An encrypted receipt document as persisted.
///
/// Carries the sealed envelope plus the owner's key wrap. Grantee
/// wraps live on grant records, not here, so adding or revoking a
/// grantee never rewrites the resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedResource {
    pub resource_id: ResourceId,
    pub envelope: SealedEnvelope,
    pub owner_wrap: KeyWrap,
    pub created_at: i64,
}

impl EncryptedResource {
    /// Seal a document for an owner.
    pub fn seal(
        document: &ReceiptDocument,
        resource_id: ResourceId,
        owner: &AgreementPublicKey,
        now: i64,
    ) -> Result<Self> {
        let content_key = ContentKey::generate();
        let envelope = SealedEnvelope::seal(&document.canonical_bytes(), &content_key)?;
        let owner_wrap = KeyWrap::seal(&content_key, owner, resource_id.as_bytes())?;

        Ok(Self {
            resource_id,
            envelope,
            owner_wrap,
            created_at: now,
        })
    }

    /// Recover the content key through the owner's wrap.
    ///
    /// The scheme tag is checked before the wrap is opened, so an
    /// unsupported envelope fails without touching key material.
    pub fn content_key_as_owner(&self, owner: &PrincipalKeyPair) -> Result<ContentKey> {
        self.envelope.check_scheme()?;
        self.owner_wrap
            .open(&owner.agreement_secret(), self.resource_id.as_bytes())
    }

    /// Decrypt and decode as the owner.
    pub fn open_as_owner(&self, owner: &PrincipalKeyPair) -> Result<ReceiptDocument> {
        let content_key = self.content_key_as_owner(owner)?;
        self.open_with_key(&content_key)
    }

    /// Decrypt and decode with an already-recovered content key.
    pub fn open_with_key(&self, key: &ContentKey) -> Result<ReceiptDocument> {
        let plaintext = self.envelope.open(key)?;
        // An authenticated payload that fails to decode was sealed
        // malformed; collapse rather than describe.
        ReceiptDocument::from_canonical_bytes(&plaintext)
            .map_err(|_| CryptoError::DecryptionError)
    }
}
