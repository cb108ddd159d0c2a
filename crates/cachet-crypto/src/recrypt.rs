//! Delegation capabilities.
//!
//! A capability lets a grantee decrypt a resource without ever holding
//! the granter's secret key. The primitive that produces capabilities
//! is pluggable through [`RecryptBackend`]; the shipped backend,
//! [`SealedRewrap`], recovers the content key through the granter's own
//! wrap and re-wraps it for the grantee under a binding derived from
//! both parties' public keys and the resource. Presenting the
//! capability against any other party or resource fails.

use serde::{Deserialize, Serialize};

use cachet_core::{Blake3Hash, PrincipalKeyPair, PrincipalPublicKey, ResourceId};

use crate::cipher::ContentKey;
use crate::engine::EncryptedResource;
use crate::error::{CryptoError, Result};
use crate::wrap::KeyWrap;

/// Derivation context for capability bindings.
const BINDING_CONTEXT: &str = "cachet-delegate-v1 binding";

/// Scheme byte for [`SealedRewrap`] capabilities.
pub const SCHEME_SEALED_REWRAP: u8 = 1;

/// The primitive behind delegation.
///
/// A backend turns an encrypted resource plus the granter's keys into a
/// capability for one grantee, and later turns that capability back
/// into the content key for that grantee alone. Implementations stamp
/// their scheme byte on every capability they produce and refuse
/// capabilities stamped by anyone else.
pub trait RecryptBackend: Send + Sync {
    /// The scheme byte stamped on capabilities from this backend.
    fn scheme(&self) -> u8;

    /// Create a capability for `grantee_public`.
    fn delegate(
        &self,
        resource: &EncryptedResource,
        granter: &PrincipalKeyPair,
        grantee_public: &PrincipalPublicKey,
    ) -> Result<Capability>;

    /// Recover the content key as the grantee.
    fn unseal(
        &self,
        capability: &Capability,
        grantee: &PrincipalKeyPair,
        granter_public: &PrincipalPublicKey,
        resource_id: &ResourceId,
    ) -> Result<ContentKey>;
}

/// A content key re-encrypted for one grantee, bound to one delegation.
///
/// The scheme byte is the first serialized field, so a reader can
/// reject a capability from an unknown backend without parsing the
/// rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Which backend produced this capability.
    pub scheme: u8,

    /// Binding over granter, grantee, and resource.
    pub binding: Blake3Hash,

    /// The content key, wrapped to the grantee under the binding.
    pub wrap: KeyWrap,
}

impl Capability {
    /// Serialize to CBOR bytes for storage on a grant record.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from stored bytes.
    ///
    /// Malformed capability material is indistinguishable from any
    /// other decryption failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|_| CryptoError::DecryptionError)
    }
}

/// The default backend: granter-side unwrap and re-wrap.
///
/// Only the content key crosses from granter to grantee; the granter's
/// key pair is used inside [`RecryptBackend::delegate`] and goes no
/// further.
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedRewrap;

impl RecryptBackend for SealedRewrap {
    fn scheme(&self) -> u8 {
        SCHEME_SEALED_REWRAP
    }

    fn delegate(
        &self,
        resource: &EncryptedResource,
        granter: &PrincipalKeyPair,
        grantee_public: &PrincipalPublicKey,
    ) -> Result<Capability> {
        let content_key = resource
            .owner_wrap
            .open(&granter.agreement_secret(), resource.resource_id.as_bytes())?;

        let binding = binding_digest(&granter.public(), grantee_public, &resource.resource_id);
        let wrap = KeyWrap::seal(&content_key, &grantee_public.agreement, binding.as_bytes())?;

        Ok(Capability {
            scheme: SCHEME_SEALED_REWRAP,
            binding,
            wrap,
        })
    }

    /// The binding is recomputed from the claimed parties and resource;
    /// a capability presented for the wrong granter, grantee, or
    /// resource fails exactly like a bad decryption.
    fn unseal(
        &self,
        capability: &Capability,
        grantee: &PrincipalKeyPair,
        granter_public: &PrincipalPublicKey,
        resource_id: &ResourceId,
    ) -> Result<ContentKey> {
        if capability.scheme != SCHEME_SEALED_REWRAP {
            return Err(CryptoError::DecryptionError);
        }
        let binding = binding_digest(granter_public, &grantee.public(), resource_id);
        if !binding.ct_eq(&capability.binding) {
            return Err(CryptoError::DecryptionError);
        }
        capability
            .wrap
            .open(&grantee.agreement_secret(), binding.as_bytes())
    }
}

fn binding_digest(
    granter: &PrincipalPublicKey,
    grantee: &PrincipalPublicKey,
    resource: &ResourceId,
) -> Blake3Hash {
    let mut hasher = blake3::Hasher::new_derive_key(BINDING_CONTEXT);
    hasher.update(granter.agreement.as_bytes());
    hasher.update(granter.attestation.as_bytes());
    hasher.update(grantee.agreement.as_bytes());
    hasher.update(grantee.attestation.as_bytes());
    hasher.update(resource.as_bytes());
    Blake3Hash(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::ReceiptDocument;

    fn sealed_resource(owner: &PrincipalKeyPair) -> EncryptedResource {
        let document = ReceiptDocument {
            merchant: "Corner Cafe".to_string(),
            purchased_at: 1736870400000,
            currency: "USD".to_string(),
            total_cents: 1250,
            line_items: Vec::new(),
        };
        EncryptedResource::seal(
            &document,
            ResourceId::derive(b"receipt:1"),
            &owner.public().agreement,
            1000,
        )
        .unwrap()
    }

    #[test]
    fn test_grantee_can_decrypt_through_capability() {
        let backend = SealedRewrap;
        let owner = PrincipalKeyPair::generate();
        let grantee = PrincipalKeyPair::generate();
        let resource = sealed_resource(&owner);

        let capability = backend.delegate(&resource, &owner, &grantee.public()).unwrap();
        let content_key = backend
            .unseal(&capability, &grantee, &owner.public(), &resource.resource_id)
            .unwrap();
        let document = resource.open_with_key(&content_key).unwrap();

        assert_eq!(document.merchant, "Corner Cafe");
    }

    #[test]
    fn test_capability_does_not_decrypt_for_others() {
        let backend = SealedRewrap;
        let owner = PrincipalKeyPair::generate();
        let grantee = PrincipalKeyPair::generate();
        let interloper = PrincipalKeyPair::generate();
        let resource = sealed_resource(&owner);

        let capability = backend.delegate(&resource, &owner, &grantee.public()).unwrap();

        assert!(matches!(
            backend.unseal(&capability, &interloper, &owner.public(), &resource.resource_id),
            Err(CryptoError::DecryptionError)
        ));
    }

    #[test]
    fn test_capability_bound_to_resource() {
        let backend = SealedRewrap;
        let owner = PrincipalKeyPair::generate();
        let grantee = PrincipalKeyPair::generate();
        let resource = sealed_resource(&owner);

        let capability = backend.delegate(&resource, &owner, &grantee.public()).unwrap();
        let other_resource = ResourceId::derive(b"receipt:2");

        assert!(matches!(
            backend.unseal(&capability, &grantee, &owner.public(), &other_resource),
            Err(CryptoError::DecryptionError)
        ));
    }

    #[test]
    fn test_capability_bound_to_granter() {
        let backend = SealedRewrap;
        let owner = PrincipalKeyPair::generate();
        let grantee = PrincipalKeyPair::generate();
        let impostor = PrincipalKeyPair::generate();
        let resource = sealed_resource(&owner);

        let capability = backend.delegate(&resource, &owner, &grantee.public()).unwrap();

        assert!(matches!(
            backend.unseal(&capability, &grantee, &impostor.public(), &resource.resource_id),
            Err(CryptoError::DecryptionError)
        ));
    }

    #[test]
    fn test_only_owner_can_delegate() {
        let backend = SealedRewrap;
        let owner = PrincipalKeyPair::generate();
        let stranger = PrincipalKeyPair::generate();
        let grantee = PrincipalKeyPair::generate();
        let resource = sealed_resource(&owner);

        assert!(matches!(
            backend.delegate(&resource, &stranger, &grantee.public()),
            Err(CryptoError::DecryptionError)
        ));
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let backend = SealedRewrap;
        let owner = PrincipalKeyPair::generate();
        let grantee = PrincipalKeyPair::generate();
        let resource = sealed_resource(&owner);

        let mut capability = backend.delegate(&resource, &owner, &grantee.public()).unwrap();
        capability.scheme = 9;

        assert!(matches!(
            backend.unseal(&capability, &grantee, &owner.public(), &resource.resource_id),
            Err(CryptoError::DecryptionError)
        ));
    }

    #[test]
    fn test_capability_bytes_roundtrip() {
        let backend = SealedRewrap;
        let owner = PrincipalKeyPair::generate();
        let grantee = PrincipalKeyPair::generate();
        let resource = sealed_resource(&owner);

        let capability = backend.delegate(&resource, &owner, &grantee.public()).unwrap();
        let restored = Capability::from_bytes(&capability.to_bytes()).unwrap();

        assert_eq!(capability, restored);
        assert_eq!(restored.scheme, SCHEME_SEALED_REWRAP);
    }

    #[test]
    fn test_malformed_capability_collapses() {
        assert!(matches!(
            Capability::from_bytes(b"garbage"),
            Err(CryptoError::DecryptionError)
        ));
    }
}
