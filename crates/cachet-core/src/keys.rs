//! Principal key material.
//!
//! Every principal owns a single 32-byte root seed. The X25519 agreement
//! secret (used for content-key wrapping) and the Ed25519 signing key (used
//! for attestations) are both derived from that seed under distinct
//! derivation contexts, so one backup covers both and neither derivation can
//! be confused for the other.
//!
//! Secret-bearing types zeroize on drop and redact their `Debug` output.

use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{AttestationPublicKey, AttestationSignature};

/// Derivation context for the X25519 agreement secret.
const AGREEMENT_CONTEXT: &str = "cachet-keys-v1 agreement";

/// Derivation context for the Ed25519 attestation key.
const ATTESTATION_CONTEXT: &str = "cachet-keys-v1 attestation";

/// The 32-byte root secret of a principal.
///
/// This is the value split by threshold backup and the only secret that must
/// survive; everything else re-derives from it.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeySeed([u8; 32]);

impl KeySeed {
    /// Generate a fresh random seed.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for KeySeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print seed bytes.
        write!(f, "KeySeed(..)")
    }
}

/// A 32-byte X25519 public key used for key agreement.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgreementPublicKey(pub [u8; 32]);

impl AgreementPublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Convert to the dalek representation for DH operations.
    pub fn to_dalek(&self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl fmt::Debug for AgreementPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgreementPub({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for AgreementPublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for AgreementPublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// The public half of a principal's key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalPublicKey {
    /// X25519 key for content-key wrapping.
    pub agreement: AgreementPublicKey,
    /// Ed25519 key for attestation verification.
    pub attestation: AttestationPublicKey,
}

/// A principal's full key material.
///
/// Holds only the root seed; the agreement secret and signing key are
/// derived on demand and never stored.
#[derive(Clone)]
pub struct PrincipalKeyPair {
    seed: KeySeed,
}

impl PrincipalKeyPair {
    /// Generate a keypair from a fresh random seed.
    pub fn generate() -> Self {
        Self {
            seed: KeySeed::generate(),
        }
    }

    /// Rebuild the keypair from a seed.
    pub fn from_seed(seed: KeySeed) -> Self {
        Self { seed }
    }

    /// The root seed (secret key material).
    pub fn seed(&self) -> &KeySeed {
        &self.seed
    }

    /// Derive the X25519 agreement secret.
    pub fn agreement_secret(&self) -> StaticSecret {
        StaticSecret::from(blake3::derive_key(AGREEMENT_CONTEXT, self.seed.as_bytes()))
    }

    /// Derive the Ed25519 signing key.
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&blake3::derive_key(
            ATTESTATION_CONTEXT,
            self.seed.as_bytes(),
        ))
    }

    /// The public half of the key material.
    pub fn public(&self) -> PrincipalPublicKey {
        let agreement = PublicKey::from(&self.agreement_secret());
        let attestation = self.signing_key().verifying_key();
        PrincipalPublicKey {
            agreement: AgreementPublicKey(*agreement.as_bytes()),
            attestation: AttestationPublicKey(attestation.to_bytes()),
        }
    }

    /// Sign a message with the attestation key.
    pub fn sign(&self, message: &[u8]) -> AttestationSignature {
        AttestationSignature(self.signing_key().sign(message).to_bytes())
    }
}

impl fmt::Debug for PrincipalKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrincipalKeyPair({:?})", self.public().agreement)
    }
}
