//! # Cachet Crypto
//!
//! Hybrid encryption, delegation capabilities, and threshold recovery.
//!
//! Every resource is sealed under a fresh ChaCha20-Poly1305 content
//! key; the content key is wrapped to recipients through ephemeral
//! X25519 agreement. Delegation re-wraps the content key for a grantee
//! without exposing the granter's secret, and threshold recovery splits
//! a principal's seed across custodians.
//!
//! ## Key Types
//!
//! - [`EncryptedResource`] - A sealed document plus the owner's key wrap
//! - [`Capability`] / [`RecryptBackend`] - Delegated decryption
//! - [`ThresholdKeyShare`] / [`RecoverySession`] - T-of-N seed recovery
//!
//! ## Failure Discipline
//!
//! All decryption failures collapse to [`CryptoError::DecryptionError`];
//! only an unsupported scheme tag is distinguishable, and that check
//! runs before any key material is touched. Errors never carry keys or
//! plaintext.

pub mod cipher;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod recovery;
pub mod recrypt;
pub mod wrap;

pub use cipher::{ContentKey, ContentNonce, EphemeralKeyPair, SharedKey};
pub use engine::EncryptedResource;
pub use envelope::{SealedEnvelope, SCHEME_CHACHA20POLY1305};
pub use error::{CryptoError, Result};
pub use recovery::{
    seed_fingerprint, split_seed, RecoveryProgress, RecoverySession, ShareValue,
    ThresholdKeyShare,
};
pub use recrypt::{Capability, RecryptBackend, SealedRewrap, SCHEME_SEALED_REWRAP};
pub use wrap::KeyWrap;
