//! # Cachet Core
//!
//! Pure primitives for Cachet: principals, receipt documents, grants,
//! commitments, and canonicalization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`PrincipalId`] / [`ResourceId`] - Blake3-derived identifiers
//! - [`PrincipalKeyPair`] - Agreement and attestation keys from one seed
//! - [`ReceiptDocument`] - The plaintext unit protected by the system
//! - [`AccessGrant`] / [`OwnershipRecord`] - Persisted delegation state
//! - [`Commitment`] - Signed integrity binding over canonical bytes
//!
//! ## Canonicalization
//!
//! Everything hashed, committed, or encrypted is encoded as
//! deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod commitment;
pub mod crypto;
pub mod document;
pub mod error;
pub mod keys;
pub mod records;
pub mod types;

pub use canonical::{
    canonical_document_bytes, canonical_grant_bytes, canonical_transfer_bytes,
    document_from_canonical,
};
pub use commitment::{Commitment, CommitmentKind};
pub use crypto::{AttestationPublicKey, AttestationSignature, Blake3Hash};
pub use document::{AccessLevel, LineItem, ReceiptDocument, ReceiptSummary};
pub use error::CoreError;
pub use keys::{AgreementPublicKey, KeySeed, PrincipalKeyPair, PrincipalPublicKey};
pub use records::{
    AccessGrant, BackupRecord, KeyState, OwnershipRecord, PrincipalRecord, Revocation,
    RevocationCause, TransferEntry, TransferProof,
};
pub use types::{GrantId, PrincipalId, ResourceId, ShareId};
