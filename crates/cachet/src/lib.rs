//! # Cachet
//!
//! Encrypted receipt custody with delegated access, auditable
//! commitments, and threshold key recovery.
//!
//! ## Overview
//!
//! Cachet keeps purchase receipts encrypted end to end while letting
//! their owners share them on their own terms:
//!
//! - **Principals**: identities with lazily created keypairs; seeds can
//!   be escrowed into recovery shares and reinstated later
//! - **Receipts**: documents sealed under a fresh content key, wrapped
//!   to the owner; only ciphertext is persisted
//! - **Delegation**: grants carry a sealed capability re-keyed for one
//!   grantee, at full, limited, or verification-only disclosure
//! - **Ownership**: transfers re-key the resource to the new owner and
//!   revoke every outstanding grant in the same write
//! - **Commitments**: stores, grants, and transfers leave signed
//!   ledger entries an auditor can verify without seeing content
//!
//! ## Key Concepts
//!
//! - **Access is re-checked at use time.** A capability alone opens
//!   nothing; every read consults the registry first.
//! - **Records are values.** Grants, ownership, and key records are
//!   replaced atomically, never mutated in place.
//! - **Denials are plain.** Decryption failures carry no cause; access
//!   refusals name one.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cachet::{AccessLevel, PrincipalId, Vault, VaultConfig};
//! use cachet::core::{LineItem, ReceiptDocument};
//! use cachet::store::MemoryStore;
//!
//! async fn example() {
//!     let vault = Vault::new(MemoryStore::new(), VaultConfig::default());
//!
//!     let alice = PrincipalId::derive(b"wallet:alice");
//!     let bob = PrincipalId::derive(b"wallet:bob");
//!     vault.register_principal(&alice).await.unwrap();
//!
//!     let document = ReceiptDocument {
//!         merchant: "CoffeeCo".to_string(),
//!         purchased_at: 1_736_870_400_000,
//!         currency: "USD".to_string(),
//!         total_cents: 1250,
//!         line_items: vec![LineItem {
//!             description: "americano".to_string(),
//!             quantity: 1,
//!             unit_cents: 1250,
//!         }],
//!     };
//!
//!     let resource_id = vault
//!         .store_receipt(&alice, b"chain:tx:77", &document)
//!         .await
//!         .unwrap();
//!
//!     // Share the summary with bob for a day.
//!     vault
//!         .grant_access(&alice, &bob, &resource_id, AccessLevel::Limited, None)
//!         .await
//!         .unwrap();
//!
//!     let view = vault.read_receipt(&bob, &resource_id).await.unwrap();
//!     println!("bob sees: {view:?}");
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `cachet::core` - Identifiers, key material, records, commitments
//! - `cachet::crypto` - Envelopes, delegation backend, secret sharing
//! - `cachet::store` - Storage trait, in-memory and SQLite backends
//! - `cachet::registry` - Access decisions and the transfer cascade

pub mod error;
pub mod keyring;
pub mod ledger;
pub mod vault;

// Re-export component crates
pub use cachet_core as core;
pub use cachet_crypto as crypto;
pub use cachet_registry as registry;
pub use cachet_store as store;

// Re-export main types for convenience
pub use error::{Result, VaultError};
pub use keyring::KeyManager;
pub use ledger::CommitmentLedger;
pub use vault::{ReceiptView, Vault, VaultConfig};

// Re-export commonly used component types
pub use cachet_core::{
    AccessGrant, AccessLevel, Commitment, CommitmentKind, GrantId, KeyState, OwnershipRecord,
    PrincipalId, PrincipalPublicKey, ReceiptDocument, ReceiptSummary, ResourceId, TransferProof,
};
pub use cachet_crypto::{EncryptedResource, RecoverySession, ThresholdKeyShare};
pub use cachet_registry::{AccessDecision, DenialReason};
