//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use bytes::Bytes;

use cachet::{Vault, VaultConfig};
use cachet_core::{
    KeySeed, LineItem, PrincipalId, PrincipalKeyPair, ReceiptDocument, ResourceId, TransferProof,
};
use cachet_store::MemoryStore;

/// A test fixture with a vault over an in-memory store.
pub struct VaultFixture {
    pub vault: Vault<MemoryStore>,
}

impl VaultFixture {
    /// Create a fixture with the default configuration.
    pub fn new() -> Self {
        Self::with_config(VaultConfig::default())
    }

    /// Create a fixture with a specific configuration.
    pub fn with_config(config: VaultConfig) -> Self {
        Self {
            vault: Vault::new(MemoryStore::new(), config),
        }
    }

    /// Derive a principal ID from a short name.
    pub fn principal(&self, name: &str) -> PrincipalId {
        PrincipalId::derive(name.as_bytes())
    }

    /// Store the sample receipt under `owner`, returning the resource
    /// ID.
    pub async fn store_sample(
        &self,
        owner: &PrincipalId,
        asset_ref: &[u8],
    ) -> cachet::Result<ResourceId> {
        self.vault
            .store_receipt(owner, asset_ref, &sample_receipt())
            .await
    }
}

impl Default for VaultFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// The receipt document used across fixture-based tests.
pub fn sample_receipt() -> ReceiptDocument {
    ReceiptDocument {
        merchant: "CoffeeCo".to_string(),
        purchased_at: 1_736_870_400_000,
        currency: "USD".to_string(),
        total_cents: 1250,
        line_items: vec![
            LineItem {
                description: "americano".to_string(),
                quantity: 1,
                unit_cents: 450,
            },
            LineItem {
                description: "croissant".to_string(),
                quantity: 2,
                unit_cents: 400,
            },
        ],
    }
}

/// Distinct principal IDs for multi-party tests.
pub fn multi_party_principals(count: usize) -> Vec<PrincipalId> {
    (0..count)
        .map(|i| PrincipalId::derive(format!("fixture:party:{i}").as_bytes()))
        .collect()
}

/// A deterministic keypair from a repeated seed byte.
pub fn seeded_keypair(byte: u8) -> PrincipalKeyPair {
    PrincipalKeyPair::from_seed(KeySeed::from_bytes([byte; 32]))
}

/// An opaque transfer proof from a short tag.
pub fn transfer_proof(tag: &str) -> TransferProof {
    TransferProof(Bytes::from(tag.as_bytes().to_vec()))
}
