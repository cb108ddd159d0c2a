//! # Cachet Testkit
//!
//! Testing utilities for Cachet.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known test cases with expected digests for cross-platform verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Golden Vectors
//!
//! Golden vectors ensure deterministic canonicalization across implementations:
//!
//! ```rust
//! use cachet_testkit::vectors::{all_vectors, vector_digest};
//!
//! for vector in all_vectors() {
//!     println!("{}: {}", vector.name, vector_digest(&vector).to_hex());
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cachet_testkit::generators::{resource_from_params, SealParams};
//!
//! proptest! {
//!     #[test]
//!     fn sealed_documents_round_trip(params: SealParams) {
//!         let resource = resource_from_params(&params).unwrap();
//!         let opened = resource.open_as_owner(&params.keypair).unwrap();
//!         prop_assert_eq!(opened, params.document);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust
//! use cachet_testkit::fixtures::{sample_receipt, VaultFixture};
//!
//! let fixture = VaultFixture::new();
//! let owner = fixture.principal("acct:owner");
//! let receipt = sample_receipt();
//! assert_eq!(receipt.total_cents, 1250);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_principals, sample_receipt, seeded_keypair, VaultFixture};
pub use generators::{resource_from_params, SealParams};
pub use vectors::{
    all_vectors, document_from_vector, vector_digest, verify_all_vectors, DeterminismVector,
};
