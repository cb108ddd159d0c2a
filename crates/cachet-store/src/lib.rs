//! # Cachet Store
//!
//! Storage abstraction for Cachet. Provides a trait-based interface for
//! persisting principals, encrypted resources, grants, commitments, and
//! backups, with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait,
//! allowing the registry and vault to be storage-agnostic. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertOutcome`] - Result of inserting a keyed record
//! - [`CasOutcome`] - Result of a versioned compare-and-swap
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cachet_store::{SqliteStore, Store, InsertOutcome};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("cachet.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     // Insert a principal record
//!     // let record: PrincipalRecord = ...;
//!     // let outcome = store.insert_principal(&record).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Inserting under an occupied key returns
//!   `AlreadyExists` without overwriting
//! - **Versioned ownership**: Transfers and grants are compare-and-swaps
//!   against the ownership version, so concurrent writers serialize
//! - **Transactional composites**: Multi-record writes (resource +
//!   ownership, transfer + revocations, backup + escrow) are atomic
//! - **Opaque records**: Each row stores its record as a CBOR blob
//!   beside the columns used for lookups

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CasOutcome, InsertOutcome, Store, StoreExt};
