//! # Cachet Registry
//!
//! Access control for Cachet: ownership, grants, and the decisions
//! built from them.
//!
//! ## Overview
//!
//! The registry sits between the vault and the store. It answers "may
//! this principal read this resource right now", records and revokes
//! grants on behalf of resource owners, and applies ownership transfers
//! with their revocation cascade. Every ownership-dependent write goes
//! through the store's versioned compare-and-swap, so concurrent
//! transfers and grants on one resource serialize without locks.
//!
//! ## Key Types
//!
//! - [`AccessRegistry`] - The coordination layer over a [`cachet_store::Store`]
//! - [`AccessDecision`] - Owner, granted, or denied with a reason
//! - [`ReadAuthorization`] - Positive proof carried to the decryption path
//! - [`TransferOutcome`] - The applied hand-off and the grants it revoked
//!
//! ## Design Notes
//!
//! - **No key material**: The registry never sees seeds or content
//!   keys; transfers take a re-keying closure supplied by the caller
//! - **Denials are specific**: Never-granted, revoked, and expired are
//!   distinct outcomes, and the read path maps them to distinct errors
//! - **Stale transfers fail closed**: A transfer claiming a prior owner
//!   is rejected against current ownership and writes nothing

pub mod error;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::{
    AccessDecision, AccessRegistry, DenialReason, ReadAuthorization, TransferOutcome,
};
