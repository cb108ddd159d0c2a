//! Store trait: the abstract interface for Cachet persistence.
//!
//! This trait keeps the registry and vault storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;

use cachet_core::{
    AccessGrant, BackupRecord, Commitment, OwnershipRecord, PrincipalId, PrincipalRecord,
    ResourceId,
};
use cachet_crypto::EncryptedResource;

use crate::error::Result;

/// Result of inserting a keyed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Record was inserted successfully.
    Inserted,
    /// A record already exists under this key (idempotent - not an error).
    AlreadyExists,
}

/// Result of a compare-and-swap against an ownership version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The expected version matched and the write went through.
    Applied,
    /// The stored version moved since it was read; nothing was written.
    Conflict {
        /// The version currently in the store.
        current_version: u64,
    },
    /// No ownership record exists for the resource; nothing was written.
    Missing,
}

/// The Store trait: async interface for Cachet persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Idempotent inserts**: Inserting under an occupied key returns
///   `AlreadyExists` without touching the stored record.
/// - **Versioned ownership**: Every write that depends on who owns a
///   resource is a compare-and-swap against [`OwnershipRecord::version`],
///   so concurrent transfers and grants serialize per resource.
/// - **Composite writes are transactional**: A method that names more
///   than one record persists all of them or none.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Principal Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a principal record if none exists for its ID.
    ///
    /// Returns `AlreadyExists` without overwriting when the principal
    /// is already present, which makes racing first-writers safe.
    async fn insert_principal(&self, record: &PrincipalRecord) -> Result<InsertOutcome>;

    /// Get a principal record by ID.
    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<PrincipalRecord>>;

    /// Replace a principal record wholesale.
    ///
    /// Used for lifecycle transitions (escrow, restore, delete). The
    /// record must already exist; replacing a missing principal is a
    /// no-op rather than an insert.
    async fn replace_principal(&self, record: &PrincipalRecord) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Resource & Ownership Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an encrypted resource together with its initial ownership.
    ///
    /// The two records land in one transaction. Returns `AlreadyExists`
    /// and writes nothing if the resource ID is taken.
    async fn insert_resource(
        &self,
        resource: &EncryptedResource,
        ownership: &OwnershipRecord,
    ) -> Result<InsertOutcome>;

    /// Get an encrypted resource by ID.
    async fn get_resource(&self, id: &ResourceId) -> Result<Option<EncryptedResource>>;

    /// Get the ownership record for a resource.
    async fn get_ownership(&self, id: &ResourceId) -> Result<Option<OwnershipRecord>>;

    /// Apply an ownership transfer as a single compare-and-swap.
    ///
    /// When the stored ownership version equals `expected_version`, one
    /// transaction replaces the ownership record, replaces the resource
    /// (its wrap re-keyed to the new owner), and writes the revoked
    /// copies of the prior owner's grants. Any version mismatch leaves
    /// the store untouched and reports `Conflict`.
    async fn apply_transfer(
        &self,
        expected_version: u64,
        ownership: &OwnershipRecord,
        resource: &EncryptedResource,
        revoked: &[AccessGrant],
    ) -> Result<CasOutcome>;

    /// Remove a resource and everything keyed to it.
    ///
    /// Deletes the resource, its ownership record, its grants, and its
    /// commitments in one transaction. Removing an unknown resource is
    /// a no-op.
    async fn purge_resource(&self, id: &ResourceId) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Write a grant, guarded by the granter still owning the resource.
    ///
    /// The grant replaces any prior record for `(resource_id, grantee)`
    /// when the ownership version still equals `expected_owner_version`;
    /// otherwise nothing is written. `Missing` means the resource has no
    /// ownership record at all.
    async fn put_grant(&self, grant: &AccessGrant, expected_owner_version: u64)
        -> Result<CasOutcome>;

    /// Get the current grant for a grantee on a resource.
    ///
    /// Revoked and expired grants stay readable here; interpreting
    /// validity is the registry's job.
    async fn get_grant(
        &self,
        resource_id: &ResourceId,
        grantee: &PrincipalId,
    ) -> Result<Option<AccessGrant>>;

    /// List all grants on a resource, in grantee order.
    async fn list_grants(&self, resource_id: &ResourceId) -> Result<Vec<AccessGrant>>;

    /// Replace an existing grant record in place.
    ///
    /// Used to persist revocation copies. Replacing a grant that is not
    /// stored is a no-op.
    async fn replace_grant(&self, grant: &AccessGrant) -> Result<()>;

    /// Delete grants whose expiry is at or before `now`.
    ///
    /// Housekeeping only; expired grants already fail validity checks.
    /// Returns the number of rows removed.
    async fn sweep_expired_grants(&self, now: i64) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Commitment Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a commitment to a resource's ledger.
    ///
    /// Idempotent on `(resource_id, subject, kind)`: appending the same
    /// commitment twice returns `AlreadyExists` and keeps the original.
    async fn append_commitment(
        &self,
        resource_id: &ResourceId,
        commitment: &Commitment,
    ) -> Result<InsertOutcome>;

    /// List a resource's commitments in the order they were appended.
    async fn list_commitments(&self, resource_id: &ResourceId) -> Result<Vec<Commitment>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Backup Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a backup and the escrowed principal it produced.
    ///
    /// One transaction writes the backup metadata and replaces the
    /// principal record, so a principal is never observed escrowed
    /// without its backup or vice versa. A later backup for the same
    /// principal replaces the earlier one.
    async fn record_backup(
        &self,
        backup: &BackupRecord,
        principal: &PrincipalRecord,
    ) -> Result<()>;

    /// Get the backup metadata for a principal, if one was recorded.
    async fn get_backup(&self, principal_id: &PrincipalId) -> Result<Option<BackupRecord>>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Fetch a resource and its ownership record together.
    ///
    /// Returns `None` unless both halves are present; one without the
    /// other means the resource was purged mid-read and is treated as
    /// absent.
    fn get_resource_bundle(
        &self,
        id: &ResourceId,
    ) -> impl std::future::Future<Output = Result<Option<(EncryptedResource, OwnershipRecord)>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn get_resource_bundle(
        &self,
        id: &ResourceId,
    ) -> Result<Option<(EncryptedResource, OwnershipRecord)>> {
        let Some(resource) = self.get_resource(id).await? else {
            return Ok(None);
        };
        let Some(ownership) = self.get_ownership(id).await? else {
            return Ok(None);
        };
        Ok(Some((resource, ownership)))
    }
}
