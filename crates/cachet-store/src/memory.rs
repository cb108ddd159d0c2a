//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use cachet_core::{
    AccessGrant, BackupRecord, Commitment, OwnershipRecord, PrincipalId, PrincipalRecord,
    ResourceId,
};
use cachet_crypto::EncryptedResource;

use crate::error::Result;
use crate::traits::{CasOutcome, InsertOutcome, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Principal records indexed by ID.
    principals: HashMap<PrincipalId, PrincipalRecord>,

    /// Encrypted resources indexed by ID.
    resources: HashMap<ResourceId, EncryptedResource>,

    /// Ownership records indexed by resource ID.
    ownership: HashMap<ResourceId, OwnershipRecord>,

    /// Current grant per (resource, grantee) pair.
    grants: HashMap<(ResourceId, PrincipalId), AccessGrant>,

    /// Commitment ledgers, append order preserved per resource.
    commitments: HashMap<ResourceId, Vec<Commitment>>,

    /// Backup metadata indexed by principal.
    backups: HashMap<PrincipalId, BackupRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner {
                principals: HashMap::new(),
                resources: HashMap::new(),
                ownership: HashMap::new(),
                grants: HashMap::new(),
                commitments: HashMap::new(),
                backups: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_principal(&self, record: &PrincipalRecord) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().unwrap();

        if inner.principals.contains_key(&record.principal_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }

        inner.principals.insert(record.principal_id, record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<PrincipalRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.principals.get(id).cloned())
    }

    async fn replace_principal(&self, record: &PrincipalRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(slot) = inner.principals.get_mut(&record.principal_id) {
            *slot = record.clone();
        }
        Ok(())
    }

    async fn insert_resource(
        &self,
        resource: &EncryptedResource,
        ownership: &OwnershipRecord,
    ) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().unwrap();

        if inner.resources.contains_key(&resource.resource_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }

        inner
            .resources
            .insert(resource.resource_id, resource.clone());
        inner
            .ownership
            .insert(ownership.resource_id, ownership.clone());

        Ok(InsertOutcome::Inserted)
    }

    async fn get_resource(&self, id: &ResourceId) -> Result<Option<EncryptedResource>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.resources.get(id).cloned())
    }

    async fn get_ownership(&self, id: &ResourceId) -> Result<Option<OwnershipRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.ownership.get(id).cloned())
    }

    async fn apply_transfer(
        &self,
        expected_version: u64,
        ownership: &OwnershipRecord,
        resource: &EncryptedResource,
        revoked: &[AccessGrant],
    ) -> Result<CasOutcome> {
        let mut inner = self.inner.write().unwrap();

        let current = match inner.ownership.get(&ownership.resource_id) {
            Some(record) => record.version,
            None => return Ok(CasOutcome::Missing),
        };
        if current != expected_version {
            return Ok(CasOutcome::Conflict {
                current_version: current,
            });
        }

        inner
            .ownership
            .insert(ownership.resource_id, ownership.clone());
        inner
            .resources
            .insert(resource.resource_id, resource.clone());
        for grant in revoked {
            inner
                .grants
                .insert((grant.resource_id, grant.grantee), grant.clone());
        }

        Ok(CasOutcome::Applied)
    }

    async fn purge_resource(&self, id: &ResourceId) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.resources.remove(id);
        inner.ownership.remove(id);
        inner.grants.retain(|(resource_id, _), _| resource_id != id);
        inner.commitments.remove(id);
        Ok(())
    }

    async fn put_grant(
        &self,
        grant: &AccessGrant,
        expected_owner_version: u64,
    ) -> Result<CasOutcome> {
        let mut inner = self.inner.write().unwrap();

        let current = match inner.ownership.get(&grant.resource_id) {
            Some(record) => record.version,
            None => return Ok(CasOutcome::Missing),
        };
        if current != expected_owner_version {
            return Ok(CasOutcome::Conflict {
                current_version: current,
            });
        }

        inner
            .grants
            .insert((grant.resource_id, grant.grantee), grant.clone());
        Ok(CasOutcome::Applied)
    }

    async fn get_grant(
        &self,
        resource_id: &ResourceId,
        grantee: &PrincipalId,
    ) -> Result<Option<AccessGrant>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.grants.get(&(*resource_id, *grantee)).cloned())
    }

    async fn list_grants(&self, resource_id: &ResourceId) -> Result<Vec<AccessGrant>> {
        let inner = self.inner.read().unwrap();

        let mut grants: Vec<AccessGrant> = inner
            .grants
            .iter()
            .filter(|((rid, _), _)| rid == resource_id)
            .map(|(_, grant)| grant.clone())
            .collect();
        grants.sort_by_key(|g| g.grantee);

        Ok(grants)
    }

    async fn replace_grant(&self, grant: &AccessGrant) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(slot) = inner.grants.get_mut(&(grant.resource_id, grant.grantee)) {
            *slot = grant.clone();
        }
        Ok(())
    }

    async fn sweep_expired_grants(&self, now: i64) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.grants.len();
        inner
            .grants
            .retain(|_, grant| !matches!(grant.expires_at, Some(at) if now >= at));
        Ok((before - inner.grants.len()) as u64)
    }

    async fn append_commitment(
        &self,
        resource_id: &ResourceId,
        commitment: &Commitment,
    ) -> Result<InsertOutcome> {
        let mut inner = self.inner.write().unwrap();
        let ledger = inner.commitments.entry(*resource_id).or_default();

        if ledger
            .iter()
            .any(|c| c.subject == commitment.subject && c.kind == commitment.kind)
        {
            return Ok(InsertOutcome::AlreadyExists);
        }

        ledger.push(commitment.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn list_commitments(&self, resource_id: &ResourceId) -> Result<Vec<Commitment>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.commitments.get(resource_id).cloned().unwrap_or_default())
    }

    async fn record_backup(
        &self,
        backup: &BackupRecord,
        principal: &PrincipalRecord,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.backups.insert(backup.principal_id, backup.clone());
        inner
            .principals
            .insert(principal.principal_id, principal.clone());
        Ok(())
    }

    async fn get_backup(&self, principal_id: &PrincipalId) -> Result<Option<BackupRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.backups.get(principal_id).cloned())
    }
}
