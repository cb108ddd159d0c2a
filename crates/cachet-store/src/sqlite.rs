//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Cachet. It uses rusqlite
//! with bundled SQLite, wrapped in async via tokio::spawn_blocking.
//!
//! Every record is stored as a CBOR blob beside the columns used for
//! lookups and compare-and-swap, so reads decode one blob and writes
//! never have to reassemble a record from columns.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use cachet_core::{
    AccessGrant, BackupRecord, Commitment, KeyState, OwnershipRecord, PrincipalId,
    PrincipalRecord, ResourceId,
};
use cachet_crypto::EncryptedResource;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CasOutcome, InsertOutcome, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(&path)?;
        migration::migrate(&mut conn)?;
        tracing::debug!(path = %path.as_ref().display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Runtime(format!("connection mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Runtime(format!("blocking task failed: {}", e)))?
    }
}

// Record blobs travel as ordinary (non-canonical) CBOR; nothing stored
// here is hashed or signed over its storage encoding.

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Encoding(e.to_string()))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Encoding(e.to_string()))
}

fn key_state_code(state: KeyState) -> i64 {
    match state {
        KeyState::Active => 0,
        KeyState::Escrowed => 1,
        KeyState::Deleted => 2,
    }
}

/// An [`AccessGrant`] flattened into its indexed columns plus blob.
struct GrantRow {
    resource_id: ResourceId,
    grantee: PrincipalId,
    granter: PrincipalId,
    expires_at: Option<i64>,
    revoked: bool,
    blob: Vec<u8>,
}

fn grant_row(grant: &AccessGrant) -> Result<GrantRow> {
    Ok(GrantRow {
        resource_id: grant.resource_id,
        grantee: grant.grantee,
        granter: grant.granter,
        expires_at: grant.expires_at,
        revoked: grant.is_revoked(),
        blob: encode(grant)?,
    })
}

fn upsert_grant_row(conn: &Connection, row: &GrantRow) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO grants (resource_id, grantee, granter, expires_at, revoked, record)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.resource_id.0.as_slice(),
            row.grantee.0.as_slice(),
            row.granter.0.as_slice(),
            row.expires_at,
            row.revoked as i64,
            row.blob,
        ],
    )?;
    Ok(())
}

fn read_ownership_version(conn: &Connection, resource_id: &ResourceId) -> Result<Option<u64>> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM ownership WHERE resource_id = ?1",
            params![resource_id.0.as_slice()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.map(|v| v as u64))
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_principal(&self, record: &PrincipalRecord) -> Result<InsertOutcome> {
        let id = record.principal_id;
        let state = key_state_code(record.state);
        let updated_at = record.updated_at;
        let blob = encode(record)?;

        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO principals (principal_id, state, record, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.0.as_slice(), state, blob, updated_at],
            )?;

            Ok(if changed == 0 {
                InsertOutcome::AlreadyExists
            } else {
                InsertOutcome::Inserted
            })
        })
        .await
    }

    async fn get_principal(&self, id: &PrincipalId) -> Result<Option<PrincipalRecord>> {
        let id = *id;

        let blob: Option<Vec<u8>> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT record FROM principals WHERE principal_id = ?1",
                    params![id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StoreError::from)
            })
            .await?;

        blob.map(|b| decode(&b)).transpose()
    }

    async fn replace_principal(&self, record: &PrincipalRecord) -> Result<()> {
        let id = record.principal_id;
        let state = key_state_code(record.state);
        let updated_at = record.updated_at;
        let blob = encode(record)?;

        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE principals SET state = ?2, record = ?3, updated_at = ?4
                 WHERE principal_id = ?1",
                params![id.0.as_slice(), state, blob, updated_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_resource(
        &self,
        resource: &EncryptedResource,
        ownership: &OwnershipRecord,
    ) -> Result<InsertOutcome> {
        let resource_id = resource.resource_id;
        let created_at = resource.created_at;
        let owner = ownership.owner;
        let version = ownership.version;
        let resource_blob = encode(resource)?;
        let ownership_blob = encode(ownership)?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let taken: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM resources WHERE resource_id = ?1",
                    params![resource_id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Ok(InsertOutcome::AlreadyExists);
            }

            tx.execute(
                "INSERT INTO resources (resource_id, record, created_at) VALUES (?1, ?2, ?3)",
                params![resource_id.0.as_slice(), resource_blob, created_at],
            )?;
            tx.execute(
                "INSERT INTO ownership (resource_id, owner, version, record)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    resource_id.0.as_slice(),
                    owner.0.as_slice(),
                    version as i64,
                    ownership_blob,
                ],
            )?;

            tx.commit()?;
            Ok(InsertOutcome::Inserted)
        })
        .await
    }

    async fn get_resource(&self, id: &ResourceId) -> Result<Option<EncryptedResource>> {
        let id = *id;

        let blob: Option<Vec<u8>> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT record FROM resources WHERE resource_id = ?1",
                    params![id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StoreError::from)
            })
            .await?;

        blob.map(|b| decode(&b)).transpose()
    }

    async fn get_ownership(&self, id: &ResourceId) -> Result<Option<OwnershipRecord>> {
        let id = *id;

        let blob: Option<Vec<u8>> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT record FROM ownership WHERE resource_id = ?1",
                    params![id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StoreError::from)
            })
            .await?;

        blob.map(|b| decode(&b)).transpose()
    }

    async fn apply_transfer(
        &self,
        expected_version: u64,
        ownership: &OwnershipRecord,
        resource: &EncryptedResource,
        revoked: &[AccessGrant],
    ) -> Result<CasOutcome> {
        let resource_id = ownership.resource_id;
        let owner = ownership.owner;
        let version = ownership.version;
        let ownership_blob = encode(ownership)?;
        let resource_blob = encode(resource)?;
        let revoked_rows: Vec<GrantRow> = revoked.iter().map(grant_row).collect::<Result<_>>()?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let current = match read_ownership_version(&tx, &resource_id)? {
                Some(v) => v,
                None => return Ok(CasOutcome::Missing),
            };
            if current != expected_version {
                return Ok(CasOutcome::Conflict {
                    current_version: current,
                });
            }

            tx.execute(
                "UPDATE ownership SET owner = ?2, version = ?3, record = ?4
                 WHERE resource_id = ?1",
                params![
                    resource_id.0.as_slice(),
                    owner.0.as_slice(),
                    version as i64,
                    ownership_blob,
                ],
            )?;
            tx.execute(
                "UPDATE resources SET record = ?2 WHERE resource_id = ?1",
                params![resource_id.0.as_slice(), resource_blob],
            )?;
            for row in &revoked_rows {
                upsert_grant_row(&tx, row)?;
            }

            tx.commit()?;
            Ok(CasOutcome::Applied)
        })
        .await
    }

    async fn purge_resource(&self, id: &ResourceId) -> Result<()> {
        let id = *id;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM resources WHERE resource_id = ?1",
                params![id.0.as_slice()],
            )?;
            tx.execute(
                "DELETE FROM ownership WHERE resource_id = ?1",
                params![id.0.as_slice()],
            )?;
            tx.execute(
                "DELETE FROM grants WHERE resource_id = ?1",
                params![id.0.as_slice()],
            )?;
            tx.execute(
                "DELETE FROM commitments WHERE resource_id = ?1",
                params![id.0.as_slice()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn put_grant(
        &self,
        grant: &AccessGrant,
        expected_owner_version: u64,
    ) -> Result<CasOutcome> {
        let row = grant_row(grant)?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let current = match read_ownership_version(&tx, &row.resource_id)? {
                Some(v) => v,
                None => return Ok(CasOutcome::Missing),
            };
            if current != expected_owner_version {
                return Ok(CasOutcome::Conflict {
                    current_version: current,
                });
            }

            upsert_grant_row(&tx, &row)?;

            tx.commit()?;
            Ok(CasOutcome::Applied)
        })
        .await
    }

    async fn get_grant(
        &self,
        resource_id: &ResourceId,
        grantee: &PrincipalId,
    ) -> Result<Option<AccessGrant>> {
        let resource_id = *resource_id;
        let grantee = *grantee;

        let blob: Option<Vec<u8>> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT record FROM grants WHERE resource_id = ?1 AND grantee = ?2",
                    params![resource_id.0.as_slice(), grantee.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StoreError::from)
            })
            .await?;

        blob.map(|b| decode(&b)).transpose()
    }

    async fn list_grants(&self, resource_id: &ResourceId) -> Result<Vec<AccessGrant>> {
        let resource_id = *resource_id;

        let blobs: Vec<Vec<u8>> = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT record FROM grants WHERE resource_id = ?1 ORDER BY grantee",
                )?;
                let blobs = stmt
                    .query_map(params![resource_id.0.as_slice()], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(blobs)
            })
            .await?;

        blobs.iter().map(|b| decode(b)).collect()
    }

    async fn replace_grant(&self, grant: &AccessGrant) -> Result<()> {
        let row = grant_row(grant)?;

        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE grants SET granter = ?3, expires_at = ?4, revoked = ?5, record = ?6
                 WHERE resource_id = ?1 AND grantee = ?2",
                params![
                    row.resource_id.0.as_slice(),
                    row.grantee.0.as_slice(),
                    row.granter.0.as_slice(),
                    row.expires_at,
                    row.revoked as i64,
                    row.blob,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn sweep_expired_grants(&self, now: i64) -> Result<u64> {
        let removed = self
            .with_conn(move |conn| {
                let changed = conn.execute(
                    "DELETE FROM grants WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                Ok(changed as u64)
            })
            .await?;

        if removed > 0 {
            tracing::debug!(removed, "swept expired grants");
        }
        Ok(removed)
    }

    async fn append_commitment(
        &self,
        resource_id: &ResourceId,
        commitment: &Commitment,
    ) -> Result<InsertOutcome> {
        let resource_id = *resource_id;
        let subject = commitment.subject;
        let kind = commitment.kind.tag();
        let blob = encode(commitment)?;

        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO commitments (resource_id, subject, kind, record)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    resource_id.0.as_slice(),
                    subject.0.as_slice(),
                    kind as i64,
                    blob,
                ],
            )?;

            Ok(if changed == 0 {
                InsertOutcome::AlreadyExists
            } else {
                InsertOutcome::Inserted
            })
        })
        .await
    }

    async fn list_commitments(&self, resource_id: &ResourceId) -> Result<Vec<Commitment>> {
        let resource_id = *resource_id;

        let blobs: Vec<Vec<u8>> = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT record FROM commitments WHERE resource_id = ?1 ORDER BY seq",
                )?;
                let blobs = stmt
                    .query_map(params![resource_id.0.as_slice()], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(blobs)
            })
            .await?;

        blobs.iter().map(|b| decode(b)).collect()
    }

    async fn record_backup(
        &self,
        backup: &BackupRecord,
        principal: &PrincipalRecord,
    ) -> Result<()> {
        let principal_id = backup.principal_id;
        let created_at = backup.created_at;
        let backup_blob = encode(backup)?;
        let state = key_state_code(principal.state);
        let updated_at = principal.updated_at;
        let principal_blob = encode(principal)?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT OR REPLACE INTO backups (principal_id, record, created_at)
                 VALUES (?1, ?2, ?3)",
                params![principal_id.0.as_slice(), backup_blob, created_at],
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO principals (principal_id, state, record, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![principal_id.0.as_slice(), state, principal_blob, updated_at],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_backup(&self, principal_id: &PrincipalId) -> Result<Option<BackupRecord>> {
        let principal_id = *principal_id;

        let blob: Option<Vec<u8>> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT record FROM backups WHERE principal_id = ?1",
                    params![principal_id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StoreError::from)
            })
            .await?;

        blob.map(|b| decode(&b)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cachet_core::{
        AccessLevel, GrantId, PrincipalKeyPair, ReceiptDocument, RevocationCause, TransferProof,
    };

    fn sample_document() -> ReceiptDocument {
        ReceiptDocument {
            merchant: "Corner Cafe".to_string(),
            purchased_at: 1736870400000,
            currency: "USD".to_string(),
            total_cents: 1250,
            line_items: Vec::new(),
        }
    }

    fn sealed_resource(owner: &PrincipalKeyPair, label: &[u8]) -> EncryptedResource {
        EncryptedResource::seal(
            &sample_document(),
            ResourceId::derive(label),
            &owner.public().agreement,
            1000,
        )
        .unwrap()
    }

    fn sample_grant(
        resource_id: ResourceId,
        granter: PrincipalId,
        grantee: PrincipalId,
        expires_at: Option<i64>,
    ) -> AccessGrant {
        AccessGrant {
            grant_id: GrantId::derive(&resource_id, &granter, &grantee, 1000),
            resource_id,
            granter,
            grantee,
            level: AccessLevel::Full,
            capability: Some(Bytes::from_static(b"sealed")),
            created_at: 1000,
            expires_at,
            revoked: None,
        }
    }

    #[tokio::test]
    async fn test_sqlite_principal_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let keys = PrincipalKeyPair::generate();
        let id = PrincipalId::derive(b"alice");
        let record = PrincipalRecord::new_active(id, &keys, 100);

        assert_eq!(
            store.insert_principal(&record).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert_principal(&record).await.unwrap(),
            InsertOutcome::AlreadyExists
        );

        let stored = store.get_principal(&id).await.unwrap().unwrap();
        assert_eq!(stored.public, keys.public());
        assert!(stored.is_usable());

        // Lifecycle transition persists through replace.
        store.replace_principal(&record.escrowed(200)).await.unwrap();
        let stored = store.get_principal(&id).await.unwrap().unwrap();
        assert!(!stored.is_usable());
        assert!(stored.seed.is_none());
    }

    #[tokio::test]
    async fn test_sqlite_resource_and_grant_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let bob = PrincipalId::derive(b"bob");

        let resource = sealed_resource(&keys, b"receipt:1");
        let rid = resource.resource_id;
        store
            .insert_resource(&resource, &OwnershipRecord::new(rid, alice, 1000))
            .await
            .unwrap();

        let stored = store.get_resource(&rid).await.unwrap().unwrap();
        assert_eq!(stored, resource);

        let grant = sample_grant(rid, alice, bob, Some(9000));
        assert_eq!(
            store.put_grant(&grant, 1).await.unwrap(),
            CasOutcome::Applied
        );
        let stored = store.get_grant(&rid, &bob).await.unwrap().unwrap();
        assert_eq!(stored, grant);

        // Replacing with the revoked copy keeps it readable.
        store
            .replace_grant(&grant.revoked(2000, RevocationCause::Explicit))
            .await
            .unwrap();
        let stored = store.get_grant(&rid, &bob).await.unwrap().unwrap();
        assert!(stored.is_revoked());
        let listed = store.list_grants(&rid).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_transfer_cas() {
        let store = SqliteStore::open_memory().unwrap();
        let alice_keys = PrincipalKeyPair::generate();
        let dana_keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let bob = PrincipalId::derive(b"bob");
        let dana = PrincipalId::derive(b"dana");

        let resource = sealed_resource(&alice_keys, b"receipt:1");
        let rid = resource.resource_id;
        let ownership = OwnershipRecord::new(rid, alice, 1000);
        store.insert_resource(&resource, &ownership).await.unwrap();
        store
            .put_grant(&sample_grant(rid, alice, bob, None), 1)
            .await
            .unwrap();

        let transferred =
            ownership.transferred(dana, TransferProof(Bytes::from_static(b"p")), 2000);
        let rewrapped = sealed_resource(&dana_keys, b"receipt:1");
        let revoked = vec![sample_grant(rid, alice, bob, None)
            .revoked(2000, RevocationCause::OwnerChanged)];

        assert_eq!(
            store
                .apply_transfer(1, &transferred, &rewrapped, &revoked)
                .await
                .unwrap(),
            CasOutcome::Applied
        );
        assert_eq!(
            store
                .apply_transfer(1, &transferred, &rewrapped, &[])
                .await
                .unwrap(),
            CasOutcome::Conflict { current_version: 2 }
        );

        let owned = store.get_ownership(&rid).await.unwrap().unwrap();
        assert_eq!(owned.owner, dana);
        assert_eq!(owned.history.len(), 1);
        assert!(store
            .get_grant(&rid, &bob)
            .await
            .unwrap()
            .unwrap()
            .is_revoked());
        // The stored resource now carries the re-keyed wrap.
        let stored = store.get_resource(&rid).await.unwrap().unwrap();
        assert_eq!(stored, rewrapped);
    }

    #[tokio::test]
    async fn test_sqlite_commitments_ordered_and_idempotent() {
        let store = SqliteStore::open_memory().unwrap();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let rid = ResourceId::derive(b"receipt:1");

        let first = Commitment::create(
            cachet_core::CommitmentKind::Receipt,
            alice,
            &keys,
            b"payload",
            1000,
        );
        let second = Commitment::create(
            cachet_core::CommitmentKind::Transfer,
            alice,
            &keys,
            b"transfer",
            2000,
        );

        assert_eq!(
            store.append_commitment(&rid, &first).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.append_commitment(&rid, &second).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.append_commitment(&rid, &first).await.unwrap(),
            InsertOutcome::AlreadyExists
        );

        let listed = store.list_commitments(&rid).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], first);
        assert_eq!(listed[1], second);
    }

    #[tokio::test]
    async fn test_sqlite_sweep_and_purge() {
        let store = SqliteStore::open_memory().unwrap();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let bob = PrincipalId::derive(b"bob");
        let carol = PrincipalId::derive(b"carol");

        let resource = sealed_resource(&keys, b"receipt:1");
        let rid = resource.resource_id;
        store
            .insert_resource(&resource, &OwnershipRecord::new(rid, alice, 1000))
            .await
            .unwrap();
        store
            .put_grant(&sample_grant(rid, alice, bob, Some(5000)), 1)
            .await
            .unwrap();
        store
            .put_grant(&sample_grant(rid, alice, carol, None), 1)
            .await
            .unwrap();

        assert_eq!(store.sweep_expired_grants(5000).await.unwrap(), 1);
        assert!(store.get_grant(&rid, &bob).await.unwrap().is_none());
        assert!(store.get_grant(&rid, &carol).await.unwrap().is_some());

        store.purge_resource(&rid).await.unwrap();
        assert!(store.get_resource(&rid).await.unwrap().is_none());
        assert!(store.get_ownership(&rid).await.unwrap().is_none());
        assert!(store.list_grants(&rid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cachet.db");

        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let resource = sealed_resource(&keys, b"receipt:1");
        let rid = resource.resource_id;

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert_principal(&PrincipalRecord::new_active(alice, &keys, 100))
                .await
                .unwrap();
            store
                .insert_resource(&resource, &OwnershipRecord::new(rid, alice, 1000))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let principal = store.get_principal(&alice).await.unwrap().unwrap();
        assert_eq!(principal.public, keys.public());
        let stored = store.get_resource(&rid).await.unwrap().unwrap();
        assert_eq!(stored, resource);
    }

    #[tokio::test]
    async fn test_sqlite_backup_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let keys = PrincipalKeyPair::generate();
        let id = PrincipalId::derive(b"alice");
        let record = PrincipalRecord::new_active(id, &keys, 100);
        store.insert_principal(&record).await.unwrap();

        let backup = BackupRecord {
            principal_id: id,
            fingerprint: cachet_crypto::seed_fingerprint(keys.seed()),
            attestation: keys.public().attestation,
            threshold: 2,
            share_count: 3,
            created_at: 200,
        };
        store
            .record_backup(&backup, &record.escrowed(200))
            .await
            .unwrap();

        assert_eq!(store.get_backup(&id).await.unwrap().unwrap(), backup);
        let stored = store.get_principal(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, KeyState::Escrowed);
    }
}
