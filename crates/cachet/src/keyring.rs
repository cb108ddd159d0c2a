//! Per-principal key lifecycle.
//!
//! Key material lives in the store as [`PrincipalRecord`]s and moves
//! through three states: `Active` (seed held, everything works),
//! `Escrowed` (seed split into recovery shares and dropped), and the
//! terminal `Deleted`. Public keys are served in every state so that
//! old attestations keep verifying; private-key operations require an
//! active seed.

use std::sync::Arc;

use cachet_core::{
    BackupRecord, KeySeed, KeyState, PrincipalId, PrincipalKeyPair, PrincipalPublicKey,
    PrincipalRecord,
};
use cachet_crypto::{seed_fingerprint, split_seed, ThresholdKeyShare};
use cachet_store::{InsertOutcome, Store};

use crate::error::{Result, VaultError};

/// Manages keypair records for principals.
///
/// Creation is lazy and idempotent: the first operation that needs a
/// principal's keys generates them. Deletion is terminal and is never
/// undone by a later get-or-create.
pub struct KeyManager<S> {
    store: Arc<S>,
}

impl<S: Store> KeyManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Ensure the principal has key material, returning the public
    /// half. Never exposes the seed.
    pub async fn get_or_create(
        &self,
        principal: &PrincipalId,
        now: i64,
    ) -> Result<PrincipalPublicKey> {
        Ok(self.get_or_create_record(principal, now).await?.public)
    }

    /// The principal's public keys, served in any state.
    pub async fn public_key(&self, principal: &PrincipalId) -> Result<PrincipalPublicKey> {
        Ok(self.require_record(principal).await?.public)
    }

    /// Lifecycle state of the principal's key material.
    pub async fn state(&self, principal: &PrincipalId) -> Result<KeyState> {
        Ok(self.require_record(principal).await?.state)
    }

    /// Hard-revoke the principal's keys. Terminal and idempotent; a
    /// principal that never existed is left nonexistent.
    pub async fn delete(&self, principal: &PrincipalId, now: i64) -> Result<()> {
        let Some(record) = self.store.get_principal(principal).await? else {
            return Ok(());
        };
        if record.state == KeyState::Deleted {
            return Ok(());
        }
        self.store.replace_principal(&record.deleted(now)).await?;
        tracing::info!(principal = %principal, "deleted key material");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Crate-internal access to records and seeds
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) async fn get_or_create_record(
        &self,
        principal: &PrincipalId,
        now: i64,
    ) -> Result<PrincipalRecord> {
        if let Some(record) = self.store.get_principal(principal).await? {
            return checked(record, principal);
        }

        let keys = PrincipalKeyPair::generate();
        let record = PrincipalRecord::new_active(*principal, &keys, now);
        match self.store.insert_principal(&record).await? {
            InsertOutcome::Inserted => {
                tracing::debug!(principal = %principal, "generated keypair");
                Ok(record)
            }
            // Lost the creation race; the record that won is the truth.
            InsertOutcome::AlreadyExists => {
                let record = self
                    .store
                    .get_principal(principal)
                    .await?
                    .ok_or(VaultError::KeyNotFound(*principal))?;
                checked(record, principal)
            }
        }
    }

    /// The full keypair, for private-key operations. Fails unless the
    /// record is active with a seed on hand.
    pub(crate) async fn keypair(&self, principal: &PrincipalId) -> Result<PrincipalKeyPair> {
        let record = self.require_record(principal).await?;
        record_keypair(&record).ok_or(VaultError::KeyNotFound(*principal))
    }

    pub(crate) async fn get_or_create_keypair(
        &self,
        principal: &PrincipalId,
        now: i64,
    ) -> Result<PrincipalKeyPair> {
        let record = self.get_or_create_record(principal, now).await?;
        record_keypair(&record).ok_or(VaultError::KeyNotFound(*principal))
    }

    /// Split the principal's seed into `share_count` recovery shares
    /// and drop it locally.
    ///
    /// The backup metadata and the escrowed record land in one write,
    /// so a crash cannot leave the seed dropped with no way back.
    pub(crate) async fn escrow(
        &self,
        principal: &PrincipalId,
        threshold: u8,
        share_count: u8,
        now: i64,
    ) -> Result<Vec<ThresholdKeyShare>> {
        let record = self.require_record(principal).await?;
        let keys = record_keypair(&record).ok_or(VaultError::KeyNotFound(*principal))?;
        let shares = split_seed(&keys, threshold, share_count)?;

        let backup = BackupRecord {
            principal_id: *principal,
            fingerprint: seed_fingerprint(keys.seed()),
            attestation: record.public.attestation,
            threshold,
            share_count,
            created_at: now,
        };
        self.store
            .record_backup(&backup, &record.escrowed(now))
            .await?;
        tracing::info!(
            principal = %principal,
            threshold,
            share_count,
            "escrowed seed into recovery shares"
        );
        Ok(shares)
    }

    /// Reinstate a recovered seed. The caller has already checked the
    /// seed against the backup fingerprint and attestation key.
    pub(crate) async fn restore(
        &self,
        principal: &PrincipalId,
        seed: KeySeed,
        now: i64,
    ) -> Result<PrincipalPublicKey> {
        let record = self.require_record(principal).await?;
        if record.state == KeyState::Deleted {
            return Err(VaultError::KeyNotFound(*principal));
        }
        let restored = record.restored(seed, now);
        self.store.replace_principal(&restored).await?;
        tracing::info!(principal = %principal, "restored key material from recovery");
        Ok(restored.public)
    }

    async fn require_record(&self, principal: &PrincipalId) -> Result<PrincipalRecord> {
        self.store
            .get_principal(principal)
            .await?
            .ok_or(VaultError::KeyNotFound(*principal))
    }
}

/// Deletion is terminal: a deleted record behaves like no record for
/// get-or-create, never a regeneration target.
fn checked(record: PrincipalRecord, principal: &PrincipalId) -> Result<PrincipalRecord> {
    if record.state == KeyState::Deleted {
        return Err(VaultError::KeyNotFound(*principal));
    }
    Ok(record)
}

/// Rebuild the keypair from a record that still holds its seed.
pub(crate) fn record_keypair(record: &PrincipalRecord) -> Option<PrincipalKeyPair> {
    if !record.is_usable() {
        return None;
    }
    record.seed.clone().map(PrincipalKeyPair::from_seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_store::MemoryStore;

    fn manager() -> KeyManager<MemoryStore> {
        KeyManager::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let keys = manager();
        let alice = PrincipalId::derive(b"alice");

        let first = keys.get_or_create(&alice, 100).await.unwrap();
        let second = keys.get_or_create(&alice, 200).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(keys.state(&alice).await.unwrap(), KeyState::Active);
    }

    #[tokio::test]
    async fn test_unknown_principal_has_no_keys() {
        let keys = manager();
        let ghost = PrincipalId::derive(b"ghost");
        assert!(matches!(
            keys.public_key(&ghost).await,
            Err(VaultError::KeyNotFound(p)) if p == ghost
        ));
    }

    #[tokio::test]
    async fn test_deleted_principal_is_never_regenerated() {
        let keys = manager();
        let alice = PrincipalId::derive(b"alice");
        keys.get_or_create(&alice, 100).await.unwrap();

        keys.delete(&alice, 200).await.unwrap();
        assert_eq!(keys.state(&alice).await.unwrap(), KeyState::Deleted);

        assert!(matches!(
            keys.get_or_create(&alice, 300).await,
            Err(VaultError::KeyNotFound(_))
        ));
        assert!(matches!(
            keys.keypair(&alice).await,
            Err(VaultError::KeyNotFound(_))
        ));
        // Deleting again is a no-op.
        keys.delete(&alice, 400).await.unwrap();
    }

    #[tokio::test]
    async fn test_escrow_drops_seed_but_serves_public_keys() {
        let keys = manager();
        let alice = PrincipalId::derive(b"alice");
        let public = keys.get_or_create(&alice, 100).await.unwrap();

        let shares = keys.escrow(&alice, 2, 3, 200).await.unwrap();
        assert_eq!(shares.len(), 3);
        assert_eq!(keys.state(&alice).await.unwrap(), KeyState::Escrowed);

        // Public keys survive; private-key operations do not.
        assert_eq!(keys.public_key(&alice).await.unwrap(), public);
        assert!(matches!(
            keys.keypair(&alice).await,
            Err(VaultError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_restore_reinstates_the_same_keys() {
        let keys = manager();
        let alice = PrincipalId::derive(b"alice");
        let public = keys.get_or_create(&alice, 100).await.unwrap();
        let seed = keys.keypair(&alice).await.unwrap().seed().clone();

        keys.escrow(&alice, 2, 3, 200).await.unwrap();
        let restored = keys.restore(&alice, seed, 300).await.unwrap();

        assert_eq!(restored, public);
        assert_eq!(keys.state(&alice).await.unwrap(), KeyState::Active);
        assert!(keys.keypair(&alice).await.is_ok());
    }

    #[tokio::test]
    async fn test_escrow_requires_an_active_seed() {
        let keys = manager();
        let alice = PrincipalId::derive(b"alice");
        keys.get_or_create(&alice, 100).await.unwrap();
        keys.escrow(&alice, 2, 3, 200).await.unwrap();

        // Already escrowed: no seed left to split.
        assert!(matches!(
            keys.escrow(&alice, 2, 3, 300).await,
            Err(VaultError::KeyNotFound(_))
        ));
    }
}
