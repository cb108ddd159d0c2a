//! The access registry: who may read what, and who owns what.
//!
//! The registry turns stored ownership and grant records into access
//! decisions, and serializes every ownership-dependent write through
//! the store's versioned compare-and-swap. It holds no key material;
//! callers hand it sealed capabilities and a re-keying closure where
//! cryptography is needed.

use std::sync::Arc;

use cachet_core::{
    AccessGrant, OwnershipRecord, PrincipalId, ResourceId, RevocationCause, TransferProof,
};
use cachet_crypto::EncryptedResource;
use cachet_store::{CasOutcome, InsertOutcome, Store, StoreExt};

use crate::error::{RegistryError, Result};

/// How many times a versioned write re-reads and retries before the
/// resource is reported as contended.
const MAX_CAS_RETRIES: usize = 8;

/// Why an access check came back negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// No such resource is registered.
    UnknownResource,
    /// The principal never held a grant on the resource.
    NoGrant,
    /// The grant was revoked, explicitly or by an ownership change.
    Revoked,
    /// The grant's validity window has closed.
    Expired {
        /// When the window closed (Unix ms).
        expired_at: i64,
    },
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The principal owns the resource.
    Owner,
    /// A live grant covers the principal; the grant carries the level
    /// and sealed capability.
    Granted(AccessGrant),
    /// No access.
    Denied(DenialReason),
}

impl AccessDecision {
    /// True when the decision permits access at some level.
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Owner | AccessDecision::Granted(_))
    }
}

/// Positive proof of read access, carried from the access check to the
/// decryption path so the two cannot disagree.
#[derive(Debug, Clone)]
pub enum ReadAuthorization {
    /// Read through the resource's owner wrap.
    Owner,
    /// Read through the sealed capability on this grant.
    Delegated(AccessGrant),
}

/// Result of an applied ownership transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// The ownership record as written, version bumped and history
    /// extended.
    pub ownership: OwnershipRecord,
    /// Revoked copies of the grants the hand-off invalidated.
    pub revoked: Vec<AccessGrant>,
}

/// The access registry.
///
/// Pure coordination over a [`Store`]: access decisions, grant
/// lifecycle, and the ownership-transfer cascade.
pub struct AccessRegistry<S> {
    store: Arc<S>,
}

impl<S: Store> AccessRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access Decisions
    // ─────────────────────────────────────────────────────────────────────────

    /// Decide what standing a principal has on a resource at `now`.
    ///
    /// Ownership wins outright and never consults grants. Denials
    /// distinguish a grant that never existed from one that was lost,
    /// with revocation reported ahead of expiry when both apply.
    pub async fn decide_access(
        &self,
        resource_id: &ResourceId,
        principal: &PrincipalId,
        now: i64,
    ) -> Result<AccessDecision> {
        let Some(ownership) = self.store.get_ownership(resource_id).await? else {
            return Ok(AccessDecision::Denied(DenialReason::UnknownResource));
        };
        if ownership.owner == *principal {
            return Ok(AccessDecision::Owner);
        }

        let Some(grant) = self.store.get_grant(resource_id, principal).await? else {
            return Ok(AccessDecision::Denied(DenialReason::NoGrant));
        };
        if grant.is_revoked() {
            return Ok(AccessDecision::Denied(DenialReason::Revoked));
        }
        if let Some(expired_at) = grant.expires_at.filter(|at| now >= *at) {
            return Ok(AccessDecision::Denied(DenialReason::Expired { expired_at }));
        }

        Ok(AccessDecision::Granted(grant))
    }

    /// Boolean convenience over [`decide_access`](Self::decide_access).
    pub async fn check_access(
        &self,
        resource_id: &ResourceId,
        principal: &PrincipalId,
        now: i64,
    ) -> Result<bool> {
        Ok(self.decide_access(resource_id, principal, now).await?.is_allowed())
    }

    /// Authorize a read, or say precisely why it is refused.
    pub async fn authorize_read(
        &self,
        resource_id: &ResourceId,
        principal: &PrincipalId,
        now: i64,
    ) -> Result<ReadAuthorization> {
        match self.decide_access(resource_id, principal, now).await? {
            AccessDecision::Owner => Ok(ReadAuthorization::Owner),
            AccessDecision::Granted(grant) => Ok(ReadAuthorization::Delegated(grant)),
            AccessDecision::Denied(DenialReason::UnknownResource) => {
                Err(RegistryError::ResourceNotFound(*resource_id))
            }
            AccessDecision::Denied(DenialReason::Expired { expired_at }) => {
                Err(RegistryError::GrantExpired {
                    resource: *resource_id,
                    grantee: *principal,
                    expired_at,
                })
            }
            AccessDecision::Denied(_) => Err(RegistryError::Unauthorized {
                resource: *resource_id,
                principal: *principal,
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resources & Ownership
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new resource under its first owner.
    ///
    /// The encrypted resource and its ownership record land in one
    /// transaction. Returns the insert outcome so callers can map an
    /// already-taken resource ID to their own error.
    pub async fn register_resource(
        &self,
        resource: &EncryptedResource,
        owner: PrincipalId,
        now: i64,
    ) -> Result<InsertOutcome> {
        let ownership = OwnershipRecord::new(resource.resource_id, owner, now);
        let outcome = self.store.insert_resource(resource, &ownership).await?;
        if outcome == InsertOutcome::Inserted {
            tracing::debug!(resource = %resource.resource_id, owner = %owner, "registered resource");
        }
        Ok(outcome)
    }

    /// Current ownership of a resource.
    pub async fn ownership(&self, resource_id: &ResourceId) -> Result<OwnershipRecord> {
        self.store
            .get_ownership(resource_id)
            .await?
            .ok_or(RegistryError::ResourceNotFound(*resource_id))
    }

    /// Transfer ownership, revoking every live grant in the same write.
    ///
    /// `rewrap` re-keys the resource's owner wrap for the new owner; it
    /// runs on the resource as read in the current attempt, so a retry
    /// after a version conflict re-keys fresh state. A transfer whose
    /// `claimed_owner` no longer holds the resource fails with
    /// `InvalidTransfer` and changes nothing.
    pub async fn transfer_ownership<F>(
        &self,
        resource_id: &ResourceId,
        claimed_owner: &PrincipalId,
        new_owner: PrincipalId,
        proof: TransferProof,
        now: i64,
        rewrap: F,
    ) -> Result<TransferOutcome>
    where
        F: Fn(&EncryptedResource) -> cachet_crypto::Result<EncryptedResource>,
    {
        for _ in 0..MAX_CAS_RETRIES {
            let Some((resource, ownership)) = self.store.get_resource_bundle(resource_id).await?
            else {
                return Err(RegistryError::ResourceNotFound(*resource_id));
            };
            if ownership.owner != *claimed_owner {
                return Err(RegistryError::InvalidTransfer {
                    resource: *resource_id,
                    claimed: *claimed_owner,
                    actual: ownership.owner,
                });
            }

            let rewrapped = rewrap(&resource)?;
            let revoked: Vec<AccessGrant> = self
                .store
                .list_grants(resource_id)
                .await?
                .iter()
                .filter(|grant| !grant.is_revoked())
                .map(|grant| grant.revoked(now, RevocationCause::OwnerChanged))
                .collect();
            let transferred = ownership.transferred(new_owner, proof.clone(), now);

            match self
                .store
                .apply_transfer(ownership.version, &transferred, &rewrapped, &revoked)
                .await?
            {
                CasOutcome::Applied => {
                    tracing::info!(
                        resource = %resource_id,
                        from = %claimed_owner,
                        to = %new_owner,
                        revoked = revoked.len(),
                        "ownership transferred"
                    );
                    return Ok(TransferOutcome {
                        ownership: transferred,
                        revoked,
                    });
                }
                CasOutcome::Conflict { .. } => continue,
                CasOutcome::Missing => {
                    return Err(RegistryError::ResourceNotFound(*resource_id))
                }
            }
        }

        tracing::warn!(resource = %resource_id, "transfer kept losing the version race");
        Err(RegistryError::Contention(*resource_id))
    }

    /// Remove a resource and everything keyed to it.
    pub async fn purge_resource(&self, resource_id: &ResourceId) -> Result<()> {
        self.store.purge_resource(resource_id).await?;
        tracing::debug!(resource = %resource_id, "purged resource");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grant Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a grant made by the resource's current owner.
    ///
    /// The write is guarded by the ownership version, so a grant racing
    /// a transfer either lands before the hand-off or fails once the
    /// granter is no longer the owner. Re-granting a revoked or expired
    /// pair replaces the old record with the fresh grant.
    pub async fn record_grant(&self, grant: &AccessGrant) -> Result<()> {
        for _ in 0..MAX_CAS_RETRIES {
            let ownership = self.ownership(&grant.resource_id).await?;
            if ownership.owner != grant.granter {
                return Err(RegistryError::Unauthorized {
                    resource: grant.resource_id,
                    principal: grant.granter,
                });
            }

            match self.store.put_grant(grant, ownership.version).await? {
                CasOutcome::Applied => {
                    tracing::debug!(
                        resource = %grant.resource_id,
                        grantee = %grant.grantee,
                        level = ?grant.level,
                        "recorded grant"
                    );
                    return Ok(());
                }
                CasOutcome::Conflict { .. } => continue,
                CasOutcome::Missing => {
                    return Err(RegistryError::ResourceNotFound(grant.resource_id))
                }
            }
        }

        Err(RegistryError::Contention(grant.resource_id))
    }

    /// Revoke a grantee's access. Idempotent: revoking an absent or
    /// already-revoked grant succeeds without writing.
    ///
    /// Only the current owner may revoke.
    pub async fn revoke_grant(
        &self,
        resource_id: &ResourceId,
        granter: &PrincipalId,
        grantee: &PrincipalId,
        now: i64,
    ) -> Result<()> {
        let ownership = self.ownership(resource_id).await?;
        if ownership.owner != *granter {
            return Err(RegistryError::Unauthorized {
                resource: *resource_id,
                principal: *granter,
            });
        }

        let Some(grant) = self.store.get_grant(resource_id, grantee).await? else {
            return Ok(());
        };
        if grant.is_revoked() {
            return Ok(());
        }

        self.store
            .replace_grant(&grant.revoked(now, RevocationCause::Explicit))
            .await?;
        tracing::debug!(resource = %resource_id, grantee = %grantee, "revoked grant");
        Ok(())
    }

    /// All grants on a resource, live and dead, for audit.
    pub async fn grants_for(&self, resource_id: &ResourceId) -> Result<Vec<AccessGrant>> {
        Ok(self.store.list_grants(resource_id).await?)
    }

    /// Drop expired grant rows. Returns how many were removed.
    pub async fn sweep_expired(&self, now: i64) -> Result<u64> {
        Ok(self.store.sweep_expired_grants(now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cachet_core::{AccessLevel, GrantId, PrincipalKeyPair, PrincipalPublicKey, ReceiptDocument};
    use cachet_crypto::KeyWrap;
    use cachet_store::MemoryStore;

    fn sample_document() -> ReceiptDocument {
        ReceiptDocument {
            merchant: "Corner Cafe".to_string(),
            purchased_at: 1736870400000,
            currency: "USD".to_string(),
            total_cents: 1250,
            line_items: Vec::new(),
        }
    }

    fn registry() -> AccessRegistry<MemoryStore> {
        AccessRegistry::new(Arc::new(MemoryStore::new()))
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

    fn make_grant(
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

    /// Re-key the owner wrap from `prior` to `next`, leaving the
    /// envelope untouched.
    fn rewrap_fn(
        prior: PrincipalKeyPair,
        next: PrincipalPublicKey,
    ) -> impl Fn(&EncryptedResource) -> cachet_crypto::Result<EncryptedResource> {
        move |resource| {
            let key = resource.content_key_as_owner(&prior)?;
            let owner_wrap =
                KeyWrap::seal(&key, &next.agreement, resource.resource_id.as_bytes())?;
            Ok(EncryptedResource {
                owner_wrap,
                ..resource.clone()
            })
        }
    }

    #[tokio::test]
    async fn test_owner_always_allowed() {
        let reg = registry();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let resource = sealed_resource(&keys, b"receipt:1");
        let rid = resource.resource_id;

        reg.register_resource(&resource, alice, 1000).await.unwrap();

        assert_eq!(
            reg.decide_access(&rid, &alice, 5000).await.unwrap(),
            AccessDecision::Owner
        );
        assert!(reg.check_access(&rid, &alice, 5000).await.unwrap());
        assert!(matches!(
            reg.authorize_read(&rid, &alice, 5000).await.unwrap(),
            ReadAuthorization::Owner
        ));
    }

    #[tokio::test]
    async fn test_denials_distinguish_absence_from_loss() {
        let reg = registry();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let bob = PrincipalId::derive(b"bob");
        let carol = PrincipalId::derive(b"carol");
        let resource = sealed_resource(&keys, b"receipt:1");
        let rid = resource.resource_id;
        reg.register_resource(&resource, alice, 1000).await.unwrap();

        // Unknown resource.
        let ghost = ResourceId::derive(b"ghost");
        assert_eq!(
            reg.decide_access(&ghost, &bob, 2000).await.unwrap(),
            AccessDecision::Denied(DenialReason::UnknownResource)
        );

        // Never granted.
        assert_eq!(
            reg.decide_access(&rid, &bob, 2000).await.unwrap(),
            AccessDecision::Denied(DenialReason::NoGrant)
        );

        // Granted, then revoked.
        reg.record_grant(&make_grant(rid, alice, bob, None))
            .await
            .unwrap();
        assert!(reg.check_access(&rid, &bob, 2000).await.unwrap());
        reg.revoke_grant(&rid, &alice, &bob, 3000).await.unwrap();
        assert_eq!(
            reg.decide_access(&rid, &bob, 4000).await.unwrap(),
            AccessDecision::Denied(DenialReason::Revoked)
        );

        // Granted with a window that closes.
        reg.record_grant(&make_grant(rid, alice, carol, Some(5000)))
            .await
            .unwrap();
        assert!(reg.check_access(&rid, &carol, 4999).await.unwrap());
        assert_eq!(
            reg.decide_access(&rid, &carol, 5000).await.unwrap(),
            AccessDecision::Denied(DenialReason::Expired { expired_at: 5000 })
        );
    }

    #[tokio::test]
    async fn test_authorize_read_error_mapping() {
        let reg = registry();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let bob = PrincipalId::derive(b"bob");
        let resource = sealed_resource(&keys, b"receipt:1");
        let rid = resource.resource_id;
        reg.register_resource(&resource, alice, 1000).await.unwrap();

        let ghost = ResourceId::derive(b"ghost");
        assert!(matches!(
            reg.authorize_read(&ghost, &bob, 2000).await,
            Err(RegistryError::ResourceNotFound(_))
        ));
        assert!(matches!(
            reg.authorize_read(&rid, &bob, 2000).await,
            Err(RegistryError::Unauthorized { .. })
        ));

        reg.record_grant(&make_grant(rid, alice, bob, Some(5000)))
            .await
            .unwrap();
        let auth = reg.authorize_read(&rid, &bob, 4000).await.unwrap();
        assert!(matches!(auth, ReadAuthorization::Delegated(ref g) if g.grantee == bob));
        assert!(matches!(
            reg.authorize_read(&rid, &bob, 6000).await,
            Err(RegistryError::GrantExpired {
                expired_at: 5000,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_only_owner_grants_and_revokes() {
        let reg = registry();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let bob = PrincipalId::derive(b"bob");
        let mallory = PrincipalId::derive(b"mallory");
        let resource = sealed_resource(&keys, b"receipt:1");
        let rid = resource.resource_id;
        reg.register_resource(&resource, alice, 1000).await.unwrap();

        // A grant whose granter is not the owner is refused.
        assert!(matches!(
            reg.record_grant(&make_grant(rid, mallory, bob, None)).await,
            Err(RegistryError::Unauthorized { .. })
        ));

        reg.record_grant(&make_grant(rid, alice, bob, None))
            .await
            .unwrap();
        assert!(matches!(
            reg.revoke_grant(&rid, &mallory, &bob, 2000).await,
            Err(RegistryError::Unauthorized { .. })
        ));

        // Revocation is idempotent for the owner.
        reg.revoke_grant(&rid, &alice, &bob, 2000).await.unwrap();
        reg.revoke_grant(&rid, &alice, &bob, 2500).await.unwrap();
        let grants = reg.grants_for(&rid).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(
            grants[0].revoked.map(|r| r.revoked_at),
            Some(2000),
            "second revoke must not move the timestamp"
        );
    }

    #[tokio::test]
    async fn test_regrant_after_revocation_replaces_record() {
        let reg = registry();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let bob = PrincipalId::derive(b"bob");
        let resource = sealed_resource(&keys, b"receipt:1");
        let rid = resource.resource_id;
        reg.register_resource(&resource, alice, 1000).await.unwrap();

        reg.record_grant(&make_grant(rid, alice, bob, None))
            .await
            .unwrap();
        reg.revoke_grant(&rid, &alice, &bob, 2000).await.unwrap();

        let mut fresh = make_grant(rid, alice, bob, None);
        fresh.created_at = 3000;
        fresh.grant_id = GrantId::derive(&rid, &alice, &bob, 3000);
        reg.record_grant(&fresh).await.unwrap();

        assert!(reg.check_access(&rid, &bob, 4000).await.unwrap());
        let grants = reg.grants_for(&rid).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].grant_id, fresh.grant_id);
    }

    #[tokio::test]
    async fn test_transfer_revokes_and_rekeys() {
        let reg = registry();
        let alice_keys = PrincipalKeyPair::generate();
        let dana_keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let bob = PrincipalId::derive(b"bob");
        let dana = PrincipalId::derive(b"dana");

        let resource = sealed_resource(&alice_keys, b"receipt:1");
        let rid = resource.resource_id;
        reg.register_resource(&resource, alice, 1000).await.unwrap();
        reg.record_grant(&make_grant(rid, alice, bob, None))
            .await
            .unwrap();

        let outcome = reg
            .transfer_ownership(
                &rid,
                &alice,
                dana,
                TransferProof(Bytes::from_static(b"settlement:77")),
                2000,
                rewrap_fn(alice_keys.clone(), dana_keys.public()),
            )
            .await
            .unwrap();

        assert_eq!(outcome.ownership.owner, dana);
        assert_eq!(outcome.ownership.version, 2);
        assert_eq!(outcome.revoked.len(), 1);
        assert_eq!(outcome.revoked[0].grantee, bob);

        // Prior grantee and prior owner both lose access.
        assert!(!reg.check_access(&rid, &bob, 3000).await.unwrap());
        assert!(!reg.check_access(&rid, &alice, 3000).await.unwrap());
        assert!(reg.check_access(&rid, &dana, 3000).await.unwrap());

        // The stored wrap now opens for the new owner only.
        let stored = reg.store.get_resource(&rid).await.unwrap().unwrap();
        assert!(stored.open_as_owner(&dana_keys).is_ok());
        assert!(stored.open_as_owner(&alice_keys).is_err());
    }

    #[tokio::test]
    async fn test_stale_transfer_changes_nothing() {
        let reg = registry();
        let alice_keys = PrincipalKeyPair::generate();
        let dana_keys = PrincipalKeyPair::generate();
        let eve_keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let dana = PrincipalId::derive(b"dana");
        let eve = PrincipalId::derive(b"eve");

        let resource = sealed_resource(&alice_keys, b"receipt:1");
        let rid = resource.resource_id;
        reg.register_resource(&resource, alice, 1000).await.unwrap();

        reg.transfer_ownership(
            &rid,
            &alice,
            dana,
            TransferProof(Bytes::new()),
            2000,
            rewrap_fn(alice_keys.clone(), dana_keys.public()),
        )
        .await
        .unwrap();

        // A second transfer still claiming alice is stale.
        let stale = reg
            .transfer_ownership(
                &rid,
                &alice,
                eve,
                TransferProof(Bytes::new()),
                3000,
                rewrap_fn(alice_keys.clone(), eve_keys.public()),
            )
            .await;
        assert!(matches!(
            stale,
            Err(RegistryError::InvalidTransfer { actual, .. }) if actual == dana
        ));

        let ownership = reg.ownership(&rid).await.unwrap();
        assert_eq!(ownership.owner, dana);
        assert_eq!(ownership.version, 2);
        assert_eq!(ownership.history.len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_unknown_resource() {
        let reg = registry();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let dana = PrincipalId::derive(b"dana");

        let result = reg
            .transfer_ownership(
                &ResourceId::derive(b"ghost"),
                &alice,
                dana,
                TransferProof(Bytes::new()),
                2000,
                rewrap_fn(keys.clone(), keys.public()),
            )
            .await;
        assert!(matches!(result, Err(RegistryError::ResourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_sweep_and_purge_passthrough() {
        let reg = registry();
        let keys = PrincipalKeyPair::generate();
        let alice = PrincipalId::derive(b"alice");
        let bob = PrincipalId::derive(b"bob");
        let resource = sealed_resource(&keys, b"receipt:1");
        let rid = resource.resource_id;
        reg.register_resource(&resource, alice, 1000).await.unwrap();
        reg.record_grant(&make_grant(rid, alice, bob, Some(5000)))
            .await
            .unwrap();

        assert_eq!(reg.sweep_expired(6000).await.unwrap(), 1);
        assert_eq!(
            reg.decide_access(&rid, &bob, 6000).await.unwrap(),
            AccessDecision::Denied(DenialReason::NoGrant)
        );

        reg.purge_resource(&rid).await.unwrap();
        assert!(matches!(
            reg.ownership(&rid).await,
            Err(RegistryError::ResourceNotFound(_))
        ));
    }
}
