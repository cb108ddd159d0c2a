//! The Vault: unified API over keys, encryption, delegation, access
//! control, commitments, and recovery.
//!
//! A vault owns one store and wires the component layers around it.
//! Callers deal in principal and resource identifiers; key material
//! stays inside, and reads come back already shaped by the caller's
//! access level.

use std::sync::Arc;

use bytes::Bytes;

use cachet_core::{
    canonical_grant_bytes, canonical_transfer_bytes, AccessGrant, AccessLevel, Commitment,
    CommitmentKind, GrantId, KeyState, OwnershipRecord, PrincipalId, PrincipalKeyPair,
    PrincipalPublicKey, PrincipalRecord, ReceiptDocument, ReceiptSummary, ResourceId,
    TransferProof,
};
use cachet_crypto::{
    Capability, CryptoError, EncryptedResource, KeyWrap, RecoverySession, RecryptBackend,
    SealedRewrap, ThresholdKeyShare,
};
use cachet_registry::{AccessDecision, AccessRegistry, ReadAuthorization, RegistryError};
use cachet_store::{InsertOutcome, Store};

use crate::error::{Result, VaultError};
use crate::keyring::{record_keypair, KeyManager};
use crate::ledger::CommitmentLedger;

/// Configuration for the vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Record a ledger commitment for stores, grants, and transfers.
    pub attest_operations: bool,
    /// Lifetime applied to grants created without an explicit expiry,
    /// in milliseconds. `None` leaves such grants open-ended.
    pub default_grant_ttl: Option<i64>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            attest_operations: true,
            default_grant_ttl: None,
        }
    }
}

/// What a read returns, shaped by the reader's access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptView {
    /// The whole document. Owners and full-level grantees.
    Full(ReceiptDocument),
    /// The deterministic redaction: merchant, date, currency, total.
    /// Line items are withheld.
    Summary(ReceiptSummary),
    /// Proof the receipt was attested, with no content. `proof_valid`
    /// is the signature check against the committer's public key.
    Verification {
        commitment: Commitment,
        proof_valid: bool,
    },
}

/// The main vault struct.
///
/// Provides a unified API for:
/// - Principal key lifecycle (create, escrow, recover, delete)
/// - Storing receipts encrypted to their owner
/// - Access-shaped reads
/// - Granting, revoking, and sweeping delegated access
/// - Ownership transfers with their revocation cascade
/// - Listing and verifying ledger commitments
pub struct Vault<S> {
    store: Arc<S>,
    keys: KeyManager<S>,
    registry: AccessRegistry<S>,
    ledger: CommitmentLedger<S>,
    recrypt: Arc<dyn RecryptBackend>,
    config: VaultConfig,
}

impl<S: Store> Vault<S> {
    /// Create a vault over a store with the default delegation
    /// backend.
    pub fn new(store: S, config: VaultConfig) -> Self {
        Self::with_backend(store, config, Arc::new(SealedRewrap))
    }

    /// Create a vault with a caller-supplied delegation backend.
    pub fn with_backend(store: S, config: VaultConfig, recrypt: Arc<dyn RecryptBackend>) -> Self {
        let store = Arc::new(store);
        Self {
            keys: KeyManager::new(Arc::clone(&store)),
            registry: AccessRegistry::new(Arc::clone(&store)),
            ledger: CommitmentLedger::new(Arc::clone(&store)),
            recrypt,
            config,
            store,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Principal Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Ensure a principal has key material, returning the public half.
    /// Idempotent; fails for a deleted principal.
    pub async fn register_principal(&self, principal: &PrincipalId) -> Result<PrincipalPublicKey> {
        self.keys.get_or_create(principal, now_millis()).await
    }

    /// A principal's public keys, served in any non-missing state.
    pub async fn principal_key(&self, principal: &PrincipalId) -> Result<PrincipalPublicKey> {
        self.keys.public_key(principal).await
    }

    /// Lifecycle state of a principal's key material.
    pub async fn principal_state(&self, principal: &PrincipalId) -> Result<KeyState> {
        self.keys.state(principal).await
    }

    /// Hard-revoke a principal's keys. Terminal: no later operation
    /// regenerates them.
    pub async fn delete_principal(&self, principal: &PrincipalId) -> Result<()> {
        self.keys.delete(principal, now_millis()).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resource Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt a receipt document to `owner` and register it.
    ///
    /// The resource ID derives from `asset_ref`, so storing the same
    /// external reference twice reports a duplicate instead of
    /// double-registering. Records a `Receipt` commitment when
    /// attestation is configured on.
    pub async fn store_receipt(
        &self,
        owner: &PrincipalId,
        asset_ref: &[u8],
        document: &ReceiptDocument,
    ) -> Result<ResourceId> {
        let now = now_millis();
        let resource_id = ResourceId::derive(asset_ref);
        let record = self.keys.get_or_create_record(owner, now).await?;
        let attest_keys = self.attest_keys(&record, owner)?;

        let resource =
            EncryptedResource::seal(document, resource_id, &record.public.agreement, now)?;
        match self.registry.register_resource(&resource, *owner, now).await? {
            InsertOutcome::Inserted => {}
            InsertOutcome::AlreadyExists => return Err(VaultError::ResourceExists(resource_id)),
        }

        if let Some(keys) = attest_keys {
            self.ledger
                .attest(
                    &resource_id,
                    CommitmentKind::Receipt,
                    *owner,
                    &keys,
                    &document.canonical_bytes(),
                    now,
                )
                .await?;
        }

        Ok(resource_id)
    }

    /// Read a receipt as `principal`, shaped by their access.
    ///
    /// Owners get the full document. Grantees get what their level
    /// discloses: the document, the summary, or an attestation they
    /// can check without content. Everyone else gets a refusal naming
    /// why.
    pub async fn read_receipt(
        &self,
        principal: &PrincipalId,
        resource_id: &ResourceId,
    ) -> Result<ReceiptView> {
        let now = now_millis();
        match self
            .registry
            .authorize_read(resource_id, principal, now)
            .await?
        {
            ReadAuthorization::Owner => {
                let resource = self.require_resource(resource_id).await?;
                let owner_keys = self.keys.keypair(principal).await?;
                Ok(ReceiptView::Full(resource.open_as_owner(&owner_keys)?))
            }
            ReadAuthorization::Delegated(grant) => {
                self.read_delegated(principal, resource_id, &grant).await
            }
        }
    }

    /// Remove a resource, its grants, and its commitments. Owner only.
    /// Deletion is terminal; the resource ID stays burned until the
    /// same asset reference is stored again.
    pub async fn delete_resource(
        &self,
        owner: &PrincipalId,
        resource_id: &ResourceId,
    ) -> Result<()> {
        let ownership = self.registry.ownership(resource_id).await?;
        if ownership.owner != *owner {
            return Err(RegistryError::Unauthorized {
                resource: *resource_id,
                principal: *owner,
            }
            .into());
        }
        Ok(self.registry.purge_resource(resource_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Delegation Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `grantee` access to a resource at `level`.
    ///
    /// The sealed capability and the registry record land in one
    /// write; the grant is live only once both exist. `expires_at` is
    /// absolute milliseconds; `None` falls back to the configured
    /// default TTL. Granting to the same grantee again replaces the
    /// earlier grant, which is how a revoked grantee is re-admitted.
    pub async fn grant_access(
        &self,
        granter: &PrincipalId,
        grantee: &PrincipalId,
        resource_id: &ResourceId,
        level: AccessLevel,
        expires_at: Option<i64>,
    ) -> Result<GrantId> {
        let now = now_millis();
        let granter_keys = self.keys.keypair(granter).await?;
        let grantee_public = self.keys.get_or_create(grantee, now).await?;
        let resource = self.require_resource(resource_id).await?;

        // Verification-only grants disclose nothing, so they carry no
        // capability.
        let capability = if level.can_decrypt() {
            let capability = self
                .recrypt
                .delegate(&resource, &granter_keys, &grantee_public)?;
            Some(Bytes::from(capability.to_bytes()))
        } else {
            None
        };

        let expires_at = expires_at.or_else(|| self.config.default_grant_ttl.map(|ttl| now + ttl));
        let grant = AccessGrant {
            grant_id: GrantId::derive(resource_id, granter, grantee, now),
            resource_id: *resource_id,
            granter: *granter,
            grantee: *grantee,
            level,
            capability,
            created_at: now,
            expires_at,
            revoked: None,
        };
        self.registry.record_grant(&grant).await?;

        if self.config.attest_operations {
            self.ledger
                .attest(
                    resource_id,
                    CommitmentKind::Grant,
                    *granter,
                    &granter_keys,
                    &canonical_grant_bytes(&grant),
                    now,
                )
                .await?;
        }

        Ok(grant.grant_id)
    }

    /// Revoke a grantee's access. Idempotent; only the current owner
    /// may revoke. Takes effect at the next access check, whatever
    /// capability material the grantee may still hold.
    pub async fn revoke_access(
        &self,
        granter: &PrincipalId,
        grantee: &PrincipalId,
        resource_id: &ResourceId,
    ) -> Result<()> {
        Ok(self
            .registry
            .revoke_grant(resource_id, granter, grantee, now_millis())
            .await?)
    }

    /// Is `principal` currently allowed on the resource?
    pub async fn check_access(
        &self,
        resource_id: &ResourceId,
        principal: &PrincipalId,
    ) -> Result<bool> {
        Ok(self
            .registry
            .check_access(resource_id, principal, now_millis())
            .await?)
    }

    /// The full access decision, including the denial reason.
    pub async fn access_decision(
        &self,
        resource_id: &ResourceId,
        principal: &PrincipalId,
    ) -> Result<AccessDecision> {
        Ok(self
            .registry
            .decide_access(resource_id, principal, now_millis())
            .await?)
    }

    /// Every grant on a resource, live and dead, for audit.
    pub async fn grants(&self, resource_id: &ResourceId) -> Result<Vec<AccessGrant>> {
        Ok(self.registry.grants_for(resource_id).await?)
    }

    /// Drop expired grant rows. Pure housekeeping; expiry is enforced
    /// at check time either way.
    pub async fn sweep_expired_grants(&self) -> Result<u64> {
        Ok(self.registry.sweep_expired(now_millis()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ownership Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply an externally validated ownership transfer.
    ///
    /// Re-keys the resource to the new owner and revokes every live
    /// grant in the same write; the new owner reads without a grant,
    /// the old owner keeps nothing. A transfer naming someone other
    /// than the current owner fails and changes no state.
    pub async fn transfer_ownership(
        &self,
        resource_id: &ResourceId,
        from: &PrincipalId,
        to: &PrincipalId,
        proof: TransferProof,
    ) -> Result<OwnershipRecord> {
        let now = now_millis();
        let from_keys = self.keys.keypair(from).await?;
        let to_public = self.keys.get_or_create(to, now).await?;

        let outcome = self
            .registry
            .transfer_ownership(resource_id, from, *to, proof, now, |resource| {
                let content_key = resource.content_key_as_owner(&from_keys)?;
                let owner_wrap = KeyWrap::seal(
                    &content_key,
                    &to_public.agreement,
                    resource.resource_id.as_bytes(),
                )?;
                Ok(EncryptedResource {
                    owner_wrap,
                    ..resource.clone()
                })
            })
            .await?;

        if self.config.attest_operations {
            if let Some(entry) = outcome.ownership.history.last() {
                let payload =
                    canonical_transfer_bytes(resource_id, entry, outcome.ownership.version);
                self.ledger
                    .attest(
                        resource_id,
                        CommitmentKind::Transfer,
                        *from,
                        &from_keys,
                        &payload,
                        now,
                    )
                    .await?;
            }
        }

        Ok(outcome.ownership)
    }

    /// Current owner and the full transfer history.
    pub async fn ownership(&self, resource_id: &ResourceId) -> Result<OwnershipRecord> {
        Ok(self.registry.ownership(resource_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commitment Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Commitments attached to a resource, oldest first.
    pub async fn commitments(&self, resource_id: &ResourceId) -> Result<Vec<Commitment>> {
        self.ledger.list(resource_id).await
    }

    /// Check a commitment against a claimed canonical payload.
    pub async fn verify_commitment(
        &self,
        commitment: &Commitment,
        canonical_payload: &[u8],
    ) -> Result<bool> {
        self.ledger.verify(commitment, canonical_payload).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recovery Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Split the principal's seed into `share_count` recovery shares,
    /// any `threshold` of which reconstruct it, and drop the seed.
    ///
    /// Until recovery completes the principal is escrowed: public keys
    /// are served, private-key operations fail.
    pub async fn backup_principal(
        &self,
        principal: &PrincipalId,
        threshold: u8,
        share_count: u8,
    ) -> Result<Vec<ThresholdKeyShare>> {
        self.keys
            .escrow(principal, threshold, share_count, now_millis())
            .await
    }

    /// Open a recovery session for a backed-up principal.
    ///
    /// Shares are submitted to the session one at a time; nothing in
    /// the vault changes until [`complete_recovery`]. Dropping the
    /// session abandons the attempt with no side effects.
    ///
    /// [`complete_recovery`]: Self::complete_recovery
    pub async fn begin_recovery(&self, principal: &PrincipalId) -> Result<RecoverySession> {
        let backup = self
            .store
            .get_backup(principal)
            .await?
            .ok_or(VaultError::BackupNotFound(*principal))?;
        Ok(RecoverySession::new(&backup, now_millis()))
    }

    /// Reconstruct the seed from a satisfied session and reinstate the
    /// principal's key material.
    pub async fn complete_recovery(&self, session: &RecoverySession) -> Result<PrincipalPublicKey> {
        let seed = session.reconstruct()?;
        self.keys
            .restore(&session.principal_id(), seed, now_millis())
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn read_delegated(
        &self,
        principal: &PrincipalId,
        resource_id: &ResourceId,
        grant: &AccessGrant,
    ) -> Result<ReceiptView> {
        if !grant.level.can_decrypt() {
            let commitment = self
                .ledger
                .find(resource_id, CommitmentKind::Receipt)
                .await?
                .ok_or(VaultError::CommitmentNotFound(*resource_id))?;
            let proof_valid = self.ledger.verify_proof(&commitment).await?;
            return Ok(ReceiptView::Verification {
                commitment,
                proof_valid,
            });
        }

        // A decrypt-level grant without capability material fails like
        // any other bad decryption.
        let capability_bytes = grant
            .capability
            .as_ref()
            .ok_or(CryptoError::DecryptionError)?;
        let capability = Capability::from_bytes(capability_bytes)?;
        let grantee_keys = self.keys.keypair(principal).await?;
        let granter_public = self.keys.public_key(&grant.granter).await?;
        let resource = self.require_resource(resource_id).await?;

        let content_key =
            self.recrypt
                .unseal(&capability, &grantee_keys, &granter_public, resource_id)?;
        let document = resource.open_with_key(&content_key)?;

        match grant.level {
            AccessLevel::Limited => Ok(ReceiptView::Summary(document.summarize())),
            _ => Ok(ReceiptView::Full(document)),
        }
    }

    /// Keys for attestation, resolved up front so a store or transfer
    /// is refused before any write when the committer cannot sign.
    fn attest_keys(
        &self,
        record: &PrincipalRecord,
        principal: &PrincipalId,
    ) -> Result<Option<PrincipalKeyPair>> {
        if !self.config.attest_operations {
            return Ok(None);
        }
        record_keypair(record)
            .map(Some)
            .ok_or(VaultError::KeyNotFound(*principal))
    }

    async fn require_resource(&self, resource_id: &ResourceId) -> Result<EncryptedResource> {
        self.store
            .get_resource(resource_id)
            .await?
            .ok_or(VaultError::ResourceNotFound(*resource_id))
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
