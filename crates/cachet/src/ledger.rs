//! Auditable commitments attached to resources.
//!
//! Every attested action lands here as a [`Commitment`]: a keyed
//! digest of the action's canonical bytes plus a signature from the
//! committer. An auditor can list a resource's entries in the order
//! they were recorded and check any of them against a claimed payload,
//! or check just the signature when the payload is withheld.

use std::sync::Arc;

use cachet_core::{Commitment, CommitmentKind, PrincipalId, PrincipalKeyPair, ResourceId};
use cachet_store::Store;

use crate::error::Result;

/// Append-only log of commitments, indexed per resource.
///
/// Appending is idempotent on (resource, subject, kind): re-attesting
/// an identical action lands on the existing entry.
pub struct CommitmentLedger<S> {
    store: Arc<S>,
}

impl<S: Store> CommitmentLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record a commitment binding `committer` to `canonical_payload`.
    pub async fn attest(
        &self,
        resource_id: &ResourceId,
        kind: CommitmentKind,
        committer: PrincipalId,
        keys: &PrincipalKeyPair,
        canonical_payload: &[u8],
        now: i64,
    ) -> Result<Commitment> {
        let commitment = Commitment::create(kind, committer, keys, canonical_payload, now);
        self.store.append_commitment(resource_id, &commitment).await?;
        tracing::debug!(
            resource = %resource_id,
            kind = ?kind,
            committer = %committer,
            "recorded commitment"
        );
        Ok(commitment)
    }

    /// All commitments on a resource, oldest first.
    pub async fn list(&self, resource_id: &ResourceId) -> Result<Vec<Commitment>> {
        Ok(self.store.list_commitments(resource_id).await?)
    }

    /// The earliest commitment of `kind` on a resource, if any.
    pub async fn find(
        &self,
        resource_id: &ResourceId,
        kind: CommitmentKind,
    ) -> Result<Option<Commitment>> {
        Ok(self
            .list(resource_id)
            .await?
            .into_iter()
            .find(|commitment| commitment.kind == kind))
    }

    /// Check a commitment against a claimed payload. False when the
    /// committer is unknown.
    pub async fn verify(&self, commitment: &Commitment, canonical_payload: &[u8]) -> Result<bool> {
        let Some(record) = self.store.get_principal(&commitment.committer).await? else {
            return Ok(false);
        };
        Ok(commitment.verify(
            &commitment.committer,
            &record.public.attestation,
            canonical_payload,
        ))
    }

    /// Check only the signature on a commitment, taking the subject as
    /// claimed. False when the committer is unknown.
    pub async fn verify_proof(&self, commitment: &Commitment) -> Result<bool> {
        let Some(record) = self.store.get_principal(&commitment.committer).await? else {
            return Ok(false);
        };
        Ok(commitment.verify_proof(&commitment.committer, &record.public.attestation))
    }
}
