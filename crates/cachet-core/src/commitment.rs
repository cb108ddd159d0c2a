//! Integrity commitments over canonical payloads.
//!
//! A commitment binds a committer to the canonical bytes of a document,
//! grant, or transfer at a point in time. The subject is a keyed digest
//! that hides the payload from anyone who only sees the ledger entry;
//! the proof is an Ed25519 signature, so the binding is attributable
//! and anyone holding the committer's public key can check it.
//! Verification recomputes rather than trusts the stored digest, and
//! digest comparison runs in constant time.

use serde::{Deserialize, Serialize};

use crate::crypto::{AttestationPublicKey, AttestationSignature, Blake3Hash};
use crate::keys::PrincipalKeyPair;
use crate::types::PrincipalId;

/// Domain context for the subject digest.
const SUBJECT_CONTEXT: &str = "cachet-commit-v1 subject";

/// Domain prefix for the signed proof message.
const PROOF_DOMAIN: &[u8] = b"cachet-commit-v1 proof:";

/// What kind of action a commitment records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CommitmentKind {
    /// A receipt document was stored.
    Receipt = 1,
    /// Access was delegated.
    Grant = 2,
    /// Ownership changed hands.
    Transfer = 3,
}

impl CommitmentKind {
    pub fn tag(self) -> u16 {
        self as u16
    }

    pub fn from_tag(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Receipt),
            2 => Some(Self::Grant),
            3 => Some(Self::Transfer),
            _ => None,
        }
    }
}

/// A recorded binding of committer, payload, kind, and time.
///
/// The subject doubles as the storage key: the same committer and
/// payload always land on the same ledger entry. Ed25519 signing is
/// deterministic, so re-creating an identical commitment yields
/// byte-identical proof as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub subject: Blake3Hash,
    pub kind: CommitmentKind,
    pub committer: PrincipalId,
    pub committed_at: i64,
    pub proof: AttestationSignature,
}

impl Commitment {
    /// Bind the committer to `canonical_payload` at `now`, signed with
    /// the committer's attestation key.
    pub fn create(
        kind: CommitmentKind,
        committer: PrincipalId,
        keys: &PrincipalKeyPair,
        canonical_payload: &[u8],
        now: i64,
    ) -> Self {
        let subject = subject_digest(&committer, canonical_payload);
        let proof = keys.sign(&proof_message(kind, &subject, now));
        Self {
            subject,
            kind,
            committer,
            committed_at: now,
            proof,
        }
    }

    /// Check this commitment against the claimed committer, their
    /// public attestation key, and the claimed payload.
    ///
    /// The subject is recomputed and compared in constant time; the
    /// proof signature is verified under the supplied key. Any changed
    /// field fails: payload, committer, kind, or timestamp. Both checks
    /// run unconditionally.
    pub fn verify(
        &self,
        committer: &PrincipalId,
        committer_key: &AttestationPublicKey,
        canonical_payload: &[u8],
    ) -> bool {
        let subject = subject_digest(committer, canonical_payload);
        let message = proof_message(self.kind, &subject, self.committed_at);
        let subject_ok = subject.ct_eq(&self.subject);
        let proof_ok = committer_key.verify(&message, &self.proof).is_ok();
        subject_ok & proof_ok
    }

    /// Check only the proof signature, taking the subject as claimed.
    ///
    /// For verifiers who hold no payload: confirms the committer signed
    /// this subject, kind, and timestamp, without revealing what the
    /// subject digests. [`verify`](Self::verify) subsumes this check
    /// when the payload is available.
    pub fn verify_proof(
        &self,
        committer: &PrincipalId,
        committer_key: &AttestationPublicKey,
    ) -> bool {
        if self.committer != *committer {
            return false;
        }
        let message = proof_message(self.kind, &self.subject, self.committed_at);
        committer_key.verify(&message, &self.proof).is_ok()
    }
}

fn subject_digest(committer: &PrincipalId, canonical_payload: &[u8]) -> Blake3Hash {
    let mut hasher = blake3::Hasher::new_derive_key(SUBJECT_CONTEXT);
    hasher.update(committer.as_bytes());
    hasher.update(canonical_payload);
    Blake3Hash(*hasher.finalize().as_bytes())
}

fn proof_message(kind: CommitmentKind, subject: &Blake3Hash, committed_at: i64) -> Vec<u8> {
    let mut message = Vec::with_capacity(PROOF_DOMAIN.len() + 2 + 32 + 8);
    message.extend_from_slice(PROOF_DOMAIN);
    message.extend_from_slice(&kind.tag().to_le_bytes());
    message.extend_from_slice(subject.as_bytes());
    message.extend_from_slice(&committed_at.to_le_bytes());
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn committer() -> (PrincipalId, PrincipalKeyPair) {
        (PrincipalId::derive(b"alice"), PrincipalKeyPair::generate())
    }

    #[test]
    fn test_commitment_verifies() {
        let (id, keys) = committer();
        let payload = b"canonical payload bytes";
        let commitment = Commitment::create(CommitmentKind::Receipt, id, &keys, payload, 1000);
        assert!(commitment.verify(&id, &keys.public().attestation, payload));
    }

    #[test]
    fn test_commitment_deterministic() {
        let (id, keys) = committer();
        let payload = b"canonical payload bytes";
        let a = Commitment::create(CommitmentKind::Receipt, id, &keys, payload, 1000);
        let b = Commitment::create(CommitmentKind::Receipt, id, &keys, payload, 1000);
        assert_eq!(a.subject, b.subject);
        assert_eq!(a.proof, b.proof);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let (id, keys) = committer();
        let commitment =
            Commitment::create(CommitmentKind::Receipt, id, &keys, b"total: 1250", 1000);
        assert!(!commitment.verify(&id, &keys.public().attestation, b"total: 9999"));
    }

    #[test]
    fn test_wrong_committer_rejected() {
        let (alice, alice_keys) = committer();
        let mallory = PrincipalId::derive(b"mallory");
        let commitment = Commitment::create(CommitmentKind::Grant, alice, &alice_keys, b"p", 1000);
        assert!(!commitment.verify(&mallory, &alice_keys.public().attestation, b"p"));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (id, keys) = committer();
        let other = PrincipalKeyPair::generate();
        let commitment = Commitment::create(CommitmentKind::Grant, id, &keys, b"payload", 1000);
        assert!(!commitment.verify(&id, &other.public().attestation, b"payload"));
    }

    #[test]
    fn test_altered_timestamp_rejected() {
        let (id, keys) = committer();
        let mut commitment =
            Commitment::create(CommitmentKind::Transfer, id, &keys, b"payload", 1000);
        commitment.committed_at = 2000;
        assert!(!commitment.verify(&id, &keys.public().attestation, b"payload"));
    }

    #[test]
    fn test_altered_kind_rejected() {
        let (id, keys) = committer();
        let mut commitment =
            Commitment::create(CommitmentKind::Receipt, id, &keys, b"payload", 1000);
        commitment.kind = CommitmentKind::Grant;
        assert!(!commitment.verify(&id, &keys.public().attestation, b"payload"));
    }

    #[test]
    fn test_forged_proof_rejected() {
        let (id, keys) = committer();
        let mut commitment =
            Commitment::create(CommitmentKind::Receipt, id, &keys, b"payload", 1000);
        commitment.proof = AttestationSignature::ZERO;
        assert!(!commitment.verify(&id, &keys.public().attestation, b"payload"));
    }

    #[test]
    fn test_verify_proof_without_payload() {
        let (id, keys) = committer();
        let commitment =
            Commitment::create(CommitmentKind::Receipt, id, &keys, b"secret payload", 1000);
        // A verifier with no payload can still confirm the signature.
        assert!(commitment.verify_proof(&id, &keys.public().attestation));

        let other = PrincipalKeyPair::generate();
        assert!(!commitment.verify_proof(&id, &other.public().attestation));
        let mallory = PrincipalId::derive(b"mallory");
        assert!(!commitment.verify_proof(&mallory, &keys.public().attestation));
    }

    #[test]
    fn test_verify_proof_rejects_resigned_subject() {
        // verify_proof takes the subject as claimed, so a swapped
        // subject must break the signature.
        let (id, keys) = committer();
        let mut commitment =
            Commitment::create(CommitmentKind::Receipt, id, &keys, b"real payload", 1000);
        commitment.subject = subject_digest(&id, b"forged payload");
        assert!(!commitment.verify_proof(&id, &keys.public().attestation));
    }

    #[test]
    fn test_kind_tags() {
        for kind in [
            CommitmentKind::Receipt,
            CommitmentKind::Grant,
            CommitmentKind::Transfer,
        ] {
            assert_eq!(CommitmentKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(CommitmentKind::from_tag(0), None);
        assert_eq!(CommitmentKind::from_tag(4), None);
    }
}
