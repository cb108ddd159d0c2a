//! Threshold backup and recovery of principal seeds.
//!
//! A seed is split into N shares over GF(256), any T of which
//! reconstruct it; fewer than T reveal nothing. Each share is signed by
//! the key it backs up, so custodian submissions are verified against
//! the attestation key recorded at split time before they count toward
//! the threshold. Reconstruction is checked against the recorded key
//! fingerprint and the recorded public key before a seed is released.
//!
//! [`RecoverySession`] accumulates shares one at a time and reports
//! progress; dropping a session abandons the attempt with no side
//! effects.

use std::collections::BTreeMap;
use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use cachet_core::{
    AttestationPublicKey, AttestationSignature, BackupRecord, Blake3Hash, KeySeed,
    PrincipalId, PrincipalKeyPair, ShareId,
};

use crate::error::{CryptoError, Result};

/// Derivation context for seed fingerprints.
const FINGERPRINT_CONTEXT: &str = "cachet-recover-v1 fingerprint";

/// Domain prefix for signed share messages.
const SHARE_DOMAIN: &[u8] = b"cachet-recover-v1 share:";

// ─────────────────────────────────────────────────────────────────────────
// GF(256) Arithmetic
// ─────────────────────────────────────────────────────────────────────────

// The field is GF(2^8) with the AES reduction polynomial x^8+x^4+x^3+x+1.
// Addition is XOR; multiplication shifts and reduces.

fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    for _ in 0..8 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse via a^254 (Fermat). Never called with zero:
/// x coordinates are distinct and nonzero, so denominators never vanish.
fn gf_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u8;
    while exp > 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

/// Evaluate a polynomial (constant term first) at `x` by Horner's rule.
fn eval_poly(coefficients: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &c in coefficients.iter().rev() {
        acc = gf_mul(acc, x) ^ c;
    }
    acc
}

/// Lagrange basis values at x = 0 for the given x coordinates.
fn basis_at_zero(xs: &[u8]) -> Vec<u8> {
    xs.iter()
        .enumerate()
        .map(|(i, &xi)| {
            let mut basis = 1u8;
            for (j, &xj) in xs.iter().enumerate() {
                if i != j {
                    basis = gf_mul(basis, gf_mul(xj, gf_inv(xi ^ xj)));
                }
            }
            basis
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────
// Shares
// ─────────────────────────────────────────────────────────────────────────

/// The 32 secret bytes of one share. Zeroed on drop, redacted in Debug.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ShareValue([u8; 32]);

impl ShareValue {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ShareValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareValue(..)")
    }
}

/// One custodian's share of a split seed.
///
/// Carries everything a later recovery needs to verify it: the
/// fingerprint of the seed it came from, its position, the split
/// geometry, and a signature by the key it backs up.
#[derive(Clone, Serialize, Deserialize)]
pub struct ThresholdKeyShare {
    pub share_id: ShareId,
    /// X coordinate, 1-based. Zero is the secret and never a share.
    pub index: u8,
    pub fingerprint: Blake3Hash,
    pub threshold: u8,
    pub share_count: u8,
    pub attestation: AttestationSignature,
    value: ShareValue,
}

impl ThresholdKeyShare {
    /// The secret bytes. Handle like a key.
    pub fn value(&self) -> &ShareValue {
        &self.value
    }
}

impl fmt::Debug for ThresholdKeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThresholdKeyShare")
            .field("share_id", &self.share_id)
            .field("index", &self.index)
            .field("threshold", &self.threshold)
            .field("share_count", &self.share_count)
            .finish_non_exhaustive()
    }
}

/// Keyed fingerprint of a seed, recorded at split time and checked at
/// reconstruction.
pub fn seed_fingerprint(seed: &KeySeed) -> Blake3Hash {
    Blake3Hash(blake3::derive_key(FINGERPRINT_CONTEXT, seed.as_bytes()))
}

fn share_message(
    fingerprint: &Blake3Hash,
    index: u8,
    threshold: u8,
    share_count: u8,
    value: &ShareValue,
) -> Vec<u8> {
    let mut message = Vec::with_capacity(SHARE_DOMAIN.len() + 32 + 3 + 32);
    message.extend_from_slice(SHARE_DOMAIN);
    message.extend_from_slice(fingerprint.as_bytes());
    message.push(index);
    message.push(threshold);
    message.push(share_count);
    message.extend_from_slice(value.as_bytes());
    message
}

// ─────────────────────────────────────────────────────────────────────────
// Splitting
// ─────────────────────────────────────────────────────────────────────────

/// Split a principal's seed into `share_count` shares, any `threshold`
/// of which reconstruct it.
///
/// Each seed byte gets an independent random polynomial of degree
/// `threshold - 1` with that byte as the constant term; share `i` is
/// the evaluation at x = i. Shares are signed with the keypair being
/// split so they can be verified when they come back.
pub fn split_seed(
    keys: &PrincipalKeyPair,
    threshold: u8,
    share_count: u8,
) -> Result<Vec<ThresholdKeyShare>> {
    if threshold == 0 || share_count == 0 || threshold > share_count {
        return Err(CryptoError::ThresholdConfigError {
            threshold,
            shares: share_count,
        });
    }

    let fingerprint = seed_fingerprint(keys.seed());
    let seed_bytes = keys.seed().as_bytes();
    let mut rng = rand::thread_rng();

    // coefficients[k] is the polynomial for seed byte k.
    let mut coefficients: Vec<Vec<u8>> = Vec::with_capacity(32);
    for &byte in seed_bytes.iter() {
        let mut poly = vec![0u8; threshold as usize];
        poly[0] = byte;
        rng.fill_bytes(&mut poly[1..]);
        coefficients.push(poly);
    }

    let shares = (1..=share_count)
        .map(|index| {
            let mut value = [0u8; 32];
            for (k, poly) in coefficients.iter().enumerate() {
                value[k] = eval_poly(poly, index);
            }
            let value = ShareValue(value);
            let attestation = keys.sign(&share_message(
                &fingerprint,
                index,
                threshold,
                share_count,
                &value,
            ));
            ThresholdKeyShare {
                share_id: ShareId::derive(fingerprint.as_bytes(), index),
                index,
                fingerprint,
                threshold,
                share_count,
                attestation,
                value,
            }
        })
        .collect();

    for poly in coefficients.iter_mut() {
        poly.zeroize();
    }

    Ok(shares)
}

// ─────────────────────────────────────────────────────────────────────────
// Recovery Sessions
// ─────────────────────────────────────────────────────────────────────────

/// How far along a recovery attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryProgress {
    /// Verified shares collected so far.
    pub collected: u8,
    /// Shares required to reconstruct.
    pub threshold: u8,
}

impl RecoveryProgress {
    pub fn remaining(&self) -> u8 {
        self.threshold.saturating_sub(self.collected)
    }

    pub fn is_satisfied(&self) -> bool {
        self.collected >= self.threshold
    }
}

/// An in-progress reconstruction of one principal's seed.
///
/// Shares are submitted one at a time and verified as they arrive;
/// nothing is written anywhere until the caller takes the
/// reconstructed seed, so dropping the session abandons the attempt
/// cleanly.
#[derive(Debug, Clone)]
pub struct RecoverySession {
    principal_id: PrincipalId,
    fingerprint: Blake3Hash,
    attestation: AttestationPublicKey,
    threshold: u8,
    share_count: u8,
    started_at: i64,
    collected: BTreeMap<u8, ShareValue>,
}

impl RecoverySession {
    /// Open a session against the backup recorded at split time.
    pub fn new(backup: &BackupRecord, now: i64) -> Self {
        Self {
            principal_id: backup.principal_id,
            fingerprint: backup.fingerprint,
            attestation: backup.attestation,
            threshold: backup.threshold,
            share_count: backup.share_count,
            started_at: now,
            collected: BTreeMap::new(),
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn progress(&self) -> RecoveryProgress {
        RecoveryProgress {
            collected: self.collected.len() as u8,
            threshold: self.threshold,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.progress().is_satisfied()
    }

    /// Submit one share.
    ///
    /// The share must carry this session's fingerprint, a plausible
    /// index, and a signature that verifies under the attestation key
    /// recorded at split time. Re-submitting a share already collected
    /// is a no-op; a conflicting value at a collected index is
    /// rejected.
    pub fn submit(&mut self, share: &ThresholdKeyShare) -> Result<RecoveryProgress> {
        if !share.fingerprint.ct_eq(&self.fingerprint) {
            return Err(CryptoError::ShareVerificationFailed);
        }
        if share.index == 0 || share.index > self.share_count {
            return Err(CryptoError::ShareVerificationFailed);
        }
        let message = share_message(
            &share.fingerprint,
            share.index,
            share.threshold,
            share.share_count,
            &share.value,
        );
        if self.attestation.verify(&message, &share.attestation).is_err() {
            return Err(CryptoError::ShareVerificationFailed);
        }

        match self.collected.get(&share.index) {
            Some(existing) if *existing == share.value => {}
            Some(_) => return Err(CryptoError::ShareVerificationFailed),
            None => {
                self.collected.insert(share.index, share.value.clone());
            }
        }
        Ok(self.progress())
    }

    /// Reconstruct the seed from the collected shares.
    ///
    /// Fails with [`CryptoError::InsufficientShares`] below the
    /// threshold, and with [`CryptoError::ShareVerificationFailed`] if
    /// the reconstructed seed does not reproduce the recorded
    /// fingerprint and public key. The session itself is unchanged and
    /// can keep collecting.
    pub fn reconstruct(&self) -> Result<KeySeed> {
        let have = self.collected.len() as u8;
        if have < self.threshold {
            return Err(CryptoError::InsufficientShares {
                have,
                need: self.threshold,
            });
        }

        let xs: Vec<u8> = self.collected.keys().copied().collect();
        let basis = basis_at_zero(&xs);

        let mut seed_bytes = [0u8; 32];
        for (k, slot) in seed_bytes.iter_mut().enumerate() {
            let mut byte = 0u8;
            for (i, value) in self.collected.values().enumerate() {
                byte ^= gf_mul(value.as_bytes()[k], basis[i]);
            }
            *slot = byte;
        }
        let seed = KeySeed::from_bytes(seed_bytes);
        seed_bytes.zeroize();

        // The reconstruction must reproduce both the fingerprint and
        // the public key recorded when the seed was split. A mix of
        // shares from different splits lands here.
        let fingerprint_ok = seed_fingerprint(&seed).ct_eq(&self.fingerprint);
        let derived = PrincipalKeyPair::from_seed(seed.clone());
        let key_ok = derived.public().attestation == self.attestation;
        if !(fingerprint_ok & key_ok) {
            return Err(CryptoError::ShareVerificationFailed);
        }

        Ok(seed)
    }
}
