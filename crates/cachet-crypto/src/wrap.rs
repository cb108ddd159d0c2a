//! Asymmetric key wrapping.
//!
//! A content key is delivered to a recipient by wrapping it under a
//! key derived from ephemeral X25519 agreement with the recipient's
//! public key. The wrap is bound to a caller-supplied context, so a
//! wrap made for one resource or delegation cannot be replayed for
//! another.

use serde::{Deserialize, Serialize};
use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

use cachet_core::AgreementPublicKey;

use crate::cipher::{agree, ContentKey, ContentNonce, EphemeralKeyPair};
use crate::error::{CryptoError, Result};

/// A content key encrypted to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWrap {
    /// Ephemeral X25519 public key (sender's side of the agreement).
    pub ephemeral_public: AgreementPublicKey,

    /// The content key, encrypted under the derived wrap key.
    pub encrypted_key: Vec<u8>,

    /// Nonce used for the wrap encryption.
    pub nonce: ContentNonce,
}

impl KeyWrap {
    /// Wrap `content_key` for `recipient`, bound to `context`.
    pub fn seal(
        content_key: &ContentKey,
        recipient: &AgreementPublicKey,
        context: &[u8],
    ) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let shared = ephemeral.diffie_hellman(recipient);
        let wrap_key = shared.derive_wrap_key(context);

        let nonce = ContentNonce::generate();
        let encrypted_key = wrap_key.encrypt(content_key.as_bytes(), &nonce)?;

        Ok(Self {
            ephemeral_public,
            encrypted_key,
            nonce,
        })
    }

    /// Unwrap with the recipient's secret under the same `context`.
    ///
    /// Wrong recipient, wrong context, and tampered wrap bytes all fail
    /// identically.
    pub fn open(&self, recipient_secret: &StaticSecret, context: &[u8]) -> Result<ContentKey> {
        let shared = agree(recipient_secret, &self.ephemeral_public);
        let wrap_key = shared.derive_wrap_key(context);

        let mut key_bytes = wrap_key.decrypt(&self.encrypted_key, &self.nonce)?;

        if key_bytes.len() != 32 {
            key_bytes.zeroize();
            return Err(CryptoError::DecryptionError);
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&key_bytes);
        key_bytes.zeroize();
        Ok(ContentKey::from_bytes(arr))
    }
}
