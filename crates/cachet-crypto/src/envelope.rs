//! Encrypted payload envelope.
//!
//! Canonical document bytes are sealed under a fresh content key and
//! wrapped in an envelope carrying the scheme tag, nonce, and
//! ciphertext. The scheme tag is checked before anything else during
//! opening.

use serde::{Deserialize, Serialize};

use crate::cipher::{ContentKey, ContentNonce};
use crate::error::{CryptoError, Result};

/// Scheme tag for ChaCha20-Poly1305 with a 256-bit key.
pub const SCHEME_CHACHA20POLY1305: u8 = 1;

/// An encrypted payload with the metadata needed to decrypt it.
///
/// The tag is a raw byte rather than an enum so that envelopes written
/// by a newer build still parse here and fail with the scheme they
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// Encryption scheme tag.
    pub scheme: u8,

    /// Nonce used for encryption (unique per envelope).
    pub nonce: ContentNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl SealedEnvelope {
    /// Encrypt plaintext with the given key.
    pub fn seal(plaintext: &[u8], key: &ContentKey) -> Result<Self> {
        let nonce = ContentNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            scheme: SCHEME_CHACHA20POLY1305,
            nonce,
            ciphertext,
        })
    }

    /// Fails with [`CryptoError::UnsupportedScheme`] unless the tag
    /// names a scheme this build implements.
    pub fn check_scheme(&self) -> Result<()> {
        if self.scheme != SCHEME_CHACHA20POLY1305 {
            return Err(CryptoError::UnsupportedScheme(self.scheme));
        }
        Ok(())
    }

    /// Decrypt with the given key.
    ///
    /// An unrecognized scheme tag fails before the key is used.
    pub fn open(&self, key: &ContentKey) -> Result<Vec<u8>> {
        self.check_scheme()?;
        key.decrypt(&self.ciphertext, &self.nonce)
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CryptoError::SerializationError(e.to_string()))
    }

    /// Get the size of the ciphertext.
    pub fn ciphertext_len(&self) -> usize {
        self.ciphertext.len()
    }
}
