//! Symmetric primitives and X25519 key agreement.
//!
//! Provides the content-key cipher (ChaCha20-Poly1305) and the shared
//! secrets that key wraps are derived from.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use cachet_core::AgreementPublicKey;

use crate::error::{CryptoError, Result};

/// Derivation context for wrap keys.
const WRAP_KEY_CONTEXT: &str = "cachet-wrap-v1 key";

/// A 256-bit symmetric key for ChaCha20-Poly1305.
///
/// One fresh content key is generated per sealed resource. Zeroed on
/// drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; 32]);

impl ContentKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt data with this key.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &ContentNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

        let nonce = Nonce::from_slice(&nonce.0);
        cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))
    }

    /// Decrypt data with this key.
    ///
    /// All failures collapse to [`CryptoError::DecryptionError`].
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &ContentNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|_| CryptoError::DecryptionError)?;

        let nonce = Nonce::from_slice(&nonce.0);
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionError)
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNonce(pub [u8; 12]);

impl ContentNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 12];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// A shared secret from X25519 key agreement. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a wrap key from this shared secret, bound to `context`.
    pub fn derive_wrap_key(&self, context: &[u8]) -> ContentKey {
        let mut hasher = blake3::Hasher::new_derive_key(WRAP_KEY_CONTEXT);
        hasher.update(&self.0);
        hasher.update(context);
        ContentKey(*hasher.finalize().as_bytes())
    }
}

/// Key agreement between a held static secret and a peer public key.
pub fn agree(secret: &StaticSecret, peer: &AgreementPublicKey) -> SharedKey {
    let shared = secret.diffie_hellman(&peer.to_dalek());
    SharedKey(*shared.as_bytes())
}

/// Ephemeral key pair for one-time key agreement.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: AgreementPublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new ephemeral key pair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = AgreementPublicKey::from_bytes(*PublicKey::from(&secret).as_bytes());
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> AgreementPublicKey {
        self.public
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Consumes the ephemeral secret (can only be used once).
    pub fn diffie_hellman(self, peer: &AgreementPublicKey) -> SharedKey {
        let shared = self.secret.diffie_hellman(&peer.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::PrincipalKeyPair;

    #[test]
    fn test_encrypt_decrypt() {
        let key = ContentKey::generate();
        let nonce = ContentNonce::generate();
        let plaintext = b"hello, world!";

        let ciphertext = key.encrypt(plaintext, &nonce).unwrap();
        assert_ne!(ciphertext, plaintext);

        let decrypted = key.decrypt(&ciphertext, &nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = ContentKey::generate();
        let key2 = ContentKey::generate();
        let nonce = ContentNonce::generate();

        let ciphertext = key1.encrypt(b"secret", &nonce).unwrap();

        assert!(matches!(
            key2.decrypt(&ciphertext, &nonce),
            Err(CryptoError::DecryptionError)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_same_error_as_wrong_key() {
        let key = ContentKey::generate();
        let nonce = ContentNonce::generate();
        let mut ciphertext = key.encrypt(b"secret", &nonce).unwrap();
        ciphertext[0] ^= 0x01;

        assert!(matches!(
            key.decrypt(&ciphertext, &nonce),
            Err(CryptoError::DecryptionError)
        ));
    }

    #[test]
    fn test_ephemeral_agreement_matches_static() {
        let recipient = PrincipalKeyPair::generate();
        let recipient_public = recipient.public().agreement;

        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let sender_shared = ephemeral.diffie_hellman(&recipient_public);
        let recipient_shared = agree(&recipient.agreement_secret(), &ephemeral_public);

        assert_eq!(sender_shared.as_bytes(), recipient_shared.as_bytes());
    }

    #[test]
    fn test_wrap_key_derivation_deterministic() {
        let shared = SharedKey([0x42; 32]);
        assert_eq!(
            shared.derive_wrap_key(b"ctx").as_bytes(),
            shared.derive_wrap_key(b"ctx").as_bytes()
        );
        assert_ne!(
            shared.derive_wrap_key(b"ctx-a").as_bytes(),
            shared.derive_wrap_key(b"ctx-b").as_bytes()
        );
    }
}
