//! Identifier newtypes.
//!
//! All identifiers are 32-byte values. Principals and resources are named by
//! external systems (wallets, asset registries), so their identifiers are
//! derived by hashing the external reference under a domain prefix. Grant and
//! share identifiers are derived from the records they name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte principal identifier.
///
/// Derived from an external identity reference (e.g., a wallet address).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(pub [u8; 32]);

impl PrincipalId {
    /// Derive a principal ID from an external identity reference.
    pub fn derive(identity: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"cachet-principal-v1:");
        hasher.update(identity);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The zero principal ID (sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrincipalId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for PrincipalId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for PrincipalId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 32-byte resource identifier.
///
/// Derived from the external asset reference the ciphertext is tied to
/// (e.g., an NFT contract address and token number).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub [u8; 32]);

impl ResourceId {
    /// Derive a resource ID from an external asset reference.
    pub fn derive(asset_ref: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"cachet-resource-v1:");
        hasher.update(asset_ref);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The zero resource ID (sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for ResourceId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for ResourceId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 32-byte grant identifier.
///
/// Derived from the parties, the resource, and the creation time, so a
/// re-grant after revocation gets a fresh identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantId(pub [u8; 32]);

impl GrantId {
    /// Derive a grant ID from the grant's identifying fields.
    pub fn derive(
        resource: &ResourceId,
        granter: &PrincipalId,
        grantee: &PrincipalId,
        created_at: i64,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"cachet-grant-v1:");
        hasher.update(resource.as_bytes());
        hasher.update(granter.as_bytes());
        hasher.update(grantee.as_bytes());
        hasher.update(&created_at.to_le_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrantId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for GrantId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 32-byte threshold-share identifier.
///
/// Derived from the key fingerprint and the share index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShareId(pub [u8; 32]);

impl ShareId {
    /// Derive a share ID from the key fingerprint and share index.
    pub fn derive(fingerprint: &[u8; 32], index: u8) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"cachet-share-v1:");
        hasher.update(fingerprint);
        hasher.update(&[index]);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShareId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for ShareId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_id_hex_roundtrip() {
        let id = PrincipalId::derive(b"wallet:0xabc123");
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(PrincipalId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(
            ResourceId::derive(b"nft:42"),
            ResourceId::derive(b"nft:42")
        );
        assert_ne!(ResourceId::derive(b"nft:42"), ResourceId::derive(b"nft:43"));
    }

    #[test]
    fn derivations_are_domain_separated() {
        // Same input bytes must not collide across identifier kinds.
        let p = PrincipalId::derive(b"same-input");
        let r = ResourceId::derive(b"same-input");
        assert_ne!(p.0, r.0);
    }

    #[test]
    fn from_hex_rejects_bad_lengths() {
        assert!(PrincipalId::from_hex("abcd").is_err());
        assert!(ResourceId::from_hex(&"ff".repeat(33)).is_err());
    }

    #[test]
    fn grant_id_varies_with_time() {
        let r = ResourceId::derive(b"r");
        let a = PrincipalId::derive(b"a");
        let b = PrincipalId::derive(b"b");
        assert_ne!(
            GrantId::derive(&r, &a, &b, 1000),
            GrantId::derive(&r, &a, &b, 2000)
        );
    }

    #[test]
    fn debug_output_truncates() {
        let id = PrincipalId::derive(b"debug");
        let s = format!("{:?}", id);
        assert!(s.starts_with("PrincipalId("));
        assert!(s.len() < 32);
    }
}
