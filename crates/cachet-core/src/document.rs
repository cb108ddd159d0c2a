//! Structured receipt documents.
//!
//! The payloads this system encrypts are purchase receipts: merchant, time,
//! currency, total, line items. Money is integer cents and timestamps are
//! Unix milliseconds, so no floats ever enter the canonical encoding.

use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::error::CoreError;

/// One purchased line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item label as it appeared on the receipt.
    pub description: String,
    /// Units purchased.
    pub quantity: u32,
    /// Price per unit, in cents.
    pub unit_cents: u64,
}

/// A structured purchase receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDocument {
    /// Merchant name.
    pub merchant: String,
    /// Purchase time (Unix milliseconds).
    pub purchased_at: i64,
    /// ISO 4217 currency code, e.g. "USD".
    pub currency: String,
    /// Receipt total, in cents.
    pub total_cents: u64,
    /// Itemized purchases.
    pub line_items: Vec<LineItem>,
}

impl ReceiptDocument {
    /// Encode to canonical CBOR bytes.
    ///
    /// These are the bytes that get encrypted and committed to; the encoding
    /// is deterministic across platforms.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical::canonical_document_bytes(self)
    }

    /// Decode from canonical CBOR bytes.
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        canonical::document_from_canonical(bytes)
    }

    /// The redacted view disclosed at `Limited` access.
    ///
    /// Always the same projection for the same document: merchant, time,
    /// currency, and total. Line items are withheld.
    pub fn summarize(&self) -> ReceiptSummary {
        ReceiptSummary {
            merchant: self.merchant.clone(),
            purchased_at: self.purchased_at,
            currency: self.currency.clone(),
            total_cents: self.total_cents,
        }
    }
}

/// The pre-declared subset of a receipt disclosed at `Limited` access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    /// Merchant name.
    pub merchant: String,
    /// Purchase time (Unix milliseconds).
    pub purchased_at: i64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Receipt total, in cents.
    pub total_cents: u64,
}

/// How much of a resource a grant discloses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccessLevel {
    /// The entire payload.
    Full = 1,
    /// The deterministic summary; line items withheld.
    Limited = 2,
    /// Only a commitment proving authenticity; no content.
    VerificationOnly = 3,
}

impl AccessLevel {
    /// Convert to u8 for serialization.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Try to parse from u8.
    pub fn from_tag(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Full),
            2 => Some(Self::Limited),
            3 => Some(Self::VerificationOnly),
            _ => None,
        }
    }

    /// Whether this level allows decrypting the payload at all.
    pub fn can_decrypt(self) -> bool {
        !matches!(self, Self::VerificationOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReceiptDocument {
        ReceiptDocument {
            merchant: "Corner Cafe".to_string(),
            purchased_at: 1736870400000,
            currency: "USD".to_string(),
            total_cents: 875,
            line_items: vec![
                LineItem {
                    description: "espresso".to_string(),
                    quantity: 2,
                    unit_cents: 300,
                },
                LineItem {
                    description: "croissant".to_string(),
                    quantity: 1,
                    unit_cents: 275,
                },
            ],
        }
    }

    #[test]
    fn summary_excludes_line_items() {
        let doc = sample();
        let summary = doc.summarize();
        assert_eq!(summary.merchant, doc.merchant);
        assert_eq!(summary.total_cents, doc.total_cents);
        // ReceiptSummary has no line-item field; the projection below is the
        // entire disclosed surface.
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("espresso"));
        assert!(!json.contains("line_items"));
    }

    #[test]
    fn summary_is_deterministic() {
        let doc = sample();
        assert_eq!(doc.summarize(), doc.summarize());
    }

    #[test]
    fn access_level_tags_roundtrip() {
        for level in [
            AccessLevel::Full,
            AccessLevel::Limited,
            AccessLevel::VerificationOnly,
        ] {
            assert_eq!(AccessLevel::from_tag(level.tag()), Some(level));
        }
        assert_eq!(AccessLevel::from_tag(0), None);
        assert_eq!(AccessLevel::from_tag(4), None);
    }

    #[test]
    fn verification_only_cannot_decrypt() {
        assert!(AccessLevel::Full.can_decrypt());
        assert!(AccessLevel::Limited.can_decrypt());
        assert!(!AccessLevel::VerificationOnly.can_decrypt());
    }
}
