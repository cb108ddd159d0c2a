//! Canonical CBOR encoding for deterministic serialization.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (money is integer cents, timestamps are i64 milliseconds)
//!
//! Everything that is encrypted, hashed, or committed goes through this
//! encoder, so the same document produces identical bytes (and thus
//! identical commitment subjects) across all platforms. Plain record
//! storage uses ordinary `ciborium` serialization instead.

use ciborium::value::Value;

use crate::document::{LineItem, ReceiptDocument};
use crate::error::CoreError;
use crate::records::{AccessGrant, TransferEntry};
use crate::types::ResourceId;

/// Field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    // Receipt document fields.
    pub const DOC_MERCHANT: u64 = 0;
    pub const DOC_PURCHASED_AT: u64 = 1;
    pub const DOC_CURRENCY: u64 = 2;
    pub const DOC_TOTAL_CENTS: u64 = 3;
    pub const DOC_LINE_ITEMS: u64 = 4;

    // Line item fields.
    pub const ITEM_DESCRIPTION: u64 = 0;
    pub const ITEM_QUANTITY: u64 = 1;
    pub const ITEM_UNIT_CENTS: u64 = 2;

    // Grant attestation fields.
    pub const GRANT_RESOURCE: u64 = 0;
    pub const GRANT_GRANTER: u64 = 1;
    pub const GRANT_GRANTEE: u64 = 2;
    pub const GRANT_LEVEL: u64 = 3;
    pub const GRANT_CREATED_AT: u64 = 4;
    pub const GRANT_EXPIRES_AT: u64 = 5;

    // Transfer attestation fields.
    pub const XFER_RESOURCE: u64 = 0;
    pub const XFER_FROM: u64 = 1;
    pub const XFER_TO: u64 = 2;
    pub const XFER_VERSION: u64 = 3;
    pub const XFER_AT: u64 = 4;
}

/// Encode a receipt document to canonical CBOR bytes.
pub fn canonical_document_bytes(doc: &ReceiptDocument) -> Vec<u8> {
    let value = document_to_cbor_value(doc);
    encode_cbor_value_canonical(&value)
}

/// Encode the attestation payload for a grant action.
///
/// Binds the resource, both parties, the access level, and the validity
/// window. This is what a granter commits to when delegating.
pub fn canonical_grant_bytes(grant: &AccessGrant) -> Vec<u8> {
    let mut entries = Vec::with_capacity(6);

    entries.push((
        Value::Integer(keys::GRANT_RESOURCE.into()),
        Value::Bytes(grant.resource_id.0.to_vec()),
    ));
    entries.push((
        Value::Integer(keys::GRANT_GRANTER.into()),
        Value::Bytes(grant.granter.0.to_vec()),
    ));
    entries.push((
        Value::Integer(keys::GRANT_GRANTEE.into()),
        Value::Bytes(grant.grantee.0.to_vec()),
    ));
    entries.push((
        Value::Integer(keys::GRANT_LEVEL.into()),
        Value::Integer(u64::from(grant.level.tag()).into()),
    ));
    entries.push((
        Value::Integer(keys::GRANT_CREATED_AT.into()),
        Value::Integer(grant.created_at.into()),
    ));
    let expires = match grant.expires_at {
        Some(at) => Value::Integer(at.into()),
        None => Value::Null,
    };
    entries.push((Value::Integer(keys::GRANT_EXPIRES_AT.into()), expires));

    encode_cbor_value_canonical(&Value::Map(entries))
}

/// Encode the attestation payload for an applied ownership transfer.
pub fn canonical_transfer_bytes(
    resource: &ResourceId,
    entry: &TransferEntry,
    version: u64,
) -> Vec<u8> {
    let entries = vec![
        (
            Value::Integer(keys::XFER_RESOURCE.into()),
            Value::Bytes(resource.0.to_vec()),
        ),
        (
            Value::Integer(keys::XFER_FROM.into()),
            Value::Bytes(entry.from.0.to_vec()),
        ),
        (
            Value::Integer(keys::XFER_TO.into()),
            Value::Bytes(entry.to.0.to_vec()),
        ),
        (
            Value::Integer(keys::XFER_VERSION.into()),
            Value::Integer(version.into()),
        ),
        (
            Value::Integer(keys::XFER_AT.into()),
            Value::Integer(entry.transferred_at.into()),
        ),
    ];

    encode_cbor_value_canonical(&Value::Map(entries))
}

/// Convert a document to a CBOR Value (map with integer keys).
fn document_to_cbor_value(doc: &ReceiptDocument) -> Value {
    // Build map entries in key order (already sorted 0-4)
    let mut entries = Vec::with_capacity(5);

    entries.push((
        Value::Integer(keys::DOC_MERCHANT.into()),
        Value::Text(doc.merchant.clone()),
    ));
    entries.push((
        Value::Integer(keys::DOC_PURCHASED_AT.into()),
        Value::Integer(doc.purchased_at.into()),
    ));
    entries.push((
        Value::Integer(keys::DOC_CURRENCY.into()),
        Value::Text(doc.currency.clone()),
    ));
    entries.push((
        Value::Integer(keys::DOC_TOTAL_CENTS.into()),
        Value::Integer(doc.total_cents.into()),
    ));

    let items: Vec<Value> = doc.line_items.iter().map(item_to_cbor_value).collect();
    entries.push((Value::Integer(keys::DOC_LINE_ITEMS.into()), Value::Array(items)));

    Value::Map(entries)
}

fn item_to_cbor_value(item: &LineItem) -> Value {
    Value::Map(vec![
        (
            Value::Integer(keys::ITEM_DESCRIPTION.into()),
            Value::Text(item.description.clone()),
        ),
        (
            Value::Integer(keys::ITEM_QUANTITY.into()),
            Value::Integer(item.quantity.into()),
        ),
        (
            Value::Integer(keys::ITEM_UNIT_CENTS.into()),
            Value::Integer(item.unit_cents.into()),
        ),
    ])
}

/// Encode a CBOR Value to canonical bytes.
fn encode_cbor_value_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => {
            encode_integer(buf, *i);
        }
        Value::Bytes(b) => {
            encode_bytes(buf, b);
        }
        Value::Text(s) => {
            encode_text(buf, s);
        }
        Value::Array(arr) => {
            encode_array(buf, arr);
        }
        Value::Map(entries) => {
            encode_map_canonical(buf, entries);
        }
        Value::Bool(b) => {
            buf.push(if *b { 0xf5 } else { 0xf4 });
        }
        Value::Null => {
            buf.push(0xf6);
        }
        Value::Float(_) => {
            panic!("floats not supported in canonical encoding");
        }
        _ => {
            panic!("unsupported CBOR value type");
        }
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        // Major type 0: unsigned integer
        encode_uint(buf, 0, n as u64);
    } else {
        // Major type 1: negative integer
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item);
    }
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    // Encode all keys first to sort by encoded bytes
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    // Sort by encoded key bytes (lexicographic)
    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    // Write map header
    encode_uint(buf, 5, key_value_pairs.len() as u64);

    // Write sorted key-value pairs
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

/// Decode a receipt document from canonical bytes.
pub fn document_from_canonical(bytes: &[u8]) -> Result<ReceiptDocument, CoreError> {
    let cursor = std::io::Cursor::new(bytes);
    let value: Value =
        ciborium::from_reader(cursor).map_err(|e| CoreError::Decoding(e.to_string()))?;
    cbor_value_to_document(&value)
}

/// Convert a CBOR Value (map) back to a ReceiptDocument.
fn cbor_value_to_document(value: &Value) -> Result<ReceiptDocument, CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedDocument("expected map".into())),
    };

    let merchant = match get_entry(map, keys::DOC_MERCHANT) {
        Some(Value::Text(s)) => s.clone(),
        _ => return Err(CoreError::MalformedDocument("missing merchant".into())),
    };

    let purchased_at = match get_entry(map, keys::DOC_PURCHASED_AT) {
        Some(Value::Integer(i)) => {
            let n: i128 = (*i).into();
            n as i64
        }
        _ => return Err(CoreError::MalformedDocument("missing purchased_at".into())),
    };

    let currency = match get_entry(map, keys::DOC_CURRENCY) {
        Some(Value::Text(s)) => s.clone(),
        _ => return Err(CoreError::MalformedDocument("missing currency".into())),
    };

    let total_cents = match get_entry(map, keys::DOC_TOTAL_CENTS) {
        Some(Value::Integer(i)) => {
            let n: i128 = (*i).into();
            if n < 0 {
                return Err(CoreError::MalformedDocument("negative total".into()));
            }
            n as u64
        }
        _ => return Err(CoreError::MalformedDocument("missing total_cents".into())),
    };

    let line_items = match get_entry(map, keys::DOC_LINE_ITEMS) {
        Some(Value::Array(arr)) => {
            let mut items = Vec::with_capacity(arr.len());
            for item in arr {
                items.push(cbor_value_to_item(item)?);
            }
            items
        }
        None => Vec::new(),
        _ => return Err(CoreError::MalformedDocument("invalid line_items".into())),
    };

    Ok(ReceiptDocument {
        merchant,
        purchased_at,
        currency,
        total_cents,
        line_items,
    })
}

fn cbor_value_to_item(value: &Value) -> Result<LineItem, CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedDocument("expected item map".into())),
    };

    let description = match get_entry(map, keys::ITEM_DESCRIPTION) {
        Some(Value::Text(s)) => s.clone(),
        _ => return Err(CoreError::MalformedDocument("missing description".into())),
    };

    let quantity = match get_entry(map, keys::ITEM_QUANTITY) {
        Some(Value::Integer(i)) => {
            let n: i128 = (*i).into();
            if n < 0 || n > u32::MAX as i128 {
                return Err(CoreError::MalformedDocument("invalid quantity".into()));
            }
            n as u32
        }
        _ => return Err(CoreError::MalformedDocument("missing quantity".into())),
    };

    let unit_cents = match get_entry(map, keys::ITEM_UNIT_CENTS) {
        Some(Value::Integer(i)) => {
            let n: i128 = (*i).into();
            if n < 0 {
                return Err(CoreError::MalformedDocument("negative unit price".into()));
            }
            n as u64
        }
        _ => return Err(CoreError::MalformedDocument("missing unit_cents".into())),
    };

    Ok(LineItem {
        description,
        quantity,
        unit_cents,
    })
}

/// Look up a map entry by integer key.
fn get_entry(map: &[(Value, Value)], key: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
        .map(|(_, v)| v)
}


#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_line_item() -> impl Strategy<Value = LineItem> {
        (".{0,24}", any::<u32>(), any::<u64>()).prop_map(
            |(description, quantity, unit_cents)| LineItem {
                description,
                quantity,
                unit_cents,
            },
        )
    }

    fn arb_document() -> impl Strategy<Value = ReceiptDocument> {
        (
            ".{0,32}",
            any::<i64>(),
            "[A-Z]{3}",
            any::<u64>(),
            prop::collection::vec(arb_line_item(), 0..5),
        )
            .prop_map(
                |(merchant, purchased_at, currency, total_cents, line_items)| ReceiptDocument {
                    merchant,
                    purchased_at,
                    currency,
                    total_cents,
                    line_items,
                },
            )
    }

    proptest! {
        // Unicode merchants, extreme timestamps, u64-boundary amounts:
        // everything the fixed samples above cannot cover.
        #[test]
        fn any_document_round_trips(doc in arb_document()) {
            let bytes = canonical_document_bytes(&doc);
            prop_assert_eq!(document_from_canonical(&bytes).unwrap(), doc);
        }
    }
}
