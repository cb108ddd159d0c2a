//! Proptest generators for property-based testing.

use proptest::prelude::*;

use cachet_core::{
    AccessLevel, KeySeed, LineItem, PrincipalId, PrincipalKeyPair, PrincipalPublicKey,
    ReceiptDocument, ResourceId,
};
use cachet_crypto::EncryptedResource;

/// Generate a random key seed.
pub fn key_seed() -> impl Strategy<Value = KeySeed> {
    any::<[u8; 32]>().prop_map(KeySeed::from_bytes)
}

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = PrincipalKeyPair> {
    key_seed().prop_map(PrincipalKeyPair::from_seed)
}

/// Generate a random public key.
pub fn public_key() -> impl Strategy<Value = PrincipalPublicKey> {
    keypair().prop_map(|kp| kp.public())
}

/// Generate a random PrincipalId.
pub fn principal_id() -> impl Strategy<Value = PrincipalId> {
    any::<[u8; 32]>().prop_map(PrincipalId)
}

/// Generate a random ResourceId.
pub fn resource_id() -> impl Strategy<Value = ResourceId> {
    any::<[u8; 32]>().prop_map(ResourceId)
}

/// Generate an AccessLevel.
pub fn access_level() -> impl Strategy<Value = AccessLevel> {
    prop_oneof![
        Just(AccessLevel::Full),
        Just(AccessLevel::Limited),
        Just(AccessLevel::VerificationOnly),
    ]
}

/// Generate a merchant name.
pub fn merchant() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,15}( [A-Z][a-z]{2,8})?".prop_map(String::from)
}

/// Generate a currency code.
pub fn currency() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["USD", "EUR", "GBP", "JPY", "CHF"]).prop_map(String::from)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Generate a line item.
pub fn line_item() -> impl Strategy<Value = LineItem> {
    ("[a-z][a-z ]{0,15}", 1u32..=20u32, 1u64..=100_000u64).prop_map(
        |(description, quantity, unit_cents)| LineItem {
            description,
            quantity,
            unit_cents,
        },
    )
}

/// Generate a receipt document whose total is consistent with its
/// line items.
pub fn document() -> impl Strategy<Value = ReceiptDocument> {
    (
        merchant(),
        timestamp(),
        currency(),
        prop::collection::vec(line_item(), 1..=6),
    )
        .prop_map(|(merchant, purchased_at, currency, line_items)| {
            let total_cents = line_items
                .iter()
                .map(|item| u64::from(item.quantity) * item.unit_cents)
                .sum();
            ReceiptDocument {
                merchant,
                purchased_at,
                currency,
                total_cents,
                line_items,
            }
        })
}

/// Generate a valid `(threshold, share_count)` pair.
pub fn threshold_config() -> impl Strategy<Value = (u8, u8)> {
    (1u8..=10u8).prop_flat_map(|count| (1u8..=count, Just(count)))
}

/// Parameters for sealing an encrypted resource.
#[derive(Debug, Clone)]
pub struct SealParams {
    pub keypair: PrincipalKeyPair,
    pub asset_ref: Vec<u8>,
    pub document: ReceiptDocument,
    pub sealed_at: i64,
}

impl Arbitrary for SealParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(), // seed
            prop::collection::vec(any::<u8>(), 1..=64), // asset_ref
            document(),
            0i64..=1_800_000_000_000i64, // sealed_at
        )
            .prop_map(|(seed, asset_ref, document, sealed_at)| SealParams {
                keypair: PrincipalKeyPair::from_seed(KeySeed::from_bytes(seed)),
                asset_ref,
                document,
                sealed_at,
            })
            .boxed()
    }
}

/// Seal a resource from parameters.
pub fn resource_from_params(params: &SealParams) -> cachet_crypto::Result<EncryptedResource> {
    EncryptedResource::seal(
        &params.document,
        ResourceId::derive(&params.asset_ref),
        &params.keypair.public().agreement,
        params.sealed_at,
    )
}
