//! Proptest generators for property-based testing.

use alloy::primitives::{Address, U256};
use cofhe_core::{EncryptableItem, FheType, Tree};
use cofhe_permits::{CanonicalPermit, PermitType};
use proptest::prelude::*;
use serde_json::Value;

/// Generate any utype.
pub fn fhe_type() -> impl Strategy<Value = FheType> {
    proptest::sample::select(FheType::ALL.to_vec())
}

/// Generate any 256-bit integer.
pub fn u256() -> impl Strategy<Value = U256> {
    any::<[u8; 32]>().prop_map(U256::from_be_bytes)
}

/// Generate an address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::from)
}

/// Generate an item whose value fits its utype.
pub fn encryptable_item() -> impl Strategy<Value = EncryptableItem> {
    (fhe_type(), u256(), 0u8..4).prop_map(|(utype, value, zone)| {
        EncryptableItem::new(utype, value & utype.max_value()).with_security_zone(zone)
    })
}

/// Generate a plain JSON scalar.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
    ]
}

/// Generate a nested input tree with encryptable leaves.
pub fn tree() -> impl Strategy<Value = Tree<EncryptableItem>> {
    let leaf = prop_oneof![
        3 => encryptable_item().prop_map(Tree::Leaf),
        1 => scalar().prop_map(Tree::Scalar),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Tree::Array),
            prop::collection::vec(("[a-z][a-z0-9]{0,7}", inner), 0..6).prop_map(Tree::Object),
        ]
    })
}

/// Generate a permit kind.
pub fn permit_type() -> impl Strategy<Value = PermitType> {
    prop_oneof![
        Just(PermitType::SelfIssued),
        Just(PermitType::Sharing),
        Just(PermitType::Import),
    ]
}

/// Parameters for the fields a permit hash covers.
#[derive(Debug, Clone)]
pub struct PermitParams {
    pub permit_type: PermitType,
    pub issuer: Address,
    pub expiration: u64,
    pub recipient: Address,
    pub validator_id: U256,
    pub validator_contract: Address,
}

impl PermitParams {
    pub fn canonical(&self) -> CanonicalPermit<'static> {
        CanonicalPermit {
            permit_type: self.permit_type.as_str(),
            issuer: self.issuer,
            expiration: self.expiration,
            recipient: self.recipient,
            validator_id: self.validator_id,
            validator_contract: self.validator_contract,
        }
    }
}

impl Arbitrary for PermitParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            permit_type(),
            address(),
            any::<u64>(),
            address(),
            u256(),
            address(),
        )
            .prop_map(
                |(permit_type, issuer, expiration, recipient, validator_id, validator_contract)| {
                    PermitParams {
                        permit_type,
                        issuer,
                        expiration,
                        recipient,
                        validator_id,
                        validator_contract,
                    }
                },
            )
            .boxed()
    }
}
