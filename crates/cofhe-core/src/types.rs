//! FHE value types shared by the encrypt and decrypt pipelines.

use std::fmt;

use alloy::primitives::{Address, Bytes, FixedBytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::{CofheError, ErrorCode};

/// The plaintext type of an encrypted value ("utype").
///
/// Discriminants are the wire ids used by the chain. Id 1 is unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum FheType {
    Bool = 0,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    Uint128 = 6,
    /// 160-bit integer, interpreted as an address.
    Uint160 = 7,
    Uint256 = 8,
}

impl FheType {
    /// Every supported type, in id order.
    pub const ALL: [FheType; 8] = [
        FheType::Bool,
        FheType::Uint8,
        FheType::Uint16,
        FheType::Uint32,
        FheType::Uint64,
        FheType::Uint128,
        FheType::Uint160,
        FheType::Uint256,
    ];

    /// The numeric wire id.
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Plaintext bit width.
    pub const fn bits(self) -> usize {
        match self {
            FheType::Bool => 1,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
            FheType::Uint160 => 160,
            FheType::Uint256 => 256,
        }
    }

    /// Lowercase name used in the JSON leaf discriminant.
    pub const fn name(self) -> &'static str {
        match self {
            FheType::Bool => "bool",
            FheType::Uint8 => "uint8",
            FheType::Uint16 => "uint16",
            FheType::Uint32 => "uint32",
            FheType::Uint64 => "uint64",
            FheType::Uint128 => "uint128",
            FheType::Uint160 => "address",
            FheType::Uint256 => "uint256",
        }
    }

    /// Parse a discriminant name. `uint160` is accepted as an alias of `address`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "uint160" => Some(FheType::Uint160),
            other => Self::ALL.into_iter().find(|t| t.name() == other),
        }
    }

    /// Largest value representable in this type.
    pub fn max_value(self) -> U256 {
        match self.bits() {
            256 => U256::MAX,
            bits => (U256::from(1u8) << bits) - U256::from(1u8),
        }
    }

    /// Whether `value` fits in this type's bit width.
    pub fn fits(self, value: U256) -> bool {
        value <= self.max_value()
    }
}

impl fmt::Display for FheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<FheType> for u8 {
    fn from(t: FheType) -> Self {
        t.id()
    }
}

impl TryFrom<u8> for FheType {
    type Error = CofheError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::ALL.into_iter().find(|t| t.id() == id).ok_or_else(|| {
            CofheError::new(ErrorCode::InvalidUtype, format!("unknown utype id {id}"))
                .with_context("utype", id)
        })
    }
}

/// A plaintext value waiting to be encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptableItem {
    pub utype: FheType,
    pub value: U256,
    pub security_zone: u8,
}

impl EncryptableItem {
    /// Build an item without range checking. The encrypt pipeline checks.
    pub fn new(utype: FheType, value: U256) -> Self {
        Self {
            utype,
            value,
            security_zone: 0,
        }
    }

    pub fn bool(value: bool) -> Self {
        Self::new(FheType::Bool, U256::from(value as u8))
    }

    pub fn uint8(value: u8) -> Self {
        Self::new(FheType::Uint8, U256::from(value))
    }

    pub fn uint16(value: u16) -> Self {
        Self::new(FheType::Uint16, U256::from(value))
    }

    pub fn uint32(value: u32) -> Self {
        Self::new(FheType::Uint32, U256::from(value))
    }

    pub fn uint64(value: u64) -> Self {
        Self::new(FheType::Uint64, U256::from(value))
    }

    pub fn uint128(value: u128) -> Self {
        Self::new(FheType::Uint128, U256::from(value))
    }

    pub fn uint256(value: U256) -> Self {
        Self::new(FheType::Uint256, value)
    }

    pub fn address(value: Address) -> Self {
        Self::new(FheType::Uint160, U256::from_be_slice(value.as_slice()))
    }

    /// Set the security zone.
    pub fn with_security_zone(mut self, zone: u8) -> Self {
        self.security_zone = zone;
        self
    }
}

/// A verified ciphertext handle, ready to submit on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedInput {
    pub ct_hash: U256,
    pub security_zone: u8,
    pub utype: FheType,
    pub signature: Bytes,
}

/// A decrypted plaintext, typed by its utype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum UnsealedValue {
    Bool(bool),
    Uint(U256),
    Address(Address),
}

impl UnsealedValue {
    /// Interpret a raw unsealed integer according to `utype`.
    pub fn from_plaintext(utype: FheType, raw: U256) -> Self {
        match utype {
            FheType::Bool => UnsealedValue::Bool(!raw.is_zero()),
            FheType::Uint160 => {
                UnsealedValue::Address(Address::from_word(B256::from(raw.to_be_bytes::<32>())))
            }
            _ => UnsealedValue::Uint(raw),
        }
    }

    /// The integer form, if this is a `Uint`.
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            UnsealedValue::Uint(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for UnsealedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsealedValue::Bool(b) => write!(f, "{b}"),
            UnsealedValue::Uint(v) => write!(f, "{v}"),
            UnsealedValue::Address(a) => write!(f, "{}", a.to_checksum(None)),
        }
    }
}

/// Ciphertext of a plaintext sealed to a permit's sealing key.
///
/// `public_key` is the sender's ephemeral X25519 key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SealedEnvelope {
    pub data: Bytes,
    pub public_key: B256,
    pub nonce: FixedBytes<12>,
}

/// What a decryption backend hands back before unsealing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "sealed", rename_all = "lowercase")]
pub enum SealedValue {
    /// XOR-masked integer from the mock backend. Offers no confidentiality.
    Mock(U256),
    Envelope(SealedEnvelope),
}

/// The on-wire subset of a permit presented to a decryption backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub issuer: Address,
    pub expiration: u64,
    pub recipient: Address,
    pub validator_id: U256,
    pub validator_contract: Address,
    pub sealing_key: B256,
    pub issuer_signature: Bytes,
    pub recipient_signature: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_utype_ids() {
        assert_eq!(FheType::Bool.id(), 0);
        assert_eq!(FheType::Uint32.id(), 4);
        assert_eq!(FheType::Uint256.id(), 8);
        assert_eq!(FheType::try_from(7).unwrap(), FheType::Uint160);
    }

    #[test]
    fn test_unknown_utype_rejected() {
        for id in [1u8, 9, 255] {
            let err = FheType::try_from(id).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidUtype);
        }
    }

    #[test]
    fn test_utype_serde_as_number() {
        let json = serde_json::to_string(&FheType::Uint64).unwrap();
        assert_eq!(json, "5");
        assert!(serde_json::from_str::<FheType>("1").is_err());
    }

    #[test]
    fn test_ranges() {
        assert!(FheType::Bool.fits(U256::from(1)));
        assert!(!FheType::Bool.fits(U256::from(2)));
        assert!(FheType::Uint8.fits(U256::from(255)));
        assert!(!FheType::Uint8.fits(U256::from(256)));
        assert!(FheType::Uint256.fits(U256::MAX));
        assert_eq!(FheType::Uint160.max_value(), (U256::from(1) << 160) - U256::from(1));
    }

    #[test]
    fn test_names_roundtrip() {
        for t in FheType::ALL {
            assert_eq!(FheType::from_name(t.name()), Some(t));
        }
        assert_eq!(FheType::from_name("uint160"), Some(FheType::Uint160));
        assert_eq!(FheType::from_name("uint7"), None);
    }

    #[test]
    fn test_address_item_fits_160_bits() {
        let item = EncryptableItem::address(address!("ffffffffffffffffffffffffffffffffffffffff"));
        assert_eq!(item.value, FheType::Uint160.max_value());
    }

    #[test]
    fn test_plaintext_conversion() {
        assert_eq!(
            UnsealedValue::from_plaintext(FheType::Bool, U256::from(3)),
            UnsealedValue::Bool(true)
        );
        assert_eq!(
            UnsealedValue::from_plaintext(FheType::Uint32, U256::from(7)),
            UnsealedValue::Uint(U256::from(7))
        );

        let addr = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
        let raw = U256::from_be_slice(addr.as_slice());
        let value = UnsealedValue::from_plaintext(FheType::Uint160, raw);
        assert_eq!(value, UnsealedValue::Address(addr));
        assert_eq!(value.to_string(), "0x5FbDB2315678afecb367f032d93F642f64180aa3");
    }
}
