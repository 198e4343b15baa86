//! Canonical permit encoding and the permit hash.
//!
//! The hash identifies a permit in storage. It covers only the fields that
//! define what the permit grants, so signatures and the sealing pair can be
//! attached later without changing its identity.
//!
//! Encoding follows RFC 8949 Core Deterministic Encoding:
//! - Map keys are small integers, sorted by encoded bytes
//! - Integers use the smallest valid encoding
//! - Definite lengths only
//!
//! The bytes are hashed with BLAKE3 in derive-key mode under the context
//! string [`HASH_CONTEXT`].

use std::fmt;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// BLAKE3 derive-key context for permit hashes.
pub const HASH_CONTEXT: &str = "cofhe-permit-v1";

/// Field keys of the canonical map.
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const TYPE: u64 = 0;
    pub const ISSUER: u64 = 1;
    pub const EXPIRATION: u64 = 2;
    pub const RECIPIENT: u64 = 3;
    pub const VALIDATOR_ID: u64 = 4;
    pub const VALIDATOR_CONTRACT: u64 = 5;
}

/// A 32-byte permit identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermitHash(pub [u8; 32]);

impl PermitHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, no prefix. Used in storage keys.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for PermitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermitHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PermitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PermitHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PermitHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The fields a permit hash covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalPermit<'a> {
    pub permit_type: &'a str,
    pub issuer: Address,
    pub expiration: u64,
    pub recipient: Address,
    pub validator_id: U256,
    pub validator_contract: Address,
}

enum Field<'a> {
    Uint(u64),
    Bytes(&'a [u8]),
    Text(&'a str),
}

/// Encode the canonical fields to deterministic CBOR.
pub fn canonical_bytes(permit: &CanonicalPermit<'_>) -> Vec<u8> {
    let validator_id = permit.validator_id.to_be_bytes::<32>();
    let entries = [
        (keys::TYPE, Field::Text(permit.permit_type)),
        (keys::ISSUER, Field::Bytes(permit.issuer.as_slice())),
        (keys::EXPIRATION, Field::Uint(permit.expiration)),
        (keys::RECIPIENT, Field::Bytes(permit.recipient.as_slice())),
        (keys::VALIDATOR_ID, Field::Bytes(&validator_id)),
        (
            keys::VALIDATOR_CONTRACT,
            Field::Bytes(permit.validator_contract.as_slice()),
        ),
    ];

    let mut buf = Vec::with_capacity(128);
    encode_map_canonical(&mut buf, &entries);
    buf
}

/// Hash the canonical fields.
pub fn permit_hash(permit: &CanonicalPermit<'_>) -> PermitHash {
    let mut hasher = blake3::Hasher::new_derive_key(HASH_CONTEXT);
    hasher.update(&canonical_bytes(permit));
    PermitHash(*hasher.finalize().as_bytes())
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(u64, Field<'_>)]) {
    let mut pairs: Vec<(Vec<u8>, &Field<'_>)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_uint(&mut key_buf, 0, *k);
            (key_buf, v)
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        match value {
            Field::Uint(n) => encode_uint(buf, 0, *n),
            Field::Bytes(b) => {
                encode_uint(buf, 2, b.len() as u64);
                buf.extend_from_slice(b);
            }
            Field::Text(s) => {
                encode_uint(buf, 3, s.len() as u64);
                buf.extend_from_slice(s.as_bytes());
            }
        }
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
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}
