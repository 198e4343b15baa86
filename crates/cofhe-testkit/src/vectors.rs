//! Golden test vectors for the canonical permit encoding.
//!
//! Any implementation that stores permits under the same keys must produce
//! these exact bytes.

use alloy::primitives::{Address, U256};
use cofhe_permits::canonical::HASH_CONTEXT;
use cofhe_permits::{canonical_bytes, permit_hash, CanonicalPermit, PermitType};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub permit_type: PermitType,
    /// Byte repeated 20 times to form the issuer address.
    pub issuer: u8,
    pub expiration: u64,
    pub recipient: u8,
    pub validator_id: u64,
    pub validator_contract: u8,
    /// Expected canonical CBOR (hex).
    pub expected_canonical: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "self permit, zero validator",
            permit_type: PermitType::SelfIssued,
            issuer: 0x11,
            expiration: 1_700_000_000,
            recipient: 0x11,
            validator_id: 0,
            validator_contract: 0x00,
            expected_canonical: "a6006473656c6601541111111111111111111111111111111111111111021a6553f10003541111111111111111111111111111111111111111045820000000000000000000000000000000000000000000000000000000000000000005540000000000000000000000000000000000000000",
        },
        GoldenVector {
            name: "sharing permit with validator",
            permit_type: PermitType::Sharing,
            issuer: 0x11,
            expiration: 1_800_000_000,
            recipient: 0x22,
            validator_id: 7,
            validator_contract: 0x33,
            expected_canonical: "a6006773686172696e6701541111111111111111111111111111111111111111021a6b49d20003542222222222222222222222222222222222222222045820000000000000000000000000000000000000000000000000000000000000000705543333333333333333333333333333333333333333",
        },
        GoldenVector {
            name: "import permit, small expiration",
            permit_type: PermitType::Import,
            issuer: 0x11,
            expiration: 23,
            recipient: 0x22,
            validator_id: u64::MAX,
            validator_contract: 0x33,
            expected_canonical: "a60066696d706f727401541111111111111111111111111111111111111111021703542222222222222222222222222222222222222222045820000000000000000000000000000000000000000000000000ffffffffffffffff05543333333333333333333333333333333333333333",
        },
    ]
}

/// Build the canonical permit described by a vector.
pub fn canonical_from_vector(vector: &GoldenVector) -> CanonicalPermit<'static> {
    CanonicalPermit {
        permit_type: vector.permit_type.as_str(),
        issuer: Address::repeat_byte(vector.issuer),
        expiration: vector.expiration,
        recipient: Address::repeat_byte(vector.recipient),
        validator_id: U256::from(vector.validator_id),
        validator_contract: Address::repeat_byte(vector.validator_contract),
    }
}

/// Check every vector's canonical bytes.
///
/// Returns `(name, matches, actual_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hex = hex::encode(canonical_bytes(&canonical_from_vector(v)));
            let matches = hex == v.expected_canonical;
            (v.name.to_string(), matches, hex)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vectors_match() {
        for (name, matches, hex) in verify_all_vectors() {
            assert!(matches, "vector '{name}' encoded as {hex}");
        }
    }

    #[test]
    fn test_hash_is_keyed_blake3_of_canonical_bytes() {
        for vector in all_vectors() {
            let canonical = canonical_from_vector(&vector);
            let bytes = hex::decode(vector.expected_canonical).unwrap();

            let mut hasher = blake3::Hasher::new_derive_key(HASH_CONTEXT);
            hasher.update(&bytes);
            let expected = *hasher.finalize().as_bytes();

            assert_eq!(
                permit_hash(&canonical).as_bytes(),
                &expected,
                "vector '{}' hashed differently",
                vector.name
            );
        }
    }

    #[test]
    fn test_vectors_hash_distinctly() {
        let hashes: Vec<_> = all_vectors()
            .iter()
            .map(|v| permit_hash(&canonical_from_vector(v)))
            .collect();
        assert_ne!(hashes[0], hashes[1]);
        assert_ne!(hashes[1], hashes[2]);
        assert_ne!(hashes[0], hashes[2]);
    }
}
