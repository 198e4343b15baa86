//! Sealing keys: per-permit X25519 key pairs.
//!
//! A decryption backend never returns a plaintext in the clear. It seals the
//! value to the permit's sealing public key and only the holder of the
//! private half can open it.
//!
//! Two transforms exist:
//!
//! - **Envelope** (production): ephemeral X25519 ECDH against the sealing
//!   key, BLAKE3 key derivation, ChaCha20-Poly1305 with a random nonce.
//! - **Mock** (tests and local chains only): `value XOR U256(public key)`.
//!   This hides nothing. It exists so a mock backend can return something
//!   that still has to go through the unseal step.

use std::fmt;

use alloy::primitives::{Bytes, FixedBytes, B256, U256};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use cofhe_core::{SealedEnvelope, SealedValue};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{Result, SealingError};

const KDF_CONTEXT: &str = "cofhe-sealing-v1 chacha20poly1305 key";

/// A sealing key pair. Fresh for every permit.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "SealingKeyPairRepr", into = "SealingKeyPairRepr")]
pub struct SealingKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl SealingKeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_private_bytes(bytes)
    }

    /// Rebuild from the private half.
    pub fn from_private_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuild from a hex private key, with or without `0x`.
    pub fn from_private_hex(s: &str) -> Result<Self> {
        Ok(Self::from_private_bytes(decode_hex32(s)?))
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// `0x` followed by 64 lowercase hex chars.
    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.public.as_bytes()))
    }

    /// The public key read as a big-endian integer.
    pub fn public_key_u256(&self) -> U256 {
        U256::from_be_bytes(self.public_key_bytes())
    }

    /// The public key as the `bytes32 sealingKey` of a permit.
    pub fn to_bytes32(&self) -> B256 {
        B256::from(self.public_key_bytes())
    }

    /// Hex private key for persistence. Never log this.
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.secret.to_bytes()))
    }

    /// Open an envelope sealed to this key pair.
    pub fn unseal(&self, envelope: &SealedEnvelope) -> Result<U256> {
        let ephemeral = PublicKey::from(envelope.public_key.0);
        let shared = self.secret.diffie_hellman(&ephemeral);
        let key = derive_key(shared.as_bytes(), &envelope.public_key.0, self.public.as_bytes());

        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| SealingError::Aead(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(envelope.nonce.as_slice()), envelope.data.as_ref())
            .map_err(|e| SealingError::Aead(e.to_string()))?;

        if plaintext.len() > 32 {
            return Err(SealingError::PlaintextTooLong(plaintext.len()));
        }
        Ok(U256::from_be_slice(&plaintext))
    }

    /// Reverse [`seal_mock`] using this pair's public key.
    pub fn unseal_mock(&self, sealed: U256) -> U256 {
        sealed ^ self.public_key_u256()
    }

    /// Unseal whatever a backend returned.
    pub fn unseal_value(&self, value: &SealedValue) -> Result<U256> {
        match value {
            SealedValue::Mock(sealed) => Ok(self.unseal_mock(*sealed)),
            SealedValue::Envelope(envelope) => self.unseal(envelope),
        }
    }
}

impl PartialEq for SealingKeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public && self.secret.to_bytes() == other.secret.to_bytes()
    }
}

impl Eq for SealingKeyPair {}

impl fmt::Debug for SealingKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealingKeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Persisted form: hex private and public halves.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SealingKeyPairRepr {
    private_key: String,
    public_key: String,
}

impl TryFrom<SealingKeyPairRepr> for SealingKeyPair {
    type Error = SealingError;

    fn try_from(repr: SealingKeyPairRepr) -> Result<Self> {
        let pair = Self::from_private_hex(&repr.private_key)?;
        if decode_hex32(&repr.public_key)? != pair.public_key_bytes() {
            return Err(SealingError::KeyMismatch);
        }
        Ok(pair)
    }
}

impl From<SealingKeyPair> for SealingKeyPairRepr {
    fn from(pair: SealingKeyPair) -> Self {
        Self {
            private_key: pair.private_key_hex(),
            public_key: pair.public_key_hex(),
        }
    }
}

/// Seal `plaintext` to `recipient`, a sealing public key.
pub fn seal(plaintext: U256, recipient: &B256) -> Result<SealedEnvelope> {
    seal_bytes(&plaintext.to_be_bytes::<32>(), recipient)
}

fn seal_bytes(plaintext: &[u8], recipient: &B256) -> Result<SealedEnvelope> {
    let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&PublicKey::from(recipient.0));
    let key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes(), &recipient.0);

    let mut nonce = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce);

    let cipher =
        ChaCha20Poly1305::new_from_slice(&key).map_err(|e| SealingError::Aead(e.to_string()))?;
    let data = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| SealingError::Aead(e.to_string()))?;

    Ok(SealedEnvelope {
        data: Bytes::from(data),
        public_key: B256::from(*ephemeral_public.as_bytes()),
        nonce: FixedBytes::from(nonce),
    })
}

/// Mock seal: `value XOR U256(key)`. Offers no confidentiality.
pub fn seal_mock(value: U256, key: &B256) -> U256 {
    value ^ U256::from_be_bytes(key.0)
}

fn derive_key(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral);
    hasher.update(recipient);
    *hasher.finalize().as_bytes()
}

fn decode_hex32(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| SealingError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        })
}
