//! Error types for the permits module.

use cofhe_core::{CofheError, ErrorCode};
use thiserror::Error;

/// Errors from sealing-key handling and the seal/unseal transforms.
#[derive(Debug, Error)]
pub enum SealingError {
    /// Key material was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Key material had the wrong length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Stored public key does not belong to the stored private key.
    #[error("public key does not match private key")]
    KeyMismatch,

    /// Authenticated encryption failed.
    #[error("aead failure: {0}")]
    Aead(String),

    /// Decrypted plaintext does not fit in 256 bits.
    #[error("plaintext too long: {0} bytes")]
    PlaintextTooLong(usize),
}

impl From<SealingError> for CofheError {
    fn from(err: SealingError) -> Self {
        let code = match err {
            SealingError::InvalidHex(_)
            | SealingError::InvalidKeyLength { .. }
            | SealingError::KeyMismatch => ErrorCode::InvalidSealingKey,
            SealingError::Aead(_) | SealingError::PlaintextTooLong(_) => ErrorCode::UnsealFailed,
        };
        CofheError::new(code, err.to_string()).with_cause(err)
    }
}

/// Errors from the external typed-data signer.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The signer refused to sign.
    #[error("signature rejected: {0}")]
    Rejected(String),

    /// The signer failed for another reason.
    #[error("signer failure: {0}")]
    Failed(String),

    /// Private key material could not be parsed.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// Result type for sealing operations.
pub type Result<T> = std::result::Result<T, SealingError>;

impl From<SignerError> for CofheError {
    fn from(err: SignerError) -> Self {
        CofheError::new(ErrorCode::SignatureRejected, err.to_string())
            .with_hint("the wallet must sign the permit before it can be used")
            .with_cause(err)
    }
}
