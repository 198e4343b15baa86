//! # CoFHE Permits
//!
//! Permits prove a holder's right to read decrypted values. Each permit owns
//! a sealing key pair so that decrypted plaintexts travel sealed to the holder.
//!
//! ## Key Types
//!
//! - [`Permit`] - The permit model, with derived [`PermitState`]
//! - [`PermitManager`] - Create, share, import, store and select permits
//! - [`SealingKeyPair`] - X25519 pair for sealing and unsealing
//! - [`PermitTypedData`] - EIP-712 messages signed by issuers and recipients
//! - [`PermitSigner`] - The wallet seam
//!
//! ## Identity
//!
//! A permit's [`PermitHash`] is BLAKE3 over a canonical CBOR encoding of the
//! fields it authorizes. Names, signatures and keys are not part of it, so a
//! permit keeps its identity while signatures are attached.

pub mod canonical;
pub mod eip712;
pub mod error;
pub mod manager;
pub mod permit;
pub mod sealing;
pub mod signer;
pub mod store;
pub mod validation;

pub use canonical::{canonical_bytes, permit_hash, CanonicalPermit, PermitHash};
pub use eip712::{PermitMessage, PermitTypedData, SignedDomain};
pub use error::{SealingError, SignerError};
pub use manager::{
    PermitManager, SelfPermitOptions, SharingPermitOptions, DEFAULT_EXPIRATION_SECS,
};
pub use permit::{unix_now, Permit, PermitFields, PermitState, PermitType};
pub use sealing::{seal, seal_mock, SealingKeyPair};
pub use signer::{LocalSigner, PermitSigner};
pub use store::PermitStore;
pub use validation::{validate, ValidationIssue, ValidationResult};
