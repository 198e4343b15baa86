//! # CoFHE Core
//!
//! Pure primitives shared by every CoFHE crate: the uniform result envelope,
//! FHE value types, and the encryptable tree codec.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`CofheError`] / [`CofheResult`] - Structured failure with a stable [`ErrorCode`]
//! - [`FheType`] - Plaintext type ("utype") of an encrypted value
//! - [`EncryptableItem`] / [`EncryptedInput`] - Before and after the encrypt pipeline
//! - [`Tree`] - Nested inputs with encryptable leaves
//! - [`Permission`] - Wire form of a permit presented to a decryption backend
//! - [`SealedValue`] - Backend output awaiting unsealing

pub mod encryptable;
pub mod error;
pub mod types;

pub use encryptable::{extract, replace, replace_all, Tree, ENCRYPTABLE_KEY};
pub use error::{BoxError, CofheError, CofheResult, ErrorCode, ErrorReport, ResultExt};
pub use types::{
    EncryptableItem, EncryptedInput, FheType, Permission, SealedEnvelope, SealedValue, UnsealedValue,
};
