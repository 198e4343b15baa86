//! # CoFHE
//!
//! Client for FHE-enabled chains: authorize decryption with permits, read
//! sealed plaintexts, and encrypt new confidential inputs.
//!
//! ## Overview
//!
//! - **Permits**: signed capabilities to read decrypted values, each with its
//!   own sealing key pair ([`cofhe_permits`])
//! - **Encryption**: trees of plaintext inputs become trees of verified
//!   ciphertext handles ([`encrypt`])
//! - **Decryption**: a handle plus the active permit yields a sealed value,
//!   unsealed locally ([`decrypt`])
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cofhe::{CofheClient, CofheConfig};
//! use cofhe::core::{EncryptableItem, FheType, Tree};
//! use cofhe::permits::LocalSigner;
//! use cofhe::store::SqliteStore;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example() -> cofhe::core::CofheResult<()> {
//!     let config = CofheConfig::from_json(&std::fs::read_to_string("cofhe.json").unwrap())?;
//!     let store = SqliteStore::open("permits.db").unwrap();
//!     let signer = LocalSigner::random();
//!     let client = CofheClient::connect(config, store, signer)?;
//!
//!     client.create_self_permit().await?;
//!
//!     let cancel = CancellationToken::new();
//!     let inputs = client
//!         .encrypt(Tree::Leaf(EncryptableItem::uint32(7)), &cancel, None)
//!         .await?;
//!     let handle = inputs.leaves()[0].ct_hash;
//!
//!     let value = client.decrypt_with_active(handle, FheType::Uint32, &cancel).await?;
//!     println!("{value}");
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod client;
pub mod config;
pub mod decrypt;
pub mod encrypt;

// Re-export component crates
pub use cofhe_core as core;
pub use cofhe_net as net;
pub use cofhe_permits as permits;
pub use cofhe_store as store;

pub use client::CofheClient;
pub use config::{CofheConfig, ConfigError, Environment};
pub use decrypt::{
    interpret_query, interpret_seal_output, select_backend, unseal, DecryptBackend,
    MockDecryptBackend, ThresholdDecryptBackend, ACL_DENIED_MESSAGE,
};
pub use encrypt::{check_ranges, EncryptStep, InputEncryptor, OnStep, PackedInputList};
