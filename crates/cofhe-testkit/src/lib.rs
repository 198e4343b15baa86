//! # CoFHE Testkit
//!
//! Testing utilities for the CoFHE client.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known canonical permit encodings for cross-implementation checks
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: An in-process chain and ready-to-use clients
//!
//! ## Golden Vectors
//!
//! ```rust
//! use cofhe_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, hex) in verify_all_vectors() {
//!     assert!(matches, "{name}: {hex}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use cofhe_permits::permit_hash;
//! use cofhe_testkit::generators::PermitParams;
//!
//! proptest! {
//!     #[test]
//!     fn permit_hash_is_deterministic(params: PermitParams) {
//!         prop_assert_eq!(permit_hash(&params.canonical()), permit_hash(&params.canonical()));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use cofhe_testkit::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let permit = fixture.client.create_self_permit().await?;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    mock_config, MockChain, TestClient, TestFixture, MOCK_ACL, MOCK_CHAIN_ID,
    MOCK_QUERY_DECRYPTER,
};
pub use generators::PermitParams;
pub use vectors::{all_vectors, canonical_from_vector, verify_all_vectors, GoldenVector};
