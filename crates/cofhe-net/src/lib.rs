//! # CoFHE Net
//!
//! Clients for the services the CoFHE client depends on but does not own.
//!
//! ## Key Types
//!
//! - [`ChainReader`] / [`RpcChainReader`] - Read-only `eth_call` access
//! - [`ThresholdNetwork`] / [`HttpThresholdNetwork`] - Seal-output requests
//! - [`InputVerifier`] / [`HttpInputVerifier`] - Input proving and verification
//!
//! Every collaborator sits behind an async trait so tests can substitute an
//! in-process fake. None of the calls retry.

pub mod abi;
pub mod chain;
pub mod error;
pub mod http;
pub mod threshold;
pub mod verifier;

pub use abi::SealOutputQuery;
pub use chain::{query_seal_output, ChainReader, RpcChainReader};
pub use error::{NetError, Result};
pub use threshold::{HttpThresholdNetwork, SealOutputRequest, SealOutputResponse, ThresholdNetwork};
pub use verifier::{HttpInputVerifier, InputVerifier, VerifiedCiphertext, VerifyRequest, VerifyResponse};
