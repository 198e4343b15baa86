//! Input verifier client.
//!
//! The verifier checks the packed plaintext list, produces ciphertexts, and
//! returns one signed handle per item.

use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http;

/// Body of `POST /verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub packed_list: Bytes,
    pub account_addr: Address,
    pub security_zone: u8,
    pub chain_id: u64,
}

/// One verified ciphertext handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedCiphertext {
    pub ct_hash: U256,
    pub signature: Bytes,
}

/// Reply of `POST /verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: String,
    #[serde(default)]
    pub data: Vec<VerifiedCiphertext>,
    #[serde(default)]
    pub error: Option<String>,
}

impl VerifyResponse {
    pub const SUCCESS: &'static str = "success";

    /// A successful response carrying `data`.
    pub fn success(data: Vec<VerifiedCiphertext>) -> Self {
        Self {
            status: Self::SUCCESS.to_string(),
            data,
            error: None,
        }
    }

    /// A rejection with a reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: Vec::new(),
            error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS
    }
}

/// Proves and verifies packed plaintext inputs.
#[async_trait]
pub trait InputVerifier: Send + Sync {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse>;
}

#[async_trait]
impl<T: InputVerifier + ?Sized> InputVerifier for std::sync::Arc<T> {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        (**self).verify(request).await
    }
}

/// [`InputVerifier`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInputVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpInputVerifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl InputVerifier for HttpInputVerifier {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        let url = http::endpoint(&self.base_url, "verify");
        tracing::debug!(
            %url,
            bytes = request.packed_list.len(),
            zone = request.security_zone,
            "submitting inputs for verification"
        );
        http::post_json(&self.client, &url, request).await
    }
}
