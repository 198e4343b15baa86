//! Threshold network client.
//!
//! The network decrypts a ciphertext handle and reseals the plaintext to the
//! permit's sealing key. The client only sees the sealed envelope.

use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use cofhe_core::{Permission, SealedEnvelope};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http;

/// Body of `POST /sealoutput`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealOutputRequest {
    /// Ciphertext handle as 64 lowercase hex chars, no prefix.
    pub ct_tempkey: String,
    pub host_chain_id: u64,
    pub permit: Permission,
}

impl SealOutputRequest {
    pub fn new(ct_hash: U256, host_chain_id: u64, permit: Permission) -> Self {
        Self {
            ct_tempkey: hex::encode(ct_hash.to_be_bytes::<32>()),
            host_chain_id,
            permit,
        }
    }
}

/// Reply of `POST /sealoutput`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealOutputResponse {
    #[serde(default)]
    pub sealed: Option<SealedEnvelope>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Remote sealing service.
#[async_trait]
pub trait ThresholdNetwork: Send + Sync {
    async fn seal_output(&self, request: &SealOutputRequest) -> Result<SealOutputResponse>;
}

#[async_trait]
impl<T: ThresholdNetwork + ?Sized> ThresholdNetwork for std::sync::Arc<T> {
    async fn seal_output(&self, request: &SealOutputRequest) -> Result<SealOutputResponse> {
        (**self).seal_output(request).await
    }
}

/// [`ThresholdNetwork`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpThresholdNetwork {
    client: reqwest::Client,
    base_url: String,
}

impl HttpThresholdNetwork {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ThresholdNetwork for HttpThresholdNetwork {
    async fn seal_output(&self, request: &SealOutputRequest) -> Result<SealOutputResponse> {
        let url = http::endpoint(&self.base_url, "sealoutput");
        tracing::debug!(%url, host_chain_id = request.host_chain_id, "requesting seal output");
        http::post_json(&self.client, &url, request).await
    }
}
