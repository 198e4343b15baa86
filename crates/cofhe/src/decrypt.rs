//! The decrypt/unseal pipeline.
//!
//! A ciphertext handle plus a usable permit goes to a [`DecryptBackend`],
//! which returns the plaintext sealed to the permit's sealing key. The
//! permit's sealing pair opens it and the raw integer is typed by its utype.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use cofhe_core::{
    CofheError, CofheResult, ErrorCode, FheType, Permission, SealedValue, UnsealedValue,
};
use cofhe_net::{
    query_seal_output, ChainReader, SealOutputQuery, SealOutputRequest, SealOutputResponse,
    ThresholdNetwork,
};
use cofhe_permits::{unix_now, validate, Permit};
use tokio_util::sync::CancellationToken;

use crate::cancel;
use crate::config::{CofheConfig, Environment};

/// Message of the error returned when the ACL refuses a permit.
pub const ACL_DENIED_MESSAGE: &str = "ACL Access Denied";

/// Produces a sealed plaintext for a handle.
#[async_trait]
pub trait DecryptBackend: Send + Sync {
    async fn seal_output(
        &self,
        handle: U256,
        utype: FheType,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> CofheResult<SealedValue>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock backend
// ─────────────────────────────────────────────────────────────────────────────

/// Decrypts through the mock query-decrypter contract of a local chain.
pub struct MockDecryptBackend<C> {
    chain: C,
    query_decrypter: Address,
    delay: Duration,
}

impl<C: ChainReader> MockDecryptBackend<C> {
    pub fn new(chain: C, query_decrypter: Address) -> Self {
        Self {
            chain,
            query_decrypter,
            delay: Duration::ZERO,
        }
    }

    /// Wait this long before each query.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl<C: ChainReader> DecryptBackend for MockDecryptBackend<C> {
    async fn seal_output(
        &self,
        handle: U256,
        utype: FheType,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> CofheResult<SealedValue> {
        cancel::sleep(cancel, "seal_output", self.delay).await?;

        let query = cancel::run(cancel, "seal_output", async {
            query_seal_output(
                &self.chain,
                self.query_decrypter,
                handle,
                utype.id(),
                permission,
            )
            .await
            .map_err(|e| {
                CofheError::new(ErrorCode::SealOutputFailed, "querySealOutput call failed")
                    .with_context("reason", "transport")
                    .with_cause(e)
            })
        })
        .await?;

        interpret_query(query)
    }
}

/// Map a `querySealOutput` answer to a sealed value.
///
/// A contract error and an ACL refusal are told apart by `context["reason"]`.
pub fn interpret_query(query: SealOutputQuery) -> CofheResult<SealedValue> {
    if !query.error.is_empty() {
        return Err(
            CofheError::new(ErrorCode::SealOutputFailed, query.error.clone())
                .with_context("reason", "backend_error")
                .with_context("backend_error", query.error),
        );
    }
    if !query.allowed {
        return Err(
            CofheError::new(ErrorCode::SealOutputFailed, ACL_DENIED_MESSAGE)
                .with_context("reason", "acl_denied")
                .with_hint("the permit issuer has not been granted access to this handle"),
        );
    }
    Ok(SealedValue::Mock(query.result))
}

// ─────────────────────────────────────────────────────────────────────────────
// Threshold network backend
// ─────────────────────────────────────────────────────────────────────────────

/// Decrypts through the threshold network.
pub struct ThresholdDecryptBackend<N> {
    network: N,
    host_chain_id: u64,
}

impl<N: ThresholdNetwork> ThresholdDecryptBackend<N> {
    pub fn new(network: N, host_chain_id: u64) -> Self {
        Self {
            network,
            host_chain_id,
        }
    }
}

#[async_trait]
impl<N: ThresholdNetwork> DecryptBackend for ThresholdDecryptBackend<N> {
    async fn seal_output(
        &self,
        handle: U256,
        _utype: FheType,
        permission: &Permission,
        cancel: &CancellationToken,
    ) -> CofheResult<SealedValue> {
        let request = SealOutputRequest::new(handle, self.host_chain_id, permission.clone());
        let response = cancel::run(cancel, "seal_output", async {
            self.network.seal_output(&request).await.map_err(|e| {
                CofheError::new(
                    ErrorCode::SealOutputFailed,
                    "threshold network request failed",
                )
                .with_context("reason", "transport")
                .with_cause(e)
            })
        })
        .await?;

        interpret_seal_output(response)
    }
}

/// Map a `/sealoutput` reply to a sealed value.
pub fn interpret_seal_output(response: SealOutputResponse) -> CofheResult<SealedValue> {
    match response.sealed {
        Some(envelope) => Ok(SealedValue::Envelope(envelope)),
        None => Err(CofheError::new(
            ErrorCode::SealOutputReturnedNull,
            "threshold network returned no sealed value",
        )
        .with_context("error_message", response.error_message)),
    }
}

/// The backend the configured environment calls for.
///
/// Collaborators are passed in so tests can substitute fakes; a missing one
/// is a configuration error.
pub fn select_backend(
    config: &CofheConfig,
    chain: Option<Arc<dyn ChainReader>>,
    network: Option<Arc<dyn ThresholdNetwork>>,
) -> CofheResult<Arc<dyn DecryptBackend>> {
    match config.environment {
        Environment::Mock => {
            let chain = chain.ok_or_else(|| {
                CofheError::new(ErrorCode::InvalidConfig, "mock environment needs a chain reader")
                    .with_hint("set rpcUrl")
            })?;
            Ok(Arc::new(
                MockDecryptBackend::new(chain, config.query_decrypter_address)
                    .with_delay(config.mock_decrypt_delay()),
            ))
        }
        Environment::Network => {
            let network = network.ok_or_else(|| {
                CofheError::new(
                    ErrorCode::InvalidConfig,
                    "network environment needs a threshold network client",
                )
                .with_hint("set thresholdNetworkUrl")
            })?;
            Ok(Arc::new(ThresholdDecryptBackend::new(network, config.chain_id)))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Decrypt `handle` with `permit` and type the plaintext as `utype`.
///
/// The permit is validated first and is never modified.
pub async fn unseal<B>(
    backend: &B,
    handle: U256,
    utype: FheType,
    permit: &Permit,
    cancel: &CancellationToken,
) -> CofheResult<UnsealedValue>
where
    B: DecryptBackend + ?Sized,
{
    validate(permit, unix_now()).into_result()?;
    let permission = permit.permission()?;
    let sealing = permit
        .sealing_pair
        .as_ref()
        .ok_or_else(|| CofheError::invalid_permit("permit has no sealing key"))?;

    tracing::debug!(%handle, utype = %utype, hash = %permit.hash, "requesting sealed output");
    let sealed = backend
        .seal_output(handle, utype, &permission, cancel)
        .await
        .inspect_err(|e| tracing::warn!(%handle, error = %e, "seal output failed"))?;

    let raw = sealing.unseal_value(&sealed)?;
    Ok(UnsealedValue::from_plaintext(utype, raw))
}
