//! Read-only contract access.
//!
//! The client never sends transactions. It only needs `eth_call`, so the
//! chain is abstracted as a single read method over raw calldata.

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;

use crate::abi::{self, SealOutputQuery};
use crate::error::{NetError, Result};

/// Executes read-only contract calls.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against `to` with `calldata`, returning the raw return data.
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes>;
}

#[async_trait]
impl<T: ChainReader + ?Sized> ChainReader for std::sync::Arc<T> {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        (**self).call(to, calldata).await
    }
}

/// [`ChainReader`] over an alloy HTTP provider.
#[derive(Clone)]
pub struct RpcChainReader {
    provider: DynProvider,
}

impl RpcChainReader {
    /// Connect to a JSON-RPC endpoint.
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let url = rpc_url.parse::<reqwest::Url>().map_err(|e| NetError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: e.to_string(),
        })?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider })
    }

    /// Wrap an existing provider.
    pub fn from_provider(provider: DynProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().to(to).input(calldata.into());
        tracing::trace!(%to, "eth_call");
        self.provider
            .call(tx)
            .await
            .map_err(|e| NetError::Rpc(e.to_string()))
    }
}

/// Call `querySealOutput` on the mock query decrypter at `contract`.
pub async fn query_seal_output<C>(
    chain: &C,
    contract: Address,
    ct_hash: U256,
    utype: u8,
    permission: &cofhe_core::Permission,
) -> Result<SealOutputQuery>
where
    C: ChainReader + ?Sized,
{
    let calldata = abi::encode_query_seal_output(ct_hash, utype, permission);
    let data = chain.call(contract, calldata).await?;
    abi::decode_seal_output_returns(&data)
}
