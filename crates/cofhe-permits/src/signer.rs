//! The external signer the permit manager asks for signatures.
//!
//! Wallet transport is out of scope. A [`PermitSigner`] only needs to report
//! its address and sign EIP-712 typed data.

use alloy::primitives::{Address, Signature};
use alloy::signers::{local::PrivateKeySigner, Signer};
use async_trait::async_trait;

use crate::eip712::PermitTypedData;
use crate::error::SignerError;

/// Signs permit typed data on behalf of one account.
#[async_trait]
pub trait PermitSigner: Send + Sync {
    /// The account this signer signs for.
    fn address(&self) -> Address;

    /// Sign `data`. Wallet refusals surface as [`SignerError::Rejected`].
    async fn sign_typed_data(&self, data: &PermitTypedData) -> Result<Signature, SignerError>;
}

/// [`PermitSigner`] backed by an in-process secp256k1 key.
#[derive(Debug, Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    /// A signer with a freshly generated key.
    pub fn random() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }

    /// Parse a hex private key.
    pub fn from_hex(key: &str) -> Result<Self, SignerError> {
        let inner = key
            .parse::<PrivateKeySigner>()
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn from_signer(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl PermitSigner for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_typed_data(&self, data: &PermitTypedData) -> Result<Signature, SignerError> {
        self.inner
            .sign_hash(&data.signing_hash())
            .await
            .map_err(|e| SignerError::Failed(e.to_string()))
    }
}

#[async_trait]
impl<T: PermitSigner + ?Sized> PermitSigner for std::sync::Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_typed_data(&self, data: &PermitTypedData) -> Result<Signature, SignerError> {
        (**self).sign_typed_data(data).await
    }
}
