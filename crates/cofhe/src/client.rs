//! The CoFHE client: one connected account on one chain.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use cofhe_core::{
    CofheResult, EncryptableItem, EncryptedInput, ErrorCode, FheType, ResultExt, Tree,
    UnsealedValue,
};
use cofhe_net::{
    ChainReader, HttpInputVerifier, HttpThresholdNetwork, InputVerifier, RpcChainReader,
    ThresholdNetwork,
};
use cofhe_permits::{Permit, PermitManager, PermitSigner, SelfPermitOptions};
use cofhe_store::KeyValueStore;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{require_url, CofheConfig, Environment};
use crate::decrypt::{self, select_backend, DecryptBackend};
use crate::encrypt::{InputEncryptor, OnStep};

/// The client.
///
/// Owns the permit manager for the connected signer, the input encryptor
/// and the decryption backend selected by configuration.
pub struct CofheClient<S, G> {
    config: CofheConfig,
    permits: PermitManager<S, G>,
    encryptor: InputEncryptor<Arc<dyn InputVerifier>>,
    backend: Arc<dyn DecryptBackend>,
}

impl<S: KeyValueStore, G: PermitSigner> CofheClient<S, G> {
    /// Build a client from explicit collaborators.
    pub fn new(
        config: CofheConfig,
        store: S,
        signer: G,
        verifier: Arc<dyn InputVerifier>,
        backend: Arc<dyn DecryptBackend>,
    ) -> CofheResult<Self> {
        config.validate()?;

        let permits = PermitManager::new(store, signer, config.chain_id, config.acl_address)
            .with_default_expiration(config.permit_expiration_secs);
        let encryptor = InputEncryptor::new(verifier, config.chain_id)
            .with_default_security_zone(config.default_security_zone);

        tracing::debug!(
            chain_id = config.chain_id,
            environment = ?config.environment,
            account = %permits.signer_address(),
            "cofhe client ready"
        );
        Ok(Self {
            config,
            permits,
            encryptor,
            backend,
        })
    }

    /// Build a client whose collaborators all come from `config`'s URLs.
    pub fn connect(config: CofheConfig, store: S, signer: G) -> CofheResult<Self> {
        config.validate()?;
        let timeout = config.request_timeout();

        let verifier_url = require_url("zkVerifierUrl", config.zk_verifier_url.as_deref())?;
        let verifier: Arc<dyn InputVerifier> = Arc::new(
            HttpInputVerifier::new(verifier_url, timeout)
                .with_code(ErrorCode::InvalidConfig, "failed to build verifier client")?,
        );

        let (chain, network): (Option<Arc<dyn ChainReader>>, Option<Arc<dyn ThresholdNetwork>>) =
            match config.environment {
                Environment::Mock => {
                    let url = require_url("rpcUrl", config.rpc_url.as_deref())?;
                    let reader: Arc<dyn ChainReader> = Arc::new(
                        RpcChainReader::connect(url)
                            .with_code(ErrorCode::InvalidConfig, "failed to build chain reader")?,
                    );
                    (Some(reader), None)
                }
                Environment::Network => {
                    let url = require_url(
                        "thresholdNetworkUrl",
                        config.threshold_network_url.as_deref(),
                    )?;
                    let network: Arc<dyn ThresholdNetwork> = Arc::new(
                        HttpThresholdNetwork::new(url, timeout).with_code(
                            ErrorCode::InvalidConfig,
                            "failed to build threshold network client",
                        )?,
                    );
                    (None, Some(network))
                }
            };

        let backend = select_backend(&config, chain, network)?;
        Self::new(config, store, signer, verifier, backend)
    }

    pub fn config(&self) -> &CofheConfig {
        &self.config
    }

    /// The connected account.
    pub fn account(&self) -> Address {
        self.permits.signer_address()
    }

    pub fn permits(&self) -> &PermitManager<S, G> {
        &self.permits
    }

    /// Create and activate a self permit for the connected account.
    pub async fn create_self_permit(&self) -> CofheResult<Permit> {
        self.permits
            .create_self(SelfPermitOptions {
                validator_id: Some(self.config.default_validator_id),
                ..SelfPermitOptions::new(self.account())
            })
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Encryption
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt every leaf of `tree` for the connected account.
    pub async fn encrypt(
        &self,
        tree: Tree<EncryptableItem>,
        cancel: &CancellationToken,
        on_step: Option<OnStep<'_>>,
    ) -> CofheResult<Tree<EncryptedInput>> {
        self.encryptor
            .encrypt(tree, self.account(), None, cancel, on_step)
            .await
    }

    /// Encrypt in an explicit security zone.
    pub async fn encrypt_in_zone(
        &self,
        tree: Tree<EncryptableItem>,
        security_zone: u8,
        cancel: &CancellationToken,
        on_step: Option<OnStep<'_>>,
    ) -> CofheResult<Tree<EncryptedInput>> {
        self.encryptor
            .encrypt(tree, self.account(), Some(security_zone), cancel, on_step)
            .await
    }

    /// Encrypt a JSON document whose leaves are tagged with `__encryptable`.
    pub async fn encrypt_json(&self, input: &Value, cancel: &CancellationToken) -> CofheResult<Value> {
        let tree = Tree::from_json(input)?;
        self.encrypt(tree, cancel, None).await?.to_json()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decryption
    // ─────────────────────────────────────────────────────────────────────────

    /// Decrypt `handle` with an explicit permit.
    pub async fn unseal(
        &self,
        handle: U256,
        utype: FheType,
        permit: &Permit,
        cancel: &CancellationToken,
    ) -> CofheResult<UnsealedValue> {
        decrypt::unseal(self.backend.as_ref(), handle, utype, permit, cancel).await
    }

    /// Decrypt `handle` with the active permit of the connected account for
    /// the default validator.
    pub async fn decrypt_with_active(
        &self,
        handle: U256,
        utype: FheType,
        cancel: &CancellationToken,
    ) -> CofheResult<UnsealedValue> {
        let permit = self
            .permits
            .get_active(self.account(), self.config.default_validator_id)
            .await?;
        self.unseal(handle, utype, &permit, cancel).await
    }
}
