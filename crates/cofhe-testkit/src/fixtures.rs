//! Test fixtures and an in-process chain.
//!
//! [`MockChain`] stands in for every remote collaborator at once: it is the
//! mock query-decrypter contract (via [`ChainReader`]), the threshold
//! network and the input verifier. Plaintexts live in memory keyed by
//! handle, and reads are gated by an ACL of (handle, account) pairs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::{address, Address, Bytes, U256};
use async_trait::async_trait;
use cofhe::{select_backend, CofheClient, CofheConfig, Environment, PackedInputList};
use cofhe_core::FheType;
use cofhe_net::abi::{decode_query_seal_output, encode_seal_output_returns};
use cofhe_net::{
    ChainReader, InputVerifier, NetError, SealOutputQuery, SealOutputRequest, SealOutputResponse,
    ThresholdNetwork, VerifiedCiphertext, VerifyRequest, VerifyResponse,
};
use cofhe_permits::{seal, seal_mock, LocalSigner};
use cofhe_store::MemoryStore;

/// Chain id used by fixtures.
pub const MOCK_CHAIN_ID: u64 = 31337;
/// ACL address used by fixtures.
pub const MOCK_ACL: Address = address!("a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0");
/// Query-decrypter address used by fixtures.
pub const MOCK_QUERY_DECRYPTER: Address = address!("0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d");

#[derive(Default)]
struct ChainState {
    plaintexts: HashMap<U256, (FheType, U256)>,
    acl: HashSet<(U256, Address)>,
    nonce: u64,
    backend_error: Option<String>,
    input_rejection: Option<String>,
    drop_last_handle: bool,
    offline: bool,
    queries: usize,
}

/// In-memory chain, threshold network and input verifier.
pub struct MockChain {
    chain_id: u64,
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(ChainState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a plaintext and return its handle. No account is allowed yet.
    pub fn store_plaintext(&self, utype: FheType, value: U256) -> U256 {
        let mut state = self.state();
        store_locked(&mut state, self.chain_id, utype, value)
    }

    /// Let `account` read `handle`.
    pub fn allow(&self, handle: U256, account: Address) {
        self.state().acl.insert((handle, account));
    }

    pub fn revoke(&self, handle: U256, account: Address) {
        self.state().acl.remove(&(handle, account));
    }

    pub fn plaintext(&self, handle: U256) -> Option<(FheType, U256)> {
        self.state().plaintexts.get(&handle).copied()
    }

    /// Make `querySealOutput` report a contract error.
    pub fn fail_queries_with(&self, reason: impl Into<String>) {
        self.state().backend_error = Some(reason.into());
    }

    /// Make the input verifier reject every batch.
    pub fn reject_inputs(&self, reason: impl Into<String>) {
        self.state().input_rejection = Some(reason.into());
    }

    /// Make the input verifier return one handle too few.
    pub fn drop_last_handle(&self) {
        self.state().drop_last_handle = true;
    }

    /// Fail every call at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Number of decryption queries received over any interface.
    pub fn query_count(&self) -> usize {
        self.state().queries
    }

    fn check_online(&self) -> cofhe_net::Result<()> {
        if self.state().offline {
            Err(NetError::Rpc("mock chain is offline".to_string()))
        } else {
            Ok(())
        }
    }

    /// The plaintext `account` may read, or `None` if the ACL forbids it.
    fn readable(&self, handle: U256, account: Address) -> Option<U256> {
        let mut state = self.state();
        state.queries += 1;
        if !state.acl.contains(&(handle, account)) {
            return None;
        }
        state.plaintexts.get(&handle).map(|(_, value)| *value)
    }
}

fn store_locked(state: &mut ChainState, chain_id: u64, utype: FheType, value: U256) -> U256 {
    state.nonce += 1;
    let mut hasher = blake3::Hasher::new_derive_key("cofhe-testkit mock ciphertext handle");
    hasher.update(&chain_id.to_be_bytes());
    hasher.update(&state.nonce.to_be_bytes());
    hasher.update(&[utype.id()]);
    hasher.update(&value.to_be_bytes::<32>());
    let handle = U256::from_be_bytes(*hasher.finalize().as_bytes());
    state.plaintexts.insert(handle, (utype, value));
    handle
}

#[async_trait]
impl ChainReader for MockChain {
    async fn call(&self, to: Address, calldata: Bytes) -> cofhe_net::Result<Bytes> {
        self.check_online()?;
        if to != MOCK_QUERY_DECRYPTER {
            return Err(NetError::Rpc(format!("no contract at {to}")));
        }
        let (handle, _utype, permission) = decode_query_seal_output(&calldata)?;

        if let Some(error) = self.state().backend_error.clone() {
            return Ok(encode_seal_output_returns(&SealOutputQuery {
                allowed: false,
                error,
                result: U256::ZERO,
            }));
        }

        let query = match self.readable(handle, permission.issuer) {
            Some(value) => SealOutputQuery {
                allowed: true,
                error: String::new(),
                result: seal_mock(value, &permission.sealing_key),
            },
            None => SealOutputQuery {
                allowed: false,
                error: String::new(),
                result: U256::ZERO,
            },
        };
        Ok(encode_seal_output_returns(&query))
    }
}

#[async_trait]
impl ThresholdNetwork for MockChain {
    async fn seal_output(
        &self,
        request: &SealOutputRequest,
    ) -> cofhe_net::Result<SealOutputResponse> {
        self.check_online()?;
        let handle = U256::from_str_radix(&request.ct_tempkey, 16)
            .map_err(|e| NetError::Decode(format!("ct_tempkey: {e}")))?;

        match self.readable(handle, request.permit.issuer) {
            Some(value) => {
                let sealed = seal(value, &request.permit.sealing_key)
                    .map_err(|e| NetError::Decode(e.to_string()))?;
                Ok(SealOutputResponse {
                    sealed: Some(sealed),
                    error_message: None,
                })
            }
            None => Ok(SealOutputResponse {
                sealed: None,
                error_message: Some(cofhe::ACL_DENIED_MESSAGE.to_string()),
            }),
        }
    }
}

#[async_trait]
impl InputVerifier for MockChain {
    async fn verify(&self, request: &VerifyRequest) -> cofhe_net::Result<VerifyResponse> {
        self.check_online()?;
        let mut state = self.state();
        if let Some(reason) = state.input_rejection.clone() {
            return Ok(VerifyResponse::rejected(reason));
        }
        let packed = match PackedInputList::from_bytes(&request.packed_list) {
            Ok(packed) => packed,
            Err(e) => return Ok(VerifyResponse::rejected(e.to_string())),
        };

        let mut data = Vec::with_capacity(packed.len());
        for (utype, value) in packed.items() {
            let handle = store_locked(&mut state, request.chain_id, *utype, *value);
            state.acl.insert((handle, request.account_addr));
            let mut signature = blake3::Hasher::new_derive_key("cofhe-testkit mock input signature");
            signature.update(&handle.to_be_bytes::<32>());
            signature.update(&[request.security_zone]);
            data.push(VerifiedCiphertext {
                ct_hash: handle,
                signature: Bytes::from(signature.finalize().as_bytes().to_vec()),
            });
        }
        if state.drop_last_handle {
            data.pop();
        }
        Ok(VerifyResponse::success(data))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client fixture
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration pointing at the fixture addresses.
pub fn mock_config(environment: Environment) -> CofheConfig {
    CofheConfig::default()
        .with_environment(environment)
        .with_chain_id(MOCK_CHAIN_ID)
        .with_acl(MOCK_ACL)
        .with_query_decrypter(MOCK_QUERY_DECRYPTER)
}

/// The client type every fixture builds.
pub type TestClient = CofheClient<Arc<MemoryStore>, LocalSigner>;

/// A client wired to a [`MockChain`], with a fresh signer and memory store.
pub struct TestFixture {
    pub chain: Arc<MockChain>,
    pub store: Arc<MemoryStore>,
    pub signer: LocalSigner,
    pub client: TestClient,
}

impl TestFixture {
    /// Mock environment: decryption through `querySealOutput`.
    pub fn new() -> Self {
        Self::on_chain(
            Arc::new(MockChain::new(MOCK_CHAIN_ID)),
            mock_config(Environment::Mock),
        )
    }

    /// Network environment: decryption through the threshold network.
    pub fn network() -> Self {
        Self::on_chain(
            Arc::new(MockChain::new(MOCK_CHAIN_ID)),
            mock_config(Environment::Network),
        )
    }

    /// A fixture on an existing chain with a custom configuration.
    pub fn on_chain(chain: Arc<MockChain>, config: CofheConfig) -> Self {
        Self::with_signer(chain, config, LocalSigner::random())
    }

    pub fn with_signer(chain: Arc<MockChain>, config: CofheConfig, signer: LocalSigner) -> Self {
        let store = Arc::new(MemoryStore::new());
        let reader: Arc<dyn ChainReader> = chain.clone();
        let network: Arc<dyn ThresholdNetwork> = chain.clone();
        let verifier: Arc<dyn InputVerifier> = chain.clone();

        let backend =
            select_backend(&config, Some(reader), Some(network)).expect("fixture backend");
        let client = CofheClient::new(config, store.clone(), signer.clone(), verifier, backend)
            .expect("fixture client");

        Self {
            chain,
            store,
            signer,
            client,
        }
    }

    /// A second account on the same chain with its own store.
    pub fn peer(&self) -> Self {
        Self::on_chain(self.chain.clone(), self.client.config().clone())
    }

    pub fn account(&self) -> Address {
        self.client.account()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
