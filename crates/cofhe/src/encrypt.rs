//! The input encryption pipeline.
//!
//! Leaves are pulled out of the input tree, range-checked, packed and handed
//! to the input verifier, which proves and verifies them and returns one
//! signed ciphertext handle per leaf. The handles are put back where the
//! leaves were. A batch either succeeds as a whole or fails as a whole.

use alloy::primitives::{Address, Bytes, U256};
use cofhe_core::{
    extract, replace_all, CofheError, CofheResult, EncryptableItem, EncryptedInput, ErrorCode,
    FheType, ResultExt, Tree,
};
use cofhe_net::{InputVerifier, VerifyRequest};
use tokio_util::sync::CancellationToken;

use crate::cancel;

/// Progress reported through the `on_step` callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptStep {
    Extract,
    Pack,
    Prove,
    Verify,
    Replace,
    Done,
}

/// Progress callback.
pub type OnStep<'a> = &'a (dyn Fn(EncryptStep) + Send + Sync);

// ─────────────────────────────────────────────────────────────────────────────
// Packing
// ─────────────────────────────────────────────────────────────────────────────

/// Plaintext items in the verifier's wire layout: `[utype:1][value:32 BE]` each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedInputList {
    items: Vec<(FheType, U256)>,
}

impl PackedInputList {
    pub const ITEM_LEN: usize = 33;

    pub fn from_items(items: &[EncryptableItem]) -> Self {
        Self {
            items: items.iter().map(|i| (i.utype, i.value)).collect(),
        }
    }

    pub fn items(&self) -> &[(FheType, U256)] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.items.len() * Self::ITEM_LEN);
        for (utype, value) in &self.items {
            buf.push(utype.id());
            buf.extend_from_slice(&value.to_be_bytes::<32>());
        }
        buf.into()
    }

    /// Parse the wire layout back.
    pub fn from_bytes(data: &[u8]) -> CofheResult<Self> {
        if data.len() % Self::ITEM_LEN != 0 {
            return Err(CofheError::new(
                ErrorCode::InvalidEncryptableValue,
                "packed input list has a truncated item",
            )
            .with_context("length", data.len()));
        }
        let items = data
            .chunks_exact(Self::ITEM_LEN)
            .map(|chunk| {
                let utype = FheType::try_from(chunk[0])?;
                Ok((utype, U256::from_be_slice(&chunk[1..])))
            })
            .collect::<CofheResult<Vec<_>>>()?;
        Ok(Self { items })
    }
}

/// Reject any item whose value does not fit its utype.
pub fn check_ranges(items: &[EncryptableItem]) -> CofheResult<()> {
    for (index, item) in items.iter().enumerate() {
        if !item.utype.fits(item.value) {
            return Err(CofheError::new(
                ErrorCode::InvalidEncryptableValue,
                format!("value does not fit in {}", item.utype.name()),
            )
            .with_context("index", index)
            .with_context("utype", item.utype.name())
            .with_context("bits", item.utype.bits()));
        }
    }
    Ok(())
}

/// The zone the batch is verified in.
///
/// An explicit zone overrides the items' own. Without one, all items must
/// agree; an empty batch uses `fallback`.
fn resolve_zone(
    items: &[EncryptableItem],
    explicit: Option<u8>,
    fallback: u8,
) -> CofheResult<u8> {
    if let Some(zone) = explicit {
        return Ok(zone);
    }
    let Some(first) = items.first() else {
        return Ok(fallback);
    };
    match items
        .iter()
        .position(|item| item.security_zone != first.security_zone)
    {
        None => Ok(first.security_zone),
        Some(index) => Err(CofheError::new(
            ErrorCode::InvalidEncryptableValue,
            "items in one batch must share a security zone",
        )
        .with_context("index", index)
        .with_context("expected", first.security_zone)
        .with_context("found", items[index].security_zone)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encryptor
// ─────────────────────────────────────────────────────────────────────────────

/// Turns trees of plaintext items into trees of verified ciphertext handles.
pub struct InputEncryptor<V> {
    verifier: V,
    chain_id: u64,
    default_security_zone: u8,
}

impl<V: InputVerifier> InputEncryptor<V> {
    pub fn new(verifier: V, chain_id: u64) -> Self {
        Self {
            verifier,
            chain_id,
            default_security_zone: 0,
        }
    }

    pub fn with_default_security_zone(mut self, zone: u8) -> Self {
        self.default_security_zone = zone;
        self
    }

    /// Encrypt every leaf of `tree` on behalf of `account`.
    pub async fn encrypt(
        &self,
        tree: Tree<EncryptableItem>,
        account: Address,
        security_zone: Option<u8>,
        cancel: &CancellationToken,
        on_step: Option<OnStep<'_>>,
    ) -> CofheResult<Tree<EncryptedInput>> {
        let step = |s: EncryptStep| {
            tracing::debug!(step = ?s, "encrypt");
            if let Some(callback) = on_step {
                callback(s);
            }
        };

        step(EncryptStep::Extract);
        let items = extract(&tree);
        check_ranges(&items)?;
        let zone = resolve_zone(&items, security_zone, self.default_security_zone)?;

        step(EncryptStep::Pack);
        let packed = PackedInputList::from_items(&items);

        let encrypted = if packed.is_empty() {
            Vec::new()
        } else {
            step(EncryptStep::Prove);
            let request = VerifyRequest {
                packed_list: packed.to_bytes(),
                account_addr: account,
                security_zone: zone,
                chain_id: self.chain_id,
            };

            step(EncryptStep::Verify);
            let response = cancel::run(cancel, "encrypt", async {
                self.verifier
                    .verify(&request)
                    .await
                    .with_code(ErrorCode::ZkVerifyFailed, "input verification request failed")
            })
            .await
            .inspect_err(|e| tracing::warn!(error = %e, items = items.len(), "input batch failed"))?;

            if !response.is_success() {
                tracing::warn!(status = %response.status, items = items.len(), "input batch rejected");
                return Err(CofheError::new(
                    ErrorCode::ZkVerifyFailed,
                    "input verifier rejected the batch",
                )
                .with_context("status", &response.status)
                .with_context("error", &response.error));
            }
            if response.data.len() != items.len() {
                tracing::warn!(
                    expected = items.len(),
                    received = response.data.len(),
                    "input verifier returned the wrong number of handles"
                );
                return Err(CofheError::new(
                    ErrorCode::ZkVerifyFailed,
                    "input verifier returned the wrong number of handles",
                )
                .with_context("expected", items.len())
                .with_context("received", response.data.len()));
            }

            items
                .iter()
                .zip(response.data)
                .map(|(item, verified)| EncryptedInput {
                    ct_hash: verified.ct_hash,
                    security_zone: zone,
                    utype: item.utype,
                    signature: verified.signature,
                })
                .collect()
        };

        step(EncryptStep::Replace);
        let out = replace_all(tree, encrypted)?;
        step(EncryptStep::Done);
        Ok(out)
    }
}
