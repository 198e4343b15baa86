//! Permit persistence over a [`KeyValueStore`].
//!
//! Layout, all values JSON:
//!
//! - `cofhe:permit:{chainId}:{account}:{hash}` - the permit
//! - `cofhe:permits:{chainId}:{account}` - hash index, insertion order
//! - `cofhe:active:{chainId}:{account}:{validatorId}` - active permit hash
//!
//! Accounts are lowercase `0x` hex. Nothing here takes a lock: concurrent
//! writers to the same key race and the last write wins.

use alloy::primitives::{Address, U256};
use cofhe_store::{KeyValueStore, KeyValueStoreExt, Result};

use crate::canonical::PermitHash;
use crate::permit::Permit;

const PERMIT_PREFIX: &str = "cofhe:permit";
const INDEX_PREFIX: &str = "cofhe:permits";
const ACTIVE_PREFIX: &str = "cofhe:active";

/// Lowercase `0x` form of an account, as used in keys.
pub fn account_key(account: Address) -> String {
    format!("0x{}", hex::encode(account.as_slice()))
}

/// Permit storage for one chain.
#[derive(Debug, Clone)]
pub struct PermitStore<S> {
    store: S,
    chain_id: u64,
}

impl<S: KeyValueStore> PermitStore<S> {
    pub fn new(store: S, chain_id: u64) -> Self {
        Self { store, chain_id }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub fn permit_key(&self, account: Address, hash: &PermitHash) -> String {
        format!(
            "{PERMIT_PREFIX}:{}:{}:{}",
            self.chain_id,
            account_key(account),
            hash.to_hex()
        )
    }

    pub fn index_key(&self, account: Address) -> String {
        format!("{INDEX_PREFIX}:{}:{}", self.chain_id, account_key(account))
    }

    pub fn active_key(&self, account: Address, validator_id: U256) -> String {
        format!(
            "{ACTIVE_PREFIX}:{}:{}:{}",
            self.chain_id,
            account_key(account),
            validator_id
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permits
    // ─────────────────────────────────────────────────────────────────────────

    /// Store `permit` under its holder and add it to the holder's index.
    ///
    /// Saving a permit whose hash is already stored replaces it.
    pub async fn save(&self, permit: &Permit) -> Result<()> {
        let account = permit.holder();
        self.store
            .set_json(&self.permit_key(account, &permit.hash), permit)
            .await?;

        let mut index = self.hashes(account).await?;
        if !index.contains(&permit.hash) {
            index.push(permit.hash);
            self.store.set_json(&self.index_key(account), &index).await?;
        }

        tracing::debug!(account = %account, hash = %permit.hash, permit_type = %permit.permit_type, "permit saved");
        Ok(())
    }

    pub async fn load(&self, account: Address, hash: &PermitHash) -> Result<Option<Permit>> {
        self.store.get_json(&self.permit_key(account, hash)).await
    }

    /// Hashes in the account's index.
    pub async fn hashes(&self, account: Address) -> Result<Vec<PermitHash>> {
        Ok(self
            .store
            .get_json::<Vec<PermitHash>>(&self.index_key(account))
            .await?
            .unwrap_or_default())
    }

    /// Every stored permit of `account`, in the order they were first saved.
    ///
    /// Index entries whose permit is gone are skipped.
    pub async fn list(&self, account: Address) -> Result<Vec<Permit>> {
        let mut permits = Vec::new();
        for hash in self.hashes(account).await? {
            if let Some(permit) = self.load(account, &hash).await? {
                permits.push(permit);
            }
        }
        Ok(permits)
    }

    /// Remove a permit. Returns the removed permit, if it existed.
    ///
    /// If it occupied the active slot for its validator, the slot is cleared.
    pub async fn delete(&self, account: Address, hash: &PermitHash) -> Result<Option<Permit>> {
        let Some(permit) = self.load(account, hash).await? else {
            return Ok(None);
        };

        self.store.remove_item(&self.permit_key(account, hash)).await?;

        let mut index = self.hashes(account).await?;
        index.retain(|h| h != hash);
        self.store.set_json(&self.index_key(account), &index).await?;

        if self.active_hash(account, permit.validator_id).await? == Some(*hash) {
            self.clear_active(account, permit.validator_id).await?;
        }

        tracing::debug!(account = %account, hash = %hash, "permit removed");
        Ok(Some(permit))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Active slots
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn active_hash(
        &self,
        account: Address,
        validator_id: U256,
    ) -> Result<Option<PermitHash>> {
        self.store
            .get_json(&self.active_key(account, validator_id))
            .await
    }

    /// Point the (account, validator) slot at `hash`, replacing any previous value.
    pub async fn set_active(
        &self,
        account: Address,
        validator_id: U256,
        hash: &PermitHash,
    ) -> Result<()> {
        self.store
            .set_json(&self.active_key(account, validator_id), hash)
            .await
    }

    pub async fn clear_active(&self, account: Address, validator_id: U256) -> Result<()> {
        self.store
            .remove_item(&self.active_key(account, validator_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permit::{PermitFields, PermitType};
    use cofhe_store::MemoryStore;

    fn permit(account: Address, validator_id: u64, expiration: u64) -> Permit {
        Permit::new(
            PermitType::SelfIssued,
            PermitFields {
                name: String::new(),
                issuer: account,
                recipient: account,
                expiration,
                validator_id: U256::from(validator_id),
                validator_contract: Address::ZERO,
            },
            None,
        )
    }

    #[test]
    fn test_key_layout() {
        let store = PermitStore::new(MemoryStore::new(), 31337);
        let account = Address::repeat_byte(0xAB);
        let hash = PermitHash::from_bytes([1u8; 32]);

        assert_eq!(
            store.index_key(account),
            format!("cofhe:permits:31337:0x{}", "ab".repeat(20))
        );
        assert_eq!(
            store.active_key(account, U256::from(7)),
            format!("cofhe:active:31337:0x{}:7", "ab".repeat(20))
        );
        assert_eq!(
            store.permit_key(account, &hash),
            format!("cofhe:permit:31337:0x{}:{}", "ab".repeat(20), "01".repeat(32))
        );
    }

    #[tokio::test]
    async fn test_save_load_list() {
        let store = PermitStore::new(MemoryStore::new(), 1);
        let account = Address::repeat_byte(1);
        let a = permit(account, 0, 100);
        let b = permit(account, 0, 200);

        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();
        store.save(&a).await.unwrap();

        assert_eq!(store.load(account, &a.hash).await.unwrap(), Some(a.clone()));
        let listed = store.list(account).await.unwrap();
        assert_eq!(listed, vec![a, b]);
        assert!(store.list(Address::repeat_byte(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chains_are_isolated() {
        let kv = std::sync::Arc::new(MemoryStore::new());
        let one = PermitStore::new(kv.clone(), 1);
        let two = PermitStore::new(kv.clone(), 2);
        let account = Address::repeat_byte(1);
        let p = permit(account, 0, 100);

        one.save(&p).await.unwrap();
        assert!(two.load(account, &p.hash).await.unwrap().is_none());
        assert!(two.list(account).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_clears_matching_active_slot() {
        let store = PermitStore::new(MemoryStore::new(), 1);
        let account = Address::repeat_byte(1);
        let a = permit(account, 3, 100);
        let b = permit(account, 3, 200);
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        store.set_active(account, U256::from(3), &b.hash).await.unwrap();
        store.delete(account, &a.hash).await.unwrap();
        assert_eq!(
            store.active_hash(account, U256::from(3)).await.unwrap(),
            Some(b.hash)
        );

        let removed = store.delete(account, &b.hash).await.unwrap();
        assert_eq!(removed.map(|p| p.hash), Some(b.hash));
        assert_eq!(store.active_hash(account, U256::from(3)).await.unwrap(), None);
        assert!(store.list(account).await.unwrap().is_empty());

        assert!(store.delete(account, &b.hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_active_slot_last_writer_wins() {
        let store = PermitStore::new(MemoryStore::new(), 1);
        let account = Address::repeat_byte(1);
        let first = PermitHash::from_bytes([1u8; 32]);
        let second = PermitHash::from_bytes([2u8; 32]);

        store.set_active(account, U256::ZERO, &first).await.unwrap();
        store.set_active(account, U256::ZERO, &second).await.unwrap();
        assert_eq!(
            store.active_hash(account, U256::ZERO).await.unwrap(),
            Some(second)
        );

        store.clear_active(account, U256::ZERO).await.unwrap();
        assert_eq!(store.active_hash(account, U256::ZERO).await.unwrap(), None);
    }
}
