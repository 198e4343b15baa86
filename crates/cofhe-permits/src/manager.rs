//! The permit manager: creates, imports, stores and selects permits.
//!
//! All dependencies are explicit. The manager owns a [`PermitStore`], a
//! [`PermitSigner`] for the connected account, the chain id and the ACL
//! address that EIP-712 signatures are bound to.

use alloy::primitives::{Address, Bytes, Signature, U256};
use cofhe_core::{CofheError, CofheResult, ErrorCode, ResultExt};
use cofhe_store::KeyValueStore;

use crate::canonical::PermitHash;
use crate::eip712::{PermitTypedData, SignedDomain};
use crate::permit::{unix_now, Permit, PermitFields, PermitType};
use crate::sealing::SealingKeyPair;
use crate::signer::PermitSigner;
use crate::store::PermitStore;
use crate::validation::{self, ValidationResult};

/// Default permit lifetime: one week.
pub const DEFAULT_EXPIRATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Options for [`PermitManager::create_self`].
#[derive(Debug, Clone, Default)]
pub struct SelfPermitOptions {
    pub issuer: Address,
    pub name: String,
    /// Unix seconds. Defaults to now plus the manager's default lifetime.
    pub expiration: Option<u64>,
    pub validator_id: Option<U256>,
    pub validator_contract: Option<Address>,
}

impl SelfPermitOptions {
    pub fn new(issuer: Address) -> Self {
        Self {
            issuer,
            ..Default::default()
        }
    }
}

/// Options for [`PermitManager::create_sharing`].
#[derive(Debug, Clone, Default)]
pub struct SharingPermitOptions {
    pub issuer: Address,
    pub recipient: Address,
    pub name: String,
    pub expiration: Option<u64>,
    pub validator_id: Option<U256>,
    pub validator_contract: Option<Address>,
}

impl SharingPermitOptions {
    pub fn new(issuer: Address, recipient: Address) -> Self {
        Self {
            issuer,
            recipient,
            ..Default::default()
        }
    }
}

/// Permit lifecycle operations for one signer on one chain.
pub struct PermitManager<S, G> {
    permits: PermitStore<S>,
    signer: G,
    acl: Address,
    default_expiration: u64,
}

impl<S: KeyValueStore, G: PermitSigner> PermitManager<S, G> {
    pub fn new(store: S, signer: G, chain_id: u64, acl: Address) -> Self {
        Self {
            permits: PermitStore::new(store, chain_id),
            signer,
            acl,
            default_expiration: DEFAULT_EXPIRATION_SECS,
        }
    }

    /// Lifetime applied when options leave `expiration` unset.
    pub fn with_default_expiration(mut self, secs: u64) -> Self {
        self.default_expiration = secs;
        self
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.permits.chain_id()
    }

    pub fn acl(&self) -> Address {
        self.acl
    }

    pub fn store(&self) -> &PermitStore<S> {
        &self.permits
    }

    /// The domain new signatures are produced under.
    pub fn domain(&self) -> SignedDomain {
        SignedDomain::acl(self.chain_id(), self.acl)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────────

    /// Create, sign, store and activate a self permit.
    pub async fn create_self(&self, options: SelfPermitOptions) -> CofheResult<Permit> {
        let now = unix_now();
        self.check_issuer(options.issuer)?;
        let expiration = self.resolve_expiration(options.expiration, now)?;

        let mut permit = Permit::new(
            PermitType::SelfIssued,
            PermitFields {
                name: options.name,
                issuer: options.issuer,
                recipient: options.issuer,
                expiration,
                validator_id: options.validator_id.unwrap_or(U256::ZERO),
                validator_contract: options.validator_contract.unwrap_or(Address::ZERO),
            },
            Some(SealingKeyPair::generate()),
        );

        let domain = self.domain();
        let signature = self.sign(&permit.issuer_typed_data(domain.clone())?).await?;
        permit.issuer_signature = Some(signature);
        permit.signed_domain = Some(domain);

        self.permits
            .save(&permit)
            .await
            .with_code(ErrorCode::StorageError, "failed to store permit")?;
        self.permits
            .set_active(permit.issuer, permit.validator_id, &permit.hash)
            .await
            .with_code(ErrorCode::StorageError, "failed to activate permit")?;

        tracing::debug!(issuer = %permit.issuer, hash = %permit.hash, expiration, "created self permit");
        Ok(permit)
    }

    /// Create, sign and store a sharing permit. It is never made active.
    pub async fn create_sharing(&self, options: SharingPermitOptions) -> CofheResult<Permit> {
        let now = unix_now();
        self.check_issuer(options.issuer)?;
        if options.recipient == Address::ZERO {
            return Err(CofheError::invalid_permit(
                "sharing permit recipient must not be the zero address",
            ));
        }
        if options.recipient == options.issuer {
            return Err(CofheError::invalid_permit(
                "sharing permit recipient must differ from the issuer",
            )
            .with_hint("use a self permit to read your own values"));
        }
        let expiration = self.resolve_expiration(options.expiration, now)?;

        let mut permit = Permit::new(
            PermitType::Sharing,
            PermitFields {
                name: options.name,
                issuer: options.issuer,
                recipient: options.recipient,
                expiration,
                validator_id: options.validator_id.unwrap_or(U256::ZERO),
                validator_contract: options.validator_contract.unwrap_or(Address::ZERO),
            },
            None,
        );

        let domain = self.domain();
        let signature = self.sign(&permit.issuer_typed_data(domain.clone())?).await?;
        permit.issuer_signature = Some(signature);
        permit.signed_domain = Some(domain);

        self.permits
            .save(&permit)
            .await
            .with_code(ErrorCode::StorageError, "failed to store permit")?;

        tracing::debug!(
            issuer = %permit.issuer,
            recipient = %permit.recipient,
            hash = %permit.hash,
            "created sharing permit"
        );
        Ok(permit)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────────────────────

    /// Serialize a signed sharing permit for its recipient.
    pub fn export(&self, permit: &Permit) -> CofheResult<String> {
        if permit.permit_type != PermitType::Sharing {
            return Err(CofheError::invalid_permit("only sharing permits can be exported")
                .with_context("type", permit.permit_type.as_str()));
        }
        if permit.issuer_signature.is_none() {
            return Err(CofheError::invalid_permit("sharing permit is not signed"));
        }
        serde_json::to_string(&permit.to_shared())
            .with_code(ErrorCode::InternalError, "failed to serialize permit")
    }

    /// Accept a sharing permit addressed to the signer.
    ///
    /// The issuer signature is checked before anything is generated, signed
    /// or stored. On success the permit becomes an `import` permit with its
    /// own sealing pair and is made active for the recipient.
    pub async fn import_shared(&self, serialized: &str) -> CofheResult<Permit> {
        let now = unix_now();
        let mut permit: Permit = serde_json::from_str(serialized)
            .with_code(ErrorCode::InvalidPermitData, "malformed permit JSON")?;

        if permit.permit_type != PermitType::Sharing {
            return Err(CofheError::invalid_permit("only sharing permits can be imported")
                .with_context("type", permit.permit_type.as_str()));
        }
        let signer = self.signer_address();
        if permit.recipient != signer {
            return Err(
                CofheError::invalid_permit("permit is addressed to another account")
                    .with_context("recipient", permit.recipient)
                    .with_context("signer", signer),
            );
        }
        if permit.compute_hash() != permit.hash {
            return Err(CofheError::invalid_permit("permit hash does not match its fields")
                .with_context("hash", permit.hash.to_hex()));
        }
        validation::verify_issuer_signature(&permit).map_err(CofheError::from)?;
        if permit.is_expired(now) {
            return Err(CofheError::new(ErrorCode::PermitExpired, "shared permit has expired")
                .with_context("expiration", permit.expiration)
                .with_hint("ask the issuer for a new permit"));
        }

        let domain = permit
            .signed_domain
            .clone()
            .ok_or_else(|| CofheError::invalid_permit("permit is missing signedDomain"))?;

        permit.permit_type = PermitType::Import;
        permit.sealing_pair = Some(SealingKeyPair::generate());
        permit.rehash();

        let signature = self.sign(&permit.recipient_typed_data(domain)?).await?;
        permit.recipient_signature = Some(signature);

        self.permits
            .save(&permit)
            .await
            .with_code(ErrorCode::StorageError, "failed to store permit")?;
        self.permits
            .set_active(permit.recipient, permit.validator_id, &permit.hash)
            .await
            .with_code(ErrorCode::StorageError, "failed to activate permit")?;

        tracing::debug!(
            issuer = %permit.issuer,
            recipient = %permit.recipient,
            hash = %permit.hash,
            "imported sharing permit"
        );
        Ok(permit)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// The active permit for (account, validator). Expired permits are returned as-is.
    pub async fn get_active(&self, account: Address, validator_id: U256) -> CofheResult<Permit> {
        let hash = self
            .permits
            .active_hash(account, validator_id)
            .await
            .with_code(ErrorCode::StorageError, "failed to read active permit")?
            .ok_or_else(|| {
                CofheError::new(ErrorCode::PermitNotFound, "no active permit")
                    .with_context("account", account)
                    .with_context("validatorId", validator_id)
                    .with_hint("create a self permit or import a shared one")
            })?;
        self.get(account, &hash).await
    }

    pub async fn get(&self, account: Address, hash: &PermitHash) -> CofheResult<Permit> {
        self.permits
            .load(account, hash)
            .await
            .with_code(ErrorCode::StorageError, "failed to read permit")?
            .ok_or_else(|| not_found(account, hash))
    }

    pub async fn list(&self, account: Address) -> CofheResult<Vec<Permit>> {
        self.permits
            .list(account)
            .await
            .with_code(ErrorCode::StorageError, "failed to list permits")
    }

    /// Delete a permit, clearing its active slot if it held one.
    pub async fn remove(&self, account: Address, hash: &PermitHash) -> CofheResult<Permit> {
        self.permits
            .delete(account, hash)
            .await
            .with_code(ErrorCode::StorageError, "failed to remove permit")?
            .ok_or_else(|| not_found(account, hash))
    }

    /// Make a stored permit the active one for its validator.
    pub async fn set_active(&self, account: Address, hash: &PermitHash) -> CofheResult<()> {
        let permit = self.get(account, hash).await?;
        self.permits
            .set_active(account, permit.validator_id, hash)
            .await
            .with_code(ErrorCode::StorageError, "failed to activate permit")
    }

    pub fn validate(&self, permit: &Permit, now: u64) -> ValidationResult {
        validation::validate(permit, now)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn check_issuer(&self, issuer: Address) -> CofheResult<()> {
        if issuer == Address::ZERO {
            return Err(CofheError::invalid_permit(
                "issuer must not be the zero address",
            ));
        }
        let signer = self.signer_address();
        if issuer != signer {
            return Err(
                CofheError::invalid_permit("issuer does not match the connected signer")
                    .with_context("issuer", issuer)
                    .with_context("signer", signer),
            );
        }
        Ok(())
    }

    fn resolve_expiration(&self, requested: Option<u64>, now: u64) -> CofheResult<u64> {
        let expiration = requested.unwrap_or(now.saturating_add(self.default_expiration));
        if expiration <= now {
            return Err(CofheError::invalid_permit("expiration must be in the future")
                .with_context("expiration", expiration)
                .with_context("now", now));
        }
        Ok(expiration)
    }

    async fn sign(&self, data: &PermitTypedData) -> CofheResult<Bytes> {
        let signature: Signature = self.signer.sign_typed_data(data).await?;
        tracing::debug!(primary_type = data.message.primary_type(), "signed permit typed data");
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }
}

fn not_found(account: Address, hash: &PermitHash) -> CofheError {
    CofheError::new(ErrorCode::PermitNotFound, "permit not found")
        .with_context("account", account)
        .with_context("hash", hash.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SignerError;
    use crate::signer::LocalSigner;
    use crate::validation::ValidationIssue;
    use async_trait::async_trait;
    use cofhe_store::MemoryStore;
    use std::sync::Arc;

    const CHAIN_ID: u64 = 31337;

    fn acl() -> Address {
        Address::repeat_byte(0xac)
    }

    fn manager(signer: LocalSigner) -> PermitManager<Arc<MemoryStore>, LocalSigner> {
        PermitManager::new(Arc::new(MemoryStore::new()), signer, CHAIN_ID, acl())
    }

    struct RefusingSigner(Address);

    #[async_trait]
    impl PermitSigner for RefusingSigner {
        fn address(&self) -> Address {
            self.0
        }

        async fn sign_typed_data(&self, _: &PermitTypedData) -> Result<Signature, SignerError> {
            Err(SignerError::Rejected("user denied".into()))
        }
    }

    #[tokio::test]
    async fn test_create_self_defaults_and_activates() {
        let signer = LocalSigner::random();
        let account = signer.address();
        let manager = manager(signer);

        let before = unix_now();
        let permit = manager
            .create_self(SelfPermitOptions::new(account))
            .await
            .unwrap();

        assert_eq!(permit.permit_type, PermitType::SelfIssued);
        assert_eq!(permit.recipient, account);
        assert!(permit.expiration >= before + DEFAULT_EXPIRATION_SECS);
        assert_eq!(permit.signed_domain, Some(SignedDomain::acl(CHAIN_ID, acl())));
        assert!(manager.validate(&permit, unix_now()).valid);

        let active = manager.get_active(account, U256::ZERO).await.unwrap();
        assert_eq!(active, permit);
        assert_eq!(manager.list(account).await.unwrap(), vec![permit]);
    }

    #[tokio::test]
    async fn test_create_self_rejects_bad_options() {
        let signer = LocalSigner::random();
        let account = signer.address();
        let manager = manager(signer);

        let err = manager
            .create_self(SelfPermitOptions::new(Address::repeat_byte(5)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPermitData);

        let err = manager
            .create_self(SelfPermitOptions {
                expiration: Some(1),
                ..SelfPermitOptions::new(account)
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPermitData);
        assert!(manager.list(account).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_signer_refusal_stores_nothing() {
        let account = Address::repeat_byte(0x11);
        let manager = PermitManager::new(
            Arc::new(MemoryStore::new()),
            RefusingSigner(account),
            CHAIN_ID,
            acl(),
        );

        let err = manager
            .create_self(SelfPermitOptions::new(account))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SignatureRejected);
        assert!(manager.list(account).await.unwrap().is_empty());
        assert_eq!(
            manager.get_active(account, U256::ZERO).await.unwrap_err().code(),
            ErrorCode::PermitNotFound
        );
    }

    #[tokio::test]
    async fn test_create_sharing_is_not_activated() {
        let signer = LocalSigner::random();
        let account = signer.address();
        let manager = manager(signer);

        let err = manager
            .create_sharing(SharingPermitOptions::new(account, account))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPermitData);

        let permit = manager
            .create_sharing(SharingPermitOptions::new(account, Address::repeat_byte(2)))
            .await
            .unwrap();
        assert!(permit.sealing_pair.is_none());
        assert_eq!(
            manager.validate(&permit, unix_now()).issue,
            Some(ValidationIssue::NotImported)
        );
        assert_eq!(
            manager.get_active(account, U256::ZERO).await.unwrap_err().code(),
            ErrorCode::PermitNotFound
        );
        assert_eq!(manager.list(account).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_share_and_import() {
        let issuer = LocalSigner::random();
        let recipient = LocalSigner::random();
        let recipient_address = recipient.address();
        let alice = manager(issuer.clone());
        let bob = manager(recipient);

        let shared = alice
            .create_sharing(SharingPermitOptions {
                validator_id: Some(U256::from(4)),
                ..SharingPermitOptions::new(issuer.address(), recipient_address)
            })
            .await
            .unwrap();
        let json = alice.export(&shared).unwrap();
        assert!(!json.contains("sealingPair"));

        let imported = bob.import_shared(&json).await.unwrap();
        assert_eq!(imported.permit_type, PermitType::Import);
        assert_eq!(imported.holder(), recipient_address);
        assert_ne!(imported.hash, shared.hash);
        assert!(imported.recipient_signature.is_some());
        assert_eq!(bob.validate(&imported, unix_now()), ValidationResult::ok());

        let active = bob
            .get_active(recipient_address, U256::from(4))
            .await
            .unwrap();
        assert_eq!(active.hash, imported.hash);
    }

    #[tokio::test]
    async fn test_import_rejects_tampered_permit() {
        let issuer = LocalSigner::random();
        let recipient = LocalSigner::random();
        let recipient_address = recipient.address();
        let alice = manager(issuer.clone());
        let bob = manager(recipient);

        let mut shared = alice
            .create_sharing(SharingPermitOptions::new(issuer.address(), recipient_address))
            .await
            .unwrap();
        shared.expiration += 60;
        shared.rehash();
        let json = serde_json::to_string(&shared.to_shared()).unwrap();

        let err = bob.import_shared(&json).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPermitData);
        assert!(bob.list(recipient_address).await.unwrap().is_empty());
        assert!(bob
            .store()
            .active_hash(recipient_address, U256::ZERO)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_import_rejects_wrong_recipient_and_kind() {
        let issuer = LocalSigner::random();
        let alice = manager(issuer.clone());
        let mallory = manager(LocalSigner::random());

        let shared = alice
            .create_sharing(SharingPermitOptions::new(
                issuer.address(),
                Address::repeat_byte(2),
            ))
            .await
            .unwrap();
        let err = mallory
            .import_shared(&alice.export(&shared).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPermitData);

        let own = alice
            .create_self(SelfPermitOptions::new(issuer.address()))
            .await
            .unwrap();
        assert!(alice.export(&own).is_err());

        let err = mallory.import_shared("{not json").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPermitData);
    }

    #[tokio::test]
    async fn test_import_rejects_expired_permit() {
        let issuer = LocalSigner::random();
        let recipient = LocalSigner::random();
        let recipient_address = recipient.address();
        let bob = manager(recipient);

        // Sign an already-expired sharing permit by hand.
        let mut permit = Permit::new(
            PermitType::Sharing,
            PermitFields {
                name: String::new(),
                issuer: issuer.address(),
                recipient: recipient_address,
                expiration: 1,
                validator_id: U256::ZERO,
                validator_contract: Address::ZERO,
            },
            None,
        );
        let domain = SignedDomain::acl(CHAIN_ID, acl());
        let typed = permit.issuer_typed_data(domain.clone()).unwrap();
        let signature = issuer.sign_typed_data(&typed).await.unwrap();
        permit.issuer_signature = Some(Bytes::from(signature.as_bytes().to_vec()));
        permit.signed_domain = Some(domain);

        let err = bob
            .import_shared(&serde_json::to_string(&permit).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermitExpired);
        assert!(bob.list(recipient_address).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_set_active() {
        let signer = LocalSigner::random();
        let account = signer.address();
        let manager = manager(signer);

        let first = manager
            .create_self(SelfPermitOptions::new(account))
            .await
            .unwrap();
        let second = manager
            .create_self(SelfPermitOptions {
                name: "second".into(),
                expiration: Some(first.expiration + 10),
                ..SelfPermitOptions::new(account)
            })
            .await
            .unwrap();
        assert_eq!(
            manager.get_active(account, U256::ZERO).await.unwrap().hash,
            second.hash
        );

        manager.set_active(account, &first.hash).await.unwrap();
        assert_eq!(
            manager.get_active(account, U256::ZERO).await.unwrap().hash,
            first.hash
        );

        manager.remove(account, &first.hash).await.unwrap();
        assert_eq!(
            manager.get_active(account, U256::ZERO).await.unwrap_err().code(),
            ErrorCode::PermitNotFound
        );
        assert_eq!(
            manager.remove(account, &first.hash).await.unwrap_err().code(),
            ErrorCode::PermitNotFound
        );
        assert_eq!(manager.list(account).await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn test_get_active_does_not_filter_expired() {
        let signer = LocalSigner::random();
        let account = signer.address();
        let manager = manager(signer);

        let permit = manager
            .create_self(SelfPermitOptions::new(account))
            .await
            .unwrap();
        let active = manager.get_active(account, U256::ZERO).await.unwrap();
        let later = permit.expiration + 1;
        assert_eq!(
            manager.validate(&active, later).issue,
            Some(ValidationIssue::Expired)
        );
    }
}
