//! End-to-end scenarios against the in-process chain.
//!
//! Every test wires a real client (permit manager, encryptor, decrypt
//! backend) to a `MockChain` acting as verifier, query decrypter and
//! threshold network.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use cofhe::core::{EncryptableItem, ErrorCode, FheType, Tree, UnsealedValue};
use cofhe::net::{ChainReader, InputVerifier, ThresholdNetwork};
use cofhe::permits::{PermitType, SharingPermitOptions};
use cofhe::store::SqliteStore;
use cofhe::{select_backend, CofheClient, EncryptStep, Environment};
use cofhe_testkit::{mock_config, MockChain, TestFixture, MOCK_CHAIN_ID};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Encrypt one item as `fixture`'s account and return its handle.
async fn encrypt_one(fixture: &TestFixture, item: EncryptableItem) -> U256 {
    let out = fixture
        .client
        .encrypt(Tree::Leaf(item), &CancellationToken::new(), None)
        .await
        .unwrap();
    match out {
        Tree::Leaf(input) => input.ct_hash,
        other => panic!("expected a leaf, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Round trips
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_mock_round_trip() {
    init_tracing();
    let fixture = TestFixture::new();
    fixture.client.create_self_permit().await.unwrap();

    let handle = encrypt_one(&fixture, EncryptableItem::uint32(7)).await;
    let value = fixture
        .client
        .decrypt_with_active(handle, FheType::Uint32, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(value, UnsealedValue::Uint(U256::from(7)));
    assert_eq!(fixture.chain.query_count(), 1);
}

#[tokio::test]
async fn test_network_round_trip() {
    init_tracing();
    let fixture = TestFixture::network();
    fixture.client.create_self_permit().await.unwrap();

    let handle = encrypt_one(&fixture, EncryptableItem::uint128(u128::MAX)).await;
    let value = fixture
        .client
        .decrypt_with_active(handle, FheType::Uint128, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(value, UnsealedValue::Uint(U256::from(u128::MAX)));
}

#[tokio::test]
async fn test_bool_and_address_are_typed() {
    for fixture in [TestFixture::new(), TestFixture::network()] {
        fixture.client.create_self_permit().await.unwrap();
        let cancel = CancellationToken::new();

        let flag = encrypt_one(&fixture, EncryptableItem::bool(true)).await;
        let who = Address::repeat_byte(0x5a);
        let addr = encrypt_one(&fixture, EncryptableItem::address(who)).await;

        let client = &fixture.client;
        assert_eq!(
            client.decrypt_with_active(flag, FheType::Bool, &cancel).await.unwrap(),
            UnsealedValue::Bool(true)
        );
        assert_eq!(
            client.decrypt_with_active(addr, FheType::Uint160, &cancel).await.unwrap(),
            UnsealedValue::Address(who)
        );
    }
}

#[tokio::test]
async fn test_nested_tree_keeps_shape() {
    let fixture = TestFixture::new();
    let input = json!({
        "amount": { "__encryptable": "uint64", "value": "1000" },
        "memo": "rent",
        "flags": [
            { "__encryptable": "bool", "value": true },
            null,
            { "__encryptable": "uint8", "value": 3 }
        ]
    });

    let out = fixture
        .client
        .encrypt_json(&input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(out["memo"], json!("rent"));
    assert_eq!(out["flags"][1], json!(null));
    assert_eq!(out["amount"]["utype"], json!(FheType::Uint64.id()));
    assert_eq!(out["flags"][2]["utype"], json!(FheType::Uint8.id()));
    assert_eq!(out["flags"][0]["securityZone"], json!(0));
}

#[tokio::test]
async fn test_steps_are_reported_in_order() {
    let fixture = TestFixture::new();
    let seen = Mutex::new(Vec::new());
    let record = |step: EncryptStep| seen.lock().unwrap().push(step);

    fixture
        .client
        .encrypt(
            Tree::Array(vec![
                Tree::Leaf(EncryptableItem::uint8(1)),
                Tree::Leaf(EncryptableItem::uint16(2)),
            ]),
            &CancellationToken::new(),
            Some(&record),
        )
        .await
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            EncryptStep::Extract,
            EncryptStep::Pack,
            EncryptStep::Prove,
            EncryptStep::Verify,
            EncryptStep::Replace,
            EncryptStep::Done,
        ]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Decryption failures
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_acl_denied_and_backend_error_are_distinct() {
    let fixture = TestFixture::new();
    fixture.client.create_self_permit().await.unwrap();
    let cancel = CancellationToken::new();

    // Stored but never granted to this account.
    let handle = fixture.chain.store_plaintext(FheType::Uint8, U256::from(1));
    let denied = fixture
        .client
        .decrypt_with_active(handle, FheType::Uint8, &cancel)
        .await
        .unwrap_err();
    assert_eq!(denied.code(), ErrorCode::SealOutputFailed);
    assert_eq!(denied.context_value("reason"), Some(&json!("acl_denied")));

    fixture.chain.fail_queries_with("execution reverted");
    let failed = fixture
        .client
        .decrypt_with_active(handle, FheType::Uint8, &cancel)
        .await
        .unwrap_err();
    assert_eq!(failed.code(), ErrorCode::SealOutputFailed);
    assert_eq!(failed.context_value("reason"), Some(&json!("backend_error")));
    assert_eq!(
        failed.context_value("backend_error"),
        Some(&json!("execution reverted"))
    );
}

#[tokio::test]
async fn test_network_acl_denied_returns_null() {
    let fixture = TestFixture::network();
    fixture.client.create_self_permit().await.unwrap();
    let handle = fixture.chain.store_plaintext(FheType::Uint8, U256::from(1));

    let err = fixture
        .client
        .decrypt_with_active(handle, FheType::Uint8, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::SealOutputReturnedNull);
    assert_eq!(
        err.context_value("error_message"),
        Some(&json!(cofhe::ACL_DENIED_MESSAGE))
    );
}

#[tokio::test]
async fn test_revoked_access_is_denied() {
    let fixture = TestFixture::new();
    fixture.client.create_self_permit().await.unwrap();
    let handle = encrypt_one(&fixture, EncryptableItem::uint16(9)).await;
    fixture.chain.revoke(handle, fixture.account());

    let err = fixture
        .client
        .decrypt_with_active(handle, FheType::Uint16, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.context_value("reason"), Some(&json!("acl_denied")));
}

#[tokio::test]
async fn test_transport_failure() {
    let fixture = TestFixture::new();
    fixture.client.create_self_permit().await.unwrap();
    let handle = encrypt_one(&fixture, EncryptableItem::uint8(4)).await;
    fixture.chain.set_offline(true);

    let err = fixture
        .client
        .decrypt_with_active(handle, FheType::Uint8, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SealOutputFailed);
    assert_eq!(err.context_value("reason"), Some(&json!("transport")));
}

#[tokio::test]
async fn test_decrypt_without_permit() {
    let fixture = TestFixture::new();
    let handle = encrypt_one(&fixture, EncryptableItem::uint8(4)).await;

    let err = fixture
        .client
        .decrypt_with_active(handle, FheType::Uint8, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermitNotFound);
    assert_eq!(fixture.chain.query_count(), 0);
}

#[tokio::test]
async fn test_cancelled_decrypt_sends_nothing() {
    let chain = Arc::new(MockChain::new(MOCK_CHAIN_ID));
    let config =
        mock_config(Environment::Mock).with_mock_decrypt_delay(Duration::from_secs(30));
    let fixture = TestFixture::on_chain(chain, config);
    fixture.client.create_self_permit().await.unwrap();
    let handle = encrypt_one(&fixture, EncryptableItem::uint8(4)).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = fixture
        .client
        .decrypt_with_active(handle, FheType::Uint8, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cancelled);
    assert_eq!(fixture.chain.query_count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Encryption failures
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_verifier_rejection() {
    let fixture = TestFixture::new();
    fixture.chain.reject_inputs("bad proof");

    let err = fixture
        .client
        .encrypt(
            Tree::Leaf(EncryptableItem::uint8(1)),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ZkVerifyFailed);
    assert_eq!(err.context_value("error"), Some(&json!("bad proof")));
}

#[tokio::test]
async fn test_verifier_dropping_a_handle() {
    let fixture = TestFixture::new();
    fixture.chain.drop_last_handle();

    let err = fixture
        .client
        .encrypt(
            Tree::Array(vec![
                Tree::Leaf(EncryptableItem::uint8(1)),
                Tree::Leaf(EncryptableItem::uint8(2)),
            ]),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ZkVerifyFailed);
    assert_eq!(err.context_value("expected"), Some(&json!(2)));
    assert_eq!(err.context_value("received"), Some(&json!(1)));
}

#[tokio::test]
async fn test_out_of_range_value_never_reaches_verifier() {
    let fixture = TestFixture::new();
    fixture.chain.set_offline(true);

    let err = fixture
        .client
        .encrypt(
            Tree::Leaf(EncryptableItem::new(FheType::Uint8, U256::from(256))),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidEncryptableValue);
}

// ─────────────────────────────────────────────────────────────────────────────
// Sharing
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_share_and_import() {
    init_tracing();
    let issuer = TestFixture::new();
    let recipient = issuer.peer();
    let cancel = CancellationToken::new();

    let handle = encrypt_one(&issuer, EncryptableItem::uint64(42)).await;

    let sharing = issuer
        .client
        .permits()
        .create_sharing(SharingPermitOptions::new(
            issuer.account(),
            recipient.account(),
        ))
        .await
        .unwrap();
    let exported = issuer.client.permits().export(&sharing).unwrap();

    let imported = recipient
        .client
        .permits()
        .import_shared(&exported)
        .await
        .unwrap();
    assert_eq!(imported.permit_type, PermitType::Import);
    assert_ne!(imported.hash, sharing.hash);

    // The recipient reads through the issuer's access.
    let value = recipient
        .client
        .decrypt_with_active(handle, FheType::Uint64, &cancel)
        .await
        .unwrap();
    assert_eq!(value, UnsealedValue::Uint(U256::from(42)));

    // The issuer's own store holds only the sharing permit.
    let issued = issuer.client.permits().list(issuer.account()).await.unwrap();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].hash, sharing.hash);
}

#[tokio::test]
async fn test_tampered_import_is_rejected() {
    let issuer = TestFixture::new();
    let recipient = issuer.peer();

    let sharing = issuer
        .client
        .permits()
        .create_sharing(SharingPermitOptions::new(
            issuer.account(),
            recipient.account(),
        ))
        .await
        .unwrap();
    let mut shared: serde_json::Value =
        serde_json::from_str(&issuer.client.permits().export(&sharing).unwrap()).unwrap();
    shared["name"] = json!("renamed");
    shared["expiration"] = json!(sharing.expiration + 1);

    let err = recipient
        .client
        .permits()
        .import_shared(&shared.to_string())
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidPermitData);
    assert!(recipient.store.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_permits_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("permits.db");
    let chain = Arc::new(MockChain::new(MOCK_CHAIN_ID));
    let signer = cofhe::permits::LocalSigner::random();
    let config = mock_config(Environment::Mock);

    let build = |store: SqliteStore| {
        let reader: Arc<dyn ChainReader> = chain.clone();
        let network: Arc<dyn ThresholdNetwork> = chain.clone();
        let verifier: Arc<dyn InputVerifier> = chain.clone();
        let backend = select_backend(&config, Some(reader), Some(network)).unwrap();
        CofheClient::new(config.clone(), store, signer.clone(), verifier, backend).unwrap()
    };

    let created = {
        let client = build(SqliteStore::open(&path).unwrap());
        client.create_self_permit().await.unwrap()
    };

    let client = build(SqliteStore::open(&path).unwrap());
    let out = client
        .encrypt(
            Tree::Leaf(EncryptableItem::uint32(31)),
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap();
    let Tree::Leaf(input) = out else {
        panic!("expected a leaf");
    };

    let active = client
        .permits()
        .get_active(client.account(), U256::ZERO)
        .await
        .unwrap();
    assert_eq!(active.hash, created.hash);
    assert_eq!(
        client
            .decrypt_with_active(input.ct_hash, FheType::Uint32, &CancellationToken::new())
            .await
            .unwrap(),
        UnsealedValue::Uint(U256::from(31))
    );
}
