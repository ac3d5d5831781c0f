//! Black-box integration tests driving the HTTP facade end to end, in the style of the teacher's
//! `tests/utxo_integration_tests.rs`: no mocks, a real `Ledger` behind the real `axum::Router`,
//! requests dispatched with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ledger_node::http::{self, AppState};
use ledger_node::ledger::Ledger;
use ledger_node::peer::PeerClient;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app() -> axum::Router {
    let ledger = Ledger::new();
    let peer_client = PeerClient::new().unwrap();
    http::app(AppState::new(ledger, peer_client))
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Scenario 1 (spec §8): a freshly-constructed node answers `/chain/get` with a single genesis
/// block and reports the seeded supply on `/wallet/balance/genesis_address`.
#[tokio::test]
async fn genesis_scenario_over_http() {
    let app = test_app();

    let (status, chain) = get(&app, "/chain/get").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chain["length"], 1);
    assert_eq!(chain["chain"][0]["previous_hash"], "0");
    assert_eq!(chain["chain"][0]["proof"], 1);

    let (status, balance) = get(&app, "/wallet/balance/genesis_address").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["balance"], 100_000_000_000_000u64);
}

/// Scenario 2 (spec §8): mining against an empty mempool fails and the chain length is unchanged.
#[tokio::test]
async fn mining_empty_mempool_fails_over_http() {
    let app = test_app();
    let (status, _) = post(&app, "/block/mine", json!({ "miner_address": "miner_x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, chain) = get(&app, "/chain/get").await;
    assert_eq!(chain["length"], 1);
}

/// Scenario 4 (spec §8), driven entirely through the wire protocol: prepare a signed transaction
/// spending the genesis UTXO, submit it, mine it, and check the resulting balances.
#[tokio::test]
async fn prepare_add_mine_conserves_value_over_http() {
    let app = test_app();

    let (status, genesis_wallet) = get(&app, "/wallet/generate").await;
    assert_eq!(status, StatusCode::OK);
    let sender_private_key = genesis_wallet["private_key"].as_str().unwrap();

    // The genesis UTXO is owned by "genesis_address", a synthetic address with no real keypair.
    // Preparing a transaction only needs *a* keypair to sign with; the ledger's balance bookkeeping
    // is keyed on owner_address strings, not on any particular key matching that address, so we
    // drive the flow from the well-known genesis address directly.
    let (status, prepared) = post(
        &app,
        "/transaction/prepare",
        json!({
            "sender_address": "genesis_address",
            "sender_private_key": sender_private_key,
            "outputs": [{ "address": "address_b", "amount": 100_00000000u64 }],
            "fee": 1_00000000u64,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "prepare failed: {prepared:?}");

    let add_body = json!({
        "signature": prepared["signature"],
        "public_key": prepared["public_key"],
        "inputs": prepared["inputs"].as_array().unwrap().iter().map(|u| json!({
            "tx_id": u["tx_id"],
            "output_index": u["output_index"],
        })).collect::<Vec<_>>(),
        "outputs": prepared["outputs"].as_array().unwrap().iter().map(|u| json!({
            "address": u["owner_address"],
            "amount": u["amount"],
        })).collect::<Vec<_>>(),
    });
    let (status, added) = post(&app, "/transaction/add", add_body).await;
    assert_eq!(status, StatusCode::CREATED, "add failed: {added:?}");
    assert_eq!(added["transaction_id"], prepared["transaction_id"]);

    let (status, mined) = post(&app, "/block/mine", json!({ "miner_address": "miner_m" })).await;
    assert_eq!(status, StatusCode::OK, "mine failed: {mined:?}");
    assert_eq!(mined["index"], 2);

    let (_, balance_b) = get(&app, "/wallet/balance/address_b").await;
    assert_eq!(balance_b["balance"], 100_00000000u64);

    let (_, balance_miner) = get(&app, "/wallet/balance/miner_m").await;
    assert_eq!(balance_miner["balance"], 51_00000000u64);

    let (_, mempool) = get(&app, "/transaction/get_mempool").await;
    assert_eq!(mempool["count"], 0);

    let (_, validity) = get(&app, "/chain/validate").await;
    assert!(validity["message"].as_str().unwrap().contains("valid"));
}

/// Scenario 3 (spec §8): an address with no UTXOs cannot prepare any transaction.
#[tokio::test]
async fn insufficient_funds_is_rejected_over_http() {
    let app = test_app();
    let (_, wallet) = get(&app, "/wallet/generate").await;
    let private_key = wallet["private_key"].as_str().unwrap();

    let (status, _) = post(
        &app,
        "/transaction/prepare",
        json!({
            "sender_address": "nobody",
            "sender_private_key": private_key,
            "outputs": [{ "address": "address_b", "amount": 1u64 }],
            "fee": 0u64,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Connecting peers round-trips through the documented node/connect surface.
#[tokio::test]
async fn node_connect_then_chain_sync_reports_authoritative_when_no_peers_are_reachable() {
    let app = test_app();
    let (status, connected) = post(&app, "/node/connect", json!({ "nodes": ["http://127.0.0.1:59999"] })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(connected["total_nodes"], 1);

    let (status, sync) = get(&app, "/node/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert!(sync["message"].as_str().unwrap().contains("authoritative"));
}

/// Scenario 6 (spec §8): a peer with a longer valid chain is adopted wholesale, and balances
/// recomputed from it reflect the peer's history rather than the local node's (which never mined).
#[tokio::test]
async fn longer_valid_peer_chain_is_adopted_over_real_http() {
    // Build the peer's ledger up to chain length 2 by admitting and mining one transaction.
    let mut peer_ledger = Ledger::new();
    let (sk, pk) = {
        let secp = secp256k1::Secp256k1::new();
        let mut rng = rand::rngs::OsRng;
        secp.generate_keypair(&mut rng)
    };
    let sender_address = ledger_node::hashing::derive_address(&pk.serialize_uncompressed());
    let genesis_output = peer_ledger
        .find_unspent(ledger_node::constants::GENESIS_TX_ID, 0)
        .unwrap()
        .clone();
    // The genesis UTXO is owned by "genesis_address"; reassign amounts directly for the test's
    // signing key since balances are keyed by owner_address string, not by key identity.
    let mut tx = ledger_node::transaction::Transaction::new();
    tx.add_input(genesis_output).unwrap();
    tx.add_output(ledger_node::utxo::Utxo::new_output(
        ledger_node::amount::Amount::from_major(10),
        sender_address.clone(),
    ));
    tx.add_output(ledger_node::utxo::Utxo::new_output(
        ledger_node::amount::Amount::from_major(999_990),
        "genesis_address",
    ));
    tx.sign_and_bind(&sk).unwrap();
    peer_ledger.admit_transaction(tx).unwrap();
    peer_ledger.mine_block("peer_miner").unwrap();
    assert_eq!(peer_ledger.chain_length(), 2);

    let peer_state = AppState::new(peer_ledger, PeerClient::new().unwrap());
    let peer_app = http::app(peer_state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let peer_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, peer_app).await.unwrap();
    });

    let local_app = test_app();
    assert_eq!(get(&local_app, "/chain/get").await.1["length"], 1);

    let (status, _) = post(
        &local_app,
        "/node/connect",
        json!({ "nodes": [format!("http://{peer_addr}")] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, sync) = get(&local_app, "/node/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert!(sync["message"].as_str().unwrap().contains("replaced"), "{sync:?}");

    let (_, chain) = get(&local_app, "/chain/get").await;
    assert_eq!(chain["length"], 2);

    let (_, validity) = get(&local_app, "/chain/validate").await;
    assert!(validity["message"].as_str().unwrap().contains("valid"));

    let (_, balance) = get(&local_app, &format!("/wallet/balance/{sender_address}")).await;
    assert_eq!(balance["balance"], 10_00000000u64);

    let (_, miner_balance) = get(&local_app, "/wallet/balance/peer_miner").await;
    assert_eq!(miner_balance["balance"], 50_00000000u64);
}
