/**
 * @notice http.rs is the HTTP facade: an `axum` router mapping the node's endpoints onto the
 * core's `Ledger` methods.
 * @dev `Ledger` lives behind a `tokio::sync::RwLock` so `balance_of`/`chain/get`/`get_mempool`
 * reads don't block each other, while admit/mine/connect/sync take the write half. Request bodies
 * are accepted as `serde_json::Value` and walked field-by-field so a missing or mistyped field
 * surfaces as a validation error (400), not axum's default unprocessable-entity rejection.
 */

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::amount::Amount;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::peer::PeerClient;
use crate::utxo::Utxo;
use crate::wallet::{self, Keypair};

/// Shared application state: the single `Ledger` behind a readers-writer lock plus the
/// `PeerClient` collaborator used by `/node/sync`.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<RwLock<Ledger>>,
    pub peer_client: Arc<PeerClient>,
}

impl AppState {
    pub fn new(ledger: Ledger, peer_client: PeerClient) -> Self {
        AppState {
            ledger: Arc::new(RwLock::new(ledger)),
            peer_client: Arc::new(peer_client),
        }
    }
}

/// Builds the full router: routes, CORS, and request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/wallet/generate", get(wallet_generate))
        .route("/transaction/prepare", post(transaction_prepare))
        .route("/transaction/add", post(transaction_add))
        .route("/transaction/get_mempool", get(transaction_get_mempool))
        .route("/block/mine", post(block_mine))
        .route("/chain/get", get(chain_get))
        .route("/chain/validate", get(chain_validate))
        .route("/wallet/balance/:address", get(wallet_balance))
        .route("/node/connect", post(node_connect))
        .route("/node/sync", get(node_sync))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wraps `LedgerError` so it can be returned directly from a handler; maps each error kind to a
/// status code (`Consensus` never escapes `replace_chain`, so it is treated as internal here
/// defensively rather than surfaced intentionally).
struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::Validation(_) | LedgerError::NotFound(_) | LedgerError::Crypto(_) => {
                StatusCode::BAD_REQUEST
            }
            LedgerError::Consensus(_) | LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(error = %self.0, status = %status, "request failed");
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn required<'a>(value: &'a Value, field: &str) -> Result<&'a Value, LedgerError> {
    value
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| LedgerError::Validation(format!("missing field `{field}`")))
}

fn required_str(value: &Value, field: &str) -> Result<String, LedgerError> {
    required(value, field)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LedgerError::Validation(format!("field `{field}` must be a string")))
}

fn required_amount(value: &Value, field: &str) -> Result<Amount, LedgerError> {
    required(value, field)?
        .as_u64()
        .map(Amount::from_minor)
        .ok_or_else(|| LedgerError::Validation(format!("field `{field}` must be a non-negative integer")))
}

fn required_array<'a>(value: &'a Value, field: &str) -> Result<&'a Vec<Value>, LedgerError> {
    required(value, field)?
        .as_array()
        .ok_or_else(|| LedgerError::Validation(format!("field `{field}` must be an array")))
}

fn required_u32(value: &Value, field: &str) -> Result<u32, LedgerError> {
    required(value, field)?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| LedgerError::Validation(format!("field `{field}` must be a small non-negative integer")))
}

fn hex_decode(field: &str, value: &str) -> Result<Vec<u8>, LedgerError> {
    hex::decode(value).map_err(|e| LedgerError::Crypto(format!("field `{field}` is not valid hex: {e}")))
}

/// `{address, amount}` destination spec, parsed from a JSON array element.
fn parse_output_spec(value: &Value) -> Result<(String, Amount), LedgerError> {
    let address = required_str(value, "address")?;
    let amount = required_amount(value, "amount")?;
    Ok((address, amount))
}

/// GET /wallet/generate
async fn wallet_generate() -> ApiResult<Json<Value>> {
    let keypair = Keypair::generate();
    Ok(Json(json!({
        "private_key": keypair.private_key_hex(),
        "public_key": keypair.public_key_hex(),
        "address": keypair.address(),
    })))
}

/// POST /transaction/prepare
async fn transaction_prepare(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Json<Value>> {
    let sender_address = required_str(&body, "sender_address")?;
    let sender_private_key = required_str(&body, "sender_private_key")?;
    let fee = required_amount(&body, "fee")?;
    let outputs = required_array(&body, "outputs")?
        .iter()
        .map(parse_output_spec)
        .collect::<Result<Vec<_>, _>>()?;

    let secret_key = wallet::secret_key_from_hex(&sender_private_key)?;

    let ledger = state.ledger.read().await;
    let tx = ledger.prepare_transaction(&sender_address, &secret_key, &outputs, fee)?;

    Ok(Json(json!({
        "transaction_id": tx.tx_id,
        "fee": tx.fee as i64,
        "size": tx.size,
        "signature": tx.signature.as_ref().map(hex::encode).unwrap_or_default(),
        "public_key": tx.sender_public_key.as_ref().map(hex::encode).unwrap_or_default(),
        "inputs": tx.inputs,
        "outputs": tx.outputs,
    })))
}

/// POST /transaction/add
async fn transaction_add(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Response> {
    let signature = hex_decode("signature", &required_str(&body, "signature")?)?;
    let public_key = hex_decode("public_key", &required_str(&body, "public_key")?)?;

    let input_refs = required_array(&body, "inputs")?
        .iter()
        .map(|v| Ok((required_str(v, "tx_id")?, required_u32(v, "output_index")?)))
        .collect::<Result<Vec<(String, u32)>, LedgerError>>()?;
    let output_specs = required_array(&body, "outputs")?
        .iter()
        .map(parse_output_spec)
        .collect::<Result<Vec<_>, _>>()?;

    let inputs = {
        let ledger = state.ledger.read().await;
        input_refs
            .iter()
            .map(|(tx_id, output_index)| {
                ledger
                    .find_unspent(tx_id, *output_index)
                    .cloned()
                    .ok_or_else(|| LedgerError::NotFound(format!("unknown or spent utxo {tx_id}:{output_index}")))
            })
            .collect::<Result<Vec<Utxo>, LedgerError>>()?
    };
    let outputs = output_specs
        .into_iter()
        .map(|(address, amount)| Utxo::new_output(amount, address))
        .collect();

    let tx = crate::transaction::Transaction::from_signed_parts(inputs, outputs, signature, public_key)?;
    let transaction_id = tx.tx_id.clone();

    let mut ledger = state.ledger.write().await;
    ledger.admit_transaction(tx)?;
    info!(transaction_id = %transaction_id, "admitted transaction");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "transaction added to mempool", "transaction_id": transaction_id })),
    )
        .into_response())
}

/// GET /transaction/get_mempool
async fn transaction_get_mempool(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let ledger = state.ledger.read().await;
    let transactions = ledger.mempool_transactions();
    Ok(Json(json!({ "count": transactions.len(), "transactions": transactions })))
}

/// POST /block/mine
async fn block_mine(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Json<Value>> {
    let miner_address = required_str(&body, "miner_address")?;
    let mut ledger = state.ledger.write().await;
    let mined = ledger.mine_block(&miner_address)?;
    info!(index = mined.index, "mined block via http facade");

    Ok(Json(json!({
        "index": mined.index,
        "timestamp": mined.timestamp,
        "proof": mined.proof,
        "previous_hash": mined.previous_hash,
        "mining_reward": mined.mining_reward,
    })))
}

/// GET /chain/get
async fn chain_get(State(state): State<AppState>) -> Json<Value> {
    let ledger = state.ledger.read().await;
    Json(json!({ "chain": ledger.chain(), "length": ledger.chain_length() }))
}

/// GET /chain/validate
async fn chain_validate(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let ledger = state.ledger.read().await;
    if ledger.is_local_chain_valid() {
        Ok(Json(json!({ "message": "the chain is valid" })))
    } else {
        Err(LedgerError::Internal("the local chain failed validation".into()).into())
    }
}

/// GET /wallet/balance/<address>
async fn wallet_balance(State(state): State<AppState>, Path(address): Path<String>) -> Json<Value> {
    let ledger = state.ledger.read().await;
    let balance = ledger.balance_of(&address);
    Json(json!({ "address": address, "balance": balance }))
}

/// POST /node/connect
async fn node_connect(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Response> {
    let nodes = required_array(&body, "nodes")?;
    let mut ledger = state.ledger.write().await;
    for node in nodes {
        let url = node
            .as_str()
            .ok_or_else(|| LedgerError::Validation("each entry in `nodes` must be a string".into()))?;
        if let Err(e) = ledger.add_peer(url) {
            warn!(url = %url, error = %e, "skipping unparseable peer url");
        }
    }
    Ok((StatusCode::CREATED, Json(json!({ "total_nodes": ledger.peer_count() }))).into_response())
}

/// GET /node/sync
async fn node_sync(State(state): State<AppState>) -> Json<Value> {
    let mut ledger = state.ledger.write().await;
    let replaced = ledger.replace_chain(&state.peer_client).await;
    if replaced {
        info!("adopted a longer valid chain from a peer");
        Json(json!({ "message": "chain was replaced", "new_chain": ledger.chain() }))
    } else {
        Json(json!({ "message": "local chain is authoritative", "actual_chain": ledger.chain() }))
    }
}
