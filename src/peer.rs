/**
 * @notice peer.rs is the PeerClient collaborator: it fetches `(length, chain)` snapshots from a
 * named peer over HTTP so `Ledger::replace_chain` can compare candidate chains (spec §2, §4.9).
 * @dev Grounded on original_source/src/routes/chain.py's `/chain/get` handler for the response
 * shape, and on the teacher's reqwest-free `requests.rs` collaborator for the "one client per
 * call, skip on error" idiom — rebuilt here against `reqwest` since that is the async HTTP client
 * the rest of this crate's stack (axum, tower-http) already pulls in.
 */

use serde::Deserialize;

use crate::block::Block;
use crate::constants::PEER_RPC_TIMEOUT;
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Deserialize)]
struct ChainResponse {
    chain: Vec<Block>,
    length: usize,
}

/// Fetches peer chain snapshots over HTTP. A thin wrapper so `Ledger::replace_chain` can be
/// exercised against a fake in tests without spinning up a real server.
#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> LedgerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(PEER_RPC_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Internal(format!("failed to build peer http client: {e}")))?;
        Ok(PeerClient { http })
    }

    /// Fetches `GET {peer}/chain/get` and returns `(length, chain)`. Per spec §5, a failing peer
    /// is reported as an `Err` the caller logs and skips rather than propagates.
    pub async fn fetch_chain(&self, peer: &str) -> LedgerResult<(usize, Vec<Block>)> {
        let url = format!("http://{peer}/chain/get");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::Internal(format!("peer {peer} unreachable: {e}")))?;
        let parsed: ChainResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Internal(format!("peer {peer} returned malformed chain: {e}")))?;
        Ok((parsed.length, parsed.chain))
    }
}

impl Default for PeerClient {
    fn default() -> Self {
        Self::new().expect("default reqwest client construction never fails")
    }
}
