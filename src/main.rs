//! Process bootstrap for the ledger node: reads configuration from the environment, seeds a
//! `Ledger`, and serves the HTTP facade described in spec §6.
//!
//! Bootstrap, logging initialization, and the HTTP listener are external-collaborator concerns
//! per spec §1 — this binary exists only to wire them to the core.

use ledger_node::config::Config;
use ledger_node::http::{self, AppState};
use ledger_node::ledger::Ledger;
use ledger_node::peer::PeerClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr;

    let ledger = Ledger::from_config(&config);
    let peer_client = PeerClient::new().expect("failed to build peer http client");
    let state = AppState::new(ledger, peer_client);

    let app = http::app(state);

    tracing::info!(%bind_addr, "ledger node listening");
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind_addr}: {e}"));
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("http server error: {e}"));
}
