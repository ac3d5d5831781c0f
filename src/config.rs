/**
 * @notice config.rs reads the node's environment-variable-driven tunables.
 * @dev Generalizes the module-level constants into runtime-overridable ones, read once into a
 * `Config` struct at startup rather than scattering `env::var` calls through the codebase.
 */

use std::env;
use std::net::SocketAddr;

use crate::constants::{BLOCK_SIZE_LIMIT, DEFAULT_BIND_ADDR, HALVING_INTERVAL, INITIAL_MINING_REWARD_MAJOR, POW_DIFFICULTY_PREFIX};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub block_size_limit: usize,
    pub initial_mining_reward_major: u64,
    pub halving_interval: u64,
    pub pow_difficulty_prefix: String,
    pub seed_peers: Vec<String>,
}

impl Config {
    /// Reads overrides from the environment, falling back to the module's compile-time constants.
    /// Malformed overrides are logged and ignored rather than treated as fatal, since these are
    /// tuning knobs, not required configuration.
    pub fn from_env() -> Self {
        Config {
            bind_addr: env::var("BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.parse().expect("DEFAULT_BIND_ADDR is a valid socket address")),
            block_size_limit: env_parsed("BLOCK_SIZE_LIMIT").unwrap_or(BLOCK_SIZE_LIMIT),
            initial_mining_reward_major: env_parsed("INITIAL_MINING_REWARD").unwrap_or(INITIAL_MINING_REWARD_MAJOR),
            halving_interval: env_parsed("HALVING_INTERVAL").unwrap_or(HALVING_INTERVAL),
            pow_difficulty_prefix: env::var("POW_DIFFICULTY_PREFIX").unwrap_or_else(|_| POW_DIFFICULTY_PREFIX.to_string()),
            seed_peers: env::var("SEED_PEERS")
                .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
                .unwrap_or_default(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
