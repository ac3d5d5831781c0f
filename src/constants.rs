/**
 * @notice constants.rs contains the global constants used throughout the ledger node software.
 */

use std::time::Duration;

// Scale factor for Amount: one major unit equals this many minor units.
// Matches the satoshi-style fixed point scale used to make balance and fee arithmetic exact.
pub const AMOUNT_SCALE: u64 = 100_000_000;

// Maximum summed transaction size admitted into a single mined block.
pub const BLOCK_SIZE_LIMIT: usize = 1500;

// Mining reward (in major units) paid for the first HALVING_INTERVAL blocks.
pub const INITIAL_MINING_REWARD_MAJOR: u64 = 50;

// Number of blocks between reward halvings.
pub const HALVING_INTERVAL: u64 = 210_000;

// Reward floor, expressed directly in minor units (1e-8 major units == 1 minor unit).
pub const MIN_REWARD_MINOR: u64 = 1;

// Hex prefix a solved proof-of-work digest must begin with.
pub const POW_DIFFICULTY_PREFIX: &str = "0000";

// Amount seeded into the genesis UTXO, in major units.
pub const GENESIS_SUPPLY_MAJOR: u64 = 1_000_000;

// Owner of the genesis UTXO.
pub const GENESIS_ADDRESS: &str = "genesis_address";

// tx_id reserved for the network's first transaction.
pub const GENESIS_TX_ID: &str = "genesis";

// Sentinel owner address for a not-yet-folded-in mining fee output.
pub const MINER_FEE_SENTINEL: &str = "miner_fee";

// previous_hash used by the genesis block, since it has no predecessor.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

// Fixed proof recorded on the genesis block.
pub const GENESIS_PROOF: u64 = 1;

// Default bind address for the HTTP facade.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

// Timeout applied to each per-peer RPC made during replace_chain.
pub const PEER_RPC_TIMEOUT: Duration = Duration::from_secs(3);
