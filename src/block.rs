/**
 * @notice block.rs contains the Block struct linked into the chain.
 * @dev Construction is pure: given (index, proof, previous_hash, transactions), block_size is
 * derived by summation. Canonical hashing is delegated to hashing::hash_canonical, which
 * serializes with lexicographically sorted keys so chain linkage and proof-of-work validation
 * see the same bytes regardless of field insertion order.
 */

use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::hashing::hash_canonical;
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub proof: u64,
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
    pub block_size: usize,
}

impl Block {
    pub fn new(index: u64, proof: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        let block_size = transactions.iter().map(|tx| tx.size).sum();
        Block {
            index,
            timestamp: crate::transaction::now_unix(),
            proof,
            previous_hash,
            transactions,
            block_size,
        }
    }

    /// Hex-encoded SHA-256 of this block's canonical (sorted-key) JSON form, used as the
    /// `previous_hash` of the block that follows it.
    pub fn canonical_hash(&self) -> LedgerResult<String> {
        hash_canonical(self)
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1 && self.previous_hash == crate::constants::GENESIS_PREVIOUS_HASH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::constants::{GENESIS_ADDRESS, GENESIS_PREVIOUS_HASH, GENESIS_PROOF};

    #[test]
    fn block_size_sums_transaction_sizes() {
        let tx = Transaction::genesis(Amount::from_major(1_000_000), GENESIS_ADDRESS);
        let size = tx.size;
        let block = Block::new(1, GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string(), vec![tx]);
        assert_eq!(block.block_size, size);
    }

    #[test]
    fn canonical_hash_is_deterministic() {
        let tx = Transaction::genesis(Amount::from_major(1_000_000), GENESIS_ADDRESS);
        let block = Block::new(1, GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string(), vec![tx]);
        assert_eq!(block.canonical_hash().unwrap(), block.canonical_hash().unwrap());
    }

    #[test]
    fn genesis_block_is_recognized() {
        let tx = Transaction::genesis(Amount::from_major(1_000_000), GENESIS_ADDRESS);
        let block = Block::new(1, GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string(), vec![tx]);
        assert!(block.is_genesis());
    }
}
