/**
 * @notice mempool.rs holds admitted-but-unconfirmed transactions in admission order.
 * @dev Grounded on original_source/src/models/Blockchain.py's `self.mempool: List[Transaction]`
 * and the teacher's BlockChain pending-queue idiom (modules/blockchain.rs), simplified to a plain
 * `Vec` since ordering here is the only structural requirement (spec §4.4).
 */

use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mempool {
    entries: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tx: Transaction) {
        self.entries.push(tx);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_signature(&self, signature: &[u8]) -> bool {
        self.entries
            .iter()
            .any(|tx| tx.signature.as_deref() == Some(signature))
    }

    /// True if any entry already references `(tx_id, output_index)` as an input — the
    /// intra-mempool double-spend guard (spec §4.4).
    pub fn references_input(&self, tx_id: &str, output_index: u32) -> bool {
        self.entries.iter().any(|tx| {
            tx.inputs
                .iter()
                .any(|input| input.tx_id == tx_id && input.output_index == output_index)
        })
    }

    /// Removes `tx_id` from the pool, if present.
    pub fn remove(&mut self, tx_id: &str) {
        self.entries.retain(|tx| tx.tx_id != tx_id);
    }

    /// Transactions ordered by `fee` descending, ties broken by original admission order
    /// (a stable sort, per spec §4.6 step 3).
    pub fn by_fee_descending(&self) -> Vec<Transaction> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.fee.cmp(&a.fee));
        sorted
    }

    /// Replaces the pool's contents, used by `Ledger::sync_mempool` during chain adoption.
    pub fn retain_valid<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Transaction) -> bool,
    {
        self.entries.retain(|tx| keep(tx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::utxo::Utxo;

    fn tx_with_fee(fee: i128, sig: u8) -> Transaction {
        let mut tx = Transaction::new();
        tx.fee = fee;
        tx.signature = Some(vec![sig]);
        tx.tx_id = format!("tx-{sig}");
        tx
    }

    #[test]
    fn insert_preserves_admission_order_for_ties() {
        let mut pool = Mempool::new();
        pool.insert(tx_with_fee(5, 1));
        pool.insert(tx_with_fee(5, 2));
        let sorted = pool.by_fee_descending();
        assert_eq!(sorted[0].tx_id, "tx-1");
        assert_eq!(sorted[1].tx_id, "tx-2");
    }

    #[test]
    fn by_fee_descending_sorts_highest_first() {
        let mut pool = Mempool::new();
        pool.insert(tx_with_fee(1, 1));
        pool.insert(tx_with_fee(9, 2));
        pool.insert(tx_with_fee(5, 3));
        let sorted = pool.by_fee_descending();
        assert_eq!(sorted.iter().map(|t| t.fee).collect::<Vec<_>>(), vec![9, 5, 1]);
    }

    #[test]
    fn contains_signature_detects_duplicate() {
        let mut pool = Mempool::new();
        pool.insert(tx_with_fee(1, 42));
        assert!(pool.contains_signature(&[42]));
        assert!(!pool.contains_signature(&[43]));
    }

    #[test]
    fn references_input_detects_collision() {
        let mut tx = Transaction::new();
        let mut input = Utxo::new_output(Amount::from_major(1), "alice");
        input.tx_id = "prev".into();
        input.output_index = 0;
        tx.inputs.push(input);

        let mut pool = Mempool::new();
        pool.insert(tx);
        assert!(pool.references_input("prev", 0));
        assert!(!pool.references_input("prev", 1));
    }

    #[test]
    fn remove_drops_matching_tx_id() {
        let mut pool = Mempool::new();
        pool.insert(tx_with_fee(1, 1));
        pool.remove("tx-1");
        assert!(pool.is_empty());
    }
}
