/**
 * @notice utxo.rs implements the UTXO (Unspent Transaction Output) model.
 * @dev Grounded on the teacher's modules/utxo.rs BTreeMap-backed UTXO set, adapted to the spec's
 * composite string key ("{tx_id}:{output_index}") and owner_address scheme in place of raw public
 * key bytes, and without the teacher's recipient_index cache (balance_of is a linear scan here,
 * matching original_source's Blockchain.get_balance, since this ledger targets a single in-memory
 * node rather than a high-throughput index).
 */

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::constants::MINER_FEE_SENTINEL;

/// An unspent (or spent) transaction output, uniquely identified once bound by `(tx_id, output_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utxo {
    pub amount: Amount,
    pub owner_address: String,
    pub tx_id: String,
    pub output_index: u32,
    pub spent: bool,
}

impl Utxo {
    /// Construct a freshly-minted, unbound output. `tx_id` is set once the producing transaction's
    /// id is known (see `Transaction::bind_outputs`).
    pub fn new_output(amount: Amount, owner_address: impl Into<String>) -> Self {
        Utxo {
            amount,
            owner_address: owner_address.into(),
            tx_id: String::new(),
            output_index: 0,
            spent: false,
        }
    }

    pub fn composite_key(tx_id: &str, output_index: u32) -> String {
        format!("{}:{}", tx_id, output_index)
    }

    pub fn key(&self) -> String {
        Self::composite_key(&self.tx_id, self.output_index)
    }

    pub fn is_miner_fee_placeholder(&self) -> bool {
        self.owner_address == MINER_FEE_SENTINEL
    }
}

/// Mapping from composite UTXO id to its record. Owned exclusively by the `Ledger`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtxoIndex {
    entries: BTreeMap<String, Utxo>,
}

impl UtxoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a UTXO under its composite key. Overwrite is permitted only because
    /// chain resync (`Ledger::replace_chain`) legitimately re-binds the same key when replaying
    /// the adopted chain from scratch.
    pub fn add(&mut self, utxo: Utxo) {
        debug_assert!(
            !utxo.is_miner_fee_placeholder(),
            "miner_fee placeholder outputs must never enter the UtxoIndex"
        );
        self.entries.insert(utxo.key(), utxo);
    }

    /// Marks the referenced entry spent. Returns whether an entry existed to mark.
    pub fn mark_spent(&mut self, tx_id: &str, output_index: u32) -> bool {
        match self.entries.get_mut(&Utxo::composite_key(tx_id, output_index)) {
            Some(entry) => {
                entry.spent = true;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, tx_id: &str, output_index: u32) -> Option<&Utxo> {
        self.entries.get(&Utxo::composite_key(tx_id, output_index))
    }

    pub fn contains_unspent(&self, tx_id: &str, output_index: u32) -> bool {
        matches!(self.get(tx_id, output_index), Some(u) if !u.spent)
    }

    pub fn balance_of(&self, address: &str) -> Amount {
        Amount::sum(
            self.entries
                .values()
                .filter(|u| u.owner_address == address && !u.spent)
                .map(|u| u.amount),
        )
        .unwrap_or(Amount::ZERO)
    }

    /// Used only during chain adoption (`Ledger::replace_chain`) to rebuild from scratch.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(amount: u64, owner: &str, tx_id: &str, idx: u32) -> Utxo {
        let mut u = Utxo::new_output(Amount::from_major(amount), owner);
        u.tx_id = tx_id.to_string();
        u.output_index = idx;
        u
    }

    #[test]
    fn add_and_get() {
        let mut index = UtxoIndex::new();
        index.add(bound(10, "alice", "tx1", 0));
        let got = index.get("tx1", 0).unwrap();
        assert_eq!(got.amount, Amount::from_major(10));
        assert!(!got.spent);
    }

    #[test]
    fn mark_spent_missing_returns_false() {
        let mut index = UtxoIndex::new();
        assert!(!index.mark_spent("nope", 0));
    }

    #[test]
    fn mark_spent_existing_returns_true_and_flips_flag() {
        let mut index = UtxoIndex::new();
        index.add(bound(1, "bob", "tx1", 0));
        assert!(index.mark_spent("tx1", 0));
        assert!(index.get("tx1", 0).unwrap().spent);
    }

    #[test]
    fn balance_of_sums_only_unspent_entries_for_address() {
        let mut index = UtxoIndex::new();
        index.add(bound(10, "alice", "tx1", 0));
        index.add(bound(5, "alice", "tx2", 0));
        index.add(bound(100, "bob", "tx3", 0));
        index.mark_spent("tx2", 0);
        assert_eq!(index.balance_of("alice"), Amount::from_major(10));
        assert_eq!(index.balance_of("bob"), Amount::from_major(100));
        assert_eq!(index.balance_of("carol"), Amount::ZERO);
    }

    #[test]
    fn contains_unspent_false_once_spent() {
        let mut index = UtxoIndex::new();
        index.add(bound(1, "alice", "tx1", 0));
        assert!(index.contains_unspent("tx1", 0));
        index.mark_spent("tx1", 0);
        assert!(!index.contains_unspent("tx1", 0));
    }
}
