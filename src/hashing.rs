/**
 * @notice hashing.rs centralizes the ledger's hash discipline: canonical JSON hashing (used for
 * block linkage and proof-of-work) and Base58Check address derivation from a public key (spec
 * §4.2), shared by transaction.rs, block.rs, and wallet.rs.
 * @dev Canonical JSON here means "UTF-8 JSON with lexicographically sorted object keys". serde_json
 * serializes `Value::Object` as a BTreeMap by default (the `preserve_order` feature is not enabled
 * in this crate), so `serde_json::to_value` followed by `serde_json::to_string` already yields keys
 * in sorted order without any extra sorting pass.
 */

use ripemd::Ripemd160;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

/// Hex-encoded SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Raw SHA-256 digest of `bytes`.
pub fn sha256_raw(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Serializes `value` to canonical (sorted-key) JSON.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, LedgerError> {
    let as_value = serde_json::to_value(value)
        .map_err(|e| LedgerError::Internal(format!("serialization failed: {e}")))?;
    serde_json::to_string(&as_value)
        .map_err(|e| LedgerError::Internal(format!("serialization failed: {e}")))
}

/// Hex-encoded SHA-256 digest of `value`'s canonical JSON form.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<String, LedgerError> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// Derives a Base58Check address from an uncompressed public key:
/// SHA-256 -> RIPEMD-160 -> version byte 0x00 -> 4-byte checksum (first 4 bytes of
/// double-SHA-256 of version+hash) -> Base58 encode.
pub fn derive_address(uncompressed_pubkey: &[u8]) -> String {
    let sha256_hash = sha256_raw(uncompressed_pubkey);

    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256_hash);
    let ripemd_hash = ripemd.finalize();

    let mut versioned = Vec::with_capacity(21);
    versioned.push(0x00u8);
    versioned.extend_from_slice(&ripemd_hash);

    let checksum_full = sha256_raw(&sha256_raw(&versioned));
    let checksum = &checksum_full[0..4];

    let mut binary_address = versioned;
    binary_address.extend_from_slice(checksum);

    bs58::encode(binary_address).into_string()
}
