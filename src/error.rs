//! error.rs contains the error kinds surfaced by the ledger core.
//!
//! Each variant corresponds to one of the error kinds in the design: malformed
//! or conflicting input is `Validation`, an unknown UTXO reference is
//! `NotFound`, signature/key problems are `Crypto`, a peer chain that fails
//! validation during sync is `Consensus` (handled locally, never surfaced to
//! a caller), and anything else unexpected is `Internal`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("consensus error: {0}")]
    Consensus(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
