/**
 * @notice amount.rs contains the fixed-point money representation used throughout the ledger.
 * @dev Amounts are stored as an integer count of minor units (AMOUNT_SCALE minor units per major
 * unit), so that balance and fee arithmetic never touches floating point. This resolves the Amount
 * representation Open Question: the reference implementation this node is based on used floats,
 * which makes fee/balance arithmetic inexact; fixed-point integers make it exact.
 */

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::AMOUNT_SCALE;

/// A non-negative quantity of value, represented as an integer count of minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Construct an amount directly from a count of minor units.
    pub fn from_minor(minor: u64) -> Self {
        Amount(minor)
    }

    /// Construct an amount from a whole number of major units.
    pub fn from_major(major: u64) -> Self {
        Amount(major.saturating_mul(AMOUNT_SCALE))
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(a))
    }
}

/// Displays as a decimal major-unit string with trailing zeros trimmed, e.g. `100`, `0.5`,
/// `1.00000001`. Used both for human-facing JSON and for the canonical signing message.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.0 / AMOUNT_SCALE;
        let minor = self.0 % AMOUNT_SCALE;
        if minor == 0 {
            write!(f, "{}", major)
        } else {
            let frac = format!("{:08}", minor);
            let frac = frac.trim_end_matches('0');
            write!(f, "{}.{}", major, frac)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AmountParseError {
    #[error("invalid amount string: {0}")]
    Invalid(String),
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, '.');
        let major_str = parts.next().unwrap_or("0");
        let major: u64 = major_str
            .parse()
            .map_err(|_| AmountParseError::Invalid(s.to_string()))?;
        let minor = match parts.next() {
            None => 0,
            Some(frac) => {
                if frac.len() > 8 || !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(AmountParseError::Invalid(s.to_string()));
                }
                let padded = format!("{:0<8}", frac);
                padded
                    .parse::<u64>()
                    .map_err(|_| AmountParseError::Invalid(s.to_string()))?
            }
        };
        Ok(Amount(major * AMOUNT_SCALE + minor))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let minor = u64::deserialize(deserializer)?;
        Ok(Amount(minor))
    }
}
