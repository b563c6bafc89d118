//! Fixed-precision money amounts
//!
//! Event payloads carry `Money`: a non-negative decimal with at most two
//! decimal places. The sign of a balance change is implied by the event
//! variant (`Credited` vs `Debited`), never stored on the amount itself.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{LedgerError, LedgerResult};

/// A validated, non-negative monetary amount with two decimal places
///
/// Construction is the only place the invariants are checked; once built,
/// a `Money` value is always well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// Create a validated amount
    ///
    /// Rejects negative amounts and amounts with more than two decimal
    /// places. Zero is representable here; command-level validation decides
    /// whether zero is acceptable for a given operation.
    pub fn new(amount: Decimal) -> LedgerResult<Self> {
        if amount.is_sign_negative() {
            return Err(LedgerError::InvalidAmount(format!(
                "amount cannot be negative: {amount}"
            )));
        }
        if amount.scale() > 2 {
            return Err(LedgerError::InvalidAmount(format!(
                "amount can have at most 2 decimal places: {amount}"
            )));
        }

        // Normalize to two decimal places so formatting is stable
        let mut normalized = amount;
        normalized.rescale(2);
        Ok(Self(normalized))
    }

    /// The underlying decimal value
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is exactly zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
