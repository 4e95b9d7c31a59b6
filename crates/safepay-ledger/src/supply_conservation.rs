//! Supply conservation invariant checker.
//!
//! ```text
//! Σ(balances) == Σ(deposits) - Σ(withdrawals)
//! ```
//!
//! Transfers between accounts (including into and out of escrow) must
//! leave total supply untouched. If this breaks, value was minted or
//! burned by a bug.

use rust_decimal::Decimal;
use safepay_types::{Result, SafepayError};

/// Running totals of value entering and leaving the ledger.
pub struct SupplyConservation {
    deposits: Decimal,
    withdrawals: Decimal,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self {
            deposits: Decimal::ZERO,
            withdrawals: Decimal::ZERO,
        }
    }

    pub fn record_deposit(&mut self, amount: Decimal) {
        self.deposits += amount;
    }

    pub fn record_withdrawal(&mut self, amount: Decimal) {
        self.withdrawals += amount;
    }

    /// Expected total supply: deposits - withdrawals.
    #[must_use]
    pub fn expected_supply(&self) -> Decimal {
        self.deposits - self.withdrawals
    }

    /// Verify that the actual supply matches the expected supply.
    ///
    /// # Errors
    /// Returns [`SafepayError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply();
        if actual_supply != expected {
            return Err(SafepayError::SupplyInvariantViolation {
                reason: format!(
                    "actual supply {actual_supply} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.deposits, self.withdrawals,
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn total_deposits(&self) -> Decimal {
        self.deposits
    }

    #[must_use]
    pub fn total_withdrawals(&self) -> Decimal {
        self.withdrawals
    }
}

impl Default for SupplyConservation {
    fn default() -> Self {
        Self::new()
    }
}
