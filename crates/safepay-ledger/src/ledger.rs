//! Value custody.
//!
//! The payment engine never touches balances directly: it asks a
//! [`Ledger`] to move value from one account to another. Production
//! deployments back this with whatever monetary system they settle on;
//! [`InMemoryLedger`] is the reference implementation used by tests and
//! simulations.

use std::collections::HashMap;

use rust_decimal::Decimal;
use safepay_types::{AccountId, Result, SafepayError};

use crate::supply_conservation::SupplyConservation;

/// Abstract value-transfer primitive.
///
/// `transfer` is atomic: it either debits `from` and credits `to` by
/// exactly `amount`, or fails and changes nothing. It never overdraws.
pub trait Ledger {
    /// Current balance of `account` (zero if never seen).
    fn balance(&self, account: AccountId) -> Decimal;

    /// Move `amount` from `from` to `to`.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount` is negative
    /// - `InsufficientFunds` if `from` cannot cover `amount`
    fn transfer(&mut self, from: AccountId, to: AccountId, amount: Decimal) -> Result<()>;
}

/// Single-unit in-memory ledger.
///
/// External value enters through [`deposit`](Self::deposit) and leaves
/// through [`withdraw`](Self::withdraw); both are recorded so that
/// [`verify_supply`](Self::verify_supply) can prove transfers neither
/// mint nor burn value.
pub struct InMemoryLedger {
    balances: HashMap<AccountId, Decimal>,
    supply: SupplyConservation,
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
            supply: SupplyConservation::new(),
        }
    }

    /// Credit value arriving from outside the ledger.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if `amount` is negative.
    pub fn deposit(&mut self, account: AccountId, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(SafepayError::InvalidAmount(amount));
        }
        *self.balances.entry(account).or_insert(Decimal::ZERO) += amount;
        self.supply.record_deposit(amount);
        Ok(())
    }

    /// Debit value leaving the ledger.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount` is negative
    /// - `InsufficientFunds` if the balance is too low
    pub fn withdraw(&mut self, account: AccountId, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(SafepayError::InvalidAmount(amount));
        }
        let available = self.balance(account);
        if available < amount {
            return Err(SafepayError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        *self.balances.entry(account).or_insert(Decimal::ZERO) -= amount;
        self.supply.record_withdrawal(amount);
        Ok(())
    }

    /// Sum of all balances.
    #[must_use]
    pub fn total_supply(&self) -> Decimal {
        self.balances.values().copied().sum()
    }

    /// Check that total supply equals deposits minus withdrawals.
    pub fn verify_supply(&self) -> Result<()> {
        self.supply.verify(self.total_supply())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for InMemoryLedger {
    fn balance(&self, account: AccountId) -> Decimal {
        self.balances.get(&account).copied().unwrap_or(Decimal::ZERO)
    }

    fn transfer(&mut self, from: AccountId, to: AccountId, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(SafepayError::InvalidAmount(amount));
        }

        let available = self.balance(from);
        if available < amount {
            return Err(SafepayError::InsufficientFunds {
                needed: amount,
                available,
            });
        }

        // Debit first: a self-transfer nets to zero.
        *self.balances.entry(from).or_insert(Decimal::ZERO) -= amount;
        *self.balances.entry(to).or_insert(Decimal::ZERO) += amount;

        tracing::debug!(
            from = %from.short(),
            to = %to.short(),
            %amount,
            "ledger transfer"
        );
        Ok(())
    }
}
