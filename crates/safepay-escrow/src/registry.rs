//! Payment registry: owns every payment record and the id sequence.
//!
//! The registry validates creation requests, hands out sequential ids
//! starting at 1, and answers existence checks. It never moves value:
//! the engine funds custody through the ledger first and only then calls
//! [`PaymentRegistry::register`], so a failed transfer leaves no record.

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use safepay_types::{
    AccountId, EngineConfig, Payment, PaymentId, PaymentStatus, Result, SafepayError,
};

/// A request to escrow a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePayment {
    pub principal: Decimal,
    pub validation_fee: Decimal,
    pub receiver: AccountId,
    pub validators: Vec<AccountId>,
}

impl CreatePayment {
    /// Value the issuer must attach: `principal + validation_fee × |validators|`.
    ///
    /// The total is computed on integer mantissas at a common scale, so it
    /// is either exact or refused. `Decimal` arithmetic would round a
    /// total needing more than 28 significant digits.
    ///
    /// # Errors
    /// Returns `InvalidPayment` if the total cannot be represented exactly.
    pub fn required_value(&self) -> Result<Decimal> {
        let principal = self.principal.normalize();
        let fee = self.validation_fee.normalize();
        let scale = principal.scale().max(fee.scale());

        let total = i128::try_from(self.validators.len())
            .ok()
            .and_then(|n| mantissa_at(fee, scale)?.checked_mul(n))
            .and_then(|fees| fees.checked_add(mantissa_at(principal, scale)?))
            .and_then(|total| exact_decimal(total, scale))
            .ok_or_else(|| invalid("required value cannot be represented exactly"))?;
        Ok(total)
    }
}

/// Mantissa of `value` rescaled to `scale` (`scale >= value.scale()`).
fn mantissa_at(value: Decimal, scale: u32) -> Option<i128> {
    10_i128
        .checked_pow(scale - value.scale())
        .and_then(|factor| value.mantissa().checked_mul(factor))
}

/// `mantissa × 10^-scale` without rounding, dropping trailing zeros first.
fn exact_decimal(mut mantissa: i128, mut scale: u32) -> Option<Decimal> {
    while scale > 0 && mantissa % 10 == 0 {
        mantissa /= 10;
        scale -= 1;
    }
    Decimal::try_from_i128_with_scale(mantissa, scale).ok()
}

/// All payments ever created, indexed by id.
pub struct PaymentRegistry {
    payments: BTreeMap<PaymentId, Payment>,
    /// Id the next successful creation receives.
    next_id: PaymentId,
    max_validators: usize,
    escrow_account: AccountId,
}

impl PaymentRegistry {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            payments: BTreeMap::new(),
            next_id: PaymentId::FIRST,
            max_validators: config.max_validators,
            escrow_account: config.escrow_account,
        }
    }

    /// Check a creation request and return the value it must carry.
    ///
    /// 1. Amounts: `principal > 0`, `validation_fee >= 0`
    /// 2. Validators: non-empty, within the configured limit, no duplicates
    /// 3. Roles: issuer and receiver may not validate their own payment,
    ///    and nobody may use the escrow account
    ///
    /// # Errors
    /// `InvalidPayment` or `DuplicateValidator`.
    pub fn validate(&self, issuer: AccountId, request: &CreatePayment) -> Result<Decimal> {
        if request.principal <= Decimal::ZERO {
            return Err(invalid("principal must be positive"));
        }
        if request.validation_fee.is_sign_negative() {
            return Err(invalid("validation fee must not be negative"));
        }

        if request.validators.is_empty() {
            return Err(invalid("at least one validator is required"));
        }
        if request.validators.len() > self.max_validators {
            return Err(invalid(&format!(
                "{} validators exceeds the limit of {}",
                request.validators.len(),
                self.max_validators
            )));
        }

        let mut seen = HashSet::with_capacity(request.validators.len());
        for validator in &request.validators {
            if !seen.insert(*validator) {
                return Err(SafepayError::DuplicateValidator(*validator));
            }
        }

        if seen.contains(&issuer) {
            return Err(invalid("issuer cannot validate its own payment"));
        }
        if seen.contains(&request.receiver) {
            return Err(invalid("receiver cannot validate its own payment"));
        }
        if issuer == self.escrow_account
            || request.receiver == self.escrow_account
            || seen.contains(&self.escrow_account)
        {
            return Err(invalid("the escrow account cannot take part in a payment"));
        }

        request.required_value()
    }

    /// Store a funded payment under the next id.
    pub fn register(
        &mut self,
        issuer: AccountId,
        request: CreatePayment,
        escrowed: Decimal,
    ) -> PaymentId {
        let id = self.next_id;
        self.next_id = id.next();

        let payment = Payment::new(
            id,
            issuer,
            request.receiver,
            request.principal,
            request.validation_fee,
            request.validators,
            escrowed,
        );
        self.payments.insert(id, payment);
        id
    }

    /// # Errors
    /// `PaymentNotFound` if `id` was never assigned.
    pub fn get(&self, id: PaymentId) -> Result<&Payment> {
        self.payments
            .get(&id)
            .ok_or(SafepayError::PaymentNotFound(id))
    }

    /// # Errors
    /// `PaymentNotFound` if `id` was never assigned.
    pub fn get_mut(&mut self, id: PaymentId) -> Result<&mut Payment> {
        self.payments
            .get_mut(&id)
            .ok_or(SafepayError::PaymentNotFound(id))
    }

    /// # Errors
    /// `PaymentNotFound` if `id` was never assigned.
    pub fn status(&self, id: PaymentId) -> Result<PaymentStatus> {
        self.get(id).map(Payment::status)
    }

    #[must_use]
    pub fn next_id(&self) -> PaymentId {
        self.next_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }

    /// Payments in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    /// Total value the registry says is still in custody.
    #[must_use]
    pub fn outstanding(&self) -> Decimal {
        self.payments.values().map(|p| p.escrowed).sum()
    }
}

fn invalid(reason: &str) -> SafepayError {
    SafepayError::InvalidPayment {
        reason: reason.to_string(),
    }
}
