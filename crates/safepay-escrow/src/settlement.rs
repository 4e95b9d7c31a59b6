//! Settlement: releasing escrowed value once a payment is final.
//!
//! Two payouts leave escrow after finality:
//! 1. **Claim**: the principal, exactly once, to the receiver if approved
//!    or to the issuer if rejected.
//! 2. **Unused-fee refund**: fees reserved for validators that never voted
//!    (the payment finalized before they did), once, to the issuer.
//!
//! As with voting, `authorize_*` only inspects and `apply_*` only mutates;
//! the engine moves value through the ledger in between.

use rust_decimal::Decimal;
use safepay_types::{AccountId, Payment, PaymentState, Result, Role, SafepayError};

/// A payout the caller is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub to: AccountId,
    pub amount: Decimal,
}

/// Check that `caller` may claim the principal of `payment`.
///
/// 1. Payment must be final
/// 2. Caller must be the beneficiary (receiver if approved, issuer if rejected)
/// 3. Principal must not have been claimed
///
/// # Errors
/// `NotFinal`, `Unauthorized`, `AlreadyClaimed`, `EscrowShortfall`.
pub fn authorize_claim(payment: &Payment, caller: AccountId) -> Result<Payout> {
    let (beneficiary, role) = payment
        .beneficiary()
        .ok_or(SafepayError::NotFinal(payment.id))?;

    if caller != beneficiary {
        return Err(SafepayError::Unauthorized {
            caller,
            role,
            payment: payment.id,
        });
    }
    if payment.is_claimed {
        return Err(SafepayError::AlreadyClaimed(payment.id));
    }
    ensure_escrow(payment, payment.principal)?;

    Ok(Payout {
        to: caller,
        amount: payment.principal,
    })
}

/// Mark the principal as paid out.
pub fn apply_claim(payment: &mut Payment) {
    debug_assert!(payment.state().can_transition_to(PaymentState::Settled));
    payment.is_claimed = true;
    payment.escrowed -= payment.principal;
}

/// Check that `caller` may recover fees no validator earned.
///
/// # Errors
/// `NotFinal`, `Unauthorized`, `FeesAlreadyRefunded`, `NothingToRefund`,
/// `EscrowShortfall`.
pub fn authorize_fee_refund(payment: &Payment, caller: AccountId) -> Result<Payout> {
    if !payment.is_final() {
        return Err(SafepayError::NotFinal(payment.id));
    }
    if caller != payment.issuer {
        return Err(SafepayError::Unauthorized {
            caller,
            role: Role::Issuer,
            payment: payment.id,
        });
    }
    if payment.fees_refunded {
        return Err(SafepayError::FeesAlreadyRefunded(payment.id));
    }

    let amount = payment.unearned_fees();
    if amount.is_zero() {
        return Err(SafepayError::NothingToRefund(payment.id));
    }
    ensure_escrow(payment, amount)?;

    Ok(Payout { to: caller, amount })
}

/// Mark unearned fees as returned.
pub fn apply_fee_refund(payment: &mut Payment, amount: Decimal) {
    debug_assert!(!payment.fees_refunded);
    payment.fees_refunded = true;
    payment.escrowed -= amount;
}

fn ensure_escrow(payment: &Payment, needed: Decimal) -> Result<()> {
    if payment.escrowed < needed {
        return Err(SafepayError::EscrowShortfall {
            payment: payment.id,
            needed,
            escrowed: payment.escrowed,
        });
    }
    Ok(())
}
