//! Validation engine: validator votes and the finality rule.
//!
//! ## Decision rule
//!
//! With `n` validators, a payment becomes final the first time either
//! approvals or rejections reach `⌊n/2⌋ + 1` votes. A single validator's
//! vote is therefore decisive on its own. Once final, every further vote
//! is refused with `AlreadyFinal`.
//!
//! If every validator has voted and neither side reached the threshold
//! (only possible with an even split), the payment is finalized as
//! rejected so the issuer can recover the principal instead of leaving it
//! locked forever.
//!
//! Checks ([`authorize_vote`]) and mutation ([`record_vote`]) are split so
//! the engine can run the fee transfer in between and abort cleanly.

use rust_decimal::Decimal;
use safepay_types::{
    AccountId, Ballot, Outcome, Payment, Result, Role, SafepayError, Vote,
};

/// Votes in one direction needed to finalize a payment with `validators` voters.
#[must_use]
pub fn majority_threshold(validators: usize) -> usize {
    validators / 2 + 1
}

/// Check that `caller` may vote on `payment` right now and that escrow
/// still covers the fee. Returns the fee to pay out.
///
/// Order of checks: validator membership, finality, replay, escrow.
///
/// # Errors
/// `Unauthorized`, `AlreadyFinal`, `AlreadyVoted`, `EscrowShortfall`.
pub fn authorize_vote(payment: &Payment, caller: AccountId) -> Result<Decimal> {
    if !payment.is_validator(&caller) {
        return Err(SafepayError::Unauthorized {
            caller,
            role: Role::Validator,
            payment: payment.id,
        });
    }
    if payment.is_final() {
        return Err(SafepayError::AlreadyFinal(payment.id));
    }
    if payment.has_voted(&caller) {
        return Err(SafepayError::AlreadyVoted {
            validator: caller,
            payment: payment.id,
        });
    }
    if payment.escrowed < payment.validation_fee {
        return Err(SafepayError::EscrowShortfall {
            payment: payment.id,
            needed: payment.validation_fee,
            escrowed: payment.escrowed,
        });
    }
    Ok(payment.validation_fee)
}

/// Record an authorized ballot, debit the fee from the payment's escrow,
/// and finalize if the vote was decisive.
///
/// Returns the outcome if this vote finalized the payment.
pub fn record_vote(payment: &mut Payment, validator: AccountId, ballot: Ballot) -> Option<Outcome> {
    debug_assert!(payment.is_validator(&validator) && !payment.is_final());

    payment.votes.insert(validator, ballot);
    payment.escrowed -= payment.validation_fee;

    let outcome = decide(payment);
    if let Some(decided) = outcome {
        debug_assert!(payment.state().can_transition_to(decided.into()));
        payment.outcome = outcome;
    }
    outcome
}

/// Outcome implied by the votes cast so far, if any.
#[must_use]
pub fn decide(payment: &Payment) -> Option<Outcome> {
    let threshold = majority_threshold(payment.validators.len());
    let approvals = payment.count_votes(Vote::Approve);
    let rejections = payment.count_votes(Vote::Reject);

    if approvals >= threshold {
        Some(Outcome::Approved)
    } else if rejections >= threshold {
        Some(Outcome::Rejected)
    } else if payment.votes.len() == payment.validators.len() {
        // Even split with everyone voted.
        Some(Outcome::Rejected)
    } else {
        None
    }
}
