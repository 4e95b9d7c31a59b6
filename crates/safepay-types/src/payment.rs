//! # Payment: the escrowed, validator-gated transfer
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐ majority approve ┌──────────┐  receiver claims
//!   │ PENDING ├─────────────────▶│ APPROVED ├──────────────────┐
//!   └────┬────┘                  └──────────┘                  ▼
//!        │ majority reject       ┌──────────┐  issuer claims ┌─────────┐
//!        └──────────────────────▶│ REJECTED ├───────────────▶│ SETTLED │
//!                                └──────────┘                └─────────┘
//! ```
//!
//! `APPROVED` and `REJECTED` are final: the outcome never changes again.
//! `SETTLED` only records that the principal left escrow; the outcome
//! stays readable through [`Payment::outcome`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, PaymentId, Result, SafepayError};

/// Direction of a validator's attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    Approve,
    Reject,
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "APPROVE"),
            Self::Reject => write!(f, "REJECT"),
        }
    }
}

/// The decided outcome of a final payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Principal goes to the receiver.
    Approved,
    /// Principal goes back to the issuer.
    Rejected,
}

impl From<Vote> for Outcome {
    fn from(vote: Vote) -> Self {
        match vote {
            Vote::Approve => Self::Approved,
            Vote::Reject => Self::Rejected,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// The role an operation requires of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Issuer,
    Receiver,
    Validator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issuer => write!(f, "issuer"),
            Self::Receiver => write!(f, "receiver"),
            Self::Validator => write!(f, "validator"),
        }
    }
}

/// One validator's recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub vote: Vote,
    /// Confidence rate declared by the validator alongside the vote.
    pub rate: u64,
    pub cast_at: DateTime<Utc>,
}

/// Lifecycle state, derived from the payment's outcome and claim flag.
///
/// Transitions are **monotonic**:
/// - `Pending → Approved | Rejected` (decisive vote)
/// - `Approved | Rejected → Settled` (claim)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentState {
    Pending,
    Approved,
    Rejected,
    Settled,
}

impl PaymentState {
    /// Can a payment in this state move to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Approved | Self::Rejected)
                | (Self::Approved | Self::Rejected, Self::Settled)
        )
    }
}

impl From<Outcome> for PaymentState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Approved => Self::Approved,
            Outcome::Rejected => Self::Rejected,
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Settled => write!(f, "SETTLED"),
        }
    }
}

/// Read-only decision flags returned by `get_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub is_approved: bool,
    pub is_rejected: bool,
    pub is_final: bool,
}

/// A payment held in escrow until its validators decide.
///
/// Deserialization goes through `PaymentRecord` so the membership index
/// is always rebuilt and the validator list re-checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PaymentRecord")]
pub struct Payment {
    pub id: PaymentId,
    /// The account that funded the payment.
    pub issuer: AccountId,
    /// The account paid on approval.
    pub receiver: AccountId,
    /// Amount released to the winning party on claim.
    pub principal: Decimal,
    /// Amount paid to each validator when it votes.
    pub validation_fee: Decimal,
    /// Validators in the order the issuer listed them.
    pub validators: Vec<AccountId>,
    /// Membership index over `validators`.
    #[serde(skip)]
    validator_set: HashSet<AccountId>,
    /// Votes cast so far, keyed by validator.
    pub votes: BTreeMap<AccountId, Ballot>,
    /// `None` while pending.
    pub outcome: Option<Outcome>,
    /// Principal has been withdrawn.
    pub is_claimed: bool,
    /// Fees of validators that never voted have been returned.
    pub fees_refunded: bool,
    /// Value still held in custody on behalf of this payment.
    pub escrowed: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Build a freshly funded payment with no votes.
    ///
    /// The caller is responsible for having validated the validator list
    /// (non-empty, no duplicates) and the amounts.
    #[must_use]
    pub fn new(
        id: PaymentId,
        issuer: AccountId,
        receiver: AccountId,
        principal: Decimal,
        validation_fee: Decimal,
        validators: Vec<AccountId>,
        escrowed: Decimal,
    ) -> Self {
        let validator_set = validators.iter().copied().collect();
        Self {
            id,
            issuer,
            receiver,
            principal,
            validation_fee,
            validators,
            validator_set,
            votes: BTreeMap::new(),
            outcome: None,
            is_claimed: false,
            fees_refunded: false,
            escrowed,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_validator(&self, account: &AccountId) -> bool {
        self.validator_set.contains(account)
    }

    #[must_use]
    pub fn has_voted(&self, account: &AccountId) -> bool {
        self.votes.contains_key(account)
    }

    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.outcome == Some(Outcome::Approved)
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.outcome == Some(Outcome::Rejected)
    }

    #[must_use]
    pub fn is_final(&self) -> bool {
        self.outcome.is_some()
    }

    #[must_use]
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus {
            is_approved: self.is_approved(),
            is_rejected: self.is_rejected(),
            is_final: self.is_final(),
        }
    }

    #[must_use]
    pub fn state(&self) -> PaymentState {
        match (self.outcome, self.is_claimed) {
            (None, _) => PaymentState::Pending,
            (Some(_), true) => PaymentState::Settled,
            (Some(Outcome::Approved), false) => PaymentState::Approved,
            (Some(Outcome::Rejected), false) => PaymentState::Rejected,
        }
    }

    /// The party entitled to the principal, once final.
    #[must_use]
    pub fn beneficiary(&self) -> Option<(AccountId, Role)> {
        match self.outcome? {
            Outcome::Approved => Some((self.receiver, Role::Receiver)),
            Outcome::Rejected => Some((self.issuer, Role::Issuer)),
        }
    }

    /// Number of votes cast in the given direction.
    #[must_use]
    pub fn count_votes(&self, vote: Vote) -> usize {
        self.votes.values().filter(|b| b.vote == vote).count()
    }

    /// Fees reserved for validators that have not voted.
    #[must_use]
    pub fn unearned_fees(&self) -> Decimal {
        let silent = self.validators.len() - self.votes.len();
        self.validation_fee * Decimal::from(silent)
    }
}

/// Wire shape of a [`Payment`], without the derived membership index.
#[derive(Deserialize)]
struct PaymentRecord {
    id: PaymentId,
    issuer: AccountId,
    receiver: AccountId,
    principal: Decimal,
    validation_fee: Decimal,
    validators: Vec<AccountId>,
    votes: BTreeMap<AccountId, Ballot>,
    outcome: Option<Outcome>,
    is_claimed: bool,
    fees_refunded: bool,
    escrowed: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRecord> for Payment {
    type Error = SafepayError;

    fn try_from(record: PaymentRecord) -> Result<Self> {
        if record.validators.is_empty() {
            return Err(invalid_record(record.id, "no validators"));
        }
        let mut validator_set = HashSet::with_capacity(record.validators.len());
        for validator in &record.validators {
            if !validator_set.insert(*validator) {
                return Err(SafepayError::DuplicateValidator(*validator));
            }
        }
        if record.votes.keys().any(|voter| !validator_set.contains(voter)) {
            return Err(invalid_record(record.id, "vote from a non-validator"));
        }

        Ok(Self {
            id: record.id,
            issuer: record.issuer,
            receiver: record.receiver,
            principal: record.principal,
            validation_fee: record.validation_fee,
            validators: record.validators,
            validator_set,
            votes: record.votes,
            outcome: record.outcome,
            is_claimed: record.is_claimed,
            fees_refunded: record.fees_refunded,
            escrowed: record.escrowed,
            created_at: record.created_at,
        })
    }
}

fn invalid_record(id: PaymentId, reason: &str) -> SafepayError {
    SafepayError::InvalidPayment {
        reason: format!("{id}: {reason}"),
    }
}

/// Test fixture. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Payment {
    /// A funded pending payment with the given parties and
    /// `principal = 1`, `validation_fee = 0.01`.
    pub fn dummy(issuer: AccountId, receiver: AccountId, validators: Vec<AccountId>) -> Self {
        let principal = Decimal::ONE;
        let fee = Decimal::new(1, 2);
        let escrowed = principal + fee * Decimal::from(validators.len());
        Self::new(
            PaymentId::FIRST,
            issuer,
            receiver,
            principal,
            fee,
            validators,
            escrowed,
        )
    }
}
