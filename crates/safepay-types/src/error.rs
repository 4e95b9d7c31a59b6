//! Error types for SafePay.
//!
//! All errors use the `SP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Payment registry errors
//! - 2xx: Ledger / custody errors
//! - 3xx: Validation (voting) errors
//! - 4xx: Settlement (claim) errors
//! - 9xx: General / internal errors
//!
//! Every error is a rejection of the triggering call: the call had no
//! effect on balances, payment records, or the event stream.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{AccountId, PaymentId, Role};

/// Central error enum for all SafePay operations.
#[derive(Debug, Error)]
pub enum SafepayError {
    // =================================================================
    // Registry Errors (1xx)
    // =================================================================
    /// No payment was ever created with this id.
    #[error("SP_ERR_100: payment id doesn't exist: {0}")]
    PaymentNotFound(PaymentId),

    /// The creation request is malformed (no validators, bad amounts, ...).
    #[error("SP_ERR_101: Invalid payment: {reason}")]
    InvalidPayment { reason: String },

    /// The same validator was listed more than once.
    #[error("SP_ERR_102: Duplicate validator: {0}")]
    DuplicateValidator(AccountId),

    /// The value attached to `create_payment` is not exactly the required total.
    #[error("SP_ERR_103: Attached value mismatch: required {required}, attached {attached}")]
    ValueMismatch { required: Decimal, attached: Decimal },

    // =================================================================
    // Ledger Errors (2xx)
    // =================================================================
    /// The debited account cannot cover the transfer.
    #[error("SP_ERR_200: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    /// Negative (or otherwise unusable) amount handed to the ledger.
    #[error("SP_ERR_201: Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Total supply no longer matches deposits minus withdrawals.
    #[error("SP_ERR_202: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// The escrow account balance disagrees with the registry's bookkeeping.
    #[error("SP_ERR_203: Custody invariant violation: escrow holds {held}, payments owe {owed}")]
    CustodyInvariantViolation { held: Decimal, owed: Decimal },

    /// A payout would take more out of a payment's escrow than it holds.
    #[error("SP_ERR_204: Escrow shortfall on {payment}: need {needed}, escrowed {escrowed}")]
    EscrowShortfall {
        payment: PaymentId,
        needed: Decimal,
        escrowed: Decimal,
    },

    // =================================================================
    // Validation Errors (3xx)
    // =================================================================
    /// The caller does not hold the role the operation requires.
    #[error("SP_ERR_300: {caller} is not the {role} of {payment}")]
    Unauthorized {
        caller: AccountId,
        role: Role,
        payment: PaymentId,
    },

    /// This validator already cast its vote on this payment.
    #[error("SP_ERR_301: {validator} already voted on {payment}")]
    AlreadyVoted {
        validator: AccountId,
        payment: PaymentId,
    },

    /// The payment's outcome is decided; no further votes are accepted.
    #[error("SP_ERR_302: payment was already validated: {0}")]
    AlreadyFinal(PaymentId),

    // =================================================================
    // Settlement Errors (4xx)
    // =================================================================
    /// Claim attempted before the payment reached a decision.
    #[error("SP_ERR_400: payment wasn't validated: {0}")]
    NotFinal(PaymentId),

    /// The principal has already been withdrawn.
    #[error("SP_ERR_401: Payment already claimed: {0}")]
    AlreadyClaimed(PaymentId),

    /// Unearned validation fees were already returned to the issuer.
    #[error("SP_ERR_402: Unused fees already refunded: {0}")]
    FeesAlreadyRefunded(PaymentId),

    /// Every reserved fee was earned by a voting validator.
    #[error("SP_ERR_403: No unused fees to refund: {0}")]
    NothingToRefund(PaymentId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("SP_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("SP_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config document, bad limits, etc.).
    #[error("SP_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SafepayError>;

impl From<serde_json::Error> for SafepayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
