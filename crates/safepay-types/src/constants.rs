//! System-wide constants for SafePay.

/// Domain tag from which the default escrow account id is derived.
pub const ESCROW_ACCOUNT_TAG: &[u8] = b"safepay:escrow";

/// Default upper bound on validators per payment.
pub const DEFAULT_MAX_VALIDATORS: usize = 64;
