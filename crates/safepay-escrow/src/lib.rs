//! # safepay-escrow
//!
//! The payment lifecycle: an issuer escrows funds for a receiver, named
//! validators attest, and the winning party claims.
//!
//! ## Architecture
//!
//! 1. **PaymentRegistry**: validates requests, assigns ids from 1, stores records
//! 2. **validation**: vote authorization, fee payout bookkeeping, majority finality
//! 3. **settlement**: single-shot principal claim and unused-fee refund
//! 4. **SafePayment**: the call surface, wiring the above to a [`Ledger`]
//!    and an [`EventSink`]
//!
//! ## Payment Flow
//!
//! ```text
//! create_payment ─▶ approve_event / reject_event (× validators) ─▶ final
//!               ─▶ claim_payment ─▶ refund_unused_fees (optional)
//! ```
//!
//! [`Ledger`]: safepay_ledger::Ledger
//! [`EventSink`]: safepay_ledger::EventSink

pub mod engine;
pub mod registry;
pub mod settlement;
pub mod validation;

pub use engine::{CallContext, SafePayment};
pub use registry::{CreatePayment, PaymentRegistry};
pub use settlement::Payout;
