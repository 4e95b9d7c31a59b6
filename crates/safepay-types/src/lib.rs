//! # safepay-types
//!
//! Shared types, errors, and configuration for **SafePay**, a
//! validator-gated escrow payment engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`PaymentId`]
//! - **Payment model**: [`Payment`], [`PaymentState`], [`PaymentStatus`], [`Outcome`]
//! - **Voting model**: [`Vote`], [`Ballot`], [`Role`]
//! - **Events**: [`Event`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`SafepayError`] with `SP_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod payment;

pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use payment::*;

// Constants are accessed via `safepay_types::constants::FOO`.
