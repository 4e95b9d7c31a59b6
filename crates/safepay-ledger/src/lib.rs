//! # safepay-ledger
//!
//! The two capabilities the payment engine is injected with:
//!
//! 1. **Ledger**: moves value between accounts, atomically, never
//!    overdrawing. [`InMemoryLedger`] tracks external deposits and
//!    withdrawals so [`SupplyConservation`] can prove no value is minted.
//! 2. **EventSink**: receives every event the engine emits, in order.
//!    [`EventJournal`] chains them with SHA-256 for an audit trail.

pub mod journal;
pub mod ledger;
pub mod supply_conservation;

pub use journal::{EventJournal, EventSink, JournalEntry};
pub use ledger::{InMemoryLedger, Ledger};
pub use supply_conservation::SupplyConservation;
