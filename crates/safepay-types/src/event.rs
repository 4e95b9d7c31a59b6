//! Events emitted by the payment engine.
//!
//! Events are the only externally observable record of what happened;
//! indexers and UIs consume them in emission order. An operation that
//! fails emits nothing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, PaymentId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A payment was funded and registered.
    PaymentCreated {
        id: PaymentId,
        issuer: AccountId,
        receiver: AccountId,
        validators: Vec<AccountId>,
    },
    /// A validator voted to approve.
    EventApproved {
        id: PaymentId,
        validator: AccountId,
        rate: u64,
    },
    /// A validator voted to reject.
    EventRejected {
        id: PaymentId,
        validator: AccountId,
        rate: u64,
    },
    /// Value left escrow.
    ValueTransferred { to: AccountId, amount: Decimal },
}

impl Event {
    /// Stable name used in logs and journal entries.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PaymentCreated { .. } => "PaymentCreated",
            Self::EventApproved { .. } => "EventApproved",
            Self::EventRejected { .. } => "EventRejected",
            Self::ValueTransferred { .. } => "ValueTransferred",
        }
    }

    /// The payment this event belongs to. Transfers carry no payment id.
    #[must_use]
    pub fn payment_id(&self) -> Option<PaymentId> {
        match self {
            Self::PaymentCreated { id, .. }
            | Self::EventApproved { id, .. }
            | Self::EventRejected { id, .. } => Some(*id),
            Self::ValueTransferred { .. } => None,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaymentCreated {
                id,
                issuer,
                receiver,
                validators,
            } => write!(
                f,
                "PaymentCreated({id}, issuer={issuer}, receiver={receiver}, validators={})",
                validators.len()
            ),
            Self::EventApproved {
                id,
                validator,
                rate,
            } => write!(f, "EventApproved({id}, validator={validator}, rate={rate})"),
            Self::EventRejected {
                id,
                validator,
                rate,
            } => write!(f, "EventRejected({id}, validator={validator}, rate={rate})"),
            Self::ValueTransferred { to, amount } => {
                write!(f, "ValueTransferred(to={to}, amount={amount})")
            }
        }
    }
}
