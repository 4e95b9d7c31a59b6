//! The payment engine facade.
//!
//! [`SafePayment`] is the call surface external callers (RPC handlers,
//! scripts, test harnesses) use. Every state-changing method follows the
//! same shape:
//!
//! 1. Look up the payment and run every precondition check
//! 2. Perform the one ledger transfer the operation needs
//! 3. Mutate the payment record
//! 4. Emit events
//!
//! A failure in 1 or 2 returns before anything is mutated or emitted, so
//! each call is all-or-nothing.

use chrono::Utc;
use rust_decimal::Decimal;
use safepay_ledger::{EventSink, Ledger};
use safepay_types::{
    AccountId, Ballot, EngineConfig, Event, Payment, PaymentId, PaymentStatus, Result,
    SafepayError, Vote,
};

use crate::registry::{CreatePayment, PaymentRegistry};
use crate::{settlement, validation};

/// Who is calling and how much value they attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: AccountId,
    pub value: Decimal,
}

impl CallContext {
    #[must_use]
    pub fn new(caller: AccountId, value: Decimal) -> Self {
        Self { caller, value }
    }
}

/// Escrow payment engine over an injected ledger and event sink.
pub struct SafePayment<L: Ledger, S: EventSink> {
    config: EngineConfig,
    registry: PaymentRegistry,
    ledger: L,
    sink: S,
}

impl<L: Ledger, S: EventSink> SafePayment<L, S> {
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn new(config: EngineConfig, ledger: L, sink: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: PaymentRegistry::new(&config),
            config,
            ledger,
            sink,
        })
    }

    // -----------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------

    /// Escrow `principal + validation_fee × |validators|` from the caller.
    ///
    /// `ctx.value` must equal the required total exactly.
    ///
    /// # Errors
    /// `InvalidPayment`, `DuplicateValidator`, `ValueMismatch`,
    /// `InsufficientFunds`.
    pub fn create_payment(&mut self, ctx: CallContext, request: CreatePayment) -> Result<PaymentId> {
        let required = self.registry.validate(ctx.caller, &request)?;
        if ctx.value != required {
            return Err(SafepayError::ValueMismatch {
                required,
                attached: ctx.value,
            });
        }

        self.ledger
            .transfer(ctx.caller, self.config.escrow_account, required)?;

        let receiver = request.receiver;
        let validators = request.validators.clone();
        let id = self.registry.register(ctx.caller, request, required);

        tracing::info!(
            payment = id.0,
            issuer = %ctx.caller.short(),
            receiver = %receiver.short(),
            validators = validators.len(),
            escrowed = %required,
            "payment created"
        );

        self.sink.emit(Event::PaymentCreated {
            id,
            issuer: ctx.caller,
            receiver,
            validators,
        });
        Ok(id)
    }

    /// The full payment record.
    pub fn get_payment(&self, id: PaymentId) -> Result<&Payment> {
        self.registry.get(id)
    }

    /// `{is_approved, is_rejected, is_final}` for a payment.
    pub fn get_status(&self, id: PaymentId) -> Result<PaymentStatus> {
        self.registry.status(id)
    }

    /// Number of payments created so far.
    #[must_use]
    pub fn payment_count(&self) -> usize {
        self.registry.len()
    }

    /// Id the next successful [`create_payment`](Self::create_payment) receives.
    #[must_use]
    pub fn next_id(&self) -> PaymentId {
        self.registry.next_id()
    }

    // -----------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------

    /// Vote to release the principal to the receiver.
    pub fn approve_event(&mut self, caller: AccountId, id: PaymentId, rate: u64) -> Result<()> {
        self.vote(caller, id, Vote::Approve, rate)
    }

    /// Vote to return the principal to the issuer.
    pub fn reject_event(&mut self, caller: AccountId, id: PaymentId, rate: u64) -> Result<()> {
        self.vote(caller, id, Vote::Reject, rate)
    }

    fn vote(&mut self, caller: AccountId, id: PaymentId, vote: Vote, rate: u64) -> Result<()> {
        let payment = self.registry.get_mut(id)?;
        let fee = validation::authorize_vote(payment, caller).inspect_err(|err| {
            tracing::warn!(payment = id.0, caller = %caller.short(), %err, "vote refused");
        })?;

        self.ledger
            .transfer(self.config.escrow_account, caller, fee)?;

        let ballot = Ballot {
            vote,
            rate,
            cast_at: Utc::now(),
        };
        let decided = validation::record_vote(payment, caller, ballot);

        tracing::debug!(
            payment = id.0,
            validator = %caller.short(),
            %vote,
            rate,
            fee = %fee,
            "vote recorded"
        );
        if let Some(outcome) = decided {
            tracing::info!(
                payment = id.0,
                %outcome,
                approvals = payment.count_votes(Vote::Approve),
                rejections = payment.count_votes(Vote::Reject),
                "payment final"
            );
        }

        self.sink.emit(match vote {
            Vote::Approve => Event::EventApproved {
                id,
                validator: caller,
                rate,
            },
            Vote::Reject => Event::EventRejected {
                id,
                validator: caller,
                rate,
            },
        });
        self.sink.emit(Event::ValueTransferred {
            to: caller,
            amount: fee,
        });
        Ok(())
    }

    // -----------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------

    /// Withdraw the principal of a final payment.
    ///
    /// # Errors
    /// `PaymentNotFound`, `NotFinal`, `Unauthorized`, `AlreadyClaimed`.
    pub fn claim_payment(&mut self, caller: AccountId, id: PaymentId) -> Result<()> {
        let payment = self.registry.get_mut(id)?;
        let payout = settlement::authorize_claim(payment, caller).inspect_err(|err| {
            tracing::warn!(payment = id.0, caller = %caller.short(), %err, "claim refused");
        })?;

        self.ledger
            .transfer(self.config.escrow_account, payout.to, payout.amount)?;
        settlement::apply_claim(payment);

        tracing::info!(
            payment = id.0,
            to = %payout.to.short(),
            amount = %payout.amount,
            "payment claimed"
        );

        self.sink.emit(Event::ValueTransferred {
            to: payout.to,
            amount: payout.amount,
        });
        Ok(())
    }

    /// Return fees reserved for validators that never voted to the issuer.
    /// Returns the refunded amount.
    ///
    /// # Errors
    /// `PaymentNotFound`, `NotFinal`, `Unauthorized`, `FeesAlreadyRefunded`,
    /// `NothingToRefund`.
    pub fn refund_unused_fees(&mut self, caller: AccountId, id: PaymentId) -> Result<Decimal> {
        let payment = self.registry.get_mut(id)?;
        let payout = settlement::authorize_fee_refund(payment, caller).inspect_err(|err| {
            tracing::warn!(payment = id.0, caller = %caller.short(), %err, "fee refund refused");
        })?;

        self.ledger
            .transfer(self.config.escrow_account, payout.to, payout.amount)?;
        settlement::apply_fee_refund(payment, payout.amount);

        tracing::info!(
            payment = id.0,
            amount = %payout.amount,
            "unused validation fees refunded"
        );

        self.sink.emit(Event::ValueTransferred {
            to: payout.to,
            amount: payout.amount,
        });
        Ok(payout.amount)
    }

    /// Check that the escrow account holds exactly what open payments are owed.
    ///
    /// # Errors
    /// `CustodyInvariantViolation` on any mismatch.
    pub fn verify_custody(&self) -> Result<()> {
        let held = self.ledger.balance(self.config.escrow_account);
        let owed = self.registry.outstanding();
        if held != owed {
            tracing::error!(%held, %owed, "custody invariant violated");
            return Err(SafepayError::CustodyInvariantViolation { held, owed });
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &PaymentRegistry {
        &self.registry
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable ledger access, for funding accounts from outside the engine.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Current balance of the escrow account.
    #[must_use]
    pub fn escrow_balance(&self) -> Decimal {
        self.ledger.balance(self.config.escrow_account)
    }
}
