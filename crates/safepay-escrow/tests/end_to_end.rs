//! End-to-end lifecycle tests: create → vote → finalize → claim.
//!
//! Every scenario runs against the in-memory ledger and the hash-chained
//! journal, and checks after each step that value is neither created nor
//! lost: ledger supply is conserved and the escrow account holds exactly
//! what open payments are owed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use safepay_escrow::validation::majority_threshold;
use safepay_escrow::{CallContext, CreatePayment, SafePayment};
use safepay_ledger::{EventJournal, InMemoryLedger, Ledger};
use safepay_types::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ether(n: i64, scale: u32) -> Decimal {
    Decimal::new(n, scale)
}

/// Helper: one engine plus the usual cast of accounts.
struct Harness {
    engine: SafePayment<InMemoryLedger, EventJournal>,
    issuer: AccountId,
    receiver: AccountId,
    validator: AccountId,
    outsider: AccountId,
}

impl Harness {
    fn new() -> Self {
        init_tracing();
        let issuer = AccountId::new();
        let mut ledger = InMemoryLedger::new();
        ledger.deposit(issuer, ether(100, 0)).expect("deposit");
        Self {
            engine: SafePayment::new(EngineConfig::default(), ledger, EventJournal::new())
                .expect("default config is valid"),
            issuer,
            receiver: AccountId::new(),
            validator: AccountId::new(),
            outsider: AccountId::new(),
        }
    }

    /// principal = 1.0, fee = 0.01, one validator.
    fn create(&mut self) -> PaymentId {
        let request = CreatePayment {
            principal: ether(1, 0),
            validation_fee: ether(1, 2),
            receiver: self.receiver,
            validators: vec![self.validator],
        };
        self.engine
            .create_payment(CallContext::new(self.issuer, ether(101, 2)), request)
            .expect("create should succeed")
    }

    fn balance(&self, account: AccountId) -> Decimal {
        self.engine.ledger().balance(account)
    }

    fn assert_conserved(&self) {
        self.engine.ledger().verify_supply().expect("supply conserved");
        self.engine.verify_custody().expect("custody matches registry");
        self.engine.sink().verify_chain().expect("journal chain intact");
    }
}

// =============================================================================
// Create payment
// =============================================================================

#[test]
fn create_debits_issuer_and_emits_event() {
    let mut h = Harness::new();
    let start = h.balance(h.issuer);

    let id = h.create();

    assert_eq!(id, PaymentId(1));
    assert_eq!(h.balance(h.issuer), start - ether(101, 2));
    assert_eq!(
        h.engine.sink().events().last(),
        Some(&Event::PaymentCreated {
            id,
            issuer: h.issuer,
            receiver: h.receiver,
            validators: vec![h.validator],
        })
    );

    let p = h.engine.get_payment(id).unwrap();
    assert!(!(p.is_final() || p.is_approved() || p.is_claimed));
    assert_eq!(p.principal, ether(1, 0));
    assert_eq!(p.validation_fee, ether(1, 2));
    assert_eq!(p.receiver, h.receiver);
    assert_eq!(p.issuer, h.issuer);
    h.assert_conserved();
}

#[test]
fn ids_increment_per_creation() {
    let mut h = Harness::new();
    for expected in 1..=4 {
        assert_eq!(h.create(), PaymentId(expected));
    }
    assert_eq!(h.engine.registry().len(), 4);
    assert_eq!(h.engine.escrow_balance(), ether(404, 2));
    h.assert_conserved();
}

#[test]
fn failed_creation_does_not_consume_an_id() {
    let mut h = Harness::new();
    let bad = CreatePayment {
        principal: ether(1, 0),
        validation_fee: ether(1, 2),
        receiver: h.receiver,
        validators: vec![],
    };
    assert!(h
        .engine
        .create_payment(CallContext::new(h.issuer, ether(1, 0)), bad)
        .is_err());
    assert_eq!(h.create(), PaymentId(1));
}

// =============================================================================
// approveEvent
// =============================================================================

#[test]
fn approve_lifecycle() {
    let mut h = Harness::new();
    let id = h.create();

    let err = h.engine.approve_event(h.issuer, PaymentId(100_000), 0).unwrap_err();
    assert!(matches!(err, SafepayError::PaymentNotFound(_)));

    for caller in [h.issuer, h.receiver, h.outsider] {
        let err = h.engine.approve_event(caller, id, 0).unwrap_err();
        assert!(
            matches!(err, SafepayError::Unauthorized { role: Role::Validator, .. }),
            "{caller} should not be able to vote, got {err:?}"
        );
    }

    let status = h.engine.get_status(id).unwrap();
    assert!(!(status.is_approved || status.is_final));

    let validator_start = h.balance(h.validator);
    let mark = h.engine.sink().len() as u64;
    h.engine.approve_event(h.validator, id, 0).unwrap();

    let emitted: Vec<&Event> = h.engine.sink().since(mark).collect();
    assert_eq!(
        emitted,
        vec![
            &Event::EventApproved {
                id,
                validator: h.validator,
                rate: 0,
            },
            &Event::ValueTransferred {
                to: h.validator,
                amount: ether(1, 2),
            },
        ]
    );
    assert_eq!(h.balance(h.validator), validator_start + ether(1, 2));

    let status = h.engine.get_status(id).unwrap();
    assert!(status.is_approved && status.is_final);

    let err = h.engine.approve_event(h.validator, id, 0).unwrap_err();
    assert!(matches!(err, SafepayError::AlreadyFinal(_)));
    assert!(err.to_string().contains("payment was already validated"));
    h.assert_conserved();
}

// =============================================================================
// rejectEvent
// =============================================================================

#[test]
fn reject_lifecycle() {
    let mut h = Harness::new();
    let id = h.create();

    for caller in [h.issuer, h.receiver, h.outsider] {
        assert!(matches!(
            h.engine.reject_event(caller, id, 0),
            Err(SafepayError::Unauthorized { .. })
        ));
    }
    let status = h.engine.get_status(id).unwrap();
    assert!(!(status.is_rejected || status.is_final));

    h.engine.reject_event(h.validator, id, 0).unwrap();
    assert_eq!(h.balance(h.validator), ether(1, 2));

    let status = h.engine.get_status(id).unwrap();
    assert!(!status.is_approved);
    assert!(status.is_rejected && status.is_final);

    // Same or opposite vote, finality holds.
    for result in [
        h.engine.reject_event(h.validator, id, 0),
        h.engine.approve_event(h.validator, id, 0),
    ] {
        assert!(matches!(result, Err(SafepayError::AlreadyFinal(_))));
    }
    assert!(h.engine.get_status(id).unwrap().is_rejected);
    h.assert_conserved();
}

// =============================================================================
// claimPayment
// =============================================================================

#[test]
fn claim_scenarios() {
    let mut h = Harness::new();
    let pending = h.create();
    let approved = h.create();
    let rejected = h.create();

    h.engine.reject_event(h.validator, rejected, 0).unwrap();
    h.engine.approve_event(h.validator, approved, 0).unwrap();

    let err = h.engine.claim_payment(h.issuer, pending).unwrap_err();
    assert!(matches!(err, SafepayError::NotFinal(_)));
    assert!(err.to_string().contains("payment wasn't validated"));

    let err = h.engine.claim_payment(h.issuer, approved).unwrap_err();
    assert!(matches!(err, SafepayError::Unauthorized { role: Role::Receiver, .. }));

    let err = h.engine.claim_payment(h.receiver, rejected).unwrap_err();
    assert!(matches!(err, SafepayError::Unauthorized { role: Role::Issuer, .. }));

    let receiver_start = h.balance(h.receiver);
    h.engine.claim_payment(h.receiver, approved).unwrap();
    assert_eq!(h.balance(h.receiver), receiver_start + ether(1, 0));
    assert_eq!(
        h.engine.sink().events().last(),
        Some(&Event::ValueTransferred {
            to: h.receiver,
            amount: ether(1, 0),
        })
    );

    let issuer_start = h.balance(h.issuer);
    h.engine.claim_payment(h.issuer, rejected).unwrap();
    assert_eq!(h.balance(h.issuer), issuer_start + ether(1, 0));

    for (caller, id) in [
        (h.receiver, approved),
        (h.issuer, approved),
        (h.issuer, rejected),
        (h.receiver, rejected),
    ] {
        assert!(h.engine.claim_payment(caller, id).is_err());
    }
    assert!(matches!(
        h.engine.claim_payment(h.receiver, approved),
        Err(SafepayError::AlreadyClaimed(_))
    ));

    assert_eq!(h.engine.get_payment(approved).unwrap().state(), PaymentState::Settled);
    assert!(h.engine.get_payment(approved).unwrap().is_approved());
    // Only the pending payment's principal and fee remain in custody.
    assert_eq!(h.engine.escrow_balance(), ether(101, 2));
    h.assert_conserved();
}

#[test]
fn rejected_scenario_from_start_to_finish() {
    let mut h = Harness::new();
    let id = h.create();
    h.engine.reject_event(h.validator, id, 0).unwrap();

    let status = h.engine.get_status(id).unwrap();
    assert!(status.is_rejected && status.is_final);

    let err = h.engine.claim_payment(h.receiver, id).unwrap_err();
    assert!(matches!(err, SafepayError::Unauthorized { .. }));

    h.engine.claim_payment(h.issuer, id).unwrap();
    // Issuer is down only the validator's fee.
    assert_eq!(h.balance(h.issuer), ether(100, 0) - ether(1, 2));
    assert_eq!(h.engine.escrow_balance(), Decimal::ZERO);
    h.assert_conserved();
}

// =============================================================================
// Multi-validator payments
// =============================================================================

fn create_multi(h: &mut Harness, validators: &[AccountId]) -> PaymentId {
    let request = CreatePayment {
        principal: ether(5, 0),
        validation_fee: ether(1, 1),
        receiver: h.receiver,
        validators: validators.to_vec(),
    };
    let value = request.required_value().unwrap();
    h.engine
        .create_payment(CallContext::new(h.issuer, value), request)
        .unwrap()
}

#[test]
fn three_validators_majority_then_refund() {
    let mut h = Harness::new();
    let vs = [AccountId::new(), AccountId::new(), AccountId::new()];
    let id = create_multi(&mut h, &vs);
    assert_eq!(h.engine.escrow_balance(), ether(53, 1));

    h.engine.approve_event(vs[0], id, 90).unwrap();
    assert!(!h.engine.get_status(id).unwrap().is_final);
    // Dissent is allowed while pending.
    h.engine.reject_event(vs[1], id, 10).unwrap();
    assert!(!h.engine.get_status(id).unwrap().is_final);

    let err = h.engine.approve_event(vs[0], id, 90).unwrap_err();
    assert!(matches!(err, SafepayError::AlreadyVoted { .. }));

    h.engine.approve_event(vs[2], id, 75).unwrap();
    assert!(h.engine.get_status(id).unwrap().is_approved);
    for v in vs {
        assert_eq!(h.balance(v), ether(1, 1), "every voter earns the fee");
    }

    assert!(matches!(
        h.engine.refund_unused_fees(h.issuer, id),
        Err(SafepayError::NothingToRefund(_))
    ));
    h.engine.claim_payment(h.receiver, id).unwrap();
    assert_eq!(h.engine.escrow_balance(), Decimal::ZERO);
    h.assert_conserved();
}

#[test]
fn early_majority_locks_out_remaining_validator() {
    let mut h = Harness::new();
    let vs = [AccountId::new(), AccountId::new(), AccountId::new()];
    let id = create_multi(&mut h, &vs);

    h.engine.reject_event(vs[0], id, 0).unwrap();
    h.engine.reject_event(vs[1], id, 0).unwrap();
    assert!(h.engine.get_status(id).unwrap().is_rejected);

    let err = h.engine.approve_event(vs[2], id, 0).unwrap_err();
    assert!(matches!(err, SafepayError::AlreadyFinal(_)));
    assert_eq!(h.balance(vs[2]), Decimal::ZERO);

    h.engine.claim_payment(h.issuer, id).unwrap();
    let refunded = h.engine.refund_unused_fees(h.issuer, id).unwrap();
    assert_eq!(refunded, ether(1, 1));
    assert!(matches!(
        h.engine.refund_unused_fees(h.issuer, id),
        Err(SafepayError::FeesAlreadyRefunded(_))
    ));

    // Issuer paid exactly the two earned fees.
    assert_eq!(h.balance(h.issuer), ether(100, 0) - ether(2, 1));
    assert_eq!(h.engine.escrow_balance(), Decimal::ZERO);
    h.assert_conserved();
}

#[test]
fn even_split_returns_principal_to_issuer() {
    let mut h = Harness::new();
    let vs = [AccountId::new(), AccountId::new()];
    let id = create_multi(&mut h, &vs);

    h.engine.approve_event(vs[0], id, 0).unwrap();
    assert!(!h.engine.get_status(id).unwrap().is_final);
    h.engine.reject_event(vs[1], id, 0).unwrap();

    let status = h.engine.get_status(id).unwrap();
    assert!(status.is_rejected && status.is_final);
    assert!(h.engine.claim_payment(h.receiver, id).is_err());
    h.engine.claim_payment(h.issuer, id).unwrap();
    h.assert_conserved();
}

// =============================================================================
// Randomized lifecycles
// =============================================================================

#[test]
fn randomized_lifecycles_conserve_value() {
    let mut h = Harness::new();
    let mut rng = StdRng::seed_from_u64(0x5afe_9a7);
    h.engine
        .ledger_mut()
        .deposit(h.issuer, ether(1_000, 0))
        .unwrap();

    for round in 0..60 {
        let n = rng.gen_range(1..=6usize);
        let validators: Vec<AccountId> = (0..n).map(|_| AccountId::new()).collect();
        let id = create_multi(&mut h, &validators);
        assert_eq!(id, PaymentId(round + 1));

        let mut order = validators.clone();
        order.shuffle(&mut rng);

        let mut voted = 0usize;
        for v in &order {
            let result = if rng.gen_bool(0.5) {
                h.engine.approve_event(*v, id, rng.gen_range(0..=100))
            } else {
                h.engine.reject_event(*v, id, rng.gen_range(0..=100))
            };
            if h.engine.get_status(id).unwrap().is_final && result.is_err() {
                assert!(matches!(result, Err(SafepayError::AlreadyFinal(_))));
            } else {
                result.unwrap();
                voted += 1;
            }
            h.assert_conserved();
        }

        let payment = h.engine.get_payment(id).unwrap();
        assert!(payment.is_final(), "every payment ends final");
        let winning = payment.count_votes(match payment.outcome {
            Some(Outcome::Approved) => Vote::Approve,
            _ => Vote::Reject,
        });
        assert!(
            winning == majority_threshold(n) || voted == n,
            "final either at threshold or after everyone voted"
        );

        let (beneficiary, _) = payment.beneficiary().unwrap();
        let silent = n - voted;
        h.engine.claim_payment(beneficiary, id).unwrap();
        if silent > 0 {
            let refunded = h.engine.refund_unused_fees(h.issuer, id).unwrap();
            assert_eq!(refunded, ether(1, 1) * Decimal::from(silent));
        }
        h.assert_conserved();
        assert_eq!(h.engine.escrow_balance(), Decimal::ZERO);
    }
}

// =============================================================================
// Audit trail
// =============================================================================

#[test]
fn journal_exports_full_lifecycle() {
    let mut h = Harness::new();
    let id = h.create();
    h.engine.approve_event(h.validator, id, 42).unwrap();
    h.engine.claim_payment(h.receiver, id).unwrap();

    let lines = h.engine.sink().to_json_lines().unwrap();
    let kinds: Vec<String> = lines
        .lines()
        .map(|line| {
            let entry: serde_json::Value = serde_json::from_str(line).unwrap();
            entry["event"]["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        kinds,
        [
            "PaymentCreated",
            "EventApproved",
            "ValueTransferred",
            "ValueTransferred"
        ]
    );
    assert_eq!(h.engine.sink().for_payment(id).count(), 2);
    h.assert_conserved();
}
