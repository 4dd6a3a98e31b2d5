//! Property-based tests for `AllocationEngine`.
//!
//! - Conservation: every applied amount lands on both sides exactly once
//! - Boundedness: no invoice or source is ever over-applied
//! - Atomicity: a rejected batch leaves every entity untouched

use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;
use remit_shared::types::{CounterpartyId, OverflowPolicy};
use rust_decimal::Decimal;

use super::engine::AllocationEngine;
use super::types::{AllocationRequest, RequestedLine};
use crate::ledger::{FundingSource, Invoice, LedgerSide, Payment, verify_conservation};

/// Strategy to generate positive decimal amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate a batch of invoice gross amounts.
fn invoice_amounts() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(positive_amount(), 1..8)
}

/// Strategy to generate an overflow policy.
fn overflow_strategy() -> impl Strategy<Value = OverflowPolicy> {
    prop_oneof![Just(OverflowPolicy::Reject), Just(OverflowPolicy::Clamp)]
}

fn make_invoices(cp: CounterpartyId, amounts: &[Decimal]) -> Vec<Invoice> {
    let base = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| {
            let due = base + Duration::days(i64::try_from(i).unwrap() * 7);
            Invoice::new(cp, &format!("INV-{i}"), base, due, *amount)
        })
        .collect()
}

fn make_payment(cp: CounterpartyId, amount: Decimal) -> Payment {
    Payment::new(
        cp,
        LedgerSide::Receivable,
        "RCPT-1",
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        amount,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Auto allocation applies `min(available, Σ balance_due)` and the
    /// allocation log replays to the same counters on both sides.
    #[test]
    fn prop_auto_allocation_conserves(
        gross in invoice_amounts(),
        funds in positive_amount(),
    ) {
        let cp = CounterpartyId::new();
        let mut invoices = make_invoices(cp, &gross);
        let mut payment = make_payment(cp, funds);
        let outstanding: Decimal = gross.iter().copied().sum();

        let allocations = AllocationEngine::allocate(
            &mut payment,
            &mut invoices,
            &AllocationRequest::Auto,
            Utc::now(),
        ).unwrap();

        let applied: Decimal = allocations.iter().map(|a| a.amount).sum();
        prop_assert_eq!(applied, funds.min(outstanding));
        prop_assert_eq!(payment.amount_applied, applied);
        prop_assert!(allocations.iter().all(|a| a.amount > Decimal::ZERO));

        let issues = verify_conservation(&invoices, &[payment], &[], &allocations);
        prop_assert!(issues.is_empty(), "Unexpected issues: {:?}", issues);
    }

    /// Explicit requests either succeed within bounds or leave every
    /// entity exactly as it was.
    #[test]
    fn prop_explicit_allocation_is_bounded_and_atomic(
        gross in invoice_amounts(),
        requested in prop::collection::vec(positive_amount(), 1..8),
        funds in positive_amount(),
        overflow in overflow_strategy(),
    ) {
        let cp = CounterpartyId::new();
        let mut invoices = make_invoices(cp, &gross);
        let mut payment = make_payment(cp, funds);
        let lines: Vec<RequestedLine> = invoices
            .iter()
            .zip(requested.iter())
            .map(|(invoice, amount)| RequestedLine::new(invoice.id, *amount))
            .collect();
        let request = AllocationRequest::explicit(lines).with_overflow(overflow);

        let invoices_before = invoices.clone();
        let payment_before = payment.clone();

        match AllocationEngine::allocate(&mut payment, &mut invoices, &request, Utc::now()) {
            Ok(allocations) => {
                prop_assert!(payment.amount_applied <= payment.amount);
                for invoice in &invoices {
                    prop_assert!(invoice.amount_applied <= invoice.gross_amount);
                }
                let issues = verify_conservation(&invoices, &[payment], &[], &allocations);
                prop_assert!(issues.is_empty(), "Unexpected issues: {:?}", issues);
            }
            Err(_) => {
                prop_assert_eq!(payment, payment_before);
                prop_assert_eq!(invoices, invoices_before);
            }
        }
    }

    /// Reject mode never applies less than was asked for.
    #[test]
    fn prop_reject_mode_applies_exact_amounts(
        gross in invoice_amounts(),
        funds in positive_amount(),
    ) {
        let cp = CounterpartyId::new();
        let mut invoices = make_invoices(cp, &gross);
        let mut payment = make_payment(cp, funds);
        let lines: Vec<RequestedLine> = invoices
            .iter()
            .map(|invoice| RequestedLine::new(invoice.id, invoice.gross_amount))
            .collect();
        let total: Decimal = gross.iter().copied().sum();

        let result = AllocationEngine::allocate(
            &mut payment,
            &mut invoices,
            &AllocationRequest::explicit(lines),
            Utc::now(),
        );

        if total <= funds {
            let allocations = result.unwrap();
            prop_assert_eq!(allocations.len(), gross.len());
            prop_assert!(invoices.iter().all(|i| i.balance_due().is_zero()));
            prop_assert_eq!(payment.available_amount(), funds - total);
        } else {
            prop_assert!(result.is_err());
            prop_assert!(payment.amount_applied.is_zero());
        }
    }
}
