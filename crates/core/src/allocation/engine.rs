//! Allocation engine.
//!
//! Applies a funding source to a set of invoices. Every call either commits
//! every line or nothing: the whole batch is planned and validated against
//! the source and invoice balances before the first mutation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use remit_shared::types::{AllocationId, InvoiceId, OverflowPolicy};
use rust_decimal::Decimal;
use tracing::debug;

use super::error::{AllocationError, AmountViolation};
use super::fifo::fill_in_order;
use super::types::{AllocationRequest, PlannedAllocation, RequestedLine};
use crate::ledger::{Allocation, FundingSource, Invoice};

/// Allocation engine for applying funds to invoices.
///
/// Pure business logic: the caller supplies freshly read entities and
/// persists the mutated entities plus the returned allocations atomically.
pub struct AllocationEngine;

impl AllocationEngine {
    /// Applies `source` to `invoices` according to `request`.
    ///
    /// On success the source and every touched invoice have their
    /// `amount_applied` incremented, and one allocation per applied line is
    /// returned. On error nothing is mutated.
    ///
    /// # Errors
    ///
    /// Returns `AllocationError` if any line is invalid or the batch would
    /// overdraw the source.
    pub fn allocate<S: FundingSource>(
        source: &mut S,
        invoices: &mut [Invoice],
        request: &AllocationRequest,
        applied_at: DateTime<Utc>,
    ) -> Result<Vec<Allocation>, AllocationError> {
        let plan = Self::plan(source, invoices, request)?;
        Ok(Self::commit(source, invoices, &plan, applied_at))
    }

    /// Validates `request` and computes the lines that would be applied,
    /// without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns `AllocationError` if any line is invalid or the batch would
    /// overdraw the source.
    pub fn plan<S: FundingSource>(
        source: &S,
        invoices: &[Invoice],
        request: &AllocationRequest,
    ) -> Result<Vec<PlannedAllocation>, AllocationError> {
        if source.is_cancelled() {
            return Err(AllocationError::SourceCancelled(source.source_ref()));
        }

        match request {
            AllocationRequest::Explicit { lines, overflow } => {
                Self::plan_explicit(source, invoices, lines, *overflow)
            }
            AllocationRequest::Auto => Self::plan_auto(source, invoices),
        }
    }

    fn plan_explicit<S: FundingSource>(
        source: &S,
        invoices: &[Invoice],
        lines: &[RequestedLine],
        overflow: OverflowPolicy,
    ) -> Result<Vec<PlannedAllocation>, AllocationError> {
        if lines.is_empty() {
            return Err(AllocationError::EmptyRequest);
        }

        let available = source.available_amount();

        for line in lines {
            let invoice = find_invoice(invoices, line.invoice_id)?;
            ensure_allocatable(source, invoice)?;
            if line.amount <= Decimal::ZERO {
                return Err(AllocationError::InvalidAllocationAmount {
                    invoice_id: line.invoice_id,
                    requested: line.amount,
                    limit: Decimal::ZERO,
                    violation: AmountViolation::NonPositive,
                });
            }
        }

        let requested: Decimal = lines.iter().map(|l| l.amount).sum();
        if available.is_zero() || (overflow == OverflowPolicy::Reject && requested > available) {
            return Err(AllocationError::InsufficientFunds {
                source_ref: source.source_ref(),
                requested,
                available,
            });
        }

        // Remaining capacity on each side, updated line by line so repeated
        // invoice ids within one batch share the same balance.
        let mut source_remaining = available;
        let mut invoice_remaining: HashMap<InvoiceId, Decimal> = HashMap::new();
        let mut plan = Vec::with_capacity(lines.len());

        for line in lines {
            let balance = match invoice_remaining.get(&line.invoice_id) {
                Some(balance) => *balance,
                None => find_invoice(invoices, line.invoice_id)?.balance_due(),
            };

            let amount = match overflow {
                OverflowPolicy::Reject => {
                    if line.amount > balance {
                        return Err(AllocationError::InvalidAllocationAmount {
                            invoice_id: line.invoice_id,
                            requested: line.amount,
                            limit: balance,
                            violation: AmountViolation::ExceedsBalanceDue,
                        });
                    }
                    if line.amount > source_remaining {
                        return Err(AllocationError::InvalidAllocationAmount {
                            invoice_id: line.invoice_id,
                            requested: line.amount,
                            limit: source_remaining,
                            violation: AmountViolation::ExceedsAvailable,
                        });
                    }
                    line.amount
                }
                OverflowPolicy::Clamp => {
                    let clamped = line.amount.min(balance).min(source_remaining);
                    if clamped != line.amount {
                        debug!(
                            invoice_id = %line.invoice_id,
                            requested = %line.amount,
                            clamped = %clamped,
                            "Clamped allocation line"
                        );
                    }
                    clamped
                }
            };

            invoice_remaining.insert(line.invoice_id, balance - amount);
            if amount.is_zero() {
                continue;
            }
            source_remaining -= amount;
            plan.push(PlannedAllocation {
                invoice_id: line.invoice_id,
                amount,
            });
        }

        Ok(plan)
    }

    fn plan_auto<S: FundingSource>(
        source: &S,
        invoices: &[Invoice],
    ) -> Result<Vec<PlannedAllocation>, AllocationError> {
        let available = source.available_amount();

        let mut candidates: Vec<&Invoice> = Vec::new();
        for invoice in invoices.iter().filter(|i| i.is_outstanding()) {
            ensure_allocatable(source, invoice)?;
            candidates.push(invoice);
        }
        candidates.sort_by_key(|i| (i.due_date, i.issue_date, i.created_at));

        if available.is_zero() {
            let requested: Decimal = candidates.iter().map(|i| i.balance_due()).sum();
            return Err(AllocationError::InsufficientFunds {
                source_ref: source.source_ref(),
                requested,
                available,
            });
        }

        let plan = fill_in_order(
            available,
            candidates.iter().map(|i| (i.id, i.balance_due())),
        )
        .into_iter()
        .map(|(invoice_id, amount)| PlannedAllocation { invoice_id, amount })
        .collect();

        Ok(plan)
    }

    fn commit<S: FundingSource>(
        source: &mut S,
        invoices: &mut [Invoice],
        plan: &[PlannedAllocation],
        applied_at: DateTime<Utc>,
    ) -> Vec<Allocation> {
        let mut allocations = Vec::with_capacity(plan.len());

        for line in plan {
            // Planned ids were resolved against this same slice.
            let Some(invoice) = invoices.iter_mut().find(|i| i.id == line.invoice_id) else {
                continue;
            };
            invoice.record_application(line.amount);
            source.record_application(line.amount);

            debug!(
                source = %source.source_ref(),
                invoice_id = %line.invoice_id,
                amount = %line.amount,
                invoice_status = %invoice.status(),
                "Applied allocation line"
            );

            allocations.push(Allocation {
                id: AllocationId::new(),
                source: source.source_ref(),
                target_invoice_id: line.invoice_id,
                amount: line.amount,
                applied_at,
            });
        }

        allocations
    }
}

fn find_invoice(invoices: &[Invoice], invoice_id: InvoiceId) -> Result<&Invoice, AllocationError> {
    invoices
        .iter()
        .find(|i| i.id == invoice_id)
        .ok_or(AllocationError::InvoiceNotFound(invoice_id))
}

fn ensure_allocatable<S: FundingSource>(
    source: &S,
    invoice: &Invoice,
) -> Result<(), AllocationError> {
    if invoice.counterparty_id != source.counterparty_id() {
        return Err(AllocationError::CounterpartyMismatch {
            source_ref: source.source_ref(),
            invoice_id: invoice.id,
        });
    }
    if !invoice.is_outstanding() {
        return Err(AllocationError::InvoiceNotAllocatable {
            invoice_id: invoice.id,
            status: invoice.status(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        CreditInstrument, CreditKind, CreditStatus, InvoiceStatus, LedgerSide, Payment,
        PaymentStatus, SourceRef,
    };
    use chrono::{Duration, NaiveDate};
    use remit_shared::types::CounterpartyId;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
    }

    fn invoice(cp: CounterpartyId, number: &str, gross: Decimal, due_days_ago: i64) -> Invoice {
        let due = today() - Duration::days(due_days_ago);
        Invoice::new(cp, number, due - Duration::days(30), due, gross)
    }

    fn payment(cp: CounterpartyId, amount: Decimal) -> Payment {
        Payment::new(cp, LedgerSide::Payable, "PAY-1", today(), amount)
    }

    #[test]
    fn test_partial_payment_scenario() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(1000), 45)];
        let mut source = payment(cp, dec!(400));
        let request =
            AllocationRequest::explicit(vec![RequestedLine::new(invoices[0].id, dec!(400))]);

        let allocations =
            AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now()).unwrap();

        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].amount, dec!(400));
        assert_eq!(allocations[0].source, SourceRef::Payment(source.id));
        assert_eq!(invoices[0].amount_applied, dec!(400));
        assert_eq!(invoices[0].status(), InvoiceStatus::PartiallyApplied);
        assert_eq!(invoices[0].balance_due(), dec!(600));
        assert_eq!(source.status(), PaymentStatus::Allocated);
    }

    #[test]
    fn test_full_settlement_marks_paid() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(250), 0)];
        let mut source = payment(cp, dec!(1000));
        let request =
            AllocationRequest::explicit(vec![RequestedLine::new(invoices[0].id, dec!(250))]);

        AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now()).unwrap();

        assert_eq!(invoices[0].status(), InvoiceStatus::Paid);
        assert_eq!(source.status(), PaymentStatus::PartiallyAllocated);
        assert_eq!(source.available_amount(), dec!(750));
    }

    #[test]
    fn test_exceeding_balance_is_rejected_not_clamped() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(100), 0)];
        let mut source = payment(cp, dec!(1000));
        let request =
            AllocationRequest::explicit(vec![RequestedLine::new(invoices[0].id, dec!(150))]);

        let err = AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now())
            .unwrap_err();

        assert!(matches!(
            err,
            AllocationError::InvalidAllocationAmount {
                violation: AmountViolation::ExceedsBalanceDue,
                ..
            }
        ));
        assert_eq!(invoices[0].amount_applied, Decimal::ZERO);
        assert_eq!(source.amount_applied, Decimal::ZERO);
    }

    #[test]
    fn test_overdraw_rejects_whole_batch() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![
            invoice(cp, "INV-1", dec!(600), 10),
            invoice(cp, "INV-2", dec!(600), 5),
        ];
        let mut source = payment(cp, dec!(1000));
        let request = AllocationRequest::explicit(vec![
            RequestedLine::new(invoices[0].id, dec!(600)),
            RequestedLine::new(invoices[1].id, dec!(600)),
        ]);

        let err = AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now())
            .unwrap_err();

        assert!(matches!(err, AllocationError::InsufficientFunds { .. }));
        assert!(invoices.iter().all(|i| i.amount_applied.is_zero()));
        assert!(source.amount_applied.is_zero());
    }

    #[test]
    fn test_non_positive_amount_rejected_even_when_clamping() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(100), 0)];
        let mut source = payment(cp, dec!(100));
        let request =
            AllocationRequest::clamped(vec![RequestedLine::new(invoices[0].id, dec!(0))]);

        let err = AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now())
            .unwrap_err();

        assert!(matches!(
            err,
            AllocationError::InvalidAllocationAmount {
                violation: AmountViolation::NonPositive,
                ..
            }
        ));
    }

    #[test]
    fn test_clamp_policy_caps_each_line() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![
            invoice(cp, "INV-1", dec!(100), 10),
            invoice(cp, "INV-2", dec!(500), 5),
        ];
        let mut source = payment(cp, dec!(300));
        let request = AllocationRequest::clamped(vec![
            RequestedLine::new(invoices[0].id, dec!(150)),
            RequestedLine::new(invoices[1].id, dec!(500)),
        ]);

        let allocations =
            AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now()).unwrap();

        let amounts: Vec<Decimal> = allocations.iter().map(|a| a.amount).collect();
        assert_eq!(amounts, vec![dec!(100), dec!(200)]);
        assert_eq!(source.available_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_clamped_to_zero_line_is_skipped() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![
            invoice(cp, "INV-1", dec!(100), 10),
            invoice(cp, "INV-2", dec!(100), 5),
        ];
        let mut source = payment(cp, dec!(100));
        let request = AllocationRequest::clamped(vec![
            RequestedLine::new(invoices[0].id, dec!(100)),
            RequestedLine::new(invoices[1].id, dec!(50)),
        ]);

        let allocations =
            AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now()).unwrap();

        assert_eq!(allocations.len(), 1);
        assert_eq!(invoices[1].amount_applied, Decimal::ZERO);
    }

    #[test]
    fn test_repeated_invoice_shares_balance() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(100), 0)];
        let mut source = payment(cp, dec!(1000));
        let request = AllocationRequest::explicit(vec![
            RequestedLine::new(invoices[0].id, dec!(60)),
            RequestedLine::new(invoices[0].id, dec!(60)),
        ]);

        let err = AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now())
            .unwrap_err();

        assert!(matches!(
            err,
            AllocationError::InvalidAllocationAmount {
                limit,
                violation: AmountViolation::ExceedsBalanceDue,
                ..
            } if limit == dec!(40)
        ));
    }

    #[test]
    fn test_auto_mode_pays_oldest_due_first() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![
            invoice(cp, "INV-NEW", dec!(300), 5),
            invoice(cp, "INV-OLD", dec!(300), 60),
            invoice(cp, "INV-MID", dec!(300), 20),
        ];
        let mut source = payment(cp, dec!(500));

        let allocations = AllocationEngine::allocate(
            &mut source,
            &mut invoices,
            &AllocationRequest::Auto,
            Utc::now(),
        )
        .unwrap();

        let applied: Vec<(InvoiceId, Decimal)> = allocations
            .iter()
            .map(|a| (a.target_invoice_id, a.amount))
            .collect();
        assert_eq!(
            applied,
            vec![(invoices[1].id, dec!(300)), (invoices[2].id, dec!(200))]
        );
        assert_eq!(invoices[0].status(), InvoiceStatus::Open);
    }

    #[test]
    fn test_auto_mode_with_exhausted_source() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(100), 0)];
        let mut source = payment(cp, dec!(100));
        source.amount_applied = dec!(100);

        let err = AllocationEngine::allocate(
            &mut source,
            &mut invoices,
            &AllocationRequest::Auto,
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, AllocationError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_counterparty_mismatch() {
        let mut invoices = vec![invoice(CounterpartyId::new(), "INV-1", dec!(100), 0)];
        let mut source = payment(CounterpartyId::new(), dec!(100));
        let request =
            AllocationRequest::explicit(vec![RequestedLine::new(invoices[0].id, dec!(10))]);

        let err = AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now())
            .unwrap_err();

        assert_eq!(err.error_code(), "COUNTERPARTY_MISMATCH");
    }

    #[test]
    fn test_cancelled_invoice_not_allocatable() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(100), 0)];
        invoices[0].cancelled = true;
        let mut source = payment(cp, dec!(100));
        let request =
            AllocationRequest::explicit(vec![RequestedLine::new(invoices[0].id, dec!(10))]);

        let err = AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now())
            .unwrap_err();

        assert!(matches!(
            err,
            AllocationError::InvoiceNotAllocatable {
                status: InvoiceStatus::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_cancelled_source_rejected() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(100), 0)];
        let mut source = payment(cp, dec!(100));
        source.cancelled = true;

        let err = AllocationEngine::allocate(
            &mut source,
            &mut invoices,
            &AllocationRequest::Auto,
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, AllocationError::SourceCancelled(_)));
    }

    #[test]
    fn test_unknown_invoice() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(100), 0)];
        let mut source = payment(cp, dec!(100));
        let missing = InvoiceId::new();
        let request = AllocationRequest::explicit(vec![RequestedLine::new(missing, dec!(10))]);

        let err = AllocationEngine::allocate(&mut source, &mut invoices, &request, Utc::now())
            .unwrap_err();

        assert!(matches!(err, AllocationError::InvoiceNotFound(id) if id == missing));
    }

    #[test]
    fn test_empty_explicit_request() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(100), 0)];
        let mut source = payment(cp, dec!(100));

        let err = AllocationEngine::allocate(
            &mut source,
            &mut invoices,
            &AllocationRequest::explicit(vec![]),
            Utc::now(),
        )
        .unwrap_err();

        assert!(matches!(err, AllocationError::EmptyRequest));
    }

    #[test]
    fn test_credit_instrument_as_source() {
        let cp = CounterpartyId::new();
        let mut invoices = vec![invoice(cp, "INV-1", dec!(150), 0)];
        let mut note = CreditInstrument::new(
            cp,
            CreditKind::CreditNote,
            "CN-1",
            today(),
            dec!(200),
        );
        let request =
            AllocationRequest::explicit(vec![RequestedLine::new(invoices[0].id, dec!(150))]);

        let allocations =
            AllocationEngine::allocate(&mut note, &mut invoices, &request, Utc::now()).unwrap();

        assert_eq!(allocations[0].source, SourceRef::CreditInstrument(note.id));
        assert_eq!(note.status(), CreditStatus::PartiallyApplied);
        assert_eq!(note.available_amount(), dec!(50));
        assert_eq!(invoices[0].status(), InvoiceStatus::Paid);
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let cp = CounterpartyId::new();
        let invoices = vec![invoice(cp, "INV-1", dec!(100), 0)];
        let source = payment(cp, dec!(100));

        let plan = AllocationEngine::plan(&source, &invoices, &AllocationRequest::Auto).unwrap();

        assert_eq!(
            plan,
            vec![PlannedAllocation {
                invoice_id: invoices[0].id,
                amount: dec!(100)
            }]
        );
        assert!(invoices[0].amount_applied.is_zero());
        assert!(source.amount_applied.is_zero());
    }
}
