//! Statement builder.

use chrono::NaiveDate;
use remit_shared::types::CounterpartyId;
use rust_decimal::Decimal;
use tracing::debug;

use super::balance::RunningBalance;
use super::error::ReconciliationError;
use super::types::Statement;
use crate::ledger::{LedgerEntry, LedgerSet, verify_conservation};

/// Builds reconciled statements from a consistent ledger read.
pub struct StatementBuilder;

impl StatementBuilder {
    /// Builds the statement for `counterparty_id` over `[start, end]`.
    ///
    /// Cancelled entities are left out. The closing balance is computed
    /// twice, by walking the running balance and by summing debits and
    /// credits; any difference is reported, never corrected.
    ///
    /// # Errors
    ///
    /// Returns `ReconciliationError::InvalidDateRange` if `start > end`.
    pub fn reconcile(
        counterparty_id: CounterpartyId,
        start: NaiveDate,
        end: NaiveDate,
        ledger: &LedgerSet,
    ) -> Result<Statement, ReconciliationError> {
        if start > end {
            return Err(ReconciliationError::InvalidDateRange { start, end });
        }

        let mut entries = Self::collect_entries(counterparty_id, ledger);
        // Stable sort keeps creation order for same-day movements.
        entries.sort_by_key(|e| (e.date, e.recorded_at));

        let opening_balance: Decimal = entries
            .iter()
            .filter(|e| e.date < start)
            .map(LedgerEntry::net_change)
            .sum();

        let mut period: Vec<LedgerEntry> = entries
            .into_iter()
            .filter(|e| e.date >= start && e.date <= end)
            .collect();

        let mut running = RunningBalance::opening(opening_balance);
        for entry in &mut period {
            running = RunningBalance::next_entry(&running, entry.net_change());
            entry.running_balance = running.current_balance;
        }

        let total_debits: Decimal = period.iter().map(|e| e.debit).sum();
        let total_credits: Decimal = period.iter().map(|e| e.credit).sum();
        let closing_balance = running.current_balance;
        let expected_closing_balance = opening_balance + total_debits - total_credits;
        let discrepancy = closing_balance - expected_closing_balance;

        let integrity_issues = verify_conservation(
            &ledger.invoices,
            &ledger.payments,
            &ledger.instruments,
            &ledger.allocations,
        );

        debug!(
            counterparty_id = %counterparty_id,
            entries = period.len(),
            opening = %opening_balance,
            closing = %closing_balance,
            discrepancy = %discrepancy,
            issues = integrity_issues.len(),
            "Built statement"
        );

        Ok(Statement {
            counterparty_id,
            period_start: start,
            period_end: end,
            opening_balance,
            entries: period,
            total_debits,
            total_credits,
            closing_balance,
            expected_closing_balance,
            discrepancy,
            integrity_issues,
        })
    }

    fn collect_entries(counterparty_id: CounterpartyId, ledger: &LedgerSet) -> Vec<LedgerEntry> {
        let invoices = ledger
            .invoices
            .iter()
            .filter(|i| i.counterparty_id == counterparty_id && !i.cancelled)
            .map(LedgerEntry::from);
        let payments = ledger
            .payments
            .iter()
            .filter(|p| p.counterparty_id == counterparty_id && !p.cancelled)
            .map(LedgerEntry::from);
        let instruments = ledger
            .instruments
            .iter()
            .filter(|i| i.counterparty_id == counterparty_id && !i.cancelled)
            .map(LedgerEntry::from);

        invoices.chain(payments).chain(instruments).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        Allocation, CreditInstrument, CreditKind, EntryKind, IntegrityIssue, Invoice, LedgerSide,
        Payment, SourceRef,
    };
    use chrono::{Duration, Utc};
    use remit_shared::types::AllocationId;
    use rust_decimal_macros::dec;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    fn sample(cp: CounterpartyId) -> LedgerSet {
        let mut before = Invoice::new(cp, "INV-0", d(1, 10), d(2, 10), dec!(500.00));
        before.amount_applied = dec!(200.00);
        let mut early_payment =
            Payment::new(cp, LedgerSide::Payable, "PAY-0", d(1, 20), dec!(200.00));
        early_payment.amount_applied = dec!(200.00);
        let invoice = Invoice::new(cp, "INV-1", d(3, 1), d(3, 31), dec!(1000.00));
        let payment = Payment::new(cp, LedgerSide::Payable, "PAY-1", d(3, 15), dec!(400.00));
        let note = CreditInstrument::new(cp, CreditKind::CreditNote, "CN-1", d(3, 20), dec!(50.25));
        let after = Invoice::new(cp, "INV-2", d(4, 2), d(5, 2), dec!(75.00));

        let allocation = Allocation {
            id: AllocationId::new(),
            source: SourceRef::Payment(early_payment.id),
            target_invoice_id: before.id,
            amount: dec!(200.00),
            applied_at: Utc::now(),
        };

        LedgerSet {
            invoices: vec![before, invoice, after],
            payments: vec![early_payment, payment],
            instruments: vec![note],
            allocations: vec![allocation],
        }
    }

    #[test]
    fn test_statement_for_period() {
        let cp = CounterpartyId::new();
        let statement = StatementBuilder::reconcile(cp, d(3, 1), d(3, 31), &sample(cp)).unwrap();

        assert_eq!(statement.opening_balance, dec!(300.00));
        let kinds: Vec<EntryKind> = statement.entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EntryKind::Invoice, EntryKind::Payment, EntryKind::CreditNote]
        );
        let running: Vec<Decimal> = statement.entries.iter().map(|e| e.running_balance).collect();
        assert_eq!(running, vec![dec!(1300.00), dec!(900.00), dec!(849.75)]);
        assert_eq!(statement.closing_balance, dec!(849.75));
        assert_eq!(statement.expected_closing_balance, dec!(849.75));
        assert!(statement.is_balanced());
        assert!(statement.ensure_balanced().is_ok());
    }

    #[test]
    fn test_empty_period_closes_at_opening() {
        let cp = CounterpartyId::new();
        let statement = StatementBuilder::reconcile(cp, d(2, 1), d(2, 28), &sample(cp)).unwrap();

        assert!(statement.entries.is_empty());
        assert_eq!(statement.closing_balance, statement.opening_balance);
        assert_eq!(statement.discrepancy, Decimal::ZERO);
    }

    #[test]
    fn test_invalid_date_range() {
        let cp = CounterpartyId::new();
        let err = StatementBuilder::reconcile(cp, d(3, 31), d(3, 1), &sample(cp)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATE_RANGE");
    }

    #[test]
    fn test_cancelled_and_foreign_entities_excluded() {
        let cp = CounterpartyId::new();
        let mut ledger = sample(cp);
        ledger.payments[1].cancelled = true;
        ledger.invoices.push(Invoice::new(
            CounterpartyId::new(),
            "OTHER",
            d(3, 5),
            d(4, 5),
            dec!(999),
        ));

        let statement = StatementBuilder::reconcile(cp, d(3, 1), d(3, 31), &ledger).unwrap();

        assert_eq!(statement.entries.len(), 2);
        assert_eq!(statement.closing_balance, dec!(1249.75));
    }

    #[test]
    fn test_same_day_entries_keep_creation_order() {
        let cp = CounterpartyId::new();
        let invoice = Invoice::new(cp, "INV-1", d(3, 1), d(3, 31), dec!(100));
        let mut payment = Payment::new(cp, LedgerSide::Payable, "PAY-1", d(3, 1), dec!(100));
        payment.created_at = invoice.created_at + Duration::seconds(1);
        let ledger = LedgerSet {
            invoices: vec![invoice],
            payments: vec![payment],
            ..LedgerSet::default()
        };

        let statement = StatementBuilder::reconcile(cp, d(3, 1), d(3, 1), &ledger).unwrap();

        let references: Vec<&str> =
            statement.entries.iter().map(|e| e.reference.as_str()).collect();
        assert_eq!(references, vec!["INV-1", "PAY-1"]);
        assert_eq!(statement.entries[0].running_balance, dec!(100));
        assert_eq!(statement.entries[1].running_balance, Decimal::ZERO);
    }

    #[test]
    fn test_integrity_issues_surface_on_statement() {
        let cp = CounterpartyId::new();
        let mut ledger = sample(cp);
        ledger.invoices[0].amount_applied = dec!(250.00);

        let statement = StatementBuilder::reconcile(cp, d(3, 1), d(3, 31), &ledger).unwrap();

        assert!(matches!(
            statement.integrity_issues.as_slice(),
            [IntegrityIssue::AppliedMismatch { .. }]
        ));
        assert!(!statement.is_balanced());
        assert_eq!(
            statement.ensure_balanced().unwrap_err().error_code(),
            "INTEGRITY_VIOLATION"
        );
    }

    #[test]
    fn test_render_rows_preserve_order_and_precision() {
        let cp = CounterpartyId::new();
        let statement = StatementBuilder::reconcile(cp, d(3, 1), d(3, 31), &sample(cp)).unwrap();

        let rows = statement.render_rows();

        assert_eq!(rows.len(), statement.entries.len() + 2);
        assert!(rows[0].contains("opening"));
        assert!(rows[1].contains("INV-1"));
        assert!(rows[3].contains("50.25"));
        assert!(rows[3].contains("849.75"));
        assert!(rows.last().unwrap().contains("closing"));
        assert_eq!(statement.to_string().lines().count(), rows.len());
    }
}
