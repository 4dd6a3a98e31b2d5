//! Statement types.

use std::fmt;

use chrono::NaiveDate;
use remit_shared::types::CounterpartyId;
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::ReconciliationError;
use crate::ledger::{IntegrityIssue, LedgerEntry};

/// Counterparty statement for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// Counterparty.
    pub counterparty_id: CounterpartyId,
    /// First day of the period.
    pub period_start: NaiveDate,
    /// Last day of the period.
    pub period_end: NaiveDate,
    /// Balance carried in from before the period.
    pub opening_balance: Decimal,
    /// Movements in the period, in date order.
    pub entries: Vec<LedgerEntry>,
    /// Sum of debits in the period.
    pub total_debits: Decimal,
    /// Sum of credits in the period.
    pub total_credits: Decimal,
    /// Last running balance, or the opening balance if there are no entries.
    pub closing_balance: Decimal,
    /// `opening + total_debits - total_credits`.
    pub expected_closing_balance: Decimal,
    /// `closing_balance - expected_closing_balance`.
    pub discrepancy: Decimal,
    /// Conservation issues found by replaying the allocation log.
    pub integrity_issues: Vec<IntegrityIssue>,
}

impl Statement {
    /// Whether the statement reconciles with no discrepancy and no
    /// integrity issues.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.discrepancy.is_zero() && self.integrity_issues.is_empty()
    }

    /// Turns a non-reconciling statement into an error.
    ///
    /// # Errors
    ///
    /// Returns `ReconciliationError::Discrepancy` if the running balance and
    /// the independent total disagree, or `IntegrityViolation` if the
    /// allocation log does not replay cleanly.
    pub fn ensure_balanced(&self) -> Result<(), ReconciliationError> {
        if !self.discrepancy.is_zero() {
            return Err(ReconciliationError::Discrepancy {
                counterparty_id: self.counterparty_id,
                discrepancy: self.discrepancy,
            });
        }
        if !self.integrity_issues.is_empty() {
            return Err(ReconciliationError::IntegrityViolation {
                counterparty_id: self.counterparty_id,
                count: self.integrity_issues.len(),
            });
        }
        Ok(())
    }

    /// Plain text rows, one per line, in statement order.
    #[must_use]
    pub fn render_rows(&self) -> Vec<String> {
        let mut rows = Vec::with_capacity(self.entries.len() + 2);
        rows.push(format!(
            "{:<10}  {:<11}  {:<16}  {:>14}  {:>14}  {:>14}",
            self.period_start, "opening", "", "", "", self.opening_balance
        ));
        for entry in &self.entries {
            rows.push(format!(
                "{:<10}  {:<11}  {:<16}  {:>14}  {:>14}  {:>14}",
                entry.date,
                entry.kind.as_str(),
                entry.reference,
                entry.debit,
                entry.credit,
                entry.running_balance
            ));
        }
        rows.push(format!(
            "{:<10}  {:<11}  {:<16}  {:>14}  {:>14}  {:>14}",
            self.period_end,
            "closing",
            "",
            self.total_debits,
            self.total_credits,
            self.closing_balance
        ));
        rows
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.render_rows() {
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}
