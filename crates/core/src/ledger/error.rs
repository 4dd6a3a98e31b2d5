//! Ledger error types for entity validation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when an entity violates its own invariants.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A face amount is negative.
    #[error("Amount for {entity_id} cannot be negative: {amount}")]
    NegativeAmount {
        /// Offending entity.
        entity_id: Uuid,
        /// The amount.
        amount: Decimal,
    },

    /// The applied amount is outside `0..=total`.
    #[error("Applied amount {applied} for {entity_id} is outside 0..={total}")]
    AppliedOutOfBounds {
        /// Offending entity.
        entity_id: Uuid,
        /// Applied amount.
        applied: Decimal,
        /// Face amount.
        total: Decimal,
    },

    /// Due date precedes issue date.
    #[error("Invoice {invoice_id} is due {due_date}, before its issue date {issue_date}")]
    DueBeforeIssue {
        /// Offending invoice.
        invoice_id: Uuid,
        /// Issue date.
        issue_date: NaiveDate,
        /// Due date.
        due_date: NaiveDate,
    },
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::AppliedOutOfBounds { .. } => "APPLIED_OUT_OF_BOUNDS",
            Self::DueBeforeIssue { .. } => "DUE_BEFORE_ISSUE",
        }
    }
}
