//! Reconciliation error types.

use chrono::NaiveDate;
use remit_shared::AppError;
use remit_shared::types::CounterpartyId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur while building or checking a statement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconciliationError {
    /// Invalid date range.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date.
        start: NaiveDate,
        /// End date.
        end: NaiveDate,
    },

    /// The running balance and the independent total disagree.
    #[error("Statement for {counterparty_id} is off by {discrepancy}")]
    Discrepancy {
        /// Counterparty.
        counterparty_id: CounterpartyId,
        /// `stream_closing - independent_closing`.
        discrepancy: Decimal,
    },

    /// Replaying the allocation log found inconsistencies.
    #[error("Statement for {counterparty_id} has {count} integrity issue(s)")]
    IntegrityViolation {
        /// Counterparty.
        counterparty_id: CounterpartyId,
        /// Number of issues found.
        count: usize,
    },
}

impl ReconciliationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            Self::Discrepancy { .. } => "RECONCILIATION_DISCREPANCY",
            Self::IntegrityViolation { .. } => "INTEGRITY_VIOLATION",
        }
    }
}

impl From<ReconciliationError> for AppError {
    fn from(err: ReconciliationError) -> Self {
        match err {
            ReconciliationError::InvalidDateRange { .. } => Self::Validation(err.to_string()),
            ReconciliationError::Discrepancy { .. }
            | ReconciliationError::IntegrityViolation { .. } => Self::Internal(err.to_string()),
        }
    }
}
