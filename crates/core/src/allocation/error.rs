//! Allocation error types.

use remit_shared::AppError;
use remit_shared::types::InvoiceId;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::ledger::{InvoiceStatus, SourceRef};

/// Which bound a requested line amount violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountViolation {
    /// Zero or negative.
    NonPositive,
    /// More than the invoice's remaining balance due.
    ExceedsBalanceDue,
    /// More than the source has left after earlier lines of the batch.
    ExceedsAvailable,
}

impl fmt::Display for AmountViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NonPositive => "must be positive",
            Self::ExceedsBalanceDue => "exceeds invoice balance due",
            Self::ExceedsAvailable => "exceeds source available amount",
        };
        f.write_str(text)
    }
}

/// Errors that can occur while allocating funds to invoices.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// A line amount is outside `0 < amount <= min(balance_due, available)`.
    #[error("Invalid amount {requested} for invoice {invoice_id}: {violation} (limit {limit})")]
    InvalidAllocationAmount {
        /// Target invoice.
        invoice_id: InvoiceId,
        /// Requested amount.
        requested: Decimal,
        /// The bound that applied.
        limit: Decimal,
        /// Which bound was violated.
        violation: AmountViolation,
    },

    /// Requested total exceeds what the source has available.
    #[error("Insufficient funds on {source_ref}: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Funding source.
        source_ref: SourceRef,
        /// Total requested.
        requested: Decimal,
        /// Available amount.
        available: Decimal,
    },

    /// Optimistic version check failed on commit.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    /// Target invoice is not part of the supplied set.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Funding source is cancelled.
    #[error("Funding source {0} is cancelled")]
    SourceCancelled(SourceRef),

    /// Invoice cannot receive funds in its current status.
    #[error("Invoice {invoice_id} is {status} and cannot receive allocations")]
    InvoiceNotAllocatable {
        /// Target invoice.
        invoice_id: InvoiceId,
        /// Its derived status.
        status: InvoiceStatus,
    },

    /// Source and invoice belong to different counterparties.
    #[error("Source {source_ref} and invoice {invoice_id} belong to different counterparties")]
    CounterpartyMismatch {
        /// Funding source.
        source_ref: SourceRef,
        /// Target invoice.
        invoice_id: InvoiceId,
    },

    /// Explicit request without lines.
    #[error("Allocation request has no lines")]
    EmptyRequest,
}

impl AllocationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAllocationAmount { .. } => "INVALID_ALLOCATION_AMOUNT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            Self::SourceCancelled(_) => "SOURCE_CANCELLED",
            Self::InvoiceNotAllocatable { .. } => "INVOICE_NOT_ALLOCATABLE",
            Self::CounterpartyMismatch { .. } => "COUNTERPARTY_MISMATCH",
            Self::EmptyRequest => "EMPTY_REQUEST",
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::InvoiceNotFound(_) => Self::NotFound(err.to_string()),
            AllocationError::ConcurrentModification => Self::Conflict(err.to_string()),
            AllocationError::InvalidAllocationAmount { .. } | AllocationError::EmptyRequest => {
                Self::Validation(err.to_string())
            }
            AllocationError::InsufficientFunds { .. }
            | AllocationError::SourceCancelled(_)
            | AllocationError::InvoiceNotAllocatable { .. }
            | AllocationError::CounterpartyMismatch { .. } => Self::BusinessRule(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remit_shared::types::PaymentId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes_map_to_app_errors() {
        let err = AllocationError::InsufficientFunds {
            source_ref: SourceRef::Payment(PaymentId::new()),
            requested: dec!(1200),
            available: dec!(1000),
        };
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
        assert_eq!(AppError::from(err).status_code(), 422);

        let err = AllocationError::ConcurrentModification;
        assert_eq!(AppError::from(err).status_code(), 409);

        let err = AllocationError::InvoiceNotFound(InvoiceId::new());
        assert_eq!(AppError::from(err).status_code(), 404);
    }

    #[test]
    fn test_invalid_amount_message() {
        let invoice_id = InvoiceId::new();
        let err = AllocationError::InvalidAllocationAmount {
            invoice_id,
            requested: dec!(700),
            limit: dec!(600),
            violation: AmountViolation::ExceedsBalanceDue,
        };
        let message = err.to_string();
        assert!(message.starts_with(&format!("Invalid amount 700 for invoice {invoice_id}")));
        assert!(message.ends_with(": exceeds invoice balance due (limit 600)"));
    }
}
