//! Credit consumption error types.

use remit_shared::AppError;
use remit_shared::types::{CounterpartyId, CreditInstrumentId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::allocation::AllocationError;

/// Errors that can occur while consuming credit notes and advances.
#[derive(Debug, Error)]
pub enum CreditError {
    /// Target amount is zero or negative.
    #[error("Credit target must be positive, got {0}")]
    NonPositiveTarget(Decimal),

    /// The pool holds nothing that can be applied.
    #[error("No usable credit for counterparty {0}")]
    NoUsableCredit(CounterpartyId),

    /// Instrument belongs to another counterparty than the invoice.
    #[error("Credit instrument {instrument_id} does not belong to counterparty {counterparty_id}")]
    CounterpartyMismatch {
        /// Offending instrument.
        instrument_id: CreditInstrumentId,
        /// Expected counterparty.
        counterparty_id: CounterpartyId,
    },

    /// Applying a consumption line through the allocation engine failed.
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

impl CreditError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NonPositiveTarget(_) => "NON_POSITIVE_TARGET",
            Self::NoUsableCredit(_) => "NO_USABLE_CREDIT",
            Self::CounterpartyMismatch { .. } => "COUNTERPARTY_MISMATCH",
            Self::Allocation(inner) => inner.error_code(),
        }
    }
}

impl From<CreditError> for AppError {
    fn from(err: CreditError) -> Self {
        match err {
            CreditError::Allocation(inner) => inner.into(),
            CreditError::NonPositiveTarget(_) => Self::Validation(err.to_string()),
            CreditError::NoUsableCredit(_) | CreditError::CounterpartyMismatch { .. } => {
                Self::BusinessRule(err.to_string())
            }
        }
    }
}
