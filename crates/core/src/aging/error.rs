//! Aging error types.

use remit_shared::AppError;
use thiserror::Error;

/// Errors raised when validating aging bucket definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgingError {
    /// No buckets were configured.
    #[error("At least one aging bucket is required")]
    NoBuckets,

    /// The first bucket must have no lower bound.
    #[error("First aging bucket '{0}' must be unbounded below")]
    BoundedBelow(String),

    /// The last bucket must have no upper bound.
    #[error("Last aging bucket '{0}' must be unbounded above")]
    BoundedAbove(String),

    /// A bucket's range is empty.
    #[error("Aging bucket '{label}' has an empty range [{lower}, {upper})")]
    EmptyRange {
        /// Bucket label.
        label: String,
        /// Inclusive lower bound.
        lower: i64,
        /// Exclusive upper bound.
        upper: i64,
    },

    /// Adjacent buckets leave a gap or overlap.
    #[error("Aging buckets '{previous}' and '{next}' are not contiguous")]
    NotContiguous {
        /// Earlier bucket.
        previous: String,
        /// Following bucket.
        next: String,
    },
}

impl AgingError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoBuckets => "NO_AGING_BUCKETS",
            Self::BoundedBelow(_) => "AGING_BUCKET_BOUNDED_BELOW",
            Self::BoundedAbove(_) => "AGING_BUCKET_BOUNDED_ABOVE",
            Self::EmptyRange { .. } => "AGING_BUCKET_EMPTY_RANGE",
            Self::NotContiguous { .. } => "AGING_BUCKETS_NOT_CONTIGUOUS",
        }
    }
}

impl From<AgingError> for AppError {
    fn from(err: AgingError) -> Self {
        Self::Validation(err.to_string())
    }
}
