//! Store and service error types.

use std::time::Duration;

use remit_core::aging::AgingError;
use remit_core::allocation::AllocationError;
use remit_core::credit::CreditError;
use remit_core::ledger::LedgerError;
use remit_core::reconciliation::ReconciliationError;
use remit_shared::AppError;
use remit_shared::types::IdempotencyKey;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::task::JoinError;
use uuid::Uuid;

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Requested ID.
        id: Uuid,
    },

    /// Entity was modified since it was read.
    #[error("Version conflict on {entity_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Entity that moved.
        entity_id: Uuid,
        /// Version the caller read.
        expected: i64,
        /// Version in the store.
        actual: i64,
    },

    /// An idempotency key was already committed.
    #[error("Idempotency key already used: {0}")]
    DuplicateKey(IdempotencyKey),

    /// Entity with the same ID already exists.
    #[error("Entity already exists: {0}")]
    AlreadyExists(Uuid),

    /// Write would leave `amount_applied` outside `0..=total`.
    #[error("Applied amount {applied} for {entity_id} is outside 0..={total}")]
    OutOfBounds {
        /// Offending entity.
        entity_id: Uuid,
        /// Requested applied amount.
        applied: Decimal,
        /// Entity total.
        total: Decimal,
    },

    /// Caller-supplied status does not match the one derived from the amounts.
    #[error("Status {given} does not match derived status {derived} for {entity_id}")]
    InconsistentStatus {
        /// Offending entity.
        entity_id: Uuid,
        /// Status supplied by the caller.
        given: String,
        /// Status derived from the new amount.
        derived: String,
    },

    /// Entity fails its own invariants.
    #[error(transparent)]
    Invalid(#[from] LedgerError),
}

impl StoreError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::DuplicateKey(_) => "DUPLICATE_IDEMPOTENCY_KEY",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::OutOfBounds { .. } => "APPLIED_OUT_OF_BOUNDS",
            Self::InconsistentStatus { .. } => "INCONSISTENT_STATUS",
            Self::Invalid(inner) => inner.error_code(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by the transactional services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Allocation rejected.
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Credit consumption rejected.
    #[error(transparent)]
    Credit(#[from] CreditError),

    /// Aging buckets invalid.
    #[error(transparent)]
    Aging(#[from] AgingError),

    /// Statement could not be built.
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    /// Idempotency key resubmitted with a different command.
    #[error("Idempotency key {0} was committed for a different command")]
    KeyReused(IdempotencyKey),

    /// Operation did not finish within its deadline.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),
}

impl ServiceError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Store(inner) => inner.error_code(),
            Self::Allocation(inner) => inner.error_code(),
            Self::Credit(inner) => inner.error_code(),
            Self::Aging(inner) => inner.error_code(),
            Self::Reconciliation(inner) => inner.error_code(),
            Self::KeyReused(_) => "IDEMPOTENCY_KEY_REUSED",
            Self::Timeout(_) => "TIMEOUT",
            Self::Task(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::VersionConflict { .. }
            | StoreError::DuplicateKey(_)
            | StoreError::AlreadyExists(_) => Self::Conflict(err.to_string()),
            StoreError::Invalid(_) => Self::Validation(err.to_string()),
            StoreError::OutOfBounds { .. } | StoreError::InconsistentStatus { .. } => {
                Self::Storage(err.to_string())
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(inner) => inner.into(),
            ServiceError::Allocation(inner) => inner.into(),
            ServiceError::Credit(inner) => inner.into(),
            ServiceError::Aging(inner) => inner.into(),
            ServiceError::Reconciliation(inner) => inner.into(),
            ServiceError::KeyReused(_) => Self::Conflict(err.to_string()),
            ServiceError::Timeout(_) => Self::Timeout(err.to_string()),
            ServiceError::Task(_) => Self::Internal(err.to_string()),
        }
    }
}
