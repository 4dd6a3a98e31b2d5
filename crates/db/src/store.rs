//! Store traits.
//!
//! Implemented in memory by [`crate::MemoryStore`]. A database-backed store
//! would implement the same traits with one transaction per `commit`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use remit_core::allocation::AllocationRequest;
use remit_core::ledger::{
    Allocation, CreditInstrument, CreditStatus, Invoice, InvoiceStatus, LedgerSet, Payment,
    SourceRef,
};
use remit_shared::types::{CounterpartyId, CreditInstrumentId, IdempotencyKey, InvoiceId, PaymentId};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreResult;

/// Invoice persistence.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Inserts a new invoice.
    async fn insert_invoice(&self, invoice: Invoice) -> StoreResult<()>;

    /// Open and partially applied invoices of a counterparty.
    async fn list_open_invoices(
        &self,
        counterparty_id: CounterpartyId,
    ) -> StoreResult<Vec<Invoice>>;

    /// Every invoice of a counterparty.
    async fn list_invoices(&self, counterparty_id: CounterpartyId) -> StoreResult<Vec<Invoice>>;

    /// Invoices across all counterparties.
    async fn list_all_invoices(&self) -> StoreResult<Vec<Invoice>>;

    /// Fetches one invoice.
    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Invoice>;

    /// Conditionally sets `amount_applied`. Returns the new version.
    ///
    /// Fails with `VersionConflict` if the stored version is not
    /// `expected_version`, and with `InconsistentStatus` if `new_status` is
    /// not what `new_amount` derives to.
    async fn update_applied_amount(
        &self,
        id: InvoiceId,
        new_amount: Decimal,
        new_status: InvoiceStatus,
        expected_version: i64,
    ) -> StoreResult<i64>;
}

/// Credit note, debit note and advance persistence.
#[async_trait]
pub trait CreditInstrumentStore: Send + Sync {
    /// Inserts a new instrument.
    async fn insert_instrument(&self, instrument: CreditInstrument) -> StoreResult<()>;

    /// Instruments of a counterparty with something left to apply.
    async fn list_available_instruments(
        &self,
        counterparty_id: CounterpartyId,
    ) -> StoreResult<Vec<CreditInstrument>>;

    /// Every instrument of a counterparty.
    async fn list_instruments(
        &self,
        counterparty_id: CounterpartyId,
    ) -> StoreResult<Vec<CreditInstrument>>;

    /// Fetches one instrument.
    async fn get_instrument(&self, id: CreditInstrumentId) -> StoreResult<CreditInstrument>;

    /// Conditionally sets `amount_applied`. Returns the new version.
    async fn update_applied_amount(
        &self,
        id: CreditInstrumentId,
        new_amount: Decimal,
        new_status: CreditStatus,
        expected_version: i64,
    ) -> StoreResult<i64>;
}

/// Payment and receipt persistence.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new payment.
    async fn insert_payment(&self, payment: Payment) -> StoreResult<()>;

    /// Fetches one payment.
    async fn get_payment(&self, id: PaymentId) -> StoreResult<Payment>;

    /// Every payment of a counterparty.
    async fn list_payments(&self, counterparty_id: CounterpartyId) -> StoreResult<Vec<Payment>>;

    /// Stamps the moment a payment became fully allocated. Keeps the first
    /// stamp if called again.
    async fn mark_allocated(&self, id: PaymentId, at: DateTime<Utc>) -> StoreResult<()>;
}

/// Append-only allocation log.
#[async_trait]
pub trait AllocationLog: Send + Sync {
    /// Appends one record.
    async fn insert_allocation(&self, allocation: Allocation) -> StoreResult<()>;

    /// Records where `id` is the source or the target invoice.
    async fn list_allocations_for(&self, id: Uuid) -> StoreResult<Vec<Allocation>>;
}

/// Entity whose applied amount a batch updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AppliedEntity {
    /// An invoice.
    Invoice(InvoiceId),
    /// A payment or receipt.
    Payment(PaymentId),
    /// A credit instrument.
    CreditInstrument(CreditInstrumentId),
}

impl AppliedEntity {
    /// Underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        match self {
            Self::Invoice(id) => id.into_inner(),
            Self::Payment(id) => id.into_inner(),
            Self::CreditInstrument(id) => id.into_inner(),
        }
    }
}

/// New `amount_applied` for one entity, valid only at `expected_version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedUpdate {
    /// Entity to update.
    pub entity: AppliedEntity,
    /// New applied amount.
    pub new_amount: Decimal,
    /// Version the entity was read at.
    pub expected_version: i64,
}

/// The command an idempotency key was committed for.
///
/// A key resubmitted with a different fingerprint is rejected instead of
/// replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandFingerprint {
    /// A payment or instrument applied to invoices.
    Allocate {
        /// Funding source.
        source: SourceRef,
        /// Request with its overflow policy resolved.
        request: AllocationRequest,
    },
    /// Credit drawn against one invoice.
    ApplyCredit {
        /// Target invoice.
        invoice_id: InvoiceId,
    },
}

/// What a committed idempotency key maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedCommand {
    /// Command the key was first used for.
    pub fingerprint: Option<CommandFingerprint>,
    /// Allocations written by that command.
    pub allocations: Vec<Allocation>,
}

/// Everything one allocation command writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitBatch {
    /// Makes the command replay-safe when set.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Stored with the key to detect reuse by a different command.
    pub fingerprint: Option<CommandFingerprint>,
    /// Applied amount updates, checked before any is applied.
    pub updates: Vec<AppliedUpdate>,
    /// Allocation records to append.
    pub allocations: Vec<Allocation>,
    /// Payment this batch fully allocates, stamped in the same write.
    pub settles: Option<(PaymentId, DateTime<Utc>)>,
}

/// Atomic multi-entity writer.
#[async_trait]
pub trait AllocationCommitter: Send + Sync {
    /// Applies `batch` atomically: every version matches and every update
    /// stays in bounds, or nothing is written.
    ///
    /// Fails with `DuplicateKey` if the batch's idempotency key was already
    /// committed.
    async fn commit(&self, batch: CommitBatch) -> StoreResult<Vec<Allocation>>;

    /// Command committed under `key`, if any.
    async fn committed(&self, key: IdempotencyKey) -> StoreResult<Option<CommittedCommand>>;
}

/// Consistent reads across entity kinds.
#[async_trait]
pub trait LedgerSnapshot: Send + Sync {
    /// Every entity and allocation of a counterparty, read atomically.
    async fn snapshot(&self, counterparty_id: CounterpartyId) -> StoreResult<LedgerSet>;
}

/// Everything the services need from a store.
pub trait LedgerStore:
    InvoiceStore
    + CreditInstrumentStore
    + PaymentStore
    + AllocationLog
    + AllocationCommitter
    + LedgerSnapshot
{
}

impl<T> LedgerStore for T where
    T: InvoiceStore
        + CreditInstrumentStore
        + PaymentStore
        + AllocationLog
        + AllocationCommitter
        + LedgerSnapshot
{
}
