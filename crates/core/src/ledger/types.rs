//! Ledger entity types shared by the payable and receivable sides.
//!
//! Statuses are never stored: each entity derives its status from
//! `amount_applied` against its total (plus the cancelled flag) on every read.

use chrono::{DateTime, NaiveDate, Utc};
use remit_shared::types::{AllocationId, CounterpartyId, CreditInstrumentId, InvoiceId, PaymentId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Which side of the books a counterparty sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSide {
    /// Accounts payable (vendor).
    Payable,
    /// Accounts receivable (customer).
    Receivable,
}

/// Derived invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Nothing applied yet.
    Open,
    /// Some but not all of the gross amount applied.
    PartiallyApplied,
    /// Fully settled.
    Paid,
    /// Cancelled; excluded from allocation, aging and statements.
    Cancelled,
}

impl InvoiceStatus {
    /// Derives the status from amounts.
    #[must_use]
    pub fn derive(amount_applied: Decimal, gross_amount: Decimal, cancelled: bool) -> Self {
        if cancelled {
            Self::Cancelled
        } else if amount_applied >= gross_amount {
            Self::Paid
        } else if amount_applied.is_zero() {
            Self::Open
        } else {
            Self::PartiallyApplied
        }
    }

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::PartiallyApplied => "partially_applied",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An issued invoice (vendor bill on the payable side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier.
    pub id: InvoiceId,
    /// Owning counterparty.
    pub counterparty_id: CounterpartyId,
    /// Human reference, e.g. `INV-1`.
    pub number: String,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: NaiveDate,
    /// Gross amount owed.
    pub gross_amount: Decimal,
    /// Amount already settled through allocations.
    #[serde(default)]
    pub amount_applied: Decimal,
    /// Whether the invoice has been cancelled.
    #[serde(default)]
    pub cancelled: bool,
    /// Optimistic concurrency version.
    #[serde(default)]
    pub version: i64,
    /// Creation instant; breaks ties between same-day entries. Required
    /// when deserializing so the order is the same on every load.
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a new open invoice.
    #[must_use]
    pub fn new(
        counterparty_id: CounterpartyId,
        number: impl Into<String>,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        gross_amount: Decimal,
    ) -> Self {
        Self {
            id: InvoiceId::new(),
            counterparty_id,
            number: number.into(),
            issue_date,
            due_date,
            gross_amount,
            amount_applied: Decimal::ZERO,
            cancelled: false,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Derived status.
    #[must_use]
    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::derive(self.amount_applied, self.gross_amount, self.cancelled)
    }

    /// `gross_amount - amount_applied`, never negative.
    #[must_use]
    pub fn balance_due(&self) -> Decimal {
        (self.gross_amount - self.amount_applied).max(Decimal::ZERO)
    }

    /// Open or partially applied.
    #[must_use]
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self.status(),
            InvoiceStatus::Open | InvoiceStatus::PartiallyApplied
        )
    }

    /// Records an application against this invoice. Callers enforce bounds.
    pub(crate) fn record_application(&mut self, amount: Decimal) {
        self.amount_applied += amount;
    }
}

/// Kind of credit instrument. All kinds reduce the counterparty balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    /// Credit note.
    CreditNote,
    /// Debit note.
    DebitNote,
    /// Advance (prepayment).
    Advance,
}

impl CreditKind {
    /// Credit and debit notes, as opposed to advances.
    #[must_use]
    pub fn is_note(&self) -> bool {
        matches!(self, Self::CreditNote | Self::DebitNote)
    }

    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditNote => "credit_note",
            Self::DebitNote => "debit_note",
            Self::Advance => "advance",
        }
    }
}

impl fmt::Display for CreditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived credit instrument status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    /// Nothing applied yet.
    Active,
    /// Partly consumed.
    PartiallyApplied,
    /// Exhausted.
    FullyApplied,
    /// Cancelled.
    Cancelled,
}

impl CreditStatus {
    /// Derives the status from amounts.
    #[must_use]
    pub fn derive(amount_applied: Decimal, original_amount: Decimal, cancelled: bool) -> Self {
        if cancelled {
            Self::Cancelled
        } else if amount_applied >= original_amount {
            Self::FullyApplied
        } else if amount_applied.is_zero() {
            Self::Active
        } else {
            Self::PartiallyApplied
        }
    }

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PartiallyApplied => "partially_applied",
            Self::FullyApplied => "fully_applied",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CreditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credit note, debit note or advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditInstrument {
    /// Unique identifier.
    pub id: CreditInstrumentId,
    /// Owning counterparty.
    pub counterparty_id: CounterpartyId,
    /// Instrument kind.
    pub kind: CreditKind,
    /// Human reference, e.g. `CN-1`.
    pub number: String,
    /// Issue date; drives FIFO consumption.
    pub issue_date: NaiveDate,
    /// Face value.
    pub original_amount: Decimal,
    /// Amount already consumed.
    #[serde(default)]
    pub amount_applied: Decimal,
    /// Whether the instrument has been cancelled.
    #[serde(default)]
    pub cancelled: bool,
    /// Optimistic concurrency version.
    #[serde(default)]
    pub version: i64,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl CreditInstrument {
    /// Creates a new active instrument.
    #[must_use]
    pub fn new(
        counterparty_id: CounterpartyId,
        kind: CreditKind,
        number: impl Into<String>,
        issue_date: NaiveDate,
        original_amount: Decimal,
    ) -> Self {
        Self {
            id: CreditInstrumentId::new(),
            counterparty_id,
            kind,
            number: number.into(),
            issue_date,
            original_amount,
            amount_applied: Decimal::ZERO,
            cancelled: false,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Derived status.
    #[must_use]
    pub fn status(&self) -> CreditStatus {
        CreditStatus::derive(self.amount_applied, self.original_amount, self.cancelled)
    }
}

/// Derived payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing allocated yet.
    Pending,
    /// Partly allocated.
    PartiallyAllocated,
    /// Fully allocated.
    Allocated,
    /// Cancelled.
    Cancelled,
}

impl PaymentStatus {
    /// Derives the status from amounts.
    #[must_use]
    pub fn derive(amount_applied: Decimal, amount: Decimal, cancelled: bool) -> Self {
        if cancelled {
            Self::Cancelled
        } else if amount_applied >= amount {
            Self::Allocated
        } else if amount_applied.is_zero() {
            Self::Pending
        } else {
            Self::PartiallyAllocated
        }
    }

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PartiallyAllocated => "partially_allocated",
            Self::Allocated => "allocated",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cash movement: a payment (payable side) or receipt (receivable side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier.
    pub id: PaymentId,
    /// Owning counterparty.
    pub counterparty_id: CounterpartyId,
    /// Payment (payable) or receipt (receivable).
    pub side: LedgerSide,
    /// Human reference.
    pub number: String,
    /// Value date.
    pub payment_date: NaiveDate,
    /// Cash amount.
    pub amount: Decimal,
    /// Amount allocated to invoices so far.
    #[serde(default)]
    pub amount_applied: Decimal,
    /// Whether the payment has been cancelled.
    #[serde(default)]
    pub cancelled: bool,
    /// When the payment was marked fully allocated.
    #[serde(default)]
    pub allocated_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version.
    #[serde(default)]
    pub version: i64,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new pending payment or receipt.
    #[must_use]
    pub fn new(
        counterparty_id: CounterpartyId,
        side: LedgerSide,
        number: impl Into<String>,
        payment_date: NaiveDate,
        amount: Decimal,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            counterparty_id,
            side,
            number: number.into(),
            payment_date,
            amount,
            amount_applied: Decimal::ZERO,
            cancelled: false,
            allocated_at: None,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Derived status.
    #[must_use]
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::derive(self.amount_applied, self.amount, self.cancelled)
    }
}

/// Typed reference to whatever funded an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SourceRef {
    /// A payment or receipt.
    Payment(PaymentId),
    /// A credit note, debit note or advance.
    CreditInstrument(CreditInstrumentId),
}

impl SourceRef {
    /// Underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        match self {
            Self::Payment(id) => id.into_inner(),
            Self::CreditInstrument(id) => id.into_inner(),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payment(id) => write!(f, "payment:{id}"),
            Self::CreditInstrument(id) => write!(f, "credit:{id}"),
        }
    }
}

/// One application of funds to an invoice. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Unique identifier.
    pub id: AllocationId,
    /// Funding source.
    pub source: SourceRef,
    /// Invoice that received the funds.
    pub target_invoice_id: InvoiceId,
    /// Applied amount, always positive.
    pub amount: Decimal,
    /// When the application happened.
    pub applied_at: DateTime<Utc>,
}

impl Allocation {
    /// Returns true if this allocation touches `id` as source or target.
    #[must_use]
    pub fn involves(&self, id: Uuid) -> bool {
        self.source.as_uuid() == id || self.target_invoice_id.into_inner() == id
    }
}

/// A set of ledger entities read at one point in time.
///
/// Store snapshots scope it to one counterparty; datasets may span many.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSet {
    /// Invoices.
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    /// Payments and receipts.
    #[serde(default)]
    pub payments: Vec<Payment>,
    /// Credit notes, debit notes and advances.
    #[serde(default)]
    pub instruments: Vec<CreditInstrument>,
    /// Allocation log entries touching any of the above.
    #[serde(default)]
    pub allocations: Vec<Allocation>,
}
