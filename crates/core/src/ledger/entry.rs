//! Transient ledger entries used to render statements.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::types::{CreditInstrument, CreditKind, Invoice, LedgerSide, Payment};

/// Kind of movement shown on a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Invoice (debit).
    Invoice,
    /// Outgoing payment on the payable side (credit).
    Payment,
    /// Incoming receipt on the receivable side (credit).
    Receipt,
    /// Credit note (credit).
    CreditNote,
    /// Debit note (credit).
    DebitNote,
    /// Advance (credit).
    Advance,
}

impl EntryKind {
    /// Invoices increase the balance; everything else reduces it.
    #[must_use]
    pub fn is_debit(&self) -> bool {
        matches!(self, Self::Invoice)
    }

    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Payment => "payment",
            Self::Receipt => "receipt",
            Self::CreditNote => "credit_note",
            Self::DebitNote => "debit_note",
            Self::Advance => "advance",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<CreditKind> for EntryKind {
    fn from(kind: CreditKind) -> Self {
        match kind {
            CreditKind::CreditNote => Self::CreditNote,
            CreditKind::DebitNote => Self::DebitNote,
            CreditKind::Advance => Self::Advance,
        }
    }
}

/// One dated movement with debit/credit semantics.
///
/// Computed for statements only, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Value date.
    pub date: NaiveDate,
    /// Movement kind.
    pub kind: EntryKind,
    /// Entity the entry was derived from.
    pub entity_id: Uuid,
    /// Human reference of that entity.
    pub reference: String,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Balance after this entry; filled in by the statement builder.
    pub running_balance: Decimal,
    #[serde(skip)]
    pub(crate) recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn new(
        date: NaiveDate,
        kind: EntryKind,
        entity_id: Uuid,
        reference: &str,
        amount: Decimal,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let (debit, credit) = if kind.is_debit() {
            (amount, Decimal::ZERO)
        } else {
            (Decimal::ZERO, amount)
        };
        Self {
            date,
            kind,
            entity_id,
            reference: reference.to_string(),
            debit,
            credit,
            running_balance: Decimal::ZERO,
            recorded_at,
        }
    }

    /// Net effect on the balance (`debit - credit`).
    #[must_use]
    pub fn net_change(&self) -> Decimal {
        self.debit - self.credit
    }
}

impl From<&Invoice> for LedgerEntry {
    fn from(invoice: &Invoice) -> Self {
        Self::new(
            invoice.issue_date,
            EntryKind::Invoice,
            invoice.id.into_inner(),
            &invoice.number,
            invoice.gross_amount,
            invoice.created_at,
        )
    }
}

impl From<&Payment> for LedgerEntry {
    fn from(payment: &Payment) -> Self {
        let kind = match payment.side {
            LedgerSide::Payable => EntryKind::Payment,
            LedgerSide::Receivable => EntryKind::Receipt,
        };
        Self::new(
            payment.payment_date,
            kind,
            payment.id.into_inner(),
            &payment.number,
            payment.amount,
            payment.created_at,
        )
    }
}

impl From<&CreditInstrument> for LedgerEntry {
    fn from(instrument: &CreditInstrument) -> Self {
        Self::new(
            instrument.issue_date,
            instrument.kind.into(),
            instrument.id.into_inner(),
            &instrument.number,
            instrument.original_amount,
            instrument.created_at,
        )
    }
}
