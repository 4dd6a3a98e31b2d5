//! Ledger entry model.
//!
//! This module implements the canonical representation of AP/AR movements:
//! - Invoices, payments/receipts and credit instruments with derived statuses
//! - Funding sources (anything that can be applied to an invoice)
//! - Immutable allocation records
//! - Transient ledger entries for statements
//! - Invariant validation and allocation log replay

pub mod audit;
pub mod entry;
pub mod error;
pub mod source;
pub mod types;
pub mod validation;

pub use audit::{IntegrityIssue, replay_applied, verify_conservation};
pub use entry::{EntryKind, LedgerEntry};
pub use error::LedgerError;
pub use source::FundingSource;
pub use types::{
    Allocation, CreditInstrument, CreditKind, CreditStatus, Invoice, InvoiceStatus, LedgerSet,
    LedgerSide, Payment, PaymentStatus, SourceRef,
};
pub use validation::{validate_credit_instrument, validate_invoice, validate_payment};
