//! Persistence layer and transactional services.
//!
//! This crate provides:
//! - Async store traits for invoices, payments, credit instruments and the
//!   allocation log
//! - An in-memory store with versioned, all-or-nothing commits
//! - Services that run the pure engines against a store with optimistic
//!   concurrency, idempotency keys and timeouts

pub mod error;
pub mod memory;
pub mod services;
pub mod store;

pub use error::{ServiceError, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use services::{AgingService, AllocationCommand, AllocationService, ReconciliationService};
pub use store::{
    AllocationCommitter, AllocationLog, AppliedEntity, AppliedUpdate, CommandFingerprint,
    CommitBatch, CommittedCommand, CreditInstrumentStore, InvoiceStore, LedgerSnapshot,
    LedgerStore, PaymentStore,
};
