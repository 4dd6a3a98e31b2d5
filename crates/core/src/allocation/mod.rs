//! Allocation of payments and credit instruments to invoices.
//!
//! The engine is pure: it validates a whole batch, mutates the in-memory
//! entities it was handed and returns the allocation records. Persisting
//! them atomically is the caller's job.

pub mod engine;
pub mod error;
pub mod fifo;
pub mod types;

#[cfg(test)]
mod engine_props;

pub use engine::AllocationEngine;
pub use error::{AllocationError, AmountViolation};
pub use fifo::fill_in_order;
pub use types::{AllocationRequest, PlannedAllocation, RequestedLine};
