//! Transactional services over the store traits.

pub mod aging;
pub mod allocation;
pub mod reconciliation;

pub use aging::AgingService;
pub use allocation::{AllocationCommand, AllocationService};
pub use reconciliation::ReconciliationService;
