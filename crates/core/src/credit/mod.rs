//! Credit notes, debit notes and advances.
//!
//! Consumption is planned FIFO by issue date and committed through the
//! allocation engine, so instrument draw-downs share the same conservation
//! guarantees as payments.

pub mod error;
pub mod policy;


pub use error::CreditError;
pub use policy::{CreditConsumption, CreditPolicy, NetPayable};
