//! Counterparty statements and reconciliation.
//!
//! A statement is an opening balance, the dated movements of a period with
//! a running balance, and a closing balance that is cross-checked against
//! an independent sum. Allocation log replay issues ride along.

pub mod balance;
pub mod builder;
pub mod error;
pub mod types;


pub use balance::RunningBalance;
pub use builder::StatementBuilder;
pub use error::ReconciliationError;
pub use types::Statement;
