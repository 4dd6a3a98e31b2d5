//! Core business logic for Remit.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `ledger` - Invoices, payments, credit instruments and the allocation log
//! - `allocation` - Applying a funding source to invoices
//! - `credit` - Credit note and advance consumption
//! - `aging` - Aging buckets for outstanding balances
//! - `reconciliation` - Counterparty statements

pub mod aging;
pub mod allocation;
pub mod credit;
pub mod ledger;
pub mod reconciliation;
