//! Common types used across the application.

pub mod id;
pub mod policy;

pub use id::*;
pub use policy::{OverflowPolicy, PoolOrder};
