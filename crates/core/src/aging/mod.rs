//! Accounts aging.
//!
//! Buckets outstanding invoice balances by days past due as of a given
//! date. Bucket definitions are validated once and then guaranteed to
//! cover every day count exactly once.

pub mod classifier;
pub mod error;
pub mod types;


pub use classifier::AgingClassifier;
pub use error::AgingError;
pub use types::{AgingBucket, AgingBuckets, AgingReport, BucketTotal, CounterpartyAging};
