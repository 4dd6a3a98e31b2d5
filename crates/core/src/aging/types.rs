//! Aging bucket and report types.

use chrono::NaiveDate;
use remit_shared::config::{AgingConfig, BucketConfig, default_buckets};
use remit_shared::types::CounterpartyId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::AgingError;

/// A days-past-due range `[lower_days, upper_days)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingBucket {
    /// Display label.
    pub label: String,
    /// Inclusive lower bound, `None` for unbounded.
    pub lower_days: Option<i64>,
    /// Exclusive upper bound, `None` for unbounded.
    pub upper_days: Option<i64>,
}

impl AgingBucket {
    /// Whether `days` past due falls in this bucket.
    #[must_use]
    pub fn contains(&self, days: i64) -> bool {
        self.lower_days.is_none_or(|lower| days >= lower)
            && self.upper_days.is_none_or(|upper| days < upper)
    }
}

impl From<&BucketConfig> for AgingBucket {
    fn from(config: &BucketConfig) -> Self {
        Self {
            label: config.label.clone(),
            lower_days: config.lower_days,
            upper_days: config.upper_days,
        }
    }
}

/// A validated, ordered set of buckets that covers every day count exactly
/// once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgingBuckets {
    buckets: Vec<AgingBucket>,
}

impl AgingBuckets {
    /// Validates and wraps `buckets`.
    ///
    /// # Errors
    ///
    /// Returns `AgingError` unless the buckets are contiguous, the first is
    /// unbounded below and the last is unbounded above.
    pub fn new(buckets: Vec<AgingBucket>) -> Result<Self, AgingError> {
        let (Some(first), Some(last)) = (buckets.first(), buckets.last()) else {
            return Err(AgingError::NoBuckets);
        };
        if first.lower_days.is_some() {
            return Err(AgingError::BoundedBelow(first.label.clone()));
        }
        if last.upper_days.is_some() {
            return Err(AgingError::BoundedAbove(last.label.clone()));
        }

        for bucket in &buckets {
            if let (Some(lower), Some(upper)) = (bucket.lower_days, bucket.upper_days)
                && lower >= upper
            {
                return Err(AgingError::EmptyRange {
                    label: bucket.label.clone(),
                    lower,
                    upper,
                });
            }
        }

        for pair in buckets.windows(2) {
            let contiguous = matches!(
                (pair[0].upper_days, pair[1].lower_days),
                (Some(upper), Some(lower)) if upper == lower
            );
            if !contiguous {
                return Err(AgingError::NotContiguous {
                    previous: pair[0].label.clone(),
                    next: pair[1].label.clone(),
                });
            }
        }

        Ok(Self { buckets })
    }

    /// Validates configured buckets.
    ///
    /// # Errors
    ///
    /// Returns `AgingError` if the configured buckets are invalid.
    pub fn from_config(config: &AgingConfig) -> Result<Self, AgingError> {
        Self::new(config.buckets.iter().map(AgingBucket::from).collect())
    }

    /// Current, 1-30, 31-60, 61-90 and 90+.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            buckets: default_buckets().iter().map(AgingBucket::from).collect(),
        }
    }

    /// Buckets in order.
    #[must_use]
    pub fn as_slice(&self) -> &[AgingBucket] {
        &self.buckets
    }

    /// Index of the bucket that holds `days` past due.
    #[must_use]
    pub fn index_for(&self, days: i64) -> usize {
        // Validation guarantees exactly one match.
        self.buckets
            .iter()
            .position(|b| b.contains(days))
            .unwrap_or(self.buckets.len().saturating_sub(1))
    }
}

impl Default for AgingBuckets {
    fn default() -> Self {
        Self::standard()
    }
}

/// Amount and invoice count in one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketTotal {
    /// Bucket label.
    pub label: String,
    /// Sum of balances due.
    pub amount: Decimal,
    /// Number of invoices.
    pub count: usize,
}

/// Aging for one counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterpartyAging {
    /// Counterparty.
    pub counterparty_id: CounterpartyId,
    /// Per-bucket totals, in bucket order.
    pub buckets: Vec<BucketTotal>,
    /// Sum over all buckets.
    pub total: Decimal,
}

/// Aging report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgingReport {
    /// Report type identifier.
    pub report_type: String,
    /// Date the report was aged at.
    pub as_of: NaiveDate,
    /// Per-bucket totals across all counterparties.
    pub buckets: Vec<BucketTotal>,
    /// Breakdown by counterparty, ordered by id.
    pub by_counterparty: Vec<CounterpartyAging>,
    /// Total outstanding.
    pub total: Decimal,
}
