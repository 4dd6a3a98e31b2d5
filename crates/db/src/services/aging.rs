//! Aging report service.

use std::sync::Arc;

use chrono::NaiveDate;
use remit_core::aging::{AgingBuckets, AgingClassifier, AgingReport};
use remit_shared::Clock;
use remit_shared::config::AgingConfig;
use remit_shared::types::CounterpartyId;
use tracing::debug;

use crate::error::ServiceError;
use crate::store::InvoiceStore;

/// Classifies outstanding invoices into the configured buckets.
pub struct AgingService<S: InvoiceStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    buckets: AgingBuckets,
}

impl<S: InvoiceStore> AgingService<S> {
    /// Creates a new aging service.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Aging` if the configured buckets are not
    /// contiguous and unbounded at both ends.
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        config: &AgingConfig,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            store,
            clock,
            buckets: AgingBuckets::from_config(config)?,
        })
    }

    /// Bucket set in use.
    #[must_use]
    pub fn buckets(&self) -> &AgingBuckets {
        &self.buckets
    }

    /// Aging report for one counterparty, or all of them when `None`.
    /// `as_of` defaults to today on the injected clock.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Store` if invoices cannot be read.
    pub async fn report(
        &self,
        counterparty_id: Option<CounterpartyId>,
        as_of: Option<NaiveDate>,
    ) -> Result<AgingReport, ServiceError> {
        let as_of = as_of.unwrap_or_else(|| self.clock.today());
        let invoices = match counterparty_id {
            Some(id) => self.store.list_invoices(id).await?,
            None => self.store.list_all_invoices().await?,
        };

        let report = AgingClassifier::classify(&invoices, as_of, &self.buckets);
        debug!(
            %as_of,
            invoices = invoices.len(),
            counterparties = report.by_counterparty.len(),
            total = %report.total,
            "Classified aging"
        );
        Ok(report)
    }
}
