//! Statement service: snapshot, then reconcile, under a deadline.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use remit_core::reconciliation::{Statement, StatementBuilder};
use remit_shared::config::ReconciliationConfig;
use remit_shared::types::CounterpartyId;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::store::LedgerSnapshot;

/// Builds counterparty statements from consistent snapshots.
pub struct ReconciliationService<S: LedgerSnapshot> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S: LedgerSnapshot> ReconciliationService<S> {
    /// Creates a new reconciliation service.
    #[must_use]
    pub fn new(store: Arc<S>, config: &ReconciliationConfig) -> Self {
        Self {
            store,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Deadline applied when the caller does not pass one.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Statement for `[start, end]` under the configured deadline.
    ///
    /// # Errors
    ///
    /// See [`Self::statement_within`].
    pub async fn statement(
        &self,
        counterparty_id: CounterpartyId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Statement, ServiceError> {
        self.statement_within(counterparty_id, start, end, self.timeout)
            .await
    }

    /// Statement for `[start, end]`, abandoned after `timeout`.
    ///
    /// The deadline bounds both the snapshot read and the reconcile.
    /// A discrepancy is returned inside the statement, not as an error.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Timeout` if the deadline elapses,
    /// `ServiceError::Reconciliation` for an inverted range,
    /// `ServiceError::Store` if the snapshot fails, or
    /// `ServiceError::Task` if the reconcile panics.
    pub async fn statement_within(
        &self,
        counterparty_id: CounterpartyId,
        start: NaiveDate,
        end: NaiveDate,
        timeout: Duration,
    ) -> Result<Statement, ServiceError> {
        // The fold runs on the blocking pool so the deadline covers it too.
        // An abandoned fold finishes in the background and is discarded.
        let build = async {
            let ledger = self.store.snapshot(counterparty_id).await?;
            let statement = tokio::task::spawn_blocking(move || {
                StatementBuilder::reconcile(counterparty_id, start, end, &ledger)
            })
            .await??;
            Ok::<_, ServiceError>(statement)
        };

        let Ok(result) = tokio::time::timeout(timeout, build).await else {
            warn!(
                counterparty_id = %counterparty_id,
                timeout_ms = timeout.as_millis(),
                "Reconciliation timed out"
            );
            return Err(ServiceError::Timeout(timeout));
        };
        let statement = result?;

        if statement.is_balanced() {
            info!(
                counterparty_id = %counterparty_id,
                entries = statement.entries.len(),
                closing = %statement.closing_balance,
                "Built statement"
            );
        } else {
            warn!(
                counterparty_id = %counterparty_id,
                discrepancy = %statement.discrepancy,
                integrity_issues = statement.integrity_issues.len(),
                "Statement does not reconcile"
            );
        }
        Ok(statement)
    }
}
