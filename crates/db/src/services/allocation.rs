//! Transactional allocation service.
//!
//! Each command reads fresh entities, runs the pure engine, and commits the
//! result as one versioned batch. A version conflict means another command
//! got there first: the whole command is re-read and re-run, up to
//! `max_retries` times.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use remit_core::allocation::{AllocationEngine, AllocationError, AllocationRequest};
use remit_core::credit::{CreditPolicy, NetPayable};
use remit_core::ledger::{
    Allocation, CreditInstrument, IntegrityIssue, Invoice, Payment, PaymentStatus, SourceRef,
    verify_conservation,
};
use remit_shared::Clock;
use remit_shared::config::AppConfig;
use remit_shared::types::{CounterpartyId, IdempotencyKey, InvoiceId, OverflowPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ServiceError, StoreError};
use crate::store::{AppliedEntity, AppliedUpdate, CommandFingerprint, CommitBatch, LedgerStore};

/// Apply one funding source to invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationCommand {
    /// Payment or credit instrument to draw from.
    pub source: SourceRef,
    /// Lines or auto mode.
    pub request: AllocationRequest,
    /// Overrides the configured overflow policy for explicit requests.
    #[serde(default)]
    pub overflow: Option<OverflowPolicy>,
    /// Makes the command replay-safe.
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl AllocationCommand {
    /// Command without an idempotency key.
    #[must_use]
    pub fn new(source: SourceRef, request: AllocationRequest) -> Self {
        Self {
            source,
            request,
            overflow: None,
            idempotency_key: None,
        }
    }

    /// Same command, replay-safe under `key`.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// Same command with an explicit overflow policy.
    #[must_use]
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = Some(overflow);
        self
    }
}

enum LoadedSource {
    Payment(Payment),
    Instrument(CreditInstrument),
}

impl LoadedSource {
    fn version(&self) -> i64 {
        match self {
            Self::Payment(p) => p.version,
            Self::Instrument(i) => i.version,
        }
    }

    fn entity(&self) -> AppliedEntity {
        match self {
            Self::Payment(p) => AppliedEntity::Payment(p.id),
            Self::Instrument(i) => AppliedEntity::CreditInstrument(i.id),
        }
    }

    fn counterparty_id(&self) -> CounterpartyId {
        match self {
            Self::Payment(p) => p.counterparty_id,
            Self::Instrument(i) => i.counterparty_id,
        }
    }

    fn amount_applied(&self) -> Decimal {
        match self {
            Self::Payment(p) => p.amount_applied,
            Self::Instrument(i) => i.amount_applied,
        }
    }

    fn allocate(
        &mut self,
        invoices: &mut [Invoice],
        request: &AllocationRequest,
        applied_at: DateTime<Utc>,
    ) -> Result<Vec<Allocation>, AllocationError> {
        match self {
            Self::Payment(p) => AllocationEngine::allocate(p, invoices, request, applied_at),
            Self::Instrument(i) => AllocationEngine::allocate(i, invoices, request, applied_at),
        }
    }
}

/// Allocation service over any [`LedgerStore`].
pub struct AllocationService<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
    overflow: OverflowPolicy,
    credit: CreditPolicy,
}

impl<S: LedgerStore> AllocationService<S> {
    /// Creates a new allocation service.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        Self {
            store,
            clock,
            max_retries: config.allocation.max_retries,
            overflow: config.allocation.overflow,
            credit: CreditPolicy::from_config(&config.credit),
        }
    }

    /// Applies a payment or credit instrument to invoices.
    ///
    /// Resubmitting a command with an already committed idempotency key
    /// returns the allocations of the first run without writing anything.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Allocation` if the engine rejects the batch,
    /// including `ConcurrentModification` once retries are exhausted, and
    /// `ServiceError::KeyReused` if the key belongs to a different command.
    pub async fn allocate(
        &self,
        command: AllocationCommand,
    ) -> Result<Vec<Allocation>, ServiceError> {
        let overflow = command.overflow.unwrap_or(self.overflow);
        let request = command.request.with_overflow(overflow);
        let fingerprint = CommandFingerprint::Allocate {
            source: command.source,
            request: request.clone(),
        };

        if let Some(previous) = self.replay(command.idempotency_key, &fingerprint).await? {
            return Ok(previous);
        }

        for attempt in 0..=self.max_retries {
            let mut batch = self
                .plan_allocation(command.source, &request, command.idempotency_key)
                .await?;
            batch.fingerprint = Some(fingerprint.clone());

            if let Some(allocations) = self.try_commit(batch, &fingerprint, attempt).await? {
                let total: Decimal = allocations.iter().map(|a| a.amount).sum();
                info!(
                    source = %command.source,
                    lines = allocations.len(),
                    total = %total,
                    attempt,
                    "Committed allocation"
                );
                return Ok(allocations);
            }
        }

        warn!(
            source = %command.source,
            retries = self.max_retries,
            "Allocation retries exhausted"
        );
        Err(AllocationError::ConcurrentModification.into())
    }

    /// Draws the counterparty's credit notes and advances down against one
    /// invoice in the configured pool order, the same order
    /// [`Self::net_payable`] previews.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Credit` if nothing can be applied,
    /// `ConcurrentModification` once retries are exhausted, or `KeyReused`
    /// if the key belongs to a different command.
    pub async fn apply_credit(
        &self,
        invoice_id: InvoiceId,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<Vec<Allocation>, ServiceError> {
        let fingerprint = CommandFingerprint::ApplyCredit { invoice_id };
        if let Some(previous) = self.replay(idempotency_key, &fingerprint).await? {
            return Ok(previous);
        }

        for attempt in 0..=self.max_retries {
            let mut invoice = self.load_invoice(invoice_id).await?;
            let mut pool = self
                .store
                .list_available_instruments(invoice.counterparty_id)
                .await?;

            let read_versions: HashMap<_, _> = pool
                .iter()
                .map(|i| (i.id, (i.version, i.amount_applied)))
                .collect();
            let invoice_version = invoice.version;

            let allocations = self
                .credit
                .apply_credit_to_invoice(&mut pool, &mut invoice, self.clock.now())?;

            let mut updates = vec![AppliedUpdate {
                entity: AppliedEntity::Invoice(invoice.id),
                new_amount: invoice.amount_applied,
                expected_version: invoice_version,
            }];
            for instrument in &pool {
                if let Some((version, applied)) = read_versions.get(&instrument.id)
                    && *applied != instrument.amount_applied
                {
                    updates.push(AppliedUpdate {
                        entity: AppliedEntity::CreditInstrument(instrument.id),
                        new_amount: instrument.amount_applied,
                        expected_version: *version,
                    });
                }
            }

            let batch = CommitBatch {
                idempotency_key,
                fingerprint: Some(fingerprint.clone()),
                updates,
                allocations,
                settles: None,
            };
            if let Some(allocations) = self.try_commit(batch, &fingerprint, attempt).await? {
                info!(
                    invoice_id = %invoice_id,
                    instruments = allocations.len(),
                    attempt,
                    "Applied credit to invoice"
                );
                return Ok(allocations);
            }
        }

        warn!(invoice_id = %invoice_id, retries = self.max_retries, "Credit retries exhausted");
        Err(AllocationError::ConcurrentModification.into())
    }

    /// How much of an invoice's balance due is covered by credit and
    /// advances, and what is left to pay in cash. Read only.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the invoice is missing or has nothing due.
    pub async fn net_payable(&self, invoice_id: InvoiceId) -> Result<NetPayable, ServiceError> {
        let invoice = self.load_invoice(invoice_id).await?;
        let pool = self
            .store
            .list_available_instruments(invoice.counterparty_id)
            .await?;
        Ok(self.credit.net_payable(invoice.balance_due(), &pool)?)
    }

    /// Replays the counterparty's allocation log against its entities.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Store` if the snapshot cannot be read.
    pub async fn verify(
        &self,
        counterparty_id: CounterpartyId,
    ) -> Result<Vec<IntegrityIssue>, ServiceError> {
        let set = self.store.snapshot(counterparty_id).await?;
        let issues =
            verify_conservation(&set.invoices, &set.payments, &set.instruments, &set.allocations);
        if !issues.is_empty() {
            warn!(
                counterparty_id = %counterparty_id,
                issues = issues.len(),
                "Allocation log does not replay cleanly"
            );
        }
        Ok(issues)
    }

    async fn replay(
        &self,
        idempotency_key: Option<IdempotencyKey>,
        fingerprint: &CommandFingerprint,
    ) -> Result<Option<Vec<Allocation>>, ServiceError> {
        let Some(key) = idempotency_key else {
            return Ok(None);
        };
        let Some(previous) = self.store.committed(key).await? else {
            return Ok(None);
        };
        Self::check_fingerprint(key, previous.fingerprint.as_ref(), fingerprint)?;
        info!(idempotency_key = %key, "Replaying committed command");
        Ok(Some(previous.allocations))
    }

    fn check_fingerprint(
        key: IdempotencyKey,
        stored: Option<&CommandFingerprint>,
        fingerprint: &CommandFingerprint,
    ) -> Result<(), ServiceError> {
        match stored {
            Some(stored) if stored != fingerprint => {
                warn!(idempotency_key = %key, "Idempotency key reused for a different command");
                Err(ServiceError::KeyReused(key))
            }
            _ => Ok(()),
        }
    }

    async fn load_invoice(&self, invoice_id: InvoiceId) -> Result<Invoice, ServiceError> {
        match self.store.get_invoice(invoice_id).await {
            Ok(invoice) => Ok(invoice),
            Err(StoreError::NotFound { .. }) => {
                Err(AllocationError::InvoiceNotFound(invoice_id).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn plan_allocation(
        &self,
        source_ref: SourceRef,
        request: &AllocationRequest,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Result<CommitBatch, ServiceError> {
        let mut source = match source_ref {
            SourceRef::Payment(id) => LoadedSource::Payment(self.store.get_payment(id).await?),
            SourceRef::CreditInstrument(id) => {
                LoadedSource::Instrument(self.store.get_instrument(id).await?)
            }
        };

        let mut invoices = match request {
            AllocationRequest::Explicit { lines, .. } => {
                let mut seen = HashSet::new();
                let mut invoices = Vec::with_capacity(lines.len());
                for line in lines {
                    if seen.insert(line.invoice_id) {
                        invoices.push(self.load_invoice(line.invoice_id).await?);
                    }
                }
                invoices
            }
            AllocationRequest::Auto => {
                let counterparty_id = source.counterparty_id();
                self.store.list_open_invoices(counterparty_id).await?
            }
        };

        let source_version = source.version();
        let now = self.clock.now();
        let allocations = source.allocate(&mut invoices, request, now)?;
        let settles = match &source {
            LoadedSource::Payment(p) if p.status() == PaymentStatus::Allocated => {
                Some((p.id, now))
            }
            _ => None,
        };

        let touched: HashSet<InvoiceId> = allocations.iter().map(|a| a.target_invoice_id).collect();
        let mut updates = vec![AppliedUpdate {
            entity: source.entity(),
            new_amount: source.amount_applied(),
            expected_version: source_version,
        }];
        updates.extend(
            invoices
                .iter()
                .filter(|i| touched.contains(&i.id))
                .map(|i| AppliedUpdate {
                    entity: AppliedEntity::Invoice(i.id),
                    new_amount: i.amount_applied,
                    expected_version: i.version,
                }),
        );

        debug!(
            source = %source_ref,
            lines = allocations.len(),
            updates = updates.len(),
            "Planned allocation batch"
        );

        Ok(CommitBatch {
            idempotency_key,
            fingerprint: None,
            updates,
            allocations,
            settles,
        })
    }

    /// `Ok(None)` on a version conflict, so the caller can re-run.
    async fn try_commit(
        &self,
        batch: CommitBatch,
        fingerprint: &CommandFingerprint,
        attempt: u32,
    ) -> Result<Option<Vec<Allocation>>, ServiceError> {
        match self.store.commit(batch).await {
            Ok(allocations) => Ok(Some(allocations)),
            Err(StoreError::VersionConflict {
                entity_id,
                expected,
                actual,
            }) => {
                warn!(
                    %entity_id,
                    expected,
                    actual,
                    attempt,
                    "Version conflict on commit, retrying"
                );
                Ok(None)
            }
            Err(StoreError::DuplicateKey(key)) => {
                // Same key committed concurrently.
                let previous = self
                    .store
                    .committed(key)
                    .await?
                    .ok_or(StoreError::DuplicateKey(key))?;
                Self::check_fingerprint(key, previous.fingerprint.as_ref(), fingerprint)?;
                Ok(Some(previous.allocations))
            }
            Err(err) => Err(err.into()),
        }
    }
}
