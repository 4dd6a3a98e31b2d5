//! In-memory store.
//!
//! All state sits behind one `tokio::sync::RwLock`, so a commit is a single
//! write-locked section and a snapshot a single read-locked one.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use remit_core::ledger::{
    Allocation, CreditInstrument, CreditStatus, FundingSource, Invoice, InvoiceStatus, LedgerSet,
    Payment, validate_credit_instrument, validate_invoice, validate_payment,
};
use remit_shared::types::{CounterpartyId, CreditInstrumentId, IdempotencyKey, InvoiceId, PaymentId};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{
    AllocationCommitter, AllocationLog, AppliedEntity, AppliedUpdate, CommitBatch,
    CommittedCommand, CreditInstrumentStore, InvoiceStore, LedgerSnapshot, PaymentStore,
};

#[derive(Debug, Default)]
struct State {
    invoices: HashMap<InvoiceId, Invoice>,
    payments: HashMap<PaymentId, Payment>,
    instruments: HashMap<CreditInstrumentId, CreditInstrument>,
    allocations: Vec<Allocation>,
    committed: HashMap<IdempotencyKey, CommittedCommand>,
}

impl State {
    fn insert_invoice(&mut self, invoice: Invoice) -> StoreResult<()> {
        validate_invoice(&invoice)?;
        if self.invoices.contains_key(&invoice.id) {
            return Err(StoreError::AlreadyExists(invoice.id.into_inner()));
        }
        self.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    fn insert_payment(&mut self, payment: Payment) -> StoreResult<()> {
        validate_payment(&payment)?;
        if self.payments.contains_key(&payment.id) {
            return Err(StoreError::AlreadyExists(payment.id.into_inner()));
        }
        self.payments.insert(payment.id, payment);
        Ok(())
    }

    fn insert_instrument(&mut self, instrument: CreditInstrument) -> StoreResult<()> {
        validate_credit_instrument(&instrument)?;
        if self.instruments.contains_key(&instrument.id) {
            return Err(StoreError::AlreadyExists(instrument.id.into_inner()));
        }
        self.instruments.insert(instrument.id, instrument);
        Ok(())
    }

    fn invoice(&self, id: InvoiceId) -> StoreResult<&Invoice> {
        self.invoices.get(&id).ok_or(StoreError::NotFound {
            entity: "Invoice",
            id: id.into_inner(),
        })
    }

    fn payment(&self, id: PaymentId) -> StoreResult<&Payment> {
        self.payments.get(&id).ok_or(StoreError::NotFound {
            entity: "Payment",
            id: id.into_inner(),
        })
    }

    fn instrument(&self, id: CreditInstrumentId) -> StoreResult<&CreditInstrument> {
        self.instruments.get(&id).ok_or(StoreError::NotFound {
            entity: "Credit instrument",
            id: id.into_inner(),
        })
    }

    /// `(version, total)` of the entity an update targets.
    fn version_and_total(&self, entity: AppliedEntity) -> StoreResult<(i64, Decimal)> {
        match entity {
            AppliedEntity::Invoice(id) => {
                let invoice = self.invoice(id)?;
                Ok((invoice.version, invoice.gross_amount))
            }
            AppliedEntity::Payment(id) => {
                let payment = self.payment(id)?;
                Ok((payment.version, payment.total_amount()))
            }
            AppliedEntity::CreditInstrument(id) => {
                let instrument = self.instrument(id)?;
                Ok((instrument.version, instrument.total_amount()))
            }
        }
    }

    fn check(&self, update: &AppliedUpdate) -> StoreResult<()> {
        let entity_id = update.entity.as_uuid();
        let (version, total) = self.version_and_total(update.entity)?;
        if version != update.expected_version {
            return Err(StoreError::VersionConflict {
                entity_id,
                expected: update.expected_version,
                actual: version,
            });
        }
        if update.new_amount < Decimal::ZERO || update.new_amount > total {
            return Err(StoreError::OutOfBounds {
                entity_id,
                applied: update.new_amount,
                total,
            });
        }
        Ok(())
    }

    /// Writes a checked update and bumps the version. Returns the new version.
    fn apply(&mut self, update: &AppliedUpdate) -> i64 {
        let slot = match update.entity {
            AppliedEntity::Invoice(id) => self
                .invoices
                .get_mut(&id)
                .map(|i| (&mut i.amount_applied, &mut i.version)),
            AppliedEntity::Payment(id) => self
                .payments
                .get_mut(&id)
                .map(|p| (&mut p.amount_applied, &mut p.version)),
            AppliedEntity::CreditInstrument(id) => self
                .instruments
                .get_mut(&id)
                .map(|i| (&mut i.amount_applied, &mut i.version)),
        };
        match slot {
            Some((applied, version)) => {
                *applied = update.new_amount;
                *version += 1;
                *version
            }
            None => update.expected_version,
        }
    }

    fn snapshot(&self, counterparty_id: CounterpartyId) -> LedgerSet {
        let invoices = sorted(
            self.invoices
                .values()
                .filter(|i| i.counterparty_id == counterparty_id)
                .cloned()
                .collect(),
            |i: &Invoice| (i.issue_date, i.created_at),
        );
        let payments = sorted(
            self.payments
                .values()
                .filter(|p| p.counterparty_id == counterparty_id)
                .cloned()
                .collect(),
            |p: &Payment| (p.payment_date, p.created_at),
        );
        let instruments = sorted(
            self.instruments
                .values()
                .filter(|i| i.counterparty_id == counterparty_id)
                .cloned()
                .collect(),
            |i: &CreditInstrument| (i.issue_date, i.created_at),
        );

        let mut ids: Vec<Uuid> = invoices.iter().map(|i| i.id.into_inner()).collect();
        ids.extend(payments.iter().map(|p| p.id.into_inner()));
        ids.extend(instruments.iter().map(|i| i.id.into_inner()));
        let allocations = self
            .allocations
            .iter()
            .filter(|a| ids.iter().any(|id| a.involves(*id)))
            .cloned()
            .collect();

        LedgerSet {
            invoices,
            payments,
            instruments,
            allocations,
        }
    }
}

fn sorted<T, K: Ord>(mut items: Vec<T>, key: impl FnMut(&T) -> K) -> Vec<T> {
    items.sort_by_key(key);
    items
}

/// In-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding every entity and allocation in `set`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if an entity fails validation or an ID repeats.
    pub fn load(set: LedgerSet) -> StoreResult<Self> {
        let mut state = State::default();
        for invoice in set.invoices {
            state.insert_invoice(invoice)?;
        }
        for payment in set.payments {
            state.insert_payment(payment)?;
        }
        for instrument in set.instruments {
            state.insert_instrument(instrument)?;
        }
        state.allocations = set.allocations;

        debug!(
            invoices = state.invoices.len(),
            payments = state.payments.len(),
            instruments = state.instruments.len(),
            allocations = state.allocations.len(),
            "Loaded ledger into memory store"
        );

        Ok(Self {
            state: RwLock::new(state),
        })
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn insert_invoice(&self, invoice: Invoice) -> StoreResult<()> {
        self.state.write().await.insert_invoice(invoice)
    }

    async fn list_open_invoices(
        &self,
        counterparty_id: CounterpartyId,
    ) -> StoreResult<Vec<Invoice>> {
        let mut invoices = self.list_invoices(counterparty_id).await?;
        invoices.retain(Invoice::is_outstanding);
        Ok(invoices)
    }

    async fn list_invoices(&self, counterparty_id: CounterpartyId) -> StoreResult<Vec<Invoice>> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .invoices
                .values()
                .filter(|i| i.counterparty_id == counterparty_id)
                .cloned()
                .collect(),
            |i: &Invoice| (i.issue_date, i.created_at),
        ))
    }

    async fn list_all_invoices(&self) -> StoreResult<Vec<Invoice>> {
        let state = self.state.read().await;
        Ok(sorted(
            state.invoices.values().cloned().collect(),
            |i: &Invoice| (i.issue_date, i.created_at),
        ))
    }

    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Invoice> {
        self.state.read().await.invoice(id).cloned()
    }

    async fn update_applied_amount(
        &self,
        id: InvoiceId,
        new_amount: Decimal,
        new_status: InvoiceStatus,
        expected_version: i64,
    ) -> StoreResult<i64> {
        let mut state = self.state.write().await;
        let update = AppliedUpdate {
            entity: AppliedEntity::Invoice(id),
            new_amount,
            expected_version,
        };
        state.check(&update)?;

        let invoice = state.invoice(id)?;
        let derived = InvoiceStatus::derive(new_amount, invoice.gross_amount, invoice.cancelled);
        if derived != new_status {
            return Err(StoreError::InconsistentStatus {
                entity_id: id.into_inner(),
                given: new_status.to_string(),
                derived: derived.to_string(),
            });
        }

        Ok(state.apply(&update))
    }
}

#[async_trait]
impl CreditInstrumentStore for MemoryStore {
    async fn insert_instrument(&self, instrument: CreditInstrument) -> StoreResult<()> {
        self.state.write().await.insert_instrument(instrument)
    }

    async fn list_available_instruments(
        &self,
        counterparty_id: CounterpartyId,
    ) -> StoreResult<Vec<CreditInstrument>> {
        let mut instruments = self.list_instruments(counterparty_id).await?;
        instruments.retain(FundingSource::is_usable);
        Ok(instruments)
    }

    async fn list_instruments(
        &self,
        counterparty_id: CounterpartyId,
    ) -> StoreResult<Vec<CreditInstrument>> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .instruments
                .values()
                .filter(|i| i.counterparty_id == counterparty_id)
                .cloned()
                .collect(),
            |i: &CreditInstrument| (i.issue_date, i.created_at),
        ))
    }

    async fn get_instrument(&self, id: CreditInstrumentId) -> StoreResult<CreditInstrument> {
        self.state.read().await.instrument(id).cloned()
    }

    async fn update_applied_amount(
        &self,
        id: CreditInstrumentId,
        new_amount: Decimal,
        new_status: CreditStatus,
        expected_version: i64,
    ) -> StoreResult<i64> {
        let mut state = self.state.write().await;
        let update = AppliedUpdate {
            entity: AppliedEntity::CreditInstrument(id),
            new_amount,
            expected_version,
        };
        state.check(&update)?;

        let instrument = state.instrument(id)?;
        let derived =
            CreditStatus::derive(new_amount, instrument.original_amount, instrument.cancelled);
        if derived != new_status {
            return Err(StoreError::InconsistentStatus {
                entity_id: id.into_inner(),
                given: new_status.to_string(),
                derived: derived.to_string(),
            });
        }

        Ok(state.apply(&update))
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, payment: Payment) -> StoreResult<()> {
        self.state.write().await.insert_payment(payment)
    }

    async fn get_payment(&self, id: PaymentId) -> StoreResult<Payment> {
        self.state.read().await.payment(id).cloned()
    }

    async fn list_payments(&self, counterparty_id: CounterpartyId) -> StoreResult<Vec<Payment>> {
        let state = self.state.read().await;
        Ok(sorted(
            state
                .payments
                .values()
                .filter(|p| p.counterparty_id == counterparty_id)
                .cloned()
                .collect(),
            |p: &Payment| (p.payment_date, p.created_at),
        ))
    }

    async fn mark_allocated(&self, id: PaymentId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let payment = state.payments.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "Payment",
            id: id.into_inner(),
        })?;
        payment.allocated_at.get_or_insert(at);
        Ok(())
    }
}

#[async_trait]
impl AllocationLog for MemoryStore {
    async fn insert_allocation(&self, allocation: Allocation) -> StoreResult<()> {
        self.state.write().await.allocations.push(allocation);
        Ok(())
    }

    async fn list_allocations_for(&self, id: Uuid) -> StoreResult<Vec<Allocation>> {
        let state = self.state.read().await;
        Ok(state
            .allocations
            .iter()
            .filter(|a| a.involves(id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AllocationCommitter for MemoryStore {
    async fn commit(&self, batch: CommitBatch) -> StoreResult<Vec<Allocation>> {
        let mut state = self.state.write().await;

        if let Some(key) = batch.idempotency_key
            && state.committed.contains_key(&key)
        {
            return Err(StoreError::DuplicateKey(key));
        }
        for update in &batch.updates {
            state.check(update)?;
        }
        if let Some((payment_id, _)) = batch.settles {
            state.payment(payment_id)?;
        }

        for update in &batch.updates {
            state.apply(update);
        }
        if let Some((payment_id, at)) = batch.settles
            && let Some(payment) = state.payments.get_mut(&payment_id)
        {
            payment.allocated_at.get_or_insert(at);
        }
        state.allocations.extend(batch.allocations.iter().cloned());
        if let Some(key) = batch.idempotency_key {
            state.committed.insert(
                key,
                CommittedCommand {
                    fingerprint: batch.fingerprint,
                    allocations: batch.allocations.clone(),
                },
            );
        }

        Ok(batch.allocations)
    }

    async fn committed(&self, key: IdempotencyKey) -> StoreResult<Option<CommittedCommand>> {
        Ok(self.state.read().await.committed.get(&key).cloned())
    }
}

#[async_trait]
impl LedgerSnapshot for MemoryStore {
    async fn snapshot(&self, counterparty_id: CounterpartyId) -> StoreResult<LedgerSet> {
        Ok(self.state.read().await.snapshot(counterparty_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use remit_core::ledger::{CreditKind, LedgerSide, SourceRef};
    use remit_shared::types::AllocationId;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
    }

    #[tokio::test]
    async fn test_update_applied_amount_checks_version() {
        let store = MemoryStore::new();
        let invoice = Invoice::new(CounterpartyId::new(), "INV-1", date(), date(), dec!(100));
        let id = invoice.id;
        store.insert_invoice(invoice).await.unwrap();

        let version = InvoiceStore::update_applied_amount(
            &store,
            id,
            dec!(40),
            InvoiceStatus::PartiallyApplied,
            0,
        )
        .await
        .unwrap();
        assert_eq!(version, 1);

        let stale =
            InvoiceStore::update_applied_amount(&store, id, dec!(100), InvoiceStatus::Paid, 0)
                .await
                .unwrap_err();
        assert_eq!(stale.error_code(), "VERSION_CONFLICT");
        assert_eq!(store.get_invoice(id).await.unwrap().amount_applied, dec!(40));
    }

    #[tokio::test]
    async fn test_update_applied_amount_rejects_wrong_status() {
        let store = MemoryStore::new();
        let instrument = CreditInstrument::new(
            CounterpartyId::new(),
            CreditKind::CreditNote,
            "CN-1",
            date(),
            dec!(200),
        );
        let id = instrument.id;
        store.insert_instrument(instrument).await.unwrap();

        let err = CreditInstrumentStore::update_applied_amount(
            &store,
            id,
            dec!(150),
            CreditStatus::FullyApplied,
            0,
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "INCONSISTENT_STATUS");

        let version = CreditInstrumentStore::update_applied_amount(
            &store,
            id,
            dec!(150),
            CreditStatus::PartiallyApplied,
            0,
        )
        .await
        .unwrap();
        assert_eq!(version, 1);
        let counterparty_id = store.get_instrument(id).await.unwrap().counterparty_id;
        let available = store.list_available_instruments(counterparty_id).await.unwrap();
        assert_eq!(available[0].available_amount(), dec!(50));
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let cp = CounterpartyId::new();
        let store = MemoryStore::new();
        let invoice = Invoice::new(cp, "INV-1", date(), date(), dec!(100));
        let payment = Payment::new(cp, LedgerSide::Payable, "PAY-1", date(), dec!(50));
        let (invoice_id, payment_id) = (invoice.id, payment.id);
        store.insert_invoice(invoice).await.unwrap();
        store.insert_payment(payment).await.unwrap();

        let batch = CommitBatch {
            idempotency_key: None,
            fingerprint: None,
            updates: vec![
                AppliedUpdate {
                    entity: AppliedEntity::Invoice(invoice_id),
                    new_amount: dec!(60),
                    expected_version: 0,
                },
                AppliedUpdate {
                    entity: AppliedEntity::Payment(payment_id),
                    new_amount: dec!(60),
                    expected_version: 0,
                },
            ],
            allocations: vec![Allocation {
                id: AllocationId::new(),
                source: SourceRef::Payment(payment_id),
                target_invoice_id: invoice_id,
                amount: dec!(60),
                applied_at: Utc::now(),
            }],
            settles: Some((payment_id, Utc::now())),
        };

        let err = store.commit(batch).await.unwrap_err();

        assert_eq!(err.error_code(), "APPLIED_OUT_OF_BOUNDS");
        assert!(store.get_invoice(invoice_id).await.unwrap().amount_applied.is_zero());
        assert!(store.list_allocations_for(invoice_id.into_inner()).await.unwrap().is_empty());
        assert!(store.get_payment(payment_id).await.unwrap().allocated_at.is_none());
    }

    #[tokio::test]
    async fn test_mark_allocated_keeps_first_stamp() {
        let store = MemoryStore::new();
        let payment =
            Payment::new(CounterpartyId::new(), LedgerSide::Receivable, "R-1", date(), dec!(5));
        let id = payment.id;
        store.insert_payment(payment).await.unwrap();

        let first = Utc::now();
        store.mark_allocated(id, first).await.unwrap();
        store.mark_allocated(id, first + chrono::Duration::hours(1)).await.unwrap();

        assert_eq!(store.get_payment(id).await.unwrap().allocated_at, Some(first));
    }

    #[tokio::test]
    async fn test_commit_stamps_settled_payment_with_the_batch() {
        let cp = CounterpartyId::new();
        let store = MemoryStore::new();
        let invoice = Invoice::new(cp, "INV-1", date(), date(), dec!(100));
        let payment = Payment::new(cp, LedgerSide::Payable, "PAY-1", date(), dec!(40));
        let (invoice_id, payment_id) = (invoice.id, payment.id);
        store.insert_invoice(invoice).await.unwrap();
        store.insert_payment(payment).await.unwrap();

        let at = Utc::now();
        store
            .commit(CommitBatch {
                updates: vec![
                    AppliedUpdate {
                        entity: AppliedEntity::Invoice(invoice_id),
                        new_amount: dec!(40),
                        expected_version: 0,
                    },
                    AppliedUpdate {
                        entity: AppliedEntity::Payment(payment_id),
                        new_amount: dec!(40),
                        expected_version: 0,
                    },
                ],
                settles: Some((payment_id, at)),
                ..CommitBatch::default()
            })
            .await
            .unwrap();

        let stored = store.get_payment(payment_id).await.unwrap();
        assert_eq!(stored.amount_applied, dec!(40));
        assert_eq!(stored.allocated_at, Some(at));
    }

    #[tokio::test]
    async fn test_load_rejects_duplicate_ids() {
        let invoice = Invoice::new(CounterpartyId::new(), "INV-1", date(), date(), dec!(1));
        let set = LedgerSet {
            invoices: vec![invoice.clone(), invoice],
            ..LedgerSet::default()
        };
        let err = MemoryStore::load(set).unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_missing_entities_are_not_found() {
        let store = MemoryStore::new();
        let err = store.get_payment(PaymentId::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
