//! Credit consumption policy.
//!
//! Credit notes, debit notes and advances form a pool per counterparty.
//! [`CreditPolicy::consume`] draws it down oldest first by issue date, ties
//! broken by creation order. Net payable previews and credit application both
//! follow the policy's [`PoolOrder`], so a preview commits exactly as shown.

use chrono::{DateTime, Utc};
use remit_shared::config::CreditConfig;
use remit_shared::types::{CreditInstrumentId, PoolOrder};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::error::CreditError;
use crate::allocation::{
    AllocationEngine, AllocationError, AllocationRequest, RequestedLine, fill_in_order,
};
use crate::ledger::{Allocation, CreditInstrument, FundingSource, Invoice};

/// Amount drawn from one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditConsumption {
    /// Instrument drawn from.
    pub instrument_id: CreditInstrumentId,
    /// Amount taken.
    pub amount: Decimal,
}

/// How much of an invoice total is covered by credit, advances and cash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetPayable {
    /// Invoice total before any deduction.
    pub invoice_total: Decimal,
    /// Covered by credit and debit notes.
    pub credit_applied: Decimal,
    /// Covered by advances.
    pub advance_applied: Decimal,
    /// Left to settle in cash: `total - credit_applied - advance_applied`.
    pub net: Decimal,
    /// Per-instrument draw-down, in consumption order.
    pub consumed: Vec<CreditConsumption>,
}

/// Credit consumption with a configured pool order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreditPolicy {
    order: PoolOrder,
}

impl CreditPolicy {
    /// Creates a policy with the given pool order.
    #[must_use]
    pub const fn new(order: PoolOrder) -> Self {
        Self { order }
    }

    /// Creates a policy from configuration.
    #[must_use]
    pub const fn from_config(config: &CreditConfig) -> Self {
        Self::new(config.pool_order)
    }

    /// Pool order used by [`Self::net_payable`] and
    /// [`Self::apply_credit_to_invoice`].
    #[must_use]
    pub const fn order(&self) -> PoolOrder {
        self.order
    }

    /// Plans the draw-down of `pool` against `target`, oldest issue date
    /// first.
    ///
    /// Cancelled and exhausted instruments are skipped. The result sums to
    /// `min(target, total available)`; a non-positive target yields nothing.
    #[must_use]
    pub fn consume(pool: &[CreditInstrument], target: Decimal) -> Vec<CreditConsumption> {
        let mut usable: Vec<&CreditInstrument> = pool.iter().filter(|i| i.is_usable()).collect();
        usable.sort_by_key(|i| (i.issue_date, i.created_at));
        Self::fill(target, &usable)
    }

    /// Splits `invoice_total` into credit, advance and cash portions,
    /// drawing on `pool` in this policy's order. Nothing is mutated.
    ///
    /// # Errors
    ///
    /// Returns `CreditError::NonPositiveTarget` if `invoice_total <= 0`.
    pub fn net_payable(
        &self,
        invoice_total: Decimal,
        pool: &[CreditInstrument],
    ) -> Result<NetPayable, CreditError> {
        if invoice_total <= Decimal::ZERO {
            return Err(CreditError::NonPositiveTarget(invoice_total));
        }

        let usable = self.ordered(pool);
        let consumed = Self::fill(invoice_total, &usable);

        let mut credit_applied = Decimal::ZERO;
        let mut advance_applied = Decimal::ZERO;
        for line in &consumed {
            let is_note = usable
                .iter()
                .find(|i| i.id == line.instrument_id)
                .is_some_and(|i| i.kind.is_note());
            if is_note {
                credit_applied += line.amount;
            } else {
                advance_applied += line.amount;
            }
        }

        Ok(NetPayable {
            invoice_total,
            credit_applied,
            advance_applied,
            net: invoice_total - credit_applied - advance_applied,
            consumed,
        })
    }

    /// Draws `pool` down against the invoice's balance due in this policy's
    /// order and commits each line through the allocation engine. The lines
    /// match what [`Self::net_payable`] previews for the same balance.
    ///
    /// All or nothing: on error neither the invoice nor any instrument is
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns `CreditError` if the invoice cannot receive funds, an
    /// instrument belongs to another counterparty, or nothing is usable.
    pub fn apply_credit_to_invoice(
        &self,
        pool: &mut [CreditInstrument],
        invoice: &mut Invoice,
        applied_at: DateTime<Utc>,
    ) -> Result<Vec<Allocation>, CreditError> {
        if !invoice.is_outstanding() {
            return Err(AllocationError::InvoiceNotAllocatable {
                invoice_id: invoice.id,
                status: invoice.status(),
            }
            .into());
        }
        if let Some(foreign) = pool.iter().find(|i| i.counterparty_id != invoice.counterparty_id) {
            return Err(CreditError::CounterpartyMismatch {
                instrument_id: foreign.id,
                counterparty_id: invoice.counterparty_id,
            });
        }

        let plan = Self::fill(invoice.balance_due(), &self.ordered(pool));
        if plan.is_empty() {
            return Err(CreditError::NoUsableCredit(invoice.counterparty_id));
        }

        let mut working_invoice = invoice.clone();
        let mut working_pool = pool.to_vec();
        let mut allocations = Vec::with_capacity(plan.len());

        for line in &plan {
            let Some(instrument) = working_pool.iter_mut().find(|i| i.id == line.instrument_id)
            else {
                continue;
            };
            let request = AllocationRequest::explicit(vec![RequestedLine::new(
                working_invoice.id,
                line.amount,
            )]);
            allocations.extend(AllocationEngine::allocate(
                instrument,
                std::slice::from_mut(&mut working_invoice),
                &request,
                applied_at,
            )?);
        }

        debug!(
            invoice_id = %invoice.id,
            instruments = plan.len(),
            "Applied credit to invoice"
        );

        *invoice = working_invoice;
        pool.clone_from_slice(&working_pool);
        Ok(allocations)
    }

    /// Usable instruments in this policy's order.
    fn ordered<'a>(&self, pool: &'a [CreditInstrument]) -> Vec<&'a CreditInstrument> {
        let mut usable: Vec<&CreditInstrument> = pool.iter().filter(|i| i.is_usable()).collect();
        match self.order {
            PoolOrder::CreditsBeforeAdvances => {
                usable.sort_by_key(|i| (!i.kind.is_note(), i.issue_date, i.created_at));
            }
            PoolOrder::AdvancesBeforeCredits => {
                usable.sort_by_key(|i| (i.kind.is_note(), i.issue_date, i.created_at));
            }
            PoolOrder::OldestFirst => usable.sort_by_key(|i| (i.issue_date, i.created_at)),
        }
        usable
    }

    fn fill(target: Decimal, ordered: &[&CreditInstrument]) -> Vec<CreditConsumption> {
        fill_in_order(target, ordered.iter().map(|i| (i.id, i.available_amount())))
            .into_iter()
            .map(|(instrument_id, amount)| CreditConsumption {
                instrument_id,
                amount,
            })
            .collect()
    }
}
