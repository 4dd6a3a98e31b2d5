//! Allocation log replay.
//!
//! The allocation log is the source of truth for applied amounts. Replaying
//! it and comparing against the `amount_applied` counters on each entity
//! verifies the conservation invariants on both sides of every allocation.

use std::collections::{HashMap, HashSet};

use remit_shared::types::AllocationId;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::source::FundingSource;
use super::types::{Allocation, CreditInstrument, Invoice, Payment};

/// A conservation or boundedness violation found by replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// Recorded `amount_applied` differs from the sum of its allocations.
    AppliedMismatch {
        /// Entity whose counter drifted.
        entity_id: Uuid,
        /// Counter stored on the entity.
        recorded: Decimal,
        /// Sum replayed from the allocation log.
        replayed: Decimal,
    },
    /// `amount_applied` is negative or exceeds the entity total.
    OutOfBounds {
        /// Offending entity.
        entity_id: Uuid,
        /// Applied amount.
        applied: Decimal,
        /// Entity total.
        total: Decimal,
    },
    /// Allocation references a source or invoice outside the checked set.
    OrphanAllocation {
        /// Offending allocation.
        allocation_id: AllocationId,
    },
    /// Allocation with a non-positive amount.
    NonPositiveAllocation {
        /// Offending allocation.
        allocation_id: AllocationId,
    },
}

/// Sums the allocation log for one entity, as source or as target.
#[must_use]
pub fn replay_applied(allocations: &[Allocation], entity_id: Uuid) -> Decimal {
    allocations
        .iter()
        .filter(|a| a.involves(entity_id))
        .map(|a| a.amount)
        .sum()
}

/// Replays `allocations` against the given entities and reports every
/// violation. An empty result means the books are consistent.
#[must_use]
pub fn verify_conservation(
    invoices: &[Invoice],
    payments: &[Payment],
    instruments: &[CreditInstrument],
    allocations: &[Allocation],
) -> Vec<IntegrityIssue> {
    let mut by_target: HashMap<Uuid, Decimal> = HashMap::new();
    let mut by_source: HashMap<Uuid, Decimal> = HashMap::new();
    for allocation in allocations {
        *by_target
            .entry(allocation.target_invoice_id.into_inner())
            .or_default() += allocation.amount;
        *by_source.entry(allocation.source.as_uuid()).or_default() += allocation.amount;
    }

    let mut issues = Vec::new();
    let mut known: HashSet<Uuid> = HashSet::new();

    let mut check = |entity_id: Uuid, total: Decimal, recorded: Decimal, replayed: Decimal| {
        known.insert(entity_id);
        if recorded < Decimal::ZERO || recorded > total {
            issues.push(IntegrityIssue::OutOfBounds {
                entity_id,
                applied: recorded,
                total,
            });
        }
        if recorded != replayed {
            issues.push(IntegrityIssue::AppliedMismatch {
                entity_id,
                recorded,
                replayed,
            });
        }
    };

    for invoice in invoices {
        let id = invoice.id.into_inner();
        let replayed = by_target.get(&id).copied().unwrap_or_default();
        check(id, invoice.gross_amount, invoice.amount_applied, replayed);
    }
    for payment in payments {
        let id = payment.id.into_inner();
        let replayed = by_source.get(&id).copied().unwrap_or_default();
        check(id, payment.total_amount(), payment.amount_applied, replayed);
    }
    for instrument in instruments {
        let id = instrument.id.into_inner();
        let replayed = by_source.get(&id).copied().unwrap_or_default();
        check(
            id,
            instrument.total_amount(),
            instrument.amount_applied,
            replayed,
        );
    }

    for allocation in allocations {
        if allocation.amount <= Decimal::ZERO {
            issues.push(IntegrityIssue::NonPositiveAllocation {
                allocation_id: allocation.id,
            });
        }
        let source_known = known.contains(&allocation.source.as_uuid());
        let target_known = known.contains(&allocation.target_invoice_id.into_inner());
        if !source_known || !target_known {
            issues.push(IntegrityIssue::OrphanAllocation {
                allocation_id: allocation.id,
            });
        }
    }

    issues
}
