//! Aging classification of outstanding invoices.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use remit_shared::types::CounterpartyId;
use rust_decimal::Decimal;

use super::types::{AgingBuckets, AgingReport, BucketTotal, CounterpartyAging};
use crate::ledger::Invoice;

/// Classifies invoice balances into aging buckets.
pub struct AgingClassifier;

impl AgingClassifier {
    /// Days between the due date and `as_of`; zero or negative means not yet
    /// overdue.
    #[must_use]
    pub fn days_overdue(invoice: &Invoice, as_of: NaiveDate) -> i64 {
        (as_of - invoice.due_date).num_days()
    }

    /// Ages every outstanding invoice's balance due as of `as_of`.
    ///
    /// Paid and cancelled invoices are omitted. Every remaining balance
    /// lands in exactly one bucket, so the bucket amounts sum to `total`.
    #[must_use]
    pub fn classify(invoices: &[Invoice], as_of: NaiveDate, buckets: &AgingBuckets) -> AgingReport {
        let mut overall = empty_totals(buckets);
        let mut by_counterparty: BTreeMap<CounterpartyId, Vec<BucketTotal>> = BTreeMap::new();

        for invoice in invoices.iter().filter(|i| i.is_outstanding()) {
            let index = buckets.index_for(Self::days_overdue(invoice, as_of));
            let balance = invoice.balance_due();

            add(&mut overall[index], balance);
            let per_counterparty = by_counterparty
                .entry(invoice.counterparty_id)
                .or_insert_with(|| empty_totals(buckets));
            add(&mut per_counterparty[index], balance);
        }

        let by_counterparty = by_counterparty
            .into_iter()
            .map(|(counterparty_id, buckets)| CounterpartyAging {
                counterparty_id,
                total: buckets.iter().map(|b| b.amount).sum(),
                buckets,
            })
            .collect();

        AgingReport {
            report_type: "aging".to_string(),
            as_of,
            total: overall.iter().map(|b| b.amount).sum(),
            buckets: overall,
            by_counterparty,
        }
    }
}

fn empty_totals(buckets: &AgingBuckets) -> Vec<BucketTotal> {
    buckets
        .as_slice()
        .iter()
        .map(|b| BucketTotal {
            label: b.label.clone(),
            amount: Decimal::ZERO,
            count: 0,
        })
        .collect()
}

fn add(total: &mut BucketTotal, amount: Decimal) {
    total.amount += amount;
    total.count += 1;
}
