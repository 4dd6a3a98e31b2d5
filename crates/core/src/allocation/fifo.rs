//! Greedy in-order fill shared by auto allocation and credit consumption.

use rust_decimal::Decimal;

/// Walks `items` in the given order, taking `min(item_capacity, remaining)`
/// from each until `capacity` is used up.
///
/// Items with nothing to take are skipped. The result sums to
/// `min(capacity, Σ item_capacity)` and never exceeds any single item.
pub fn fill_in_order<K, I>(capacity: Decimal, items: I) -> Vec<(K, Decimal)>
where
    I: IntoIterator<Item = (K, Decimal)>,
{
    let mut remaining = capacity.max(Decimal::ZERO);
    let mut taken = Vec::new();

    for (key, item_capacity) in items {
        if remaining.is_zero() {
            break;
        }
        let take = item_capacity.min(remaining);
        if take <= Decimal::ZERO {
            continue;
        }
        remaining -= take;
        taken.push((key, take));
    }

    taken
}
