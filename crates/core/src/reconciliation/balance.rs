//! Running balance chain for statements.

use rust_decimal::Decimal;
use serde::Serialize;

/// Balance before and after one statement line.
///
/// - `current_balance[N] = previous_balance[N] + change`
/// - `previous_balance[N] = current_balance[N-1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunningBalance {
    /// Position in the chain; the opening balance is 0.
    pub sequence: u64,
    /// Balance before this line.
    pub previous_balance: Decimal,
    /// Balance after this line.
    pub current_balance: Decimal,
}

impl RunningBalance {
    /// Seeds the chain with the period's opening balance.
    #[must_use]
    pub fn opening(balance: Decimal) -> Self {
        Self {
            sequence: 0,
            previous_balance: balance,
            current_balance: balance,
        }
    }

    /// Next link in the chain.
    #[must_use]
    pub fn next_entry(previous: &Self, balance_change: Decimal) -> Self {
        Self {
            sequence: previous.sequence + 1,
            previous_balance: previous.current_balance,
            current_balance: previous.current_balance + balance_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    /// Strategy for generating balance changes (can be positive or negative)
    fn balance_change_strategy() -> impl Strategy<Value = Decimal> {
        (-100_000i64..100_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The previous balance of each link is the current balance of the
        /// one before it.
        #[test]
        fn prop_previous_equals_prior_current(
            opening in balance_change_strategy(),
            change in balance_change_strategy(),
        ) {
            let first = RunningBalance::opening(opening);
            let second = RunningBalance::next_entry(&first, change);

            prop_assert_eq!(second.previous_balance, first.current_balance);
            prop_assert_eq!(second.current_balance, second.previous_balance + change);
        }

        /// The last link equals opening plus the sum of all changes.
        #[test]
        fn prop_final_balance_equals_opening_plus_changes(
            opening in balance_change_strategy(),
            changes in prop::collection::vec(balance_change_strategy(), 0..20),
        ) {
            let mut current = RunningBalance::opening(opening);
            for change in &changes {
                current = RunningBalance::next_entry(&current, *change);
            }

            let expected = opening + changes.iter().copied().sum::<Decimal>();
            prop_assert_eq!(current.current_balance, expected);
            prop_assert_eq!(current.sequence, changes.len() as u64);
        }
    }

    #[test]
    fn test_opening_has_no_change() {
        let rb = RunningBalance::opening(dec!(250.00));
        assert_eq!(rb.previous_balance, rb.current_balance);
        assert_eq!(rb.sequence, 0);
    }
}
