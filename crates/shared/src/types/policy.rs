//! Caller-selectable policies for allocation and credit consumption.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do when a requested allocation exceeds what can be applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the whole batch.
    #[default]
    Reject,
    /// Reduce each line to `min(balance_due, remaining_available)`.
    Clamp,
}

impl OverflowPolicy {
    /// Returns the string representation of the policy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Clamp => "clamp",
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order in which the credit pool is drawn down when computing a net payable.
///
/// Within each group instruments are always consumed oldest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolOrder {
    /// Credit and debit notes first, then advances.
    #[default]
    CreditsBeforeAdvances,
    /// Advances first, then credit and debit notes.
    AdvancesBeforeCredits,
    /// One pool ordered by issue date regardless of kind.
    OldestFirst,
}

impl PoolOrder {
    /// Returns the string representation of the order.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditsBeforeAdvances => "credits_before_advances",
            Self::AdvancesBeforeCredits => "advances_before_credits",
            Self::OldestFirst => "oldest_first",
        }
    }
}

impl fmt::Display for PoolOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
