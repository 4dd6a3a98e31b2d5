//! Allocation request and plan types.

use remit_shared::types::{InvoiceId, OverflowPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Caller-requested amount for one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    /// Target invoice.
    pub invoice_id: InvoiceId,
    /// Requested amount.
    pub amount: Decimal,
}

impl RequestedLine {
    /// Creates a requested line.
    #[must_use]
    pub const fn new(invoice_id: InvoiceId, amount: Decimal) -> Self {
        Self { invoice_id, amount }
    }
}

/// How the engine should decide per-invoice amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AllocationRequest {
    /// Caller states each amount.
    Explicit {
        /// Ordered lines.
        lines: Vec<RequestedLine>,
        /// What to do when a line overflows its bounds.
        #[serde(default)]
        overflow: OverflowPolicy,
    },
    /// Apply everything available to the supplied invoices, oldest due first.
    Auto,
}

impl AllocationRequest {
    /// Explicit request that rejects overflowing lines.
    #[must_use]
    pub fn explicit(lines: Vec<RequestedLine>) -> Self {
        Self::Explicit {
            lines,
            overflow: OverflowPolicy::Reject,
        }
    }

    /// Explicit request that clamps overflowing lines.
    #[must_use]
    pub fn clamped(lines: Vec<RequestedLine>) -> Self {
        Self::Explicit {
            lines,
            overflow: OverflowPolicy::Clamp,
        }
    }

    /// Same request with a different overflow policy. No-op for `Auto`.
    #[must_use]
    pub fn with_overflow(self, policy: OverflowPolicy) -> Self {
        match self {
            Self::Explicit { lines, .. } => Self::Explicit {
                lines,
                overflow: policy,
            },
            Self::Auto => Self::Auto,
        }
    }
}

/// A validated line the engine is about to commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAllocation {
    /// Target invoice.
    pub invoice_id: InvoiceId,
    /// Amount to apply.
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_explicit_defaults_to_reject() {
        let request = AllocationRequest::explicit(vec![]);
        assert!(matches!(
            request,
            AllocationRequest::Explicit {
                overflow: OverflowPolicy::Reject,
                ..
            }
        ));
    }

    #[test]
    fn test_with_overflow() {
        let line = RequestedLine::new(InvoiceId::new(), dec!(5));
        let request = AllocationRequest::explicit(vec![line]).with_overflow(OverflowPolicy::Clamp);
        assert!(matches!(
            request,
            AllocationRequest::Explicit {
                overflow: OverflowPolicy::Clamp,
                ..
            }
        ));
        assert_eq!(
            AllocationRequest::Auto.with_overflow(OverflowPolicy::Clamp),
            AllocationRequest::Auto
        );
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "mode": "explicit",
            "lines": [{"invoice_id": "0190a4b2-7c3e-7000-8000-000000000001", "amount": "10.50"}]
        }"#;
        let request: AllocationRequest = serde_json::from_str(json).unwrap();
        match request {
            AllocationRequest::Explicit { lines, overflow } => {
                assert_eq!(lines[0].amount, dec!(10.50));
                assert_eq!(overflow, OverflowPolicy::Reject);
            }
            AllocationRequest::Auto => panic!("expected explicit request"),
        }
    }
}
