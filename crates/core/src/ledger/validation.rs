//! Invariant checks run before an entity is accepted by a store.

use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::LedgerError;
use super::types::{CreditInstrument, Invoice, Payment};

fn validate_amounts(entity_id: Uuid, total: Decimal, applied: Decimal) -> Result<(), LedgerError> {
    if total < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount {
            entity_id,
            amount: total,
        });
    }
    if applied < Decimal::ZERO || applied > total {
        return Err(LedgerError::AppliedOutOfBounds {
            entity_id,
            applied,
            total,
        });
    }
    Ok(())
}

/// Validates an invoice.
///
/// # Errors
///
/// Returns an error on negative amounts, out-of-bounds applied amounts, or a
/// due date before the issue date.
pub fn validate_invoice(invoice: &Invoice) -> Result<(), LedgerError> {
    validate_amounts(
        invoice.id.into_inner(),
        invoice.gross_amount,
        invoice.amount_applied,
    )?;
    if invoice.due_date < invoice.issue_date {
        return Err(LedgerError::DueBeforeIssue {
            invoice_id: invoice.id.into_inner(),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
        });
    }
    Ok(())
}

/// Validates a credit note, debit note or advance.
///
/// # Errors
///
/// Returns an error on negative or out-of-bounds amounts.
pub fn validate_credit_instrument(instrument: &CreditInstrument) -> Result<(), LedgerError> {
    validate_amounts(
        instrument.id.into_inner(),
        instrument.original_amount,
        instrument.amount_applied,
    )
}

/// Validates a payment or receipt.
///
/// # Errors
///
/// Returns an error on negative or out-of-bounds amounts.
pub fn validate_payment(payment: &Payment) -> Result<(), LedgerError> {
    validate_amounts(payment.id.into_inner(), payment.amount, payment.amount_applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::LedgerSide;
    use chrono::NaiveDate;
    use remit_shared::types::CounterpartyId;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn test_valid_invoice() {
        let invoice = Invoice::new(CounterpartyId::new(), "INV-1", date(1), date(31), dec!(100));
        assert!(validate_invoice(&invoice).is_ok());
    }

    #[test]
    fn test_negative_gross_rejected() {
        let invoice = Invoice::new(CounterpartyId::new(), "INV-1", date(1), date(31), dec!(-1));
        assert!(matches!(
            validate_invoice(&invoice),
            Err(LedgerError::NegativeAmount { .. })
        ));
    }

    #[test]
    fn test_overapplied_invoice_rejected() {
        let mut invoice =
            Invoice::new(CounterpartyId::new(), "INV-1", date(1), date(31), dec!(100));
        invoice.amount_applied = dec!(100.01);
        assert!(matches!(
            validate_invoice(&invoice),
            Err(LedgerError::AppliedOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_due_before_issue_rejected() {
        let invoice = Invoice::new(CounterpartyId::new(), "INV-1", date(10), date(9), dec!(100));
        let err = validate_invoice(&invoice).unwrap_err();
        assert_eq!(err.error_code(), "DUE_BEFORE_ISSUE");
    }

    #[test]
    fn test_negative_applied_payment_rejected() {
        let mut payment = Payment::new(
            CounterpartyId::new(),
            LedgerSide::Payable,
            "PAY-1",
            date(1),
            dec!(100),
        );
        payment.amount_applied = dec!(-5);
        assert!(validate_payment(&payment).is_err());
    }
}
