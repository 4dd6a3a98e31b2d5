//! Funding sources: anything whose available amount can be applied to invoices.

use remit_shared::types::CounterpartyId;
use rust_decimal::Decimal;

use super::types::{CreditInstrument, Payment, SourceRef};

/// A payment, receipt, credit note, debit note or advance viewed as funds.
///
/// `available_amount = total_amount - amount_applied`.
pub trait FundingSource {
    /// Typed reference recorded on allocations.
    fn source_ref(&self) -> SourceRef;

    /// Owning counterparty.
    fn counterparty_id(&self) -> CounterpartyId;

    /// Face value of the source.
    fn total_amount(&self) -> Decimal;

    /// Amount already applied.
    fn amount_applied(&self) -> Decimal;

    /// Whether the source has been cancelled.
    fn is_cancelled(&self) -> bool;

    /// Adds `amount` to the applied total. The allocation engine enforces bounds.
    fn record_application(&mut self, amount: Decimal);

    /// Amount still available, never negative.
    fn available_amount(&self) -> Decimal {
        (self.total_amount() - self.amount_applied()).max(Decimal::ZERO)
    }

    /// Not cancelled and has something left to apply.
    fn is_usable(&self) -> bool {
        !self.is_cancelled() && self.available_amount() > Decimal::ZERO
    }
}

impl FundingSource for Payment {
    fn source_ref(&self) -> SourceRef {
        SourceRef::Payment(self.id)
    }

    fn counterparty_id(&self) -> CounterpartyId {
        self.counterparty_id
    }

    fn total_amount(&self) -> Decimal {
        self.amount
    }

    fn amount_applied(&self) -> Decimal {
        self.amount_applied
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn record_application(&mut self, amount: Decimal) {
        self.amount_applied += amount;
    }
}

impl FundingSource for CreditInstrument {
    fn source_ref(&self) -> SourceRef {
        SourceRef::CreditInstrument(self.id)
    }

    fn counterparty_id(&self) -> CounterpartyId {
        self.counterparty_id
    }

    fn total_amount(&self) -> Decimal {
        self.original_amount
    }

    fn amount_applied(&self) -> Decimal {
        self.amount_applied
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn record_application(&mut self, amount: Decimal) {
        self.amount_applied += amount;
    }
}
