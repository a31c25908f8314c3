//! Fixed cashflow.

use pk_core::{Real, Time};
use pk_time::{AnnualDays, Date};

/// A fixed cashflow on a payment date — a zero-coupon bond position.
#[derive(Debug, Clone)]
pub struct CashFlow {
    /// Payment date.
    pub payment_date: Date,
    /// Amount paid.
    pub amount: Real,
    /// Day convention for the year fraction to payment.
    pub annual_days: AnnualDays,
}

impl CashFlow {
    /// Create a cashflow with the 365-day convention.
    pub fn new(payment_date: Date, amount: Real) -> Self {
        Self {
            payment_date,
            amount,
            annual_days: AnnualDays::N365,
        }
    }

    /// Year fraction from `valuation` to payment (natural days).
    pub fn tau(&self, valuation: Date) -> Time {
        (self.payment_date - valuation).num_days() as Time / self.annual_days.days()
    }
}
