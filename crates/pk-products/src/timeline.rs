//! Product timing: start/end dates, trading calendar, step conventions.

use chrono::Days;
use pk_core::errors::Result;
use pk_core::{ensure, Real, Time};
use pk_time::{AnnualDays, Calendar, Date};
use std::sync::Arc;

/// The timing block every product carries.
#[derive(Debug, Clone)]
pub struct Timeline {
    /// Trade start date.
    pub start_date: Date,
    /// Trade end (expiry) date.
    pub end_date: Date,
    /// Trading calendar for business-day arithmetic.
    pub calendar: Arc<dyn Calendar>,
    /// Natural-day convention for date ↔ year-fraction conversions.
    pub annual_days: AnnualDays,
    /// Trading days per year; the simulation/PDE grids step on trading days.
    pub steps_per_year: usize,
}

impl Timeline {
    /// Build from explicit start and end dates.
    pub fn new(
        start_date: Date,
        end_date: Date,
        calendar: Arc<dyn Calendar>,
        annual_days: AnnualDays,
        steps_per_year: usize,
    ) -> Result<Self> {
        ensure!(
            start_date < end_date,
            "start date {start_date} must precede end date {end_date}"
        );
        ensure!(steps_per_year >= 1, "steps_per_year must be at least 1");
        Ok(Self {
            start_date,
            end_date,
            calendar,
            annual_days,
            steps_per_year,
        })
    }

    /// Build from a start date and a maturity in years; the end date is
    /// `start + round(maturity · annual_days)` natural days.
    pub fn from_maturity(
        start_date: Date,
        maturity: Real,
        calendar: Arc<dyn Calendar>,
        annual_days: AnnualDays,
        steps_per_year: usize,
    ) -> Result<Self> {
        ensure!(maturity > 0.0, "maturity must be positive, got {maturity}");
        let days = (maturity * annual_days.days()).round() as u64;
        let end_date = start_date
            .checked_add_days(Days::new(days))
            .expect("maturity overflows the date range");
        Self::new(start_date, end_date, calendar, annual_days, steps_per_year)
    }

    /// Year fraction from `valuation` to expiry on the trading-day grid.
    pub fn tau(&self, valuation: Date) -> Time {
        self.calendar.business_days_between(valuation, self.end_date) as Time
            / self.steps_per_year as Time
    }

    /// Trading days from `valuation` to expiry.
    pub fn steps_to_expiry(&self, valuation: Date) -> i64 {
        self.calendar.business_days_between(valuation, self.end_date)
    }
}
