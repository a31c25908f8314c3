//! # pk-time
//!
//! Business-day arithmetic, observation-date schedules, and the valuation
//! date for pricekit-rs.
//!
//! Holiday tables are deliberately not part of this crate: hosts implement
//! [`Calendar`] for their markets and hand it to products. The bundled
//! [`WeekendCalendar`] (Monday–Friday) is the default used when no market
//! calendar is supplied.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod calendar;
pub mod schedule;

pub use calendar::{BusinessDayConvention, Calendar, WeekendCalendar};
pub use schedule::{Frequency, Schedule};

use pk_core::settings::Settings;

/// Date type used throughout the library.
pub type Date = chrono::NaiveDate;

/// Number of days per year used when converting dates to year fractions.
///
/// 365 is the natural-day convention; 243 and 244 are the trading-day
/// conventions used by autocallable term sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnualDays {
    /// 365 natural days.
    N365,
    /// 243 trading days.
    N243,
    /// 244 trading days.
    N244,
}

impl AnnualDays {
    /// The day count as a float divisor.
    pub fn days(self) -> f64 {
        match self {
            AnnualDays::N365 => 365.0,
            AnnualDays::N243 => 243.0,
            AnnualDays::N244 => 244.0,
        }
    }
}

/// Return the global valuation date.
///
/// Defaults to the latest weekday on or before today when the host has not
/// set one explicitly.
pub fn valuation_date() -> Date {
    match Settings::instance().valuation_date_serial() {
        Some(serial) => Date::from_num_days_from_ce_opt(serial)
            .expect("stored valuation date serial out of range"),
        None => {
            let today = chrono::Local::now().date_naive();
            calendar::latest_business_day(&WeekendCalendar, today)
        }
    }
}

/// Set the global valuation date.
pub fn set_valuation_date(d: Date) {
    use chrono::Datelike;
    Settings::instance().set_valuation_date_serial(d.num_days_from_ce());
}
