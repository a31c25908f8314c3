//! Observation-date schedules.
//!
//! A [`Schedule`] is the ordered list of observation dates an autocallable
//! or accrual product watches. It is generated from (start, end, frequency,
//! lock term, business-day convention, end-of-month rule), or built from an
//! explicit date list supplied by the host.

use crate::calendar::{BusinessDayConvention, Calendar};
use crate::Date;
use chrono::{Datelike, Days, Months};
use pk_core::errors::Result;
use pk_core::{ensure, Real};

/// Observation frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    /// Every business day.
    Daily,
    /// Every 7 calendar days.
    Weekly,
    /// Monthly anniversaries.
    Monthly,
    /// Quarterly anniversaries.
    Quarterly,
    /// Annual anniversaries.
    Annual,
}

/// An ordered, strictly increasing sequence of observation dates.
#[derive(Debug, Clone)]
pub struct Schedule {
    dates: Vec<Date>,
}

impl Schedule {
    /// Generate a schedule from `start` to `end`.
    ///
    /// The first `lock_term` periods after `start` carry no observation
    /// (the autocallable "lock"); the (adjusted) `end` date is always the
    /// last observation. With `end_of_month` set, monthly-and-longer
    /// schedules generated from a month-end start stick to month ends.
    pub fn generate(
        calendar: &dyn Calendar,
        start: Date,
        end: Date,
        freq: Frequency,
        lock_term: usize,
        convention: BusinessDayConvention,
        end_of_month: bool,
    ) -> Result<Self> {
        ensure!(start < end, "schedule start {start} must precede end {end}");

        let mut dates = Vec::new();
        if freq == Frequency::Daily {
            let mut d = calendar.advance(start, lock_term as i32 + 1);
            while d < end {
                dates.push(d);
                d = calendar.advance(d, 1);
            }
        } else {
            let mut k = lock_term as u32 + 1;
            loop {
                let unadjusted = anniversary(start, freq, k, end_of_month);
                if unadjusted >= end {
                    break;
                }
                let adjusted = calendar.adjust(unadjusted, convention);
                if adjusted < end {
                    dates.push(adjusted);
                }
                k += 1;
            }
        }
        dates.push(calendar.adjust(end, convention));
        dates.dedup();

        Self::from_dates(dates)
    }

    /// Build a schedule from an explicit date list.
    ///
    /// Fails unless the dates are strictly increasing.
    pub fn from_dates(dates: Vec<Date>) -> Result<Self> {
        ensure!(!dates.is_empty(), "schedule must contain at least one date");
        for w in dates.windows(2) {
            ensure!(
                w[0] < w[1],
                "schedule dates must be strictly increasing: {} >= {}",
                w[0],
                w[1]
            );
        }
        Ok(Self { dates })
    }

    /// All dates in the schedule.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Number of observation dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the schedule is empty (never true for a constructed one).
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// The `i`-th observation date.
    pub fn date(&self, i: usize) -> Date {
        self.dates[i]
    }

    /// The last observation date.
    pub fn last(&self) -> Date {
        *self.dates.last().expect("schedule is never empty")
    }

    /// Trading-day offsets of each observation from `from`.
    ///
    /// Observations on or before `from` get offset 0 (they are treated as
    /// already elapsed by the engines).
    pub fn business_day_offsets(&self, calendar: &dyn Calendar, from: Date) -> Vec<usize> {
        self.dates
            .iter()
            .map(|&d| calendar.business_days_between(from, d).max(0) as usize)
            .collect()
    }

    /// Year fractions of each observation from `from` on a trading-day grid.
    pub fn year_fractions(
        &self,
        calendar: &dyn Calendar,
        from: Date,
        steps_per_year: usize,
    ) -> Vec<Real> {
        self.business_day_offsets(calendar, from)
            .into_iter()
            .map(|n| n as Real / steps_per_year as Real)
            .collect()
    }
}

/// The `k`-th anniversary of `start` at the given frequency.
fn anniversary(start: Date, freq: Frequency, k: u32, end_of_month: bool) -> Date {
    match freq {
        Frequency::Daily => unreachable!("daily schedules are generated directly"),
        Frequency::Weekly => start
            .checked_add_days(Days::new(7 * k as u64))
            .expect("date overflow"),
        Frequency::Monthly | Frequency::Quarterly | Frequency::Annual => {
            let months = match freq {
                Frequency::Monthly => k,
                Frequency::Quarterly => 3 * k,
                _ => 12 * k,
            };
            let d = start
                .checked_add_months(Months::new(months))
                .expect("date overflow");
            if end_of_month && is_month_end(start) {
                month_end(d)
            } else {
                d
            }
        }
    }
}

fn is_month_end(d: Date) -> bool {
    d.checked_add_days(Days::new(1)).expect("date overflow").month() != d.month()
}

fn month_end(d: Date) -> Date {
    let first_next = Date::from_ymd_opt(
        if d.month() == 12 { d.year() + 1 } else { d.year() },
        if d.month() == 12 { 1 } else { d.month() + 1 },
        1,
    )
    .expect("valid month start");
    first_next.pred_opt().expect("date underflow")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekendCalendar;

    fn ymd(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_lock3_one_year() {
        let cal = WeekendCalendar;
        let s = Schedule::generate(
            &cal,
            ymd(2022, 1, 5),
            ymd(2023, 1, 5),
            Frequency::Monthly,
            3,
            BusinessDayConvention::ModifiedFollowing,
            false,
        )
        .unwrap();
        // Observations in months 4..=12: 9 dates.
        assert_eq!(s.len(), 9);
        assert_eq!(s.date(0), ymd(2022, 5, 5));
        assert_eq!(s.last(), ymd(2023, 1, 5));
        for w in s.dates().windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn weekend_anniversaries_are_adjusted() {
        let cal = WeekendCalendar;
        let s = Schedule::generate(
            &cal,
            ymd(2022, 1, 1), // Saturday start; anniversaries drift over weekends
            ymd(2023, 1, 1),
            Frequency::Monthly,
            0,
            BusinessDayConvention::ModifiedFollowing,
            false,
        )
        .unwrap();
        for &d in s.dates() {
            assert!(cal.is_business_day(d), "unadjusted date {d}");
        }
    }

    #[test]
    fn explicit_dates_must_increase() {
        let ok = Schedule::from_dates(vec![ymd(2023, 5, 29), ymd(2023, 6, 30)]);
        assert!(ok.is_ok());
        let bad = Schedule::from_dates(vec![ymd(2023, 6, 30), ymd(2023, 6, 30)]);
        assert!(bad.is_err());
    }

    #[test]
    fn business_day_offsets_from_valuation() {
        let cal = WeekendCalendar;
        let s = Schedule::from_dates(vec![ymd(2022, 1, 12), ymd(2022, 1, 19)]).unwrap();
        let offsets = s.business_day_offsets(&cal, ymd(2022, 1, 5));
        assert_eq!(offsets, vec![5, 10]);
        let yf = s.year_fractions(&cal, ymd(2022, 1, 5), 243);
        assert!((yf[0] - 5.0 / 243.0).abs() < 1e-15);
    }

    #[test]
    fn daily_schedule_is_every_business_day() {
        let cal = WeekendCalendar;
        let s = Schedule::generate(
            &cal,
            ymd(2022, 1, 5),
            ymd(2022, 1, 19),
            Frequency::Daily,
            0,
            BusinessDayConvention::Following,
            false,
        )
        .unwrap();
        assert_eq!(s.len(), 10);
        for &d in s.dates() {
            assert!(cal.is_business_day(d));
        }
    }

    #[test]
    fn end_of_month_rule_sticks_to_month_ends() {
        let cal = WeekendCalendar;
        let s = Schedule::generate(
            &cal,
            ymd(2022, 1, 31),
            ymd(2022, 7, 31),
            Frequency::Monthly,
            0,
            BusinessDayConvention::Unadjusted,
            true,
        )
        .unwrap();
        assert!(s.dates().contains(&ymd(2022, 2, 28)));
        assert!(s.dates().contains(&ymd(2022, 4, 30)));
    }
}
