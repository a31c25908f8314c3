//! Business-day calendar trait and conventions.
//!
//! A [`Calendar`] answers three questions: is a date a business day, how
//! many business days separate two dates, and what is the n-th business day
//! after a date. Everything else (adjustment conventions, latest trading
//! day) is derived.

use crate::Date;
use chrono::{Datelike, Days, Weekday};

/// Rule for moving a date that falls on a non-business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusinessDayConvention {
    /// Move to the next business day.
    Following,
    /// Move to the previous business day.
    Preceding,
    /// Following, unless that crosses into the next month — then Preceding.
    ModifiedFollowing,
    /// Leave the date untouched.
    Unadjusted,
}

/// A business-day calendar.
///
/// Hosts implement this for market calendars with holiday tables; the
/// library only requires the three primitives below.
pub trait Calendar: std::fmt::Debug + Send + Sync {
    /// Whether `d` is a business day.
    fn is_business_day(&self, d: Date) -> bool;

    /// Number of business days in the half-open interval `(from, to]`.
    ///
    /// Negative when `to < from`.
    fn business_days_between(&self, from: Date, to: Date) -> i64 {
        if to < from {
            return -self.business_days_between(to, from);
        }
        let mut count = 0;
        let mut d = from;
        while d < to {
            d = d.checked_add_days(Days::new(1)).expect("date overflow");
            if self.is_business_day(d) {
                count += 1;
            }
        }
        count
    }

    /// The `n`-th business day strictly after `d` (`n` may be negative).
    fn advance(&self, d: Date, n: i32) -> Date {
        let step = if n >= 0 { 1 } else { -1 };
        let mut remaining = n.abs();
        let mut cur = d;
        while remaining > 0 {
            cur = shift(cur, step);
            if self.is_business_day(cur) {
                remaining -= 1;
            }
        }
        cur
    }

    /// Adjust `d` according to the given convention.
    fn adjust(&self, d: Date, convention: BusinessDayConvention) -> Date {
        match convention {
            BusinessDayConvention::Unadjusted => d,
            BusinessDayConvention::Following => self.next_or_same(d, 1),
            BusinessDayConvention::Preceding => self.next_or_same(d, -1),
            BusinessDayConvention::ModifiedFollowing => {
                let adjusted = self.next_or_same(d, 1);
                if adjusted.month() != d.month() {
                    self.next_or_same(d, -1)
                } else {
                    adjusted
                }
            }
        }
    }

    /// The closest business day to `d` in the given direction (`d` itself
    /// if it already is one).
    fn next_or_same(&self, d: Date, direction: i32) -> Date {
        let mut cur = d;
        while !self.is_business_day(cur) {
            cur = shift(cur, direction);
        }
        cur
    }
}

fn shift(d: Date, step: i32) -> Date {
    if step >= 0 {
        d.checked_add_days(Days::new(1)).expect("date overflow")
    } else {
        d.checked_sub_days(Days::new(1)).expect("date underflow")
    }
}

/// The latest business day on or before `d`.
pub fn latest_business_day(calendar: &dyn Calendar, d: Date) -> Date {
    calendar.next_or_same(d, -1)
}

/// A calendar whose only non-business days are Saturdays and Sundays.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekendCalendar;

impl Calendar for WeekendCalendar {
    fn is_business_day(&self, d: Date) -> bool {
        !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
