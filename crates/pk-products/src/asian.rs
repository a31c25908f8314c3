//! Asian options.

use crate::enums::{AveSubstitution, AverageMethod, CallPut};
use crate::timeline::Timeline;
use pk_core::errors::Result;
use pk_core::{ensure, Real};
use pk_time::Date;

/// An Asian option averaging daily closes over an observation window.
///
/// The average can substitute the terminal underlying price (average-price
/// option) or the strike (average-strike option). Enhanced Asians cap the
/// averaged observations at `limited_price` before averaging.
#[derive(Debug, Clone)]
pub struct AsianOption {
    /// Strike (ignored for strike substitution).
    pub strike: Real,
    /// Call or put.
    pub callput: CallPut,
    /// Geometric or arithmetic averaging.
    pub ave_method: AverageMethod,
    /// Which payoff leg the average substitutes.
    pub substitute: AveSubstitution,
    /// Whether observations are capped at `limited_price`.
    pub enhanced: bool,
    /// Observation cap for enhanced Asians.
    pub limited_price: Option<Real>,
    /// First averaging observation date; defaults to the trade start.
    pub obs_start: Date,
    /// Timing block.
    pub timeline: Timeline,
}

impl AsianOption {
    /// Create an Asian option averaging from `obs_start` (or the trade
    /// start when `None`) to expiry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strike: Real,
        callput: CallPut,
        ave_method: AverageMethod,
        substitute: AveSubstitution,
        enhanced: bool,
        limited_price: Option<Real>,
        obs_start: Option<Date>,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(strike > 0.0, "strike must be positive, got {strike}");
        ensure!(
            !enhanced || limited_price.is_some(),
            "an enhanced Asian needs a limited_price cap"
        );
        ensure!(
            !enhanced || substitute == AveSubstitution::Underlying,
            "enhanced payoffs only substitute the underlying"
        );
        let obs_start = obs_start.unwrap_or(timeline.start_date);
        ensure!(
            obs_start < timeline.end_date,
            "averaging must start before expiry"
        );
        Ok(Self {
            strike,
            callput,
            ave_method,
            substitute,
            enhanced,
            limited_price,
            obs_start,
            timeline,
        })
    }

    /// Payoff given the path average and the terminal spot.
    pub fn payoff(&self, average: Real, terminal: Real) -> Real {
        let phi = self.callput.sign();
        match self.substitute {
            AveSubstitution::Underlying => (phi * (average - self.strike)).max(0.0),
            AveSubstitution::Strike => (phi * (terminal - average)).max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pk_time::{AnnualDays, WeekendCalendar};
    use std::sync::Arc;

    fn timeline() -> Timeline {
        Timeline::from_maturity(
            Date::from_ymd_opt(2023, 1, 5).unwrap(),
            1.0,
            Arc::new(WeekendCalendar),
            AnnualDays::N365,
            243,
        )
        .unwrap()
    }

    #[test]
    fn average_price_payoff() {
        let opt = AsianOption::new(
            100.0,
            CallPut::Call,
            AverageMethod::Geometric,
            AveSubstitution::Underlying,
            false,
            None,
            None,
            timeline(),
        )
        .unwrap();
        assert_eq!(opt.payoff(105.0, 90.0), 5.0);
        assert_eq!(opt.payoff(95.0, 150.0), 0.0);
    }

    #[test]
    fn average_strike_payoff() {
        let opt = AsianOption::new(
            100.0,
            CallPut::Put,
            AverageMethod::Arithmetic,
            AveSubstitution::Strike,
            false,
            None,
            None,
            timeline(),
        )
        .unwrap();
        assert_eq!(opt.payoff(105.0, 95.0), 10.0);
    }

    #[test]
    fn enhanced_requires_cap() {
        let r = AsianOption::new(
            100.0,
            CallPut::Call,
            AverageMethod::Arithmetic,
            AveSubstitution::Underlying,
            true,
            None,
            None,
            timeline(),
        );
        assert!(r.is_err());
    }
}
