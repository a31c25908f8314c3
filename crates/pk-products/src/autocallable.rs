//! Autocallable structures: binary autocall notes, snowballs, phoenixes.
//!
//! All autocallables here are quoted per `s0` notional: a par structure on
//! a 100-spot underlying prices near 100.

use crate::enums::{CallPut, Status};
use crate::timeline::Timeline;
use pk_core::errors::Result;
use pk_core::{ensure, Real};
use pk_time::{BusinessDayConvention, Frequency, Schedule};

/// A binary autocall note (no knock-in leg).
///
/// On each observation date after the lock the note redeems at
/// `notional · (1 + coupon_out · τᵢ)` when spot breaches the out barrier
/// (above for `Call`, below for `Put`). Surviving to expiry pays
/// `notional · (1 + coupon_div · T)`.
#[derive(Debug, Clone)]
pub struct AutoCall {
    /// Initial spot fixing; also the notional scale.
    pub s0: Real,
    /// Knock-out barrier.
    pub barrier_out: Real,
    /// Annualised knock-out coupon.
    pub coupon_out: Real,
    /// Annualised survival coupon paid at expiry.
    pub coupon_div: Real,
    /// Call: out above the barrier; Put: out below.
    pub callput: CallPut,
    /// Margin scale applied to the quoted PV.
    pub margin_lvl: Real,
    /// Knock-out observation dates.
    pub obs: Schedule,
    /// Timing block.
    pub timeline: Timeline,
}

impl AutoCall {
    /// Create an autocall note with monthly observations after `lock_term`
    /// months.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        s0: Real,
        barrier_out: Real,
        coupon_out: Real,
        coupon_div: Real,
        callput: CallPut,
        lock_term: usize,
        margin_lvl: Real,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(s0 > 0.0, "initial fixing must be positive, got {s0}");
        ensure!(barrier_out > 0.0, "out barrier must be positive");
        let obs = monthly_observations(&timeline, lock_term)?;
        Ok(Self {
            s0,
            barrier_out,
            coupon_out,
            coupon_div,
            callput,
            margin_lvl,
            obs,
            timeline,
        })
    }

    /// Same note with an explicit observation schedule.
    pub fn with_observations(mut self, obs: Schedule) -> Self {
        self.obs = obs;
        self
    }

    /// Whether spot `s` triggers the early redemption.
    pub fn knocks_out(&self, s: Real) -> bool {
        match self.callput {
            CallPut::Call => s >= self.barrier_out,
            CallPut::Put => s <= self.barrier_out,
        }
    }
}

/// A snowball note.
///
/// Knock-out is observed on the schedule against a per-date barrier;
/// knock-in is observed daily against `barrier_in`. Redemption pays the
/// annualised `coupon_out`; surviving untouched pays `coupon_div`
/// (defaulting to the out coupon); knocked-in notes convert the downside
/// into a short put struck at `knock_in_strike`, optionally floored and
/// optionally packaged with an upside participation leg (snowball-plus).
#[derive(Debug, Clone)]
pub struct Snowball {
    /// Initial spot fixing; also the notional scale.
    pub s0: Real,
    /// Knock-out barrier per observation date.
    pub barrier_out: Vec<Real>,
    /// Daily knock-in barrier.
    pub barrier_in: Real,
    /// Annualised knock-out coupon.
    pub coupon_out: Real,
    /// Annualised survival coupon; falls back to `coupon_out` when `None`.
    pub coupon_div: Option<Real>,
    /// Strike of the knocked-in short put.
    pub knock_in_strike: Real,
    /// Floor on the redemption fraction after knock-in (e.g. 0.8 caps the
    /// loss at 20 % of notional).
    pub floor: Option<Real>,
    /// Participation of the upside call leg (snowball-plus), zero to omit.
    pub parti_out: Real,
    /// Strike of the upside call leg.
    pub strike_call: Option<Real>,
    /// Margin scale applied to the quoted PV.
    pub margin_lvl: Real,
    /// Knock-out observation dates.
    pub obs: Schedule,
    /// Barrier lifecycle at valuation.
    pub status: Status,
    /// Timing block.
    pub timeline: Timeline,
}

impl Snowball {
    /// Create a standard (flat-barrier) snowball with monthly observations
    /// after `lock_term` months.
    #[allow(clippy::too_many_arguments)]
    pub fn standard(
        s0: Real,
        barrier_out: Real,
        barrier_in: Real,
        coupon_out: Real,
        coupon_div: Option<Real>,
        lock_term: usize,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(s0 > 0.0, "initial fixing must be positive, got {s0}");
        ensure!(
            barrier_in < barrier_out,
            "knock-in barrier {barrier_in} must sit below the out barrier {barrier_out}"
        );
        let obs = monthly_observations(&timeline, lock_term)?;
        let barrier_out = vec![barrier_out; obs.len()];
        Ok(Self {
            s0,
            barrier_out,
            barrier_in,
            coupon_out,
            coupon_div,
            knock_in_strike: s0,
            floor: None,
            parti_out: 0.0,
            strike_call: None,
            margin_lvl: 1.0,
            obs,
            status: Status::NoTouch,
            timeline,
        })
    }

    /// Replace the per-date knock-out barriers (step-down structures).
    pub fn with_barriers(mut self, barrier_out: Vec<Real>) -> Result<Self> {
        ensure!(
            barrier_out.len() == self.obs.len(),
            "need one barrier per observation: {} barriers vs {} dates",
            barrier_out.len(),
            self.obs.len()
        );
        self.barrier_out = barrier_out;
        Ok(self)
    }

    /// Attach an upside participation leg (snowball-plus).
    pub fn with_upside(mut self, parti_out: Real, strike_call: Real) -> Self {
        self.parti_out = parti_out;
        self.strike_call = Some(strike_call);
        self
    }

    /// Decouple the knocked-in put strike from `s0` (OTM snowball).
    pub fn with_knock_in_strike(mut self, strike: Real) -> Self {
        self.knock_in_strike = strike;
        self
    }

    /// Floor the post-knock-in redemption fraction (limited-loss snowball).
    pub fn with_floor(mut self, floor: Real) -> Self {
        self.floor = Some(floor);
        self
    }

    /// Same note with an explicit status.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Survival coupon (annualised) paid when neither barrier ever trades.
    pub fn survival_coupon(&self) -> Real {
        self.coupon_div.unwrap_or(self.coupon_out)
    }

    /// Redemption fraction of notional at terminal spot `s` after a
    /// knock-in: `1 − max(1 − S/K, 0)` floored at the loss floor.
    pub fn knocked_in_fraction(&self, s: Real) -> Real {
        let frac = 1.0 - (1.0 - s / self.knock_in_strike).max(0.0);
        match self.floor {
            Some(f) => frac.max(f),
            None => frac,
        }
    }

    /// Upside leg payoff fraction at terminal spot `s` (zero without one).
    pub fn upside_fraction(&self, s: Real) -> Real {
        match self.strike_call {
            Some(k) => self.parti_out * (s / self.s0 - k / self.s0).max(0.0),
            None => 0.0,
        }
    }
}

/// A phoenix note; FCN and DCN are parameterisations of the same shape.
///
/// On each observation date a period coupon pays when spot is at or above
/// `barrier_yield`; after the lock the note also redeems early at par when
/// spot is at or above `barrier_out`. Knock-in is observed daily; a
/// knocked-in note redeems `min(S_T / knock_in_strike, 1)` at expiry.
#[derive(Debug, Clone)]
pub struct Phoenix {
    /// Initial spot fixing; also the notional scale.
    pub s0: Real,
    /// Knock-out barrier.
    pub barrier_out: Real,
    /// Daily knock-in barrier.
    pub barrier_in: Real,
    /// Coupon condition barrier.
    pub barrier_yield: Real,
    /// Per-period coupon (not annualised).
    pub coupon: Real,
    /// Strike of the knocked-in conversion.
    pub knock_in_strike: Real,
    /// Observation dates for coupons; knock-out observation starts at
    /// index `lock_periods`.
    pub obs: Schedule,
    /// Number of leading observations without knock-out.
    pub lock_periods: usize,
    /// Barrier lifecycle at valuation.
    pub status: Status,
    /// Timing block.
    pub timeline: Timeline,
}

impl Phoenix {
    /// Create a phoenix note with monthly coupon observations; the first
    /// `lock_term` months pay coupons but cannot redeem early.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        s0: Real,
        barrier_out: Real,
        barrier_in: Real,
        barrier_yield: Real,
        coupon: Real,
        lock_term: usize,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(s0 > 0.0, "initial fixing must be positive, got {s0}");
        ensure!(
            barrier_in <= barrier_yield,
            "knock-in barrier {barrier_in} cannot exceed the yield barrier {barrier_yield}"
        );
        // Coupons accrue from the first month; the lock only gates
        // early redemption.
        let obs = monthly_observations(&timeline, 0)?;
        Ok(Self {
            s0,
            barrier_out,
            barrier_in,
            barrier_yield,
            coupon,
            knock_in_strike: s0,
            obs,
            lock_periods: lock_term,
            status: Status::NoTouch,
            timeline,
        })
    }

    /// A fixed coupon note: the coupon pays unconditionally every period.
    pub fn fcn(
        s0: Real,
        barrier_out: Real,
        barrier_in: Real,
        coupon: Real,
        lock_term: usize,
        timeline: Timeline,
    ) -> Result<Self> {
        let mut p =
            Self::new(s0, barrier_out, barrier_in, barrier_in, coupon, lock_term, timeline)?;
        // A zero yield barrier makes the coupon unconditional
        p.barrier_yield = 0.0;
        Ok(p)
    }

    /// A digital coupon note: the coupon pays when spot holds above the
    /// knock-in barrier.
    pub fn dcn(
        s0: Real,
        barrier_out: Real,
        barrier_in: Real,
        coupon: Real,
        lock_term: usize,
        timeline: Timeline,
    ) -> Result<Self> {
        Self::new(s0, barrier_out, barrier_in, barrier_in, coupon, lock_term, timeline)
    }

    /// Same note with an explicit status.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Redemption fraction of notional at terminal spot `s` after a
    /// knock-in.
    pub fn knocked_in_fraction(&self, s: Real) -> Real {
        (s / self.knock_in_strike).min(1.0)
    }
}

/// Monthly observation schedule over the product's life, skipping
/// `lock_term` leading months, modified-following.
fn monthly_observations(timeline: &Timeline, lock_term: usize) -> Result<Schedule> {
    Schedule::generate(
        &*timeline.calendar,
        timeline.start_date,
        timeline.end_date,
        Frequency::Monthly,
        lock_term,
        BusinessDayConvention::ModifiedFollowing,
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pk_time::{AnnualDays, Date, WeekendCalendar};
    use std::sync::Arc;

    fn timeline(years: f64) -> Timeline {
        Timeline::from_maturity(
            Date::from_ymd_opt(2022, 1, 5).unwrap(),
            years,
            Arc::new(WeekendCalendar),
            AnnualDays::N365,
            243,
        )
        .unwrap()
    }

    #[test]
    fn standard_snowball_shape() {
        let sb = Snowball::standard(100.0, 103.0, 80.0, 0.0884, None, 3, timeline(1.0)).unwrap();
        assert_eq!(sb.obs.len(), 9); // months 4..=12
        assert_eq!(sb.barrier_out.len(), 9);
        assert_eq!(sb.knock_in_strike, 100.0);
        assert_eq!(sb.survival_coupon(), 0.0884);
    }

    #[test]
    fn knocked_in_fraction_is_short_put() {
        let sb = Snowball::standard(100.0, 103.0, 80.0, 0.1, None, 3, timeline(1.0)).unwrap();
        assert!((sb.knocked_in_fraction(90.0) - 0.9).abs() < 1e-12);
        assert_eq!(sb.knocked_in_fraction(120.0), 1.0);
        let floored = Snowball::standard(100.0, 103.0, 80.0, 0.1, None, 3, timeline(1.0))
            .unwrap()
            .with_floor(0.8);
        assert_eq!(floored.knocked_in_fraction(50.0), 0.8);
    }

    #[test]
    fn snowball_plus_upside() {
        let sb = Snowball::standard(100.0, 103.0, 80.0, 0.115, None, 3, timeline(2.0))
            .unwrap()
            .with_upside(0.5, 103.0);
        assert!((sb.upside_fraction(113.0) - 0.05).abs() < 1e-12);
        assert_eq!(sb.upside_fraction(100.0), 0.0);
    }

    #[test]
    fn stepdown_barriers_must_match_schedule() {
        let sb = Snowball::standard(100.0, 103.0, 80.0, 0.1, None, 3, timeline(1.0)).unwrap();
        let n = sb.obs.len();
        let barriers: Vec<f64> = (0..n).map(|i| 103.0 - 0.5 * i as f64).collect();
        assert!(sb.clone().with_barriers(barriers).is_ok());
        assert!(sb.with_barriers(vec![103.0]).is_err());
    }

    #[test]
    fn autocall_put_direction() {
        let note = AutoCall::new(
            100.0,
            97.0,
            0.045,
            0.02,
            CallPut::Put,
            3,
            1.0,
            timeline(2.0),
        )
        .unwrap();
        assert!(note.knocks_out(95.0));
        assert!(!note.knocks_out(100.0));
    }

    #[test]
    fn fcn_pays_unconditionally() {
        let fcn = Phoenix::fcn(100.0, 100.0, 80.0, 0.00322, 3, timeline(2.0)).unwrap();
        assert_eq!(fcn.barrier_yield, 0.0);
        assert_eq!(fcn.lock_periods, 3);
        // Coupons observe monthly from month 1
        assert_eq!(fcn.obs.len(), 24);
    }

    #[test]
    fn dcn_coupon_gates_on_knock_in_barrier() {
        let dcn = Phoenix::dcn(100.0, 100.0, 75.0, 0.00745, 3, timeline(2.0)).unwrap();
        assert_eq!(dcn.barrier_yield, 75.0);
    }
}
