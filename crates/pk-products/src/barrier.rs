//! Barrier products: single barriers, double sharks, airbags.

use crate::enums::{CallPut, ExerciseType, InOut, PaymentType, Status, UpDown};
use crate::timeline::Timeline;
use pk_core::errors::Result;
use pk_core::{ensure, Real, Time};

/// A single-barrier option.
///
/// Knock-in options pay the rebate at expiry when never activated;
/// knock-out options pay the rebate on the hit.
#[derive(Debug, Clone)]
pub struct BarrierOption {
    /// Strike of the underlying vanilla payoff.
    pub strike: Real,
    /// Barrier level.
    pub barrier: Real,
    /// Cash rebate.
    pub rebate: Real,
    /// Participation applied to the vanilla leg.
    pub parti: Real,
    /// Barrier direction.
    pub updown: UpDown,
    /// Knock-in or knock-out.
    pub inout: InOut,
    /// Call or put.
    pub callput: CallPut,
    /// When the rebate pays.
    pub payment: PaymentType,
    /// Observation spacing in years; `None` means continuous observation.
    pub discrete_obs_interval: Option<Time>,
    /// Barrier lifecycle at valuation.
    pub status: Status,
    /// Timing block.
    pub timeline: Timeline,
}

impl BarrierOption {
    /// Create a barrier option. The rebate payment convention follows the
    /// barrier sense: knock-outs pay at hit, knock-ins at expiry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strike: Real,
        barrier: Real,
        rebate: Real,
        parti: Real,
        updown: UpDown,
        inout: InOut,
        callput: CallPut,
        discrete_obs_interval: Option<Time>,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(strike > 0.0, "strike must be positive, got {strike}");
        ensure!(barrier > 0.0, "barrier must be positive, got {barrier}");
        let payment = match inout {
            InOut::In => PaymentType::Expire,
            InOut::Out => PaymentType::Hit,
        };
        Ok(Self {
            strike,
            barrier,
            rebate,
            parti,
            updown,
            inout,
            callput,
            payment,
            discrete_obs_interval,
            status: Status::NoTouch,
            timeline,
        })
    }

    /// Same product with an explicit status.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Whether spot `s` is on the knock side of the barrier.
    pub fn breaches(&self, s: Real) -> bool {
        match self.updown {
            UpDown::Up => s >= self.barrier,
            UpDown::Down => s <= self.barrier,
        }
    }

    /// Vanilla leg payoff at terminal spot `s`, participation applied.
    pub fn vanilla_payoff(&self, s: Real) -> Real {
        self.parti * (self.callput.sign() * (s - self.strike)).max(0.0)
    }
}

/// A double-shark structure: a call spread above and a put spread below,
/// both knocked out at the corridor bounds against a rebate.
#[derive(Debug, Clone)]
pub struct DoubleShark {
    /// (put strike, call strike).
    pub strike: (Real, Real),
    /// (lower KO barrier, upper KO barrier).
    pub bound: (Real, Real),
    /// (lower rebate, upper rebate).
    pub rebate: (Real, Real),
    /// (put participation, call participation).
    pub parti: (Real, Real),
    /// European (expiry) or American (lifetime) barrier observation.
    pub exercise: ExerciseType,
    /// When rebates pay.
    pub payment: PaymentType,
    /// Observation spacing in years; `None` means continuous observation.
    pub discrete_obs_interval: Option<Time>,
    /// Barrier lifecycle at valuation.
    pub status: Status,
    /// Timing block.
    pub timeline: Timeline,
}

impl DoubleShark {
    /// Create a double shark.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strike: (Real, Real),
        bound: (Real, Real),
        rebate: (Real, Real),
        parti: (Real, Real),
        exercise: ExerciseType,
        payment: PaymentType,
        discrete_obs_interval: Option<Time>,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(
            0.0 < bound.0 && bound.0 < bound.1,
            "bounds must satisfy 0 < lower < upper, got {bound:?}"
        );
        ensure!(
            bound.0 < strike.0 && strike.0 < strike.1 && strike.1 < bound.1,
            "strikes {strike:?} must nest inside bounds {bound:?}"
        );
        Ok(Self {
            strike,
            bound,
            rebate,
            parti,
            exercise,
            payment,
            discrete_obs_interval,
            status: Status::NoTouch,
            timeline,
        })
    }

    /// Surviving payoff at terminal spot `s`: put spread below, call
    /// spread above, capped at the bounds.
    pub fn spread_payoff(&self, s: Real) -> Real {
        let (k_put, k_call) = self.strike;
        let (lo, hi) = self.bound;
        self.parti.0 * (k_put - s.max(lo)).max(0.0) + self.parti.1 * (s.min(hi) - k_call).max(0.0)
    }
}

/// An airbag: upside call participation with a protective floor that
/// resets on a downside knock-in.
///
/// Payoff at expiry: `call_parti · max(S − K, 0)` when never knocked in,
/// else `reset_call_parti · max(S − K, 0) − knockin_parti · max(K − S, 0)`.
#[derive(Debug, Clone)]
pub struct Airbag {
    /// Strike.
    pub strike: Real,
    /// Downside knock-in barrier.
    pub barrier: Real,
    /// Downside participation after knock-in.
    pub knockin_parti: Real,
    /// Upside participation before knock-in.
    pub call_parti: Real,
    /// Upside participation after knock-in.
    pub reset_call_parti: Real,
    /// Observation spacing in years; `None` means continuous observation.
    pub discrete_obs_interval: Option<Time>,
    /// Barrier lifecycle at valuation.
    pub status: Status,
    /// Timing block.
    pub timeline: Timeline,
}

impl Airbag {
    /// Create an airbag.
    pub fn new(
        strike: Real,
        barrier: Real,
        knockin_parti: Real,
        call_parti: Real,
        reset_call_parti: Real,
        discrete_obs_interval: Option<Time>,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(strike > 0.0, "strike must be positive, got {strike}");
        ensure!(
            barrier < strike,
            "airbag barrier {barrier} must sit below the strike {strike}"
        );
        Ok(Self {
            strike,
            barrier,
            knockin_parti,
            call_parti,
            reset_call_parti,
            discrete_obs_interval,
            status: Status::NoTouch,
            timeline,
        })
    }

    /// Same product with an explicit status.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Terminal payoff given whether the barrier was touched.
    pub fn payoff(&self, s: Real, knocked_in: bool) -> Real {
        let call = (s - self.strike).max(0.0);
        if knocked_in {
            self.reset_call_parti * call - self.knockin_parti * (self.strike - s).max(0.0)
        } else {
            self.call_parti * call
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pk_time::{AnnualDays, Date, WeekendCalendar};
    use std::sync::Arc;

    fn timeline() -> Timeline {
        Timeline::from_maturity(
            Date::from_ymd_opt(2021, 1, 5).unwrap(),
            1.0,
            Arc::new(WeekendCalendar),
            AnnualDays::N365,
            243,
        )
        .unwrap()
    }

    #[test]
    fn rebate_payment_follows_barrier_sense() {
        let ko = BarrierOption::new(
            100.0,
            110.0,
            0.0,
            1.0,
            UpDown::Up,
            InOut::Out,
            CallPut::Call,
            None,
            timeline(),
        )
        .unwrap();
        assert_eq!(ko.payment, PaymentType::Hit);
        let ki = BarrierOption::new(
            100.0,
            90.0,
            0.0,
            1.0,
            UpDown::Down,
            InOut::In,
            CallPut::Call,
            None,
            timeline(),
        )
        .unwrap();
        assert_eq!(ki.payment, PaymentType::Expire);
    }

    #[test]
    fn double_shark_payoff_spreads() {
        let ds = DoubleShark::new(
            (90.0, 110.0),
            (80.0, 120.0),
            (3.0, 3.0),
            (0.5, 0.5),
            ExerciseType::American,
            PaymentType::Expire,
            None,
            timeline(),
        )
        .unwrap();
        assert_eq!(ds.spread_payoff(100.0), 0.0);
        assert_eq!(ds.spread_payoff(115.0), 2.5);
        assert_eq!(ds.spread_payoff(85.0), 2.5);
        // Capped at the bounds
        assert_eq!(ds.spread_payoff(119.9), 0.5 * 9.9);
    }

    #[test]
    fn airbag_payoff_branches() {
        let ab = Airbag::new(100.0, 70.0, 1.0, 0.7, 1.0, None, timeline()).unwrap();
        assert!((ab.payoff(110.0, false) - 7.0).abs() < 1e-12);
        assert!((ab.payoff(110.0, true) - 10.0).abs() < 1e-12);
        assert_eq!(ab.payoff(80.0, false), 0.0);
        assert!((ab.payoff(80.0, true) - -20.0).abs() < 1e-12);
    }
}
