//! Daily accrual products: accumulators and range accruals.

use crate::timeline::Timeline;
use pk_core::errors::Result;
use pk_core::{ensure, Real};

/// An accumulator (or decumulator) observed every trading day.
///
/// Each day the holder accrues `(S − strike)/s0` of forward P&L, levered by
/// `leverage` on the losing side; accrual terminates the day the out
/// barrier trades. `barrier_out > s0` with `strike < s0` is the long
/// accumulator; `barrier_out < s0` with `strike > s0` is the decumulator,
/// which accrues `(strike − S)/s0` instead.
#[derive(Debug, Clone)]
pub struct Accumulator {
    /// Initial spot fixing; also the notional scale.
    pub s0: Real,
    /// Daily accrual strike.
    pub strike: Real,
    /// Knock-out barrier terminating the accrual.
    pub barrier_out: Real,
    /// Leverage applied to losing-side accruals.
    pub leverage: Real,
    /// Margin scale applied to the quoted PV.
    pub margin_lvl: Real,
    /// Timing block.
    pub timeline: Timeline,
}

impl Accumulator {
    /// Create an accumulator. The accrual direction is inferred from the
    /// barrier side: above spot accumulates, below spot decumulates.
    pub fn new(
        s0: Real,
        strike: Real,
        barrier_out: Real,
        leverage: Real,
        margin_lvl: Real,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(s0 > 0.0, "initial fixing must be positive, got {s0}");
        ensure!(leverage >= 1.0, "leverage must be at least 1, got {leverage}");
        ensure!(
            barrier_out != s0,
            "the out barrier must sit on one side of the initial fixing"
        );
        ensure!(
            (barrier_out > s0) == (strike < s0),
            "strike {strike} and barrier {barrier_out} must straddle the fixing {s0}"
        );
        Ok(Self {
            s0,
            strike,
            barrier_out,
            leverage,
            margin_lvl,
            timeline,
        })
    }

    /// Whether this is the long (accumulating) direction.
    pub fn is_long(&self) -> bool {
        self.barrier_out > self.s0
    }

    /// Whether spot `s` terminates the accrual.
    pub fn knocks_out(&self, s: Real) -> bool {
        if self.is_long() {
            s >= self.barrier_out
        } else {
            s <= self.barrier_out
        }
    }

    /// One day's accrued P&L fraction at close `s`.
    pub fn daily_accrual(&self, s: Real) -> Real {
        let pnl = if self.is_long() {
            s - self.strike
        } else {
            self.strike - s
        };
        let units = if pnl < 0.0 { self.leverage } else { 1.0 };
        units * pnl / self.s0
    }
}

/// A range accrual paying a coupon prorated by the days spent in a range.
///
/// At expiry pays `payment · (days in [lower, upper]) / total days` on the
/// `s0` notional.
#[derive(Debug, Clone)]
pub struct RangeAccrual {
    /// Initial spot fixing; also the notional scale.
    pub s0: Real,
    /// Lower bound of the accrual range.
    pub lower_strike: Real,
    /// Upper bound of the accrual range.
    pub upper_strike: Real,
    /// Total coupon fraction when every day accrues.
    pub payment: Real,
    /// Timing block.
    pub timeline: Timeline,
}

impl RangeAccrual {
    /// Create a range accrual.
    pub fn new(
        s0: Real,
        lower_strike: Real,
        upper_strike: Real,
        payment: Real,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(s0 > 0.0, "initial fixing must be positive, got {s0}");
        ensure!(
            0.0 < lower_strike && lower_strike < upper_strike,
            "range must satisfy 0 < lower < upper, got [{lower_strike}, {upper_strike}]"
        );
        Ok(Self {
            s0,
            lower_strike,
            upper_strike,
            payment,
            timeline,
        })
    }

    /// Whether a daily close accrues.
    pub fn in_range(&self, s: Real) -> bool {
        (self.lower_strike..=self.upper_strike).contains(&s)
    }
}
