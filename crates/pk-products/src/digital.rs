//! Digital (binary) options, single- and double-sided.

use crate::enums::{CallPut, ExerciseType, PaymentType, Status, TouchType};
use crate::timeline::Timeline;
use pk_core::errors::Result;
use pk_core::{ensure, Real, Time};

/// A cash-or-nothing digital option.
///
/// European: pays `rebate` when the terminal spot is beyond the strike.
/// American: a one-touch paying on the first strike touch, either
/// immediately (`PaymentType::Hit`) or at expiry (`PaymentType::Expire`).
#[derive(Debug, Clone)]
pub struct DigitalOption {
    /// Trigger level.
    pub strike: Real,
    /// Cash amount paid on the trigger.
    pub rebate: Real,
    /// Call: trigger above; Put: trigger below.
    pub callput: CallPut,
    /// European (expiry observation) or American (touch).
    pub exercise: ExerciseType,
    /// When the cash pays.
    pub payment: PaymentType,
    /// Observation spacing in years; `None` means continuous observation.
    pub discrete_obs_interval: Option<Time>,
    /// Barrier lifecycle at valuation.
    pub status: Status,
    /// Timing block.
    pub timeline: Timeline,
}

impl DigitalOption {
    /// Create a digital option.
    pub fn new(
        strike: Real,
        rebate: Real,
        callput: CallPut,
        exercise: ExerciseType,
        payment: PaymentType,
        discrete_obs_interval: Option<Time>,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(strike > 0.0, "strike must be positive, got {strike}");
        ensure!(
            exercise == ExerciseType::American || payment == PaymentType::Expire,
            "a European digital pays at expiry; payment type must be Expire"
        );
        Ok(Self {
            strike,
            rebate,
            callput,
            exercise,
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
}

/// A double-sided digital over a `(lower, upper)` corridor.
///
/// European Touch pays the matching rebate when the terminal spot is
/// outside the corridor ("binary convex"); European NoTouch pays when it
/// ends inside ("binary concave"; both rebates must then agree). American
/// variants are the double-touch and double-no-touch.
#[derive(Debug, Clone)]
pub struct DoubleDigitalOption {
    /// Lower and upper trigger levels.
    pub bound: (Real, Real),
    /// Rebates for the lower and upper triggers.
    pub rebate: (Real, Real),
    /// Touch or no-touch sense.
    pub touch: TouchType,
    /// European or American observation.
    pub exercise: ExerciseType,
    /// When the cash pays.
    pub payment: PaymentType,
    /// Observation spacing in years; `None` means continuous observation.
    pub discrete_obs_interval: Option<Time>,
    /// Barrier lifecycle at valuation.
    pub status: Status,
    /// Timing block.
    pub timeline: Timeline,
}

impl DoubleDigitalOption {
    /// Create a double digital option.
    pub fn new(
        bound: (Real, Real),
        rebate: (Real, Real),
        touch: TouchType,
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
            exercise == ExerciseType::American || payment == PaymentType::Expire,
            "a European double digital pays at expiry; payment type must be Expire"
        );
        Ok(Self {
            bound,
            rebate,
            touch,
            exercise,
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
}
