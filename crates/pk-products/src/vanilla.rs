//! Vanilla options and portfolios of them.

use crate::enums::{CallPut, ExerciseType};
use crate::timeline::Timeline;
use pk_core::errors::Result;
use pk_core::{ensure, Real};

/// A European or American vanilla option.
#[derive(Debug, Clone)]
pub struct VanillaOption {
    /// Strike price.
    pub strike: Real,
    /// Call or put.
    pub callput: CallPut,
    /// Exercise style.
    pub exercise: ExerciseType,
    /// Timing block.
    pub timeline: Timeline,
}

impl VanillaOption {
    /// Create a vanilla option.
    pub fn new(
        strike: Real,
        callput: CallPut,
        exercise: ExerciseType,
        timeline: Timeline,
    ) -> Result<Self> {
        ensure!(strike > 0.0, "strike must be positive, got {strike}");
        Ok(Self {
            strike,
            callput,
            exercise,
            timeline,
        })
    }

    /// Terminal payoff at spot `s`.
    pub fn payoff(&self, s: Real) -> Real {
        (self.callput.sign() * (s - self.strike)).max(0.0)
    }
}

/// A weighted basket of vanilla options priced leg by leg.
///
/// Negative weights are short legs; a strangle is one long call and one
/// long put at different strikes.
#[derive(Debug, Clone, Default)]
pub struct VanillaPortfolio {
    /// (quantity, option) legs.
    pub legs: Vec<(Real, VanillaOption)>,
}

impl VanillaPortfolio {
    /// Create an empty portfolio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leg with the given quantity.
    pub fn with_leg(mut self, quantity: Real, option: VanillaOption) -> Self {
        self.legs.push((quantity, option));
        self
    }
}
