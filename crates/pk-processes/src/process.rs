//! The stochastic process trait.

use crate::paths::PathMatrix;
use pk_core::errors::Result;
use pk_core::{DiscountFactor, Rate, Real, Time, Volatility};
use pk_math::ShockMatrix;

/// A single-underlying stochastic process owning its market data.
///
/// Engines read market data through the process at call time (late
/// binding) and use the path primitives for simulation. The version
/// counter folds over all owned market data so engine caches can detect
/// mutation.
pub trait StochasticProcess: std::fmt::Debug + Send + Sync {
    /// The current spot level.
    fn spot(&self) -> Real;

    /// Overwrite the spot level (used by hosts and delta bumps).
    fn set_spot(&self, value: Real);

    /// The risk-free zero rate at year fraction `t`.
    fn interest(&self, t: Time) -> Rate;

    /// The dividend / carry rate at year fraction `t`.
    fn div(&self, t: Time) -> Rate;

    /// The volatility at `(t, s)`.
    fn vol(&self, t: Time, s: Real) -> Volatility;

    /// Risk-neutral drift `r(t) − q(t)`.
    fn drift(&self, t: Time) -> Real {
        self.interest(t) - self.div(t)
    }

    /// Diffusion coefficient `σ(t, s)·s`.
    fn diffusion(&self, t: Time, s: Real) -> Real {
        self.vol(t, s) * s
    }

    /// Discount factor to year fraction `t`.
    fn disc_factor(&self, t: Time) -> DiscountFactor;

    /// One exact/Euler step of the spot from `s` over `dt` given a
    /// standard-normal shock.
    fn evolve(&self, t: Time, s: Real, dt: Time, z: Real) -> Real;

    /// Normal shocks consumed per time step (1 for BSM, 2 for Heston).
    fn shocks_per_step(&self) -> usize {
        1
    }

    /// Simulate price paths on a uniform grid over `[0, tau]`.
    ///
    /// The shock matrix must have `n_step · shocks_per_step()` columns.
    fn simulate_paths(&self, tau: Time, n_step: usize, shocks: &ShockMatrix)
        -> Result<PathMatrix>;

    /// Set the parallel vol shift (vega bumps).
    fn set_vol_shift(&self, shift: Real);

    /// Set the parallel rate shift (rho bumps).
    fn set_rate_shift(&self, shift: Real);

    /// Monotone version counter over all owned market data.
    fn version(&self) -> u64;
}
