//! Generalized Black-Scholes-Merton process.
//!
//! `dS/S = (r(t) − q(t)) dt + σ(t, S) dW`
//!
//! where σ can be a flat Black vol or a local-vol surface. The path step is
//! the exact log-normal evolution with σ frozen over the step.

use crate::paths::PathMatrix;
use crate::process::StochasticProcess;
use crate::quote::SimpleQuote;
use crate::rate::RateCurve;
use crate::volatility::VolSurface;
use pk_core::errors::Result;
use pk_core::{ensure, DiscountFactor, Rate, Real, Time, Volatility};
use pk_math::ShockMatrix;
use std::sync::Arc;

/// A generalized BSM process over a spot quote, rate curves, and a vol
/// surface.
#[derive(Debug)]
pub struct GeneralizedBsmProcess {
    spot: SimpleQuote,
    interest: Arc<dyn RateCurve>,
    dividend: Arc<dyn RateCurve>,
    vol: Arc<dyn VolSurface>,
}

impl GeneralizedBsmProcess {
    /// Create a new BSM process.
    pub fn new(
        spot: SimpleQuote,
        interest: Arc<dyn RateCurve>,
        dividend: Arc<dyn RateCurve>,
        vol: Arc<dyn VolSurface>,
    ) -> Self {
        Self {
            spot,
            interest,
            dividend,
            vol,
        }
    }

    /// Convenience constructor from flat market data.
    pub fn flat(spot: Real, r: Rate, q: Rate, sigma: Volatility) -> Self {
        use crate::rate::ConstantRate;
        use crate::volatility::BlackConstVol;
        Self::new(
            SimpleQuote::new(spot),
            Arc::new(ConstantRate::new(r)),
            Arc::new(ConstantRate::new(q)),
            Arc::new(BlackConstVol::new(sigma)),
        )
    }

    /// The rate curve.
    pub fn interest_curve(&self) -> &dyn RateCurve {
        &*self.interest
    }

    /// The dividend curve.
    pub fn dividend_curve(&self) -> &dyn RateCurve {
        &*self.dividend
    }

    /// The vol surface.
    pub fn vol_surface(&self) -> &dyn VolSurface {
        &*self.vol
    }
}

impl StochasticProcess for GeneralizedBsmProcess {
    fn spot(&self) -> Real {
        self.spot.value()
    }

    fn set_spot(&self, value: Real) {
        self.spot.set_value(value);
    }

    fn interest(&self, t: Time) -> Rate {
        self.interest.rate(t)
    }

    fn div(&self, t: Time) -> Rate {
        self.dividend.rate(t)
    }

    fn vol(&self, t: Time, s: Real) -> Volatility {
        self.vol.vol(t, s)
    }

    fn disc_factor(&self, t: Time) -> DiscountFactor {
        self.interest.discount_factor(t)
    }

    fn evolve(&self, t: Time, s: Real, dt: Time, z: Real) -> Real {
        // Exact GBM evolution with σ frozen over [t, t+dt]:
        // S' = S · exp((r − q − σ²/2)·dt + σ·√dt·z)
        let sigma = self.vol.vol(t, s);
        let mu = self.drift(t);
        s * ((mu - 0.5 * sigma * sigma) * dt + sigma * dt.sqrt() * z).exp()
    }

    fn simulate_paths(
        &self,
        tau: Time,
        n_step: usize,
        shocks: &ShockMatrix,
    ) -> Result<PathMatrix> {
        ensure!(tau > 0.0, "path simulation needs tau > 0, got {tau}");
        ensure!(
            shocks.n_steps() == n_step,
            "shock matrix has {} columns, path grid needs {n_step}",
            shocks.n_steps()
        );
        let dt = tau / n_step as Real;
        let s0 = self.spot();
        let mut paths = PathMatrix::filled(shocks.n_paths(), n_step + 1, s0);
        for i in 0..shocks.n_paths() {
            let row = shocks.row(i);
            let path = paths.path_mut(i);
            let mut s = s0;
            for (k, &z) in row.iter().enumerate() {
                s = self.evolve(k as Real * dt, s, dt, z);
                path[k + 1] = s;
            }
        }
        Ok(paths)
    }

    fn set_vol_shift(&self, shift: Real) {
        self.vol.set_shift(shift);
    }

    fn set_rate_shift(&self, shift: Real) {
        self.interest.set_shift(shift);
    }

    fn version(&self) -> u64 {
        self.spot.version()
            + self.interest.version()
            + self.dividend.version()
            + self.vol.version()
    }
}
