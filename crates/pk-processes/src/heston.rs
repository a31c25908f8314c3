//! Heston stochastic volatility process with Andersen QE discretisation.
//!
//! ```text
//! dS = (r − q) S dt + √v S dW₁
//! dv = κ(θ − v) dt + σᵥ √v dW₂
//! dW₁ dW₂ = ρ dt
//! ```
//!
//! The variance step is Andersen's quadratic-exponential scheme: a
//! moment-matched quadratic of a normal when ψ = s²/m² ≤ ψ_c, an
//! exponential tail with an atom at zero above, with the martingale
//! correction on the log-spot drift so the discounted spot stays a
//! martingale.

use crate::paths::PathMatrix;
use crate::process::StochasticProcess;
use crate::quote::SimpleQuote;
use crate::rate::RateCurve;
use pk_core::errors::Result;
use pk_core::{ensure, DiscountFactor, Rate, Real, Time, Volatility};
use pk_math::{normal_cdf, ShockMatrix};
use std::sync::Arc;

/// Switching threshold between the quadratic and exponential branches.
const PSI_C: Real = 1.5;

/// The Heston process.
///
/// * `v0` — initial variance
/// * `kappa` — mean-reversion speed
/// * `theta` — long-run variance
/// * `sigma_v` — vol-of-vol
/// * `rho` — spot/variance correlation
#[derive(Debug)]
pub struct HestonProcess {
    spot: SimpleQuote,
    interest: Arc<dyn RateCurve>,
    dividend: Arc<dyn RateCurve>,
    v0: Real,
    kappa: Real,
    theta: Real,
    sigma_v: Real,
    rho: Real,
    /// Vega bumps shift √v0 and √θ; zero outside a bump.
    vol_shift: SimpleQuote,
}

impl HestonProcess {
    /// Create a new Heston process.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spot: SimpleQuote,
        interest: Arc<dyn RateCurve>,
        dividend: Arc<dyn RateCurve>,
        v0: Real,
        kappa: Real,
        theta: Real,
        sigma_v: Real,
        rho: Real,
    ) -> Result<Self> {
        ensure!((-1.0..=1.0).contains(&rho), "correlation must be in [-1, 1], got {rho}");
        ensure!(v0 >= 0.0, "initial variance must be non-negative, got {v0}");
        ensure!(kappa > 0.0, "mean-reversion speed must be positive, got {kappa}");
        ensure!(theta >= 0.0, "long-run variance must be non-negative, got {theta}");
        ensure!(sigma_v > 0.0, "vol-of-vol must be positive, got {sigma_v}");
        Ok(Self {
            spot,
            interest,
            dividend,
            v0,
            kappa,
            theta,
            sigma_v,
            rho,
            vol_shift: SimpleQuote::new(0.0),
        })
    }

    /// Initial variance, vega shift applied.
    pub fn v0(&self) -> Real {
        shifted_sq(self.v0, self.vol_shift.value())
    }

    /// Long-run variance, vega shift applied.
    pub fn theta(&self) -> Real {
        shifted_sq(self.theta, self.vol_shift.value())
    }

    /// Mean-reversion speed.
    pub fn kappa(&self) -> Real {
        self.kappa
    }

    /// Vol-of-vol.
    pub fn sigma_v(&self) -> Real {
        self.sigma_v
    }

    /// Spot/variance correlation.
    pub fn rho(&self) -> Real {
        self.rho
    }

    /// One Andersen-QE step of the joint (S, v) state.
    #[allow(clippy::too_many_arguments)]
    pub fn evolve_qe(
        &self,
        t: Time,
        s: Real,
        v: Real,
        dt: Time,
        z_s: Real,
        z_v: Real,
    ) -> (Real, Real) {
        let kappa = self.kappa;
        let theta = self.theta();
        let sigma = self.sigma_v;
        let rho = self.rho;
        let v = v.max(0.0);

        // Conditional moments of v(t+dt) | v(t)
        let e = (-kappa * dt).exp();
        let m = theta + (v - theta) * e;
        let s2 = v * sigma * sigma * e * (1.0 - e) / kappa
            + theta * sigma * sigma * (1.0 - e) * (1.0 - e) / (2.0 * kappa);
        let psi = if m > 0.0 { s2 / (m * m) } else { Real::INFINITY };

        // log-spot coefficients, γ₁ = γ₂ = ½
        let gamma = 0.5;
        let k0 = -rho * kappa * theta / sigma * dt;
        let k1 = gamma * dt * (kappa * rho / sigma - 0.5) - rho / sigma;
        let k2 = gamma * dt * (kappa * rho / sigma - 0.5) + rho / sigma;
        let k3 = gamma * dt * (1.0 - rho * rho);
        let k4 = gamma * dt * (1.0 - rho * rho);
        let a_coef = k2 + 0.5 * k4;

        let (v_next, k0_star) = if psi <= PSI_C {
            // Quadratic branch: v' = a (b + Z)²
            let inv_psi = 1.0 / psi;
            let b2 = 2.0 * inv_psi - 1.0 + (2.0 * inv_psi).sqrt() * (2.0 * inv_psi - 1.0).sqrt();
            let a = m / (1.0 + b2);
            let b = b2.sqrt();
            let v_next = a * (b + z_v) * (b + z_v);
            let k0_star = if 1.0 - 2.0 * a_coef * a > 0.0 {
                -a_coef * b2 * a / (1.0 - 2.0 * a_coef * a)
                    + 0.5 * (1.0 - 2.0 * a_coef * a).ln()
                    - (k1 + 0.5 * k3) * v
            } else {
                k0
            };
            (v_next, k0_star)
        } else {
            // Exponential branch: atom at zero plus exponential tail
            let p = (psi - 1.0) / (psi + 1.0);
            let beta = (1.0 - p) / m;
            let u = normal_cdf(z_v);
            let v_next = if u <= p {
                0.0
            } else {
                ((1.0 - p) / (1.0 - u)).ln() / beta
            };
            let k0_star = if beta > a_coef {
                -(p + beta * (1.0 - p) / (beta - a_coef)).ln() - (k1 + 0.5 * k3) * v
            } else {
                k0
            };
            (v_next, k0_star)
        };

        let mu = self.drift(t);
        let log_s = s.ln()
            + mu * dt
            + k0_star
            + k1 * v
            + k2 * v_next
            + (k3 * v + k4 * v_next).max(0.0).sqrt() * z_s;

        (log_s.exp(), v_next)
    }
}

/// Apply an additive shift on the square root of a variance parameter.
fn shifted_sq(var: Real, shift: Real) -> Real {
    let s = var.sqrt() + shift;
    s * s
}

impl StochasticProcess for HestonProcess {
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

    fn vol(&self, _t: Time, _s: Real) -> Volatility {
        // Instantaneous spot vol; engines needing the full dynamics go
        // through simulate_paths.
        self.v0().sqrt()
    }

    fn disc_factor(&self, t: Time) -> DiscountFactor {
        self.interest.discount_factor(t)
    }

    fn evolve(&self, t: Time, s: Real, dt: Time, z: Real) -> Real {
        // Deterministic-variance approximation for engines that only
        // support one-factor stepping.
        let sigma = self.v0().sqrt();
        let mu = self.drift(t);
        s * ((mu - 0.5 * sigma * sigma) * dt + sigma * dt.sqrt() * z).exp()
    }

    fn shocks_per_step(&self) -> usize {
        2
    }

    fn simulate_paths(
        &self,
        tau: Time,
        n_step: usize,
        shocks: &ShockMatrix,
    ) -> Result<PathMatrix> {
        ensure!(tau > 0.0, "path simulation needs tau > 0, got {tau}");
        ensure!(
            shocks.n_steps() == 2 * n_step,
            "Heston needs {} shock columns ({} steps), got {}",
            2 * n_step,
            n_step,
            shocks.n_steps()
        );
        let dt = tau / n_step as Real;
        let s0 = self.spot();
        let v0 = self.v0();
        let mut paths = PathMatrix::filled(shocks.n_paths(), n_step + 1, s0);
        for i in 0..shocks.n_paths() {
            let row = shocks.row(i);
            let path = paths.path_mut(i);
            let (mut s, mut v) = (s0, v0);
            for k in 0..n_step {
                let (z_s, z_v) = (row[2 * k], row[2 * k + 1]);
                let (s_next, v_next) = self.evolve_qe(k as Real * dt, s, v, dt, z_s, z_v);
                s = s_next;
                v = v_next;
                path[k + 1] = s;
            }
        }
        Ok(paths)
    }

    fn set_vol_shift(&self, shift: Real) {
        self.vol_shift.set_value(shift);
    }

    fn set_rate_shift(&self, shift: Real) {
        self.interest.set_shift(shift);
    }

    fn version(&self) -> u64 {
        self.spot.version() + self.interest.version() + self.dividend.version()
            + self.vol_shift.version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::ConstantRate;
    use approx::assert_abs_diff_eq;
    use pk_math::NormalSource;

    fn make_heston() -> HestonProcess {
        HestonProcess::new(
            SimpleQuote::new(100.0),
            Arc::new(ConstantRate::new(0.05)),
            Arc::new(ConstantRate::new(0.02)),
            0.04, // v0
            1.5,  // kappa
            0.04, // theta
            0.3,  // sigma_v
            -0.7, // rho
        )
        .unwrap()
    }

    #[test]
    fn parameter_validation() {
        let bad = HestonProcess::new(
            SimpleQuote::new(100.0),
            Arc::new(ConstantRate::new(0.05)),
            Arc::new(ConstantRate::new(0.0)),
            0.04,
            1.5,
            0.04,
            0.3,
            -1.5,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn variance_stays_non_negative() {
        let p = make_heston();
        let mut v: Real = 0.001;
        let mut s = 100.0;
        for k in 0..200 {
            let z = if k % 2 == 0 { -3.0 } else { 2.5 };
            let (s_next, v_next) = p.evolve_qe(0.0, s, v, 1.0 / 243.0, z, -z);
            s = s_next;
            v = v_next;
            assert!(v >= 0.0, "variance went negative: {v}");
            assert!(s > 0.0, "spot went non-positive: {s}");
        }
    }

    #[test]
    fn qe_discounted_spot_is_martingale() {
        let p = make_heston();
        let n_step = 24;
        let shocks =
            ShockMatrix::generate(NormalSource::Pseudorandom, 7, 20_000, 2 * n_step, true)
                .unwrap();
        let paths = p.simulate_paths(1.0, n_step, &shocks).unwrap();
        let mean_terminal: Real = (0..paths.n_paths())
            .map(|i| *paths.path(i).last().unwrap())
            .sum::<Real>()
            / paths.n_paths() as Real;
        let forward = 100.0 * (0.03_f64).exp();
        // QE with martingale correction keeps the forward tight
        assert!(
            (mean_terminal - forward).abs() / forward < 0.01,
            "E[S_T] = {mean_terminal}, forward = {forward}"
        );
    }

    #[test]
    fn vega_shift_moves_v0_and_theta() {
        let p = make_heston();
        assert_abs_diff_eq!(p.v0(), 0.04, epsilon = 1e-15);
        p.set_vol_shift(0.01);
        assert_abs_diff_eq!(p.v0(), 0.21 * 0.21, epsilon = 1e-12);
        assert_abs_diff_eq!(p.theta(), 0.21 * 0.21, epsilon = 1e-12);
        p.set_vol_shift(0.0);
        assert_eq!(p.v0(), 0.04);
    }
}
