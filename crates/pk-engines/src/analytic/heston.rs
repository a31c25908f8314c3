//! Semi-analytic Heston vanilla engine.
//!
//! `C = S e^{−qτ} P₁ − K e^{−rτ} P₂` where the probabilities integrate the
//! characteristic function. The `g̃ = 1/g` formulation avoids the branch
//! discontinuity of the original Heston paper for long maturities.

use crate::engine::{valuation_or_default, PricingEngine};
use num_complex::Complex64;
use pk_core::errors::Result;
use pk_core::{ensure, fail, Real};
use pk_processes::{HestonProcess, StochasticProcess};
use pk_products::{CallPut, ExerciseType, VanillaOption};
use pk_time::Date;
use std::f64::consts::PI;
use std::sync::Arc;

/// Semi-analytic Heston engine for European vanillas.
#[derive(Debug)]
pub struct AnalyticHestonVanillaEngine {
    process: Arc<HestonProcess>,
    /// Truncation of the Fourier integral.
    phi_max: Real,
    /// Simpson intervals over `[0, phi_max]` (even).
    intervals: usize,
}

impl AnalyticHestonVanillaEngine {
    /// Create a new engine with the default integration settings.
    pub fn new(process: Arc<HestonProcess>) -> Self {
        Self {
            process,
            phi_max: 200.0,
            intervals: 2000,
        }
    }

    /// Tune the integration grid.
    pub fn with_integration(mut self, phi_max: Real, intervals: usize) -> Self {
        self.phi_max = phi_max;
        self.intervals = intervals + intervals % 2;
        self
    }
}

/// The integrand `Re[e^{−iφ ln K} f_j(φ) / (iφ)]`.
#[allow(clippy::too_many_arguments)]
fn pj_integrand(
    j: usize,
    phi: Real,
    ln_s: Real,
    ln_k: Real,
    tau: Real,
    r: Real,
    q: Real,
    v0: Real,
    kappa: Real,
    theta: Real,
    sigma_v: Real,
    rho: Real,
) -> Real {
    let i = Complex64::new(0.0, 1.0);
    let iphi = i * phi;
    let (u, b) = if j == 1 {
        (0.5, kappa - rho * sigma_v)
    } else {
        (-0.5, kappa)
    };

    let a = kappa * theta;
    let rsip = rho * sigma_v * iphi;
    let d = ((rsip - b) * (rsip - b) - sigma_v * sigma_v * (2.0 * u * iphi - phi * phi)).sqrt();
    // Stable branch: g̃ = (b − ρσᵥiφ − d)/(b − ρσᵥiφ + d)
    let g = (b - rsip - d) / (b - rsip + d);
    let emdt = (-d * tau).exp();

    let big_c = (r - q) * iphi * tau
        + a / (sigma_v * sigma_v)
            * ((b - rsip - d) * tau - 2.0 * ((1.0 - g * emdt) / (1.0 - g)).ln());
    let big_d = (b - rsip - d) / (sigma_v * sigma_v) * (1.0 - emdt) / (1.0 - g * emdt);

    let f = (big_c + big_d * v0 + iphi * ln_s).exp();
    ((-iphi * ln_k).exp() * f / iphi).re
}

impl AnalyticHestonVanillaEngine {
    fn pj(&self, j: usize, spot: Real, strike: Real, tau: Real, r: Real, q: Real) -> Result<Real> {
        let v0 = self.process.v0();
        let kappa = self.process.kappa();
        let theta = self.process.theta();
        let sigma_v = self.process.sigma_v();
        let rho = self.process.rho();
        let (ln_s, ln_k) = (spot.ln(), strike.ln());

        // Simpson over [ε, phi_max]; the integrand is finite at 0⁺ but the
        // 1/φ factor wants the origin avoided.
        let eps = 1e-8;
        let h = (self.phi_max - eps) / self.intervals as Real;
        let eval = |phi: Real| {
            pj_integrand(j, phi, ln_s, ln_k, tau, r, q, v0, kappa, theta, sigma_v, rho)
        };
        let mut sum = eval(eps) + eval(self.phi_max);
        for k in 1..self.intervals {
            let w = if k % 2 == 1 { 4.0 } else { 2.0 };
            sum += w * eval(eps + k as Real * h);
        }
        let integral = sum * h / 3.0;
        if !integral.is_finite() {
            fail!(Numerical, "Heston characteristic-function integral diverged");
        }
        Ok(0.5 + integral / PI)
    }
}

impl PricingEngine<VanillaOption> for AnalyticHestonVanillaEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &VanillaOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        ensure!(
            prod.exercise == ExerciseType::European,
            "the Heston closed form prices Europeans only"
        );
        let valuation = valuation_or_default(t);
        let tau = prod.timeline.tau(valuation);
        ensure!(tau > 0.0, "option expired: tau = {tau}");

        let s = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);

        let p1 = self.pj(1, s, prod.strike, tau, r, q)?;
        let p2 = self.pj(2, s, prod.strike, tau, r, q)?;
        let call = s * (-q * tau).exp() * p1 - prod.strike * (-r * tau).exp() * p2;
        Ok(match prod.callput {
            CallPut::Call => call,
            // Put-call parity
            CallPut::Put => call - s * (-q * tau).exp() + prod.strike * (-r * tau).exp(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::vanilla::black_scholes_merton;
    use pk_processes::{ConstantRate, SimpleQuote};
    use pk_products::Timeline;
    use pk_time::{AnnualDays, WeekendCalendar};

    fn heston(v0: Real, sigma_v: Real) -> Arc<HestonProcess> {
        Arc::new(
            HestonProcess::new(
                SimpleQuote::new(100.0),
                Arc::new(ConstantRate::new(0.03)),
                Arc::new(ConstantRate::new(0.01)),
                v0,
                2.0,
                v0,
                sigma_v,
                -0.5,
            )
            .unwrap(),
        )
    }

    fn option(callput: CallPut, strike: Real) -> VanillaOption {
        let timeline = Timeline::from_maturity(
            Date::from_ymd_opt(2022, 1, 5).unwrap(),
            1.0,
            Arc::new(WeekendCalendar),
            AnnualDays::N365,
            243,
        )
        .unwrap();
        VanillaOption::new(strike, callput, ExerciseType::European, timeline).unwrap()
    }

    #[test]
    fn degenerate_heston_matches_black_scholes() {
        // Tiny vol-of-vol pins the variance at v0: effectively BSM at √v0
        let engine = AnalyticHestonVanillaEngine::new(heston(0.04, 1e-4));
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let prod = option(CallPut::Call, 100.0);
        let tau = prod.timeline.tau(valuation.unwrap());
        let pv = engine.calc_present_value(&prod, valuation, None).unwrap();
        let (bs, ..) = black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.03, 0.01, 0.2, tau);
        assert!((pv - bs).abs() < 0.02, "heston {pv} vs bsm {bs}");
    }

    #[test]
    fn put_call_parity_holds() {
        let engine = AnalyticHestonVanillaEngine::new(heston(0.04, 0.4));
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let call = engine
            .calc_present_value(&option(CallPut::Call, 105.0), valuation, None)
            .unwrap();
        let put = engine
            .calc_present_value(&option(CallPut::Put, 105.0), valuation, None)
            .unwrap();
        let tau = option(CallPut::Call, 105.0).timeline.tau(valuation.unwrap());
        let parity = 100.0 * (-0.01 * tau as f64).exp() - 105.0 * (-0.03 * tau as f64).exp();
        assert!((call - put - parity).abs() < 1e-6);
    }

    #[test]
    fn negative_correlation_raises_the_left_wing() {
        // The same OTM put priced under ρ = −0.6 versus ρ = +0.6
        let make = |rho: Real| {
            Arc::new(
                HestonProcess::new(
                    SimpleQuote::new(100.0),
                    Arc::new(ConstantRate::new(0.03)),
                    Arc::new(ConstantRate::new(0.01)),
                    0.04,
                    2.0,
                    0.04,
                    0.6,
                    rho,
                )
                .unwrap(),
            )
        };
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let put = option(CallPut::Put, 80.0);
        let negative = AnalyticHestonVanillaEngine::new(make(-0.6))
            .calc_present_value(&put, valuation, None)
            .unwrap();
        let positive = AnalyticHestonVanillaEngine::new(make(0.6))
            .calc_present_value(&put, valuation, None)
            .unwrap();
        assert!(negative > 0.0 && positive > 0.0);
        assert!(
            negative > positive,
            "skew missing: ρ<0 put {negative} vs ρ>0 put {positive}"
        );
    }
}
