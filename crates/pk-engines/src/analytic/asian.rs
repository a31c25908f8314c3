//! Analytic geometric Asian engine (Kemna-Vorst).

use crate::engine::{valuation_or_default, PricingEngine};
use pk_core::errors::Result;
use pk_core::{ensure, Real};
use pk_math::normal_cdf;
use pk_processes::StochasticProcess;
use pk_products::{AsianOption, AveSubstitution, AverageMethod, CallPut};
use pk_time::Date;
use std::sync::Arc;

/// Kemna-Vorst (1990) continuously-averaged geometric Asian price.
///
/// The geometric average of a GBM is log-normal with vol `σ/√3` and cost
/// of carry `½(r − q − σ²/6)`.
pub fn kemna_vorst(
    callput: CallPut,
    spot: Real,
    strike: Real,
    r: Real,
    q: Real,
    sigma: Real,
    tau: Real,
) -> Real {
    let phi = callput.sign();
    let sigma_g = sigma / 3.0_f64.sqrt();
    let b_g = 0.5 * (r - q - sigma * sigma / 6.0);
    let sq = sigma_g * tau.sqrt();
    let d1 = ((spot / strike).ln() + (b_g + 0.5 * sigma_g * sigma_g) * tau) / sq;
    let d2 = d1 - sq;
    phi * (spot * ((b_g - r) * tau).exp() * normal_cdf(phi * d1)
        - strike * (-r * tau).exp() * normal_cdf(phi * d2))
}

/// Analytic engine for geometric average-price Asians.
///
/// Arithmetic averaging, strike substitution, and enhanced (capped)
/// payoffs have no closed form here; those route to MC or the tree.
#[derive(Debug)]
pub struct AnalyticAsianEngine {
    process: Arc<dyn StochasticProcess>,
}

impl AnalyticAsianEngine {
    /// Create a new engine on the given process.
    pub fn new(process: Arc<dyn StochasticProcess>) -> Self {
        Self { process }
    }
}

impl PricingEngine<AsianOption> for AnalyticAsianEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &AsianOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        ensure!(
            prod.ave_method == AverageMethod::Geometric,
            "the closed form covers geometric averaging only"
        );
        ensure!(
            prod.substitute == AveSubstitution::Underlying && !prod.enhanced,
            "the closed form covers plain average-price payoffs only"
        );

        let valuation = valuation_or_default(t);
        ensure!(
            prod.obs_start <= valuation,
            "forward-starting averaging windows are not supported analytically"
        );
        let tau = prod.timeline.tau(valuation);
        ensure!(tau > 0.0, "option expired: tau = {tau}");

        let s = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, s);

        Ok(kemna_vorst(prod.callput, s, prod.strike, r, q, sigma, tau))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::vanilla::black_scholes_merton;
    use approx::assert_abs_diff_eq;

    #[test]
    fn geometric_asian_cheaper_than_vanilla() {
        let asian = kemna_vorst(CallPut::Call, 100.0, 100.0, 0.02, 0.05, 0.16, 1.0);
        let (vanilla, ..) = black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.02, 0.05, 0.16, 1.0);
        assert!(asian > 0.0 && asian < vanilla, "asian {asian} vanilla {vanilla}");
    }

    #[test]
    fn zero_vol_reduces_to_discounted_average_forward() {
        // With σ = 0 the average grows at (r − q)/2
        let price = kemna_vorst(CallPut::Call, 100.0, 90.0, 0.04, 0.0, 1e-12, 1.0);
        let avg_fwd = 100.0 * (0.02_f64).exp();
        let expected = (avg_fwd - 90.0) * (-0.04_f64).exp();
        assert_abs_diff_eq!(price, expected, epsilon = 1e-6);
    }

    #[test]
    fn asian_put_call_parity() {
        // C − P = e^{−rτ}(G_fwd − K) where G_fwd = S·exp(b_G τ + σ_G²τ/2)
        let (s, k, r, q, sigma, tau) = (100.0_f64, 95.0, 0.02, 0.05, 0.16, 1.0);
        let call = kemna_vorst(CallPut::Call, s, k, r, q, sigma, tau);
        let put = kemna_vorst(CallPut::Put, s, k, r, q, sigma, tau);
        let sigma_g = sigma / 3.0_f64.sqrt();
        let b_g = 0.5 * (r - q - sigma * sigma / 6.0);
        let g_fwd = s * ((b_g + 0.5 * sigma_g * sigma_g) * tau).exp();
        let parity = (-r * tau).exp() * (g_fwd - k);
        assert_abs_diff_eq!(call - put, parity, epsilon = 1e-8);
    }
}
