//! Analytic double-barrier engine.
//!
//! Double knock-out calls and puts by the Ikeda-Kunitomo (1992) image
//! series (flat barriers, truncated), or by Haug's single-barrier
//! decomposition, selected at engine construction. The double-shark
//! structure prices as participation-weighted double-KO spreads plus a
//! first-touch rebate leg.

use crate::engine::{valuation_or_default, PricingEngine};
use pk_core::errors::Result;
use pk_core::{ensure, Real};
use pk_math::normal_cdf;
use pk_processes::StochasticProcess;
use pk_products::{CallPut, DoubleShark, InOut, PaymentType, Status, UpDown};
use pk_time::Date;
use std::sync::Arc;

use super::barrier::{bgk_adjusted_barrier, reiner_rubinstein};
use super::digital::double_no_touch;
use super::vanilla::black_scholes_merton;

/// Which double-barrier closed form to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleBarrierFormula {
    /// Ikeda-Kunitomo infinite series, truncated.
    IkedaKunitomo,
    /// Haug's single-barrier decomposition `DO + UO − vanilla`.
    Haug,
}

/// Ikeda-Kunitomo double knock-out price with flat barriers.
///
/// The image expansion runs over `n ∈ [−terms, terms]`.
#[allow(clippy::too_many_arguments)]
pub fn ikeda_kunitomo(
    callput: CallPut,
    spot: Real,
    strike: Real,
    lower: Real,
    upper: Real,
    r: Real,
    q: Real,
    sigma: Real,
    tau: Real,
    terms: usize,
) -> Real {
    let b = r - q;
    let sigma2 = sigma * sigma;
    let sq = sigma * tau.sqrt();
    let mu1 = 2.0 * b / sigma2 + 1.0;
    let df_q = (-q * tau).exp();
    let df_r = (-r * tau).exp();

    // Caps: a surviving call payoff is capped by the upper barrier, a put
    // by the lower.
    let (k_near, k_far) = match callput {
        CallPut::Call => (strike, upper),
        CallPut::Put => (lower, strike),
    };

    let mut sum_s = 0.0;
    let mut sum_k = 0.0;
    let n_terms = terms as i64;
    for n in -n_terms..=n_terms {
        let un = upper.powi(n as i32);
        let ln_ = lower.powi(n as i32);
        let ratio = un / ln_;
        let image = lower.powi(n as i32 + 1) / (un * spot);

        let d = |k: Real| ((spot * un * un / (k * ln_ * ln_)).ln() + (b + 0.5 * sigma2) * tau) / sq;
        let d_img =
            |k: Real| ((image * image * spot / k).ln() + (b + 0.5 * sigma2) * tau) / sq;

        let d1 = d(k_near);
        let d2 = d(k_far);
        let d3 = d_img(k_near);
        let d4 = d_img(k_far);

        sum_s += ratio.powf(mu1) * (normal_cdf(d1) - normal_cdf(d2))
            - image.powf(mu1) * (normal_cdf(d3) - normal_cdf(d4));
        sum_k += ratio.powf(mu1 - 2.0) * (normal_cdf(d1 - sq) - normal_cdf(d2 - sq))
            - image.powf(mu1 - 2.0) * (normal_cdf(d3 - sq) - normal_cdf(d4 - sq));
    }

    let price = match callput {
        CallPut::Call => spot * df_q * sum_s - strike * df_r * sum_k,
        CallPut::Put => strike * df_r * sum_k - spot * df_q * sum_s,
    };
    price.max(0.0)
}

/// Haug's double knock-out approximation from single-barrier pieces.
#[allow(clippy::too_many_arguments)]
pub fn haug_double_knockout(
    callput: CallPut,
    spot: Real,
    strike: Real,
    lower: Real,
    upper: Real,
    r: Real,
    q: Real,
    sigma: Real,
    tau: Real,
) -> Real {
    let down_out = reiner_rubinstein(
        UpDown::Down,
        InOut::Out,
        callput,
        spot,
        strike,
        lower,
        0.0,
        r,
        q,
        sigma,
        tau,
    );
    let up_out = reiner_rubinstein(
        UpDown::Up,
        InOut::Out,
        callput,
        spot,
        strike,
        upper,
        0.0,
        r,
        q,
        sigma,
        tau,
    );
    let (vanilla, ..) = black_scholes_merton(callput, spot, strike, r, q, sigma, tau);
    (down_out + up_out - vanilla).max(0.0)
}

/// Analytic engine for double-shark structures.
#[derive(Debug)]
pub struct AnalyticDoubleSharkEngine {
    process: Arc<dyn StochasticProcess>,
    formula: DoubleBarrierFormula,
    series_terms: usize,
}

impl AnalyticDoubleSharkEngine {
    /// Create a new engine; the original truncates the series at 10 terms.
    pub fn new(process: Arc<dyn StochasticProcess>, formula: DoubleBarrierFormula) -> Self {
        Self {
            process,
            formula,
            series_terms: 10,
        }
    }

    /// Change the series truncation.
    pub fn with_series_terms(mut self, terms: usize) -> Self {
        self.series_terms = terms;
        self
    }

    fn double_knockout(
        &self,
        callput: CallPut,
        spot: Real,
        strike: Real,
        lower: Real,
        upper: Real,
        r: Real,
        q: Real,
        sigma: Real,
        tau: Real,
    ) -> Real {
        match self.formula {
            DoubleBarrierFormula::IkedaKunitomo => ikeda_kunitomo(
                callput,
                spot,
                strike,
                lower,
                upper,
                r,
                q,
                sigma,
                tau,
                self.series_terms,
            ),
            DoubleBarrierFormula::Haug => {
                haug_double_knockout(callput, spot, strike, lower, upper, r, q, sigma, tau)
            }
        }
    }
}

impl PricingEngine<DoubleShark> for AnalyticDoubleSharkEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &DoubleShark,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        ensure!(
            prod.payment == PaymentType::Expire,
            "the closed forms price expiry-paid rebates; use MC or PDE for pay-at-hit"
        );
        ensure!(
            (prod.rebate.0 - prod.rebate.1).abs() < 1e-12,
            "the first-touch rebate leg needs matching rebates analytically"
        );

        let valuation = valuation_or_default(t);
        let tau = prod.timeline.tau(valuation);
        ensure!(tau > 0.0, "option expired: tau = {tau}");

        let s = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, self.process.spot());

        if prod.status == Status::KnockedOut {
            return Ok(prod.rebate.0 * (-r * tau).exp());
        }

        let lower = bgk_adjusted_barrier(
            prod.bound.0,
            UpDown::Down,
            sigma,
            prod.discrete_obs_interval,
        );
        let upper =
            bgk_adjusted_barrier(prod.bound.1, UpDown::Up, sigma, prod.discrete_obs_interval);

        let put_leg =
            self.double_knockout(CallPut::Put, s, prod.strike.0, lower, upper, r, q, sigma, tau);
        let call_leg =
            self.double_knockout(CallPut::Call, s, prod.strike.1, lower, upper, r, q, sigma, tau);

        // First-touch rebate at expiry: rebate · D(τ) · P(either bound trades)
        let dnt = double_no_touch(s, lower, upper, 1.0, r, q, sigma, tau, self.series_terms)?;
        let rebate_leg = prod.rebate.0 * ((-r * tau).exp() - dnt);

        Ok(prod.parti.0 * put_leg + prod.parti.1 * call_leg + rebate_leg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> (Real, Real, Real, Real, Real) {
        // spot, r, q, sigma, tau
        (100.0, 0.03, 0.03, 0.2, 1.0)
    }

    #[test]
    fn double_knockout_below_vanilla() {
        let (s, r, q, sigma, tau) = params();
        let dko = ikeda_kunitomo(CallPut::Call, s, 100.0, 80.0, 120.0, r, q, sigma, tau, 10);
        let (vanilla, ..) = black_scholes_merton(CallPut::Call, s, 100.0, r, q, sigma, tau);
        assert!(dko >= 0.0 && dko < vanilla, "dko = {dko}, vanilla = {vanilla}");
    }

    #[test]
    fn wide_barriers_recover_vanilla() {
        let (s, r, q, sigma, tau) = params();
        let dko = ikeda_kunitomo(CallPut::Call, s, 100.0, 20.0, 500.0, r, q, sigma, tau, 10);
        let (vanilla, ..) = black_scholes_merton(CallPut::Call, s, 100.0, r, q, sigma, tau);
        assert!(
            (dko - vanilla).abs() < 0.01,
            "wide-barrier dko {dko} vs vanilla {vanilla}"
        );
    }

    #[test]
    fn series_agrees_with_haug_for_wide_corridor() {
        let (s, r, q, sigma, tau) = params();
        let ik = ikeda_kunitomo(CallPut::Call, s, 100.0, 60.0, 160.0, r, q, sigma, tau, 10);
        let haug = haug_double_knockout(CallPut::Call, s, 100.0, 60.0, 160.0, r, q, sigma, tau);
        assert!(
            (ik - haug).abs() < 0.15,
            "IK {ik} vs Haug {haug} disagree for a wide corridor"
        );
    }

    #[test]
    fn tighter_corridor_is_cheaper() {
        let (s, r, q, sigma, tau) = params();
        let tight = ikeda_kunitomo(CallPut::Put, s, 100.0, 90.0, 110.0, r, q, sigma, tau, 10);
        let wide = ikeda_kunitomo(CallPut::Put, s, 100.0, 80.0, 120.0, r, q, sigma, tau, 10);
        assert!(tight < wide, "tight {tight} should undercut wide {wide}");
    }
}
