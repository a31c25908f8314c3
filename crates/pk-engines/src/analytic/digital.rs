//! Analytic digital engines.
//!
//! European cash-or-nothing, American one-touch (Reiner-Rubinstein, paid
//! at hit or at expiry), and double-sided binaries: European corridor
//! combinations plus the Hui (1996) series for the American double
//! no-touch.

use crate::engine::{valuation_or_default, PricingEngine};
use pk_core::errors::Result;
use pk_core::{ensure, fail, Real};
use pk_math::normal_cdf;
use pk_processes::StochasticProcess;
use pk_products::{
    CallPut, DigitalOption, DoubleDigitalOption, ExerciseType, PaymentType, Status, TouchType,
    UpDown,
};
use pk_time::Date;
use std::f64::consts::PI;
use std::sync::Arc;

use super::barrier::bgk_adjusted_barrier;

/// European cash-or-nothing price: pays `rebate` when `φ(S_T − K) > 0`.
#[allow(clippy::too_many_arguments)]
pub fn cash_or_nothing(
    callput: CallPut,
    spot: Real,
    strike: Real,
    rebate: Real,
    r: Real,
    q: Real,
    sigma: Real,
    tau: Real,
) -> Real {
    let phi = callput.sign();
    let d2 = ((spot / strike).ln() + (r - q - 0.5 * sigma * sigma) * tau) / (sigma * tau.sqrt());
    rebate * (-r * tau).exp() * normal_cdf(phi * d2)
}

/// One-touch value paying `rebate` the moment `barrier` trades.
#[allow(clippy::too_many_arguments)]
pub fn one_touch_at_hit(
    updown: UpDown,
    spot: Real,
    barrier: Real,
    rebate: Real,
    r: Real,
    q: Real,
    sigma: Real,
    tau: Real,
) -> Real {
    let sigma2 = sigma * sigma;
    let mu = (r - q) / sigma2 - 0.5;
    let la = (mu * mu + 2.0 * r / sigma2).sqrt();
    let a7 = sigma * tau.sqrt();
    let z = (barrier / spot).ln() / a7 + la * a7;
    let eta = -updown.sign();
    rebate
        * ((barrier / spot).powf(mu + la) * normal_cdf(eta * z)
            + (barrier / spot).powf(mu - la) * normal_cdf(eta * (z - 2.0 * la * a7)))
}

/// Probability-weighted value of a touch paying `rebate` at expiry.
#[allow(clippy::too_many_arguments)]
pub fn one_touch_at_expiry(
    updown: UpDown,
    spot: Real,
    barrier: Real,
    rebate: Real,
    r: Real,
    q: Real,
    sigma: Real,
    tau: Real,
) -> Real {
    rebate * (-r * tau).exp() - no_touch(updown, spot, barrier, rebate, r, q, sigma, tau)
}

/// Value of a no-touch paying `rebate` at expiry when `barrier` never
/// trades.
#[allow(clippy::too_many_arguments)]
pub fn no_touch(
    updown: UpDown,
    spot: Real,
    barrier: Real,
    rebate: Real,
    r: Real,
    q: Real,
    sigma: Real,
    tau: Real,
) -> Real {
    let sigma2 = sigma * sigma;
    let mu = (r - q) / sigma2 - 0.5;
    let a = (barrier / spot).powf(2.0 * mu);
    let a5 = r - q - 0.5 * sigma2;
    let a7 = sigma * tau.sqrt();
    let d4 = ((spot / barrier).ln() + a5 * tau) / a7;
    let d5 = ((spot / barrier).ln() - a5 * tau) / a7;
    let eta = -updown.sign();
    rebate * (-r * tau).exp() * (normal_cdf(eta * d4) - a * normal_cdf(-eta * d5))
}

/// Hui (1996) series value of a double no-touch paying `rebate` at expiry
/// when neither bound ever trades.
#[allow(clippy::too_many_arguments)]
pub fn double_no_touch(
    spot: Real,
    lower: Real,
    upper: Real,
    rebate: Real,
    r: Real,
    q: Real,
    sigma: Real,
    tau: Real,
    series_terms: usize,
) -> Result<Real> {
    ensure!(
        lower < spot && spot < upper,
        "spot {spot} must lie inside the corridor [{lower}, {upper}]"
    );
    let sigma2 = sigma * sigma;
    let b = r - q;
    let l = (upper / lower).ln();
    let alpha = -0.5 * (2.0 * b / sigma2 - 1.0);
    let beta = -0.25 * (2.0 * b / sigma2 - 1.0) * (2.0 * b / sigma2 - 1.0) - 2.0 * r / sigma2;
    let x = (spot / lower).ln();

    let mut sum = 0.0;
    for i in 1..=series_terms {
        let ii = i as Real;
        let wave = ii * PI / l;
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        let term = 2.0 * PI * ii * rebate / (l * l)
            * ((spot / lower).powf(alpha) - sign * (spot / upper).powf(alpha))
            / (alpha * alpha + wave * wave)
            * (wave * x).sin()
            * (-0.5 * (wave * wave - beta) * sigma2 * tau).exp();
        sum += term;
    }
    if !sum.is_finite() {
        fail!(Numerical, "double no-touch series diverged");
    }
    Ok(sum.max(0.0))
}

// ── Engines ──────────────────────────────────────────────────────────────────

/// Analytic engine for single digital options.
#[derive(Debug)]
pub struct AnalyticDigitalEngine {
    process: Arc<dyn StochasticProcess>,
}

impl AnalyticDigitalEngine {
    /// Create a new engine on the given process.
    pub fn new(process: Arc<dyn StochasticProcess>) -> Self {
        Self { process }
    }
}

impl PricingEngine<DigitalOption> for AnalyticDigitalEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &DigitalOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let tau = prod.timeline.tau(valuation);
        ensure!(tau > 0.0, "option expired: tau = {tau}");

        let s = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, self.process.spot());

        match prod.status {
            Status::KnockedOut => {
                fail!(State, "a digital option has no knocked-out state")
            }
            Status::KnockedIn => {
                // Already touched: the cash is locked in
                return Ok(match prod.payment {
                    PaymentType::Hit => prod.rebate,
                    PaymentType::Expire => prod.rebate * (-r * tau).exp(),
                });
            }
            Status::NoTouch => {}
        }

        match prod.exercise {
            ExerciseType::European => Ok(cash_or_nothing(
                prod.callput,
                s,
                prod.strike,
                prod.rebate,
                r,
                q,
                sigma,
                tau,
            )),
            ExerciseType::American => {
                let updown = match prod.callput {
                    CallPut::Call => UpDown::Up,
                    CallPut::Put => UpDown::Down,
                };
                let barrier = bgk_adjusted_barrier(
                    prod.strike,
                    updown,
                    sigma,
                    prod.discrete_obs_interval,
                );
                // Already through the trigger: the touch is immediate
                let touched = match updown {
                    UpDown::Up => s >= barrier,
                    UpDown::Down => s <= barrier,
                };
                if touched {
                    return Ok(match prod.payment {
                        PaymentType::Hit => prod.rebate,
                        PaymentType::Expire => prod.rebate * (-r * tau).exp(),
                    });
                }
                Ok(match prod.payment {
                    PaymentType::Hit => {
                        one_touch_at_hit(updown, s, barrier, prod.rebate, r, q, sigma, tau)
                    }
                    PaymentType::Expire => {
                        one_touch_at_expiry(updown, s, barrier, prod.rebate, r, q, sigma, tau)
                    }
                })
            }
        }
    }
}

/// Analytic engine for double digital options.
#[derive(Debug)]
pub struct AnalyticDoubleDigitalEngine {
    process: Arc<dyn StochasticProcess>,
    series_terms: usize,
}

impl AnalyticDoubleDigitalEngine {
    /// Create a new engine with the given series truncation (the original
    /// uses 10 terms).
    pub fn new(process: Arc<dyn StochasticProcess>, series_terms: usize) -> Self {
        Self {
            process,
            series_terms,
        }
    }
}

impl PricingEngine<DoubleDigitalOption> for AnalyticDoubleDigitalEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &DoubleDigitalOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let tau = prod.timeline.tau(valuation);
        ensure!(tau > 0.0, "option expired: tau = {tau}");

        let s = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, self.process.spot());
        let (lower, upper) = prod.bound;
        let (rebate_lo, rebate_hi) = prod.rebate;

        match prod.exercise {
            ExerciseType::European => match prod.touch {
                TouchType::Touch => {
                    // Pays outside the corridor at expiry
                    let below =
                        cash_or_nothing(CallPut::Put, s, lower, rebate_lo, r, q, sigma, tau);
                    let above =
                        cash_or_nothing(CallPut::Call, s, upper, rebate_hi, r, q, sigma, tau);
                    Ok(below + above)
                }
                TouchType::NoTouch => {
                    ensure!(
                        (rebate_lo - rebate_hi).abs() < 1e-12,
                        "a corridor binary pays one amount; rebates must match"
                    );
                    let below_lo =
                        cash_or_nothing(CallPut::Put, s, lower, rebate_lo, r, q, sigma, tau);
                    let below_hi =
                        cash_or_nothing(CallPut::Put, s, upper, rebate_lo, r, q, sigma, tau);
                    Ok(below_hi - below_lo)
                }
            },
            ExerciseType::American => {
                ensure!(
                    prod.payment == PaymentType::Expire,
                    "the double-touch series prices expiry payment only; use MC or PDE for pay-at-hit"
                );
                ensure!(
                    (rebate_lo - rebate_hi).abs() < 1e-12,
                    "the double-touch series needs matching rebates"
                );
                // Adjust both bounds outwards under discrete observation
                let lower_adj =
                    bgk_adjusted_barrier(lower, UpDown::Down, sigma, prod.discrete_obs_interval);
                let upper_adj =
                    bgk_adjusted_barrier(upper, UpDown::Up, sigma, prod.discrete_obs_interval);
                let dnt = double_no_touch(
                    s,
                    lower_adj,
                    upper_adj,
                    rebate_lo,
                    r,
                    q,
                    sigma,
                    tau,
                    self.series_terms,
                )?;
                Ok(match prod.touch {
                    TouchType::NoTouch => dnt,
                    TouchType::Touch => rebate_lo * (-r * tau).exp() - dnt,
                })
            }
        }
    }
}
