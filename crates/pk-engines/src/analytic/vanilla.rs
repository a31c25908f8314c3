//! Analytic vanilla engine: Black-Scholes-Merton Europeans, approximated
//! Americans, and leg-by-leg portfolios.

use crate::analytic::american::{self, AmericanMethod};
use crate::engine::{valuation_or_default, PricingEngine};
use pk_core::errors::Result;
use pk_core::{ensure, Real};
use pk_math::{normal_cdf, normal_pdf};
use pk_processes::StochasticProcess;
use pk_products::{CallPut, ExerciseType, VanillaOption, VanillaPortfolio};
use pk_time::Date;
use std::sync::Arc;

/// Black-Scholes-Merton price and closed-form Greeks.
///
/// Returns `(price, delta, gamma, vega, theta, rho)` with vega per unit
/// vol, theta per year, rho per unit rate.
pub fn black_scholes_merton(
    callput: CallPut,
    spot: Real,
    strike: Real,
    r: Real,
    q: Real,
    sigma: Real,
    t: Real,
) -> (Real, Real, Real, Real, Real, Real) {
    let phi = callput.sign();

    if t <= 0.0 {
        let intrinsic = (phi * (spot - strike)).max(0.0);
        return (intrinsic, 0.0, 0.0, 0.0, 0.0, 0.0);
    }

    let sqrt_t = t.sqrt();
    let std_dev = sigma * sqrt_t;
    let df_r = (-r * t).exp();
    let df_q = (-q * t).exp();
    let fwd = spot * ((r - q) * t).exp();

    let (d1, d2) = if std_dev > 1e-15 {
        let d1 = ((spot / strike).ln() + (r - q + 0.5 * sigma * sigma) * t) / std_dev;
        (d1, d1 - std_dev)
    } else {
        let big = if fwd > strike { 1e15 } else { -1e15 };
        (big, big)
    };

    let nd1 = normal_cdf(phi * d1);
    let nd2 = normal_cdf(phi * d2);
    let npd1 = normal_pdf(d1);

    let price = phi * (spot * df_q * nd1 - strike * df_r * nd2);
    let delta = phi * df_q * nd1;
    let gamma = if std_dev > 1e-15 {
        df_q * npd1 / (spot * std_dev)
    } else {
        0.0
    };
    let vega = spot * df_q * npd1 * sqrt_t;
    let theta = {
        let term1 = if sqrt_t > 1e-15 {
            -(spot * df_q * npd1 * sigma) / (2.0 * sqrt_t)
        } else {
            0.0
        };
        let term2 = -phi * r * strike * df_r * nd2;
        let term3 = phi * q * spot * df_q * nd1;
        term1 + term2 + term3
    };
    let rho = phi * strike * t * df_r * nd2;

    (price, delta, gamma, vega, theta, rho)
}

/// Analytic engine for vanilla options and vanilla portfolios.
///
/// Europeans use the Black-Scholes-Merton closed form; Americans use the
/// approximation selected by the method tag.
#[derive(Debug)]
pub struct AnalyticVanillaEngine {
    process: Arc<dyn StochasticProcess>,
    american_method: AmericanMethod,
}

impl AnalyticVanillaEngine {
    /// Create an engine defaulting to Bjerksund-Stensland 2002 for
    /// Americans.
    pub fn new(process: Arc<dyn StochasticProcess>) -> Self {
        Self {
            process,
            american_method: AmericanMethod::BjerksundStensland2002,
        }
    }

    /// Select the American approximation.
    pub fn with_american_method(mut self, method: AmericanMethod) -> Self {
        self.american_method = method;
        self
    }
}

impl PricingEngine<VanillaOption> for AnalyticVanillaEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &VanillaOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let tau = prod.timeline.tau(valuation);
        ensure!(tau > 0.0, "option expired: tau = {tau}");

        let s = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, s);

        match prod.exercise {
            ExerciseType::European => {
                let (price, ..) =
                    black_scholes_merton(prod.callput, s, prod.strike, r, q, sigma, tau);
                Ok(price)
            }
            ExerciseType::American => american::american_price(
                self.american_method,
                prod.callput,
                s,
                prod.strike,
                r,
                q,
                sigma,
                tau,
            ),
        }
    }
}

impl PricingEngine<VanillaPortfolio> for AnalyticVanillaEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &VanillaPortfolio,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let mut pv = 0.0;
        for (quantity, leg) in &prod.legs {
            pv += quantity * self.calc_present_value(leg, t, spot)?;
        }
        Ok(pv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pk_processes::GeneralizedBsmProcess;
    use pk_products::Timeline;
    use pk_time::{AnnualDays, WeekendCalendar};

    fn timeline(years: f64) -> Timeline {
        Timeline::from_maturity(
            Date::from_ymd_opt(2022, 1, 5).unwrap(),
            years,
            Arc::new(WeekendCalendar),
            AnnualDays::N365,
            243,
        )
        .unwrap()
    }

    #[test]
    fn bs_call_reference_value() {
        // S=100, K=100, r=5%, q=0, σ=20%, T=1 → 10.4506
        let (price, delta, gamma, vega, _theta, rho) =
            black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.05, 0.0, 0.20, 1.0);
        assert_abs_diff_eq!(price, 10.4506, epsilon = 1e-3);
        assert!(delta > 0.5 && delta < 0.8);
        assert!(gamma > 0.0 && vega > 0.0 && rho > 0.0);
    }

    #[test]
    fn quarter_year_call_reference_value() {
        // S=100, K=100, r=0.02, q=0.05, σ=0.16, τ=0.25:
        // d1 = −0.05375, d2 = −0.13375 → C ≈ 2.8044
        let (price, ..) =
            black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.02, 0.05, 0.16, 0.25);
        assert_abs_diff_eq!(price, 2.8044, epsilon = 1e-2);
    }

    #[test]
    fn put_call_parity() {
        let (s, k, r, q, sigma, t) = (100.0, 105.0, 0.08, 0.03, 0.25, 0.5);
        let (call, ..) = black_scholes_merton(CallPut::Call, s, k, r, q, sigma, t);
        let (put, ..) = black_scholes_merton(CallPut::Put, s, k, r, q, sigma, t);
        let parity = s * (-q * t as f64).exp() - k * (-r * t as f64).exp();
        assert_abs_diff_eq!(call - put, parity, epsilon = 1e-8);
    }

    #[test]
    fn zero_vol_call_is_discounted_forward() {
        let (price, ..) = black_scholes_merton(CallPut::Call, 100.0, 95.0, 0.05, 0.0, 0.0, 1.0);
        let expected = 100.0 - 95.0 * (-0.05_f64).exp();
        assert_abs_diff_eq!(price, expected, epsilon = 1e-8);
    }

    #[test]
    fn engine_prices_via_process() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.05, 0.0, 0.20));
        let engine = AnalyticVanillaEngine::new(process);
        let option = VanillaOption::new(
            100.0,
            CallPut::Call,
            ExerciseType::European,
            timeline(1.0),
        )
        .unwrap();
        let valuation = Date::from_ymd_opt(2022, 1, 5).unwrap();
        // tau on the trading grid is 261/243, not exactly 1y
        let tau = option.timeline.tau(valuation);
        let (expected, ..) = black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.05, 0.0, 0.20, tau);
        let pv = engine
            .calc_present_value(&option, Some(valuation), None)
            .unwrap();
        assert_abs_diff_eq!(pv, expected, epsilon = 1e-10);
    }

    #[test]
    fn bump_delta_matches_closed_form() {
        let valuation = Date::from_ymd_opt(2022, 1, 5).unwrap();
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.05, 0.0, 0.20));
        let engine = AnalyticVanillaEngine::new(process);
        let option = VanillaOption::new(
            100.0,
            CallPut::Call,
            ExerciseType::European,
            timeline(1.0),
        )
        .unwrap();
        let tau = option.timeline.tau(valuation);
        let (_, bs_delta, ..) =
            black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.05, 0.0, 0.20, tau);
        let bumped = engine.delta(&option, Some(valuation)).unwrap();
        assert!(
            (bumped - bs_delta).abs() <= 1e-4,
            "bump delta {bumped} vs closed form {bs_delta}"
        );
    }

    #[test]
    fn portfolio_sums_legs() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.0, 0.20));
        let engine = AnalyticVanillaEngine::new(process);
        let call = VanillaOption::new(
            110.0,
            CallPut::Call,
            ExerciseType::European,
            timeline(1.0),
        )
        .unwrap();
        let put =
            VanillaOption::new(90.0, CallPut::Put, ExerciseType::European, timeline(1.0)).unwrap();
        let strangle = VanillaPortfolio::new()
            .with_leg(1.0, call.clone())
            .with_leg(1.0, put.clone());
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let pv_sum = engine.calc_present_value(&call, valuation, None).unwrap()
            + engine.calc_present_value(&put, valuation, None).unwrap();
        let pv = engine
            .calc_present_value(&strangle, valuation, None)
            .unwrap();
        assert_abs_diff_eq!(pv, pv_sum, epsilon = 1e-12);
    }

    #[test]
    fn expired_option_errors() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.0, 0.20));
        let engine = AnalyticVanillaEngine::new(process);
        let option = VanillaOption::new(
            100.0,
            CallPut::Call,
            ExerciseType::European,
            timeline(1.0),
        )
        .unwrap();
        let late = Date::from_ymd_opt(2024, 1, 5).unwrap();
        assert!(engine.calc_present_value(&option, Some(late), None).is_err());
    }
}
