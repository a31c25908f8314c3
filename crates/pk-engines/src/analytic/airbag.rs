//! Analytic airbag engine.
//!
//! The airbag decomposes into Reiner-Rubinstein barrier pieces on the
//! downside knock-in barrier `B`:
//!
//! `PV = call_parti·DOC + reset_call_parti·DIC − knockin_parti·DIP`
//!
//! since the untouched payoff is the participating call, and a touch swaps
//! it for the reset call minus the short put.

use crate::engine::{valuation_or_default, PricingEngine};
use pk_core::errors::Result;
use pk_core::{ensure, fail, Real};
use pk_processes::StochasticProcess;
use pk_products::{Airbag, CallPut, InOut, Status, UpDown};
use pk_time::Date;
use std::sync::Arc;

use super::barrier::{bgk_adjusted_barrier, reiner_rubinstein};
use super::vanilla::black_scholes_merton;

/// Analytic engine for airbag structures.
#[derive(Debug)]
pub struct AnalyticAirbagEngine {
    process: Arc<dyn StochasticProcess>,
}

impl AnalyticAirbagEngine {
    /// Create a new engine on the given process.
    pub fn new(process: Arc<dyn StochasticProcess>) -> Self {
        Self { process }
    }
}

impl PricingEngine<Airbag> for AnalyticAirbagEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &Airbag,
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
            Status::KnockedOut => fail!(State, "an airbag has no knocked-out state"),
            Status::KnockedIn => {
                let (call, ..) =
                    black_scholes_merton(CallPut::Call, s, prod.strike, r, q, sigma, tau);
                let (put, ..) =
                    black_scholes_merton(CallPut::Put, s, prod.strike, r, q, sigma, tau);
                return Ok(prod.reset_call_parti * call - prod.knockin_parti * put);
            }
            Status::NoTouch => {}
        }

        let barrier =
            bgk_adjusted_barrier(prod.barrier, UpDown::Down, sigma, prod.discrete_obs_interval);

        let doc = reiner_rubinstein(
            UpDown::Down,
            InOut::Out,
            CallPut::Call,
            s,
            prod.strike,
            barrier,
            0.0,
            r,
            q,
            sigma,
            tau,
        );
        let dic = reiner_rubinstein(
            UpDown::Down,
            InOut::In,
            CallPut::Call,
            s,
            prod.strike,
            barrier,
            0.0,
            r,
            q,
            sigma,
            tau,
        );
        let dip = reiner_rubinstein(
            UpDown::Down,
            InOut::In,
            CallPut::Put,
            s,
            prod.strike,
            barrier,
            0.0,
            r,
            q,
            sigma,
            tau,
        );

        Ok(prod.call_parti * doc + prod.reset_call_parti * dic - prod.knockin_parti * dip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PricingEngine;
    use pk_processes::GeneralizedBsmProcess;
    use pk_products::Timeline;
    use pk_time::{AnnualDays, WeekendCalendar};

    fn make_airbag(knockin_parti: Real, call_parti: Real, reset: Real) -> Airbag {
        let timeline = Timeline::from_maturity(
            Date::from_ymd_opt(2021, 1, 5).unwrap(),
            1.0,
            Arc::new(WeekendCalendar),
            AnnualDays::N365,
            243,
        )
        .unwrap();
        Airbag::new(100.0, 70.0, knockin_parti, call_parti, reset, None, timeline).unwrap()
    }

    #[test]
    fn equal_participations_collapse_to_risk_reversal() {
        // With call_parti = reset_call_parti = knockin_parti = 1 the airbag
        // is a call minus a down-and-in put.
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.05, 0.2));
        let engine = AnalyticAirbagEngine::new(process);
        let prod = make_airbag(1.0, 1.0, 1.0);
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let pv = engine.calc_present_value(&prod, valuation, None).unwrap();
        let tau = prod.timeline.tau(valuation.unwrap());
        let (call, ..) = black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.03, 0.05, 0.2, tau);
        let dip = reiner_rubinstein(
            UpDown::Down,
            InOut::In,
            CallPut::Put,
            100.0,
            100.0,
            70.0,
            0.0,
            0.03,
            0.05,
            0.2,
            tau,
        );
        assert!((pv - (call - dip)).abs() < 1e-10, "pv {pv} vs {}", call - dip);
    }

    #[test]
    fn protection_cheapens_the_downside() {
        // Lower knock-in participation raises the value
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.05, 0.2));
        let engine = AnalyticAirbagEngine::new(process);
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let protected = engine
            .calc_present_value(&make_airbag(0.5, 0.7, 1.0), valuation, None)
            .unwrap();
        let exposed = engine
            .calc_present_value(&make_airbag(1.0, 0.7, 1.0), valuation, None)
            .unwrap();
        assert!(protected > exposed);
    }

    #[test]
    fn knocked_in_status_prices_vanilla_legs() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.05, 0.2));
        let engine = AnalyticAirbagEngine::new(process);
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let prod = make_airbag(1.0, 0.7, 1.0).with_status(Status::KnockedIn);
        let pv = engine.calc_present_value(&prod, valuation, None).unwrap();
        let tau = prod.timeline.tau(valuation.unwrap());
        let (call, ..) = black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.03, 0.05, 0.2, tau);
        let (put, ..) = black_scholes_merton(CallPut::Put, 100.0, 100.0, 0.03, 0.05, 0.2, tau);
        assert!((pv - (call - put)).abs() < 1e-10);
    }
}
