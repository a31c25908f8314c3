//! PDE engines for barrier structures.

use crate::engine::{trading_grid, valuation_or_default, PricingEngine};
use crate::fdm::{solve_backward, FdmConfig, FdmProblem, FdmSolution};
use crate::mc::obs_stride;
use pk_core::errors::Result;
use pk_core::{Real, Time};
use pk_processes::StochasticProcess;
use pk_products::{Airbag, BarrierOption, DoubleShark, InOut, PaymentType, Status};
use pk_time::Date;
use std::sync::Arc;

/// PDE engine for single-barrier options.
///
/// Knock-ins run two coupled vectors — the knocked-in (vanilla) value and
/// the not-touched value — with barrier nodes transferring between them at
/// each observation.
#[derive(Debug)]
pub struct FdmBarrierEngine {
    process: Arc<dyn StochasticProcess>,
    config: FdmConfig,
}

impl FdmBarrierEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: FdmConfig) -> Self {
        Self { process, config }
    }

    /// Full backward solve, exposing the value surface.
    pub fn solve(
        &self,
        prod: &BarrierOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<FdmSolution> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let problem = BarrierProblem {
            prod: prod.clone(),
            stride: obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year),
            r: self.process.interest(tau),
            tau,
        };
        solve_backward(&*self.process, &self.config, s0, tau, n_step, &problem)
    }
}

struct BarrierProblem {
    prod: BarrierOption,
    stride: usize,
    r: Real,
    tau: Time,
}

impl FdmProblem for BarrierProblem {
    fn n_states(&self) -> usize {
        match (self.prod.inout, self.prod.status) {
            (InOut::In, Status::NoTouch) => 2,
            _ => 1,
        }
    }

    fn quote_state(&self) -> usize {
        // State 0 is the activated option; the no-touch vector is state 1.
        match (self.prod.inout, self.prod.status) {
            (InOut::In, Status::NoTouch) => 1,
            _ => 0,
        }
    }

    fn terminal(&self, s: &[Real]) -> Vec<Vec<Real>> {
        let vanilla: Vec<Real> = s.iter().map(|&x| self.prod.vanilla_payoff(x)).collect();
        match (self.prod.inout, self.prod.status) {
            (InOut::In, Status::NoTouch) => {
                // Not touched by expiry: the rebate (at expiry); touching at
                // expiry itself activates.
                let no_touch: Vec<Real> = s
                    .iter()
                    .zip(&vanilla)
                    .map(|(&x, &v)| if self.prod.breaches(x) { v } else { self.prod.rebate })
                    .collect();
                vec![vanilla, no_touch]
            }
            (InOut::In, _) => vec![vanilla],
            (InOut::Out, _) => {
                let out: Vec<Real> = s
                    .iter()
                    .zip(&vanilla)
                    .map(|(&x, &v)| if self.prod.breaches(x) { self.prod.rebate } else { v })
                    .collect();
                vec![out]
            }
        }
    }

    fn apply_events(&self, k: usize, t_k: Time, s: &[Real], states: &mut [Vec<Real>]) {
        if k % self.stride != 0 {
            return;
        }
        match (self.prod.inout, self.prod.status) {
            (InOut::Out, Status::NoTouch) => {
                let locked = match self.prod.payment {
                    PaymentType::Hit => self.prod.rebate,
                    PaymentType::Expire => self.prod.rebate * (-self.r * (self.tau - t_k)).exp(),
                };
                let values = &mut states[0];
                for (i, &x) in s.iter().enumerate() {
                    if self.prod.breaches(x) {
                        values[i] = locked;
                    }
                }
            }
            (InOut::In, Status::NoTouch) => {
                let (activated, rest) = states.split_first_mut().expect("two states");
                let no_touch = &mut rest[0];
                for (i, &x) in s.iter().enumerate() {
                    if self.prod.breaches(x) {
                        no_touch[i] = activated[i];
                    }
                }
            }
            _ => {}
        }
    }
}

impl PricingEngine<BarrierOption> for FdmBarrierEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &BarrierOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        if prod.status == Status::KnockedOut {
            let valuation = valuation_or_default(t);
            let (tau, _) = trading_grid(&prod.timeline, valuation)?;
            return Ok(match (prod.inout, prod.payment) {
                (InOut::Out, PaymentType::Hit) => 0.0,
                _ => prod.rebate * self.process.disc_factor(tau),
            });
        }
        Ok(self.solve(prod, t, spot)?.pv)
    }

    fn delta(&self, prod: &BarrierOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.delta())
    }

    fn gamma(&self, prod: &BarrierOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.gamma())
    }

    fn theta(&self, prod: &BarrierOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.theta())
    }
}

/// PDE engine for double-shark structures.
#[derive(Debug)]
pub struct FdmDoubleSharkEngine {
    process: Arc<dyn StochasticProcess>,
    config: FdmConfig,
}

impl FdmDoubleSharkEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: FdmConfig) -> Self {
        Self { process, config }
    }

    /// Full backward solve, exposing the value surface.
    pub fn solve(
        &self,
        prod: &DoubleShark,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<FdmSolution> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let problem = DoubleSharkProblem {
            prod: prod.clone(),
            stride: obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year),
            r: self.process.interest(tau),
            tau,
        };
        solve_backward(&*self.process, &self.config, s0, tau, n_step, &problem)
    }
}

struct DoubleSharkProblem {
    prod: DoubleShark,
    stride: usize,
    r: Real,
    tau: Time,
}

impl DoubleSharkProblem {
    fn locked(&self, rebate: Real, t_k: Time) -> Real {
        match self.prod.payment {
            PaymentType::Hit => rebate,
            PaymentType::Expire => rebate * (-self.r * (self.tau - t_k)).exp(),
        }
    }
}

impl FdmProblem for DoubleSharkProblem {
    fn terminal(&self, s: &[Real]) -> Vec<Vec<Real>> {
        let (lower, upper) = self.prod.bound;
        vec![s
            .iter()
            .map(|&x| {
                if x <= lower {
                    self.prod.rebate.0
                } else if x >= upper {
                    self.prod.rebate.1
                } else {
                    self.prod.spread_payoff(x)
                }
            })
            .collect()]
    }

    fn apply_events(&self, k: usize, t_k: Time, s: &[Real], states: &mut [Vec<Real>]) {
        if k % self.stride != 0 {
            return;
        }
        let (lower, upper) = self.prod.bound;
        let values = &mut states[0];
        for (i, &x) in s.iter().enumerate() {
            if x <= lower {
                values[i] = self.locked(self.prod.rebate.0, t_k);
            } else if x >= upper {
                values[i] = self.locked(self.prod.rebate.1, t_k);
            }
        }
    }
}

impl PricingEngine<DoubleShark> for FdmDoubleSharkEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &DoubleShark,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        if prod.status == Status::KnockedOut {
            let valuation = valuation_or_default(t);
            let (tau, _) = trading_grid(&prod.timeline, valuation)?;
            return Ok(prod.rebate.0 * self.process.disc_factor(tau));
        }
        Ok(self.solve(prod, t, spot)?.pv)
    }

    fn delta(&self, prod: &DoubleShark, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.delta())
    }

    fn gamma(&self, prod: &DoubleShark, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.gamma())
    }

    fn theta(&self, prod: &DoubleShark, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.theta())
    }
}

/// PDE engine for airbags, with the two-vector knock-in bookkeeping.
#[derive(Debug)]
pub struct FdmAirbagEngine {
    process: Arc<dyn StochasticProcess>,
    config: FdmConfig,
}

impl FdmAirbagEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: FdmConfig) -> Self {
        Self { process, config }
    }

    /// Full backward solve, exposing the value surface.
    pub fn solve(
        &self,
        prod: &Airbag,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<FdmSolution> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let problem = AirbagProblem {
            prod: prod.clone(),
            stride: obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year),
        };
        solve_backward(&*self.process, &self.config, s0, tau, n_step, &problem)
    }
}

struct AirbagProblem {
    prod: Airbag,
    stride: usize,
}

impl FdmProblem for AirbagProblem {
    fn n_states(&self) -> usize {
        if self.prod.status == Status::KnockedIn {
            1
        } else {
            2
        }
    }

    fn quote_state(&self) -> usize {
        if self.prod.status == Status::KnockedIn {
            0
        } else {
            1
        }
    }

    fn terminal(&self, s: &[Real]) -> Vec<Vec<Real>> {
        let knocked: Vec<Real> = s.iter().map(|&x| self.prod.payoff(x, true)).collect();
        if self.prod.status == Status::KnockedIn {
            return vec![knocked];
        }
        let untouched: Vec<Real> = s
            .iter()
            .map(|&x| {
                if x <= self.prod.barrier {
                    self.prod.payoff(x, true)
                } else {
                    self.prod.payoff(x, false)
                }
            })
            .collect();
        vec![knocked, untouched]
    }

    fn apply_events(&self, k: usize, _t_k: Time, s: &[Real], states: &mut [Vec<Real>]) {
        if self.prod.status == Status::KnockedIn || k % self.stride != 0 {
            return;
        }
        let (knocked, rest) = states.split_first_mut().expect("two states");
        let untouched = &mut rest[0];
        for (i, &x) in s.iter().enumerate() {
            if x <= self.prod.barrier {
                untouched[i] = knocked[i];
            }
        }
    }
}

impl PricingEngine<Airbag> for FdmAirbagEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &Airbag,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        Ok(self.solve(prod, t, spot)?.pv)
    }

    fn delta(&self, prod: &Airbag, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.delta())
    }

    fn gamma(&self, prod: &Airbag, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.gamma())
    }

    fn theta(&self, prod: &Airbag, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.theta())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::barrier::AnalyticBarrierEngine;
    use pk_products::{CallPut, Timeline, UpDown};
    use pk_time::{AnnualDays, WeekendCalendar};

    fn timeline() -> Timeline {
        Timeline::from_maturity(
            Date::from_ymd_opt(2021, 1, 5).unwrap(),
            1.0,
            Arc::new(WeekendCalendar),
            AnnualDays::N365,
            243,
        )
        .unwrap()
    }

    fn config() -> FdmConfig {
        FdmConfig {
            s_step: 800,
            n_smax: 2,
            fdm_theta: 1.0,
            rannacher_steps: 2,
        }
    }

    #[test]
    fn up_and_out_call_matches_reiner_rubinstein() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.03, 0.05, 0.2,
        ));
        let engine = FdmBarrierEngine::new(
            Arc::clone(&process) as Arc<dyn StochasticProcess>,
            config(),
        );
        // Daily observation on both sides, so the closed form carries the
        // matching BGK barrier shift
        let prod = BarrierOption::new(
            100.0,
            110.0,
            0.0,
            1.0,
            UpDown::Up,
            InOut::Out,
            CallPut::Call,
            Some(1.0 / 243.0),
            timeline(),
        )
        .unwrap();
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let pde = engine.calc_present_value(&prod, valuation, None).unwrap();
        let analytic = AnalyticBarrierEngine::new(process)
            .calc_present_value(&prod, valuation, None)
            .unwrap();
        assert!(
            (pde - analytic).abs() / analytic.max(0.1) < 0.03,
            "PDE {pde} vs analytic {analytic}"
        );
    }

    #[test]
    fn knock_in_two_vector_parity() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.03, 0.05, 0.2,
        ));
        let engine = FdmBarrierEngine::new(process, config());
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let make = |inout| {
            BarrierOption::new(
                100.0,
                90.0,
                0.0,
                1.0,
                UpDown::Down,
                inout,
                CallPut::Call,
                Some(1.0 / 243.0),
                timeline(),
            )
            .unwrap()
        };
        let ki = engine
            .calc_present_value(&make(InOut::In), valuation, None)
            .unwrap();
        let ko = engine
            .calc_present_value(&make(InOut::Out), valuation, None)
            .unwrap();
        // KI + KO built on the same grid reproduce the vanilla
        let vanilla_prod = BarrierOption::new(
            100.0,
            1e-6,
            0.0,
            1.0,
            UpDown::Down,
            InOut::Out,
            CallPut::Call,
            Some(1.0 / 243.0),
            timeline(),
        )
        .unwrap();
        let vanilla = engine
            .calc_present_value(&vanilla_prod, valuation, None)
            .unwrap();
        assert!(
            (ki + ko - vanilla).abs() / vanilla < 5e-3,
            "grid parity broken: {ki} + {ko} != {vanilla}"
        );
    }

    #[test]
    fn airbag_grid_matches_decomposition() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.03, 0.05, 0.2,
        ));
        let engine = FdmAirbagEngine::new(
            Arc::clone(&process) as Arc<dyn StochasticProcess>,
            config(),
        );
        let prod = Airbag::new(100.0, 70.0, 1.0, 0.7, 1.0, None, timeline()).unwrap();
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let pde = engine.calc_present_value(&prod, valuation, None).unwrap();
        let analytic = crate::analytic::AnalyticAirbagEngine::new(process)
            .calc_present_value(&prod, valuation, None)
            .unwrap();
        assert!(
            (pde - analytic).abs() < 0.25,
            "PDE {pde} vs decomposition {analytic}"
        );
    }
}
