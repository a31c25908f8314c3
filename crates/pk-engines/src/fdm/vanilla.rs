//! PDE engines for vanillas and digitals.

use crate::engine::{trading_grid, valuation_or_default, PricingEngine};
use crate::fdm::{solve_backward, FdmConfig, FdmProblem, FdmSolution};
use crate::mc::obs_stride;
use pk_core::errors::Result;
use pk_core::{fail, Real, Time};
use pk_processes::StochasticProcess;
use pk_products::{
    CallPut, DigitalOption, DoubleDigitalOption, ExerciseType, PaymentType, Status, TouchType,
    VanillaOption,
};
use pk_time::Date;
use std::sync::Arc;

/// PDE engine for vanilla options (European and American).
#[derive(Debug)]
pub struct FdmVanillaEngine {
    process: Arc<dyn StochasticProcess>,
    config: FdmConfig,
}

impl FdmVanillaEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: FdmConfig) -> Self {
        Self { process, config }
    }

    /// Full backward solve, exposing the value surface.
    pub fn solve(
        &self,
        prod: &VanillaOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<FdmSolution> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let problem = VanillaProblem {
            prod: prod.clone(),
        };
        solve_backward(&*self.process, &self.config, s0, tau, n_step, &problem)
    }
}

struct VanillaProblem {
    prod: VanillaOption,
}

impl FdmProblem for VanillaProblem {
    fn terminal(&self, s: &[Real]) -> Vec<Vec<Real>> {
        vec![s.iter().map(|&x| self.prod.payoff(x)).collect()]
    }

    fn apply_events(&self, _k: usize, _t_k: Time, s: &[Real], states: &mut [Vec<Real>]) {
        if self.prod.exercise == ExerciseType::American {
            let values = &mut states[0];
            for (i, &x) in s.iter().enumerate() {
                values[i] = values[i].max(self.prod.payoff(x));
            }
        }
    }
}

impl PricingEngine<VanillaOption> for FdmVanillaEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &VanillaOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        Ok(self.solve(prod, t, spot)?.pv)
    }

    fn delta(&self, prod: &VanillaOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.delta())
    }

    fn gamma(&self, prod: &VanillaOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.gamma())
    }

    fn theta(&self, prod: &VanillaOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.theta())
    }
}

/// PDE engine for single digitals (cash-or-nothing and one-touch).
#[derive(Debug)]
pub struct FdmDigitalEngine {
    process: Arc<dyn StochasticProcess>,
    config: FdmConfig,
}

impl FdmDigitalEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: FdmConfig) -> Self {
        Self { process, config }
    }

    /// Full backward solve, exposing the value surface.
    pub fn solve(
        &self,
        prod: &DigitalOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<FdmSolution> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let problem = DigitalProblem {
            prod: prod.clone(),
            stride: obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year),
            r,
            tau,
        };
        solve_backward(&*self.process, &self.config, s0, tau, n_step, &problem)
    }
}

struct DigitalProblem {
    prod: DigitalOption,
    stride: usize,
    r: Real,
    tau: Time,
}

impl DigitalProblem {
    fn beyond(&self, s: Real) -> bool {
        match self.prod.callput {
            CallPut::Call => s >= self.prod.strike,
            CallPut::Put => s <= self.prod.strike,
        }
    }

    /// Value locked in the moment the trigger trades at `t_k`.
    fn locked_value(&self, t_k: Time) -> Real {
        match self.prod.payment {
            PaymentType::Hit => self.prod.rebate,
            PaymentType::Expire => self.prod.rebate * (-self.r * (self.tau - t_k)).exp(),
        }
    }
}

impl FdmProblem for DigitalProblem {
    fn terminal(&self, s: &[Real]) -> Vec<Vec<Real>> {
        vec![s
            .iter()
            .map(|&x| if self.beyond(x) { self.prod.rebate } else { 0.0 })
            .collect()]
    }

    fn apply_events(&self, k: usize, t_k: Time, s: &[Real], states: &mut [Vec<Real>]) {
        if self.prod.exercise != ExerciseType::American || k % self.stride != 0 {
            return;
        }
        let locked = self.locked_value(t_k);
        let values = &mut states[0];
        for (i, &x) in s.iter().enumerate() {
            if self.beyond(x) {
                values[i] = locked;
            }
        }
    }
}

impl PricingEngine<DigitalOption> for FdmDigitalEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &DigitalOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        match prod.status {
            Status::KnockedOut => fail!(State, "a digital option has no knocked-out state"),
            Status::KnockedIn => {
                let valuation = valuation_or_default(t);
                let (tau, _) = trading_grid(&prod.timeline, valuation)?;
                return Ok(match prod.payment {
                    PaymentType::Hit => prod.rebate,
                    PaymentType::Expire => prod.rebate * self.process.disc_factor(tau),
                });
            }
            Status::NoTouch => {}
        }
        Ok(self.solve(prod, t, spot)?.pv)
    }

    fn delta(&self, prod: &DigitalOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.delta())
    }

    fn gamma(&self, prod: &DigitalOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.gamma())
    }

    fn theta(&self, prod: &DigitalOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.theta())
    }
}

/// PDE engine for double digitals.
#[derive(Debug)]
pub struct FdmDoubleDigitalEngine {
    process: Arc<dyn StochasticProcess>,
    config: FdmConfig,
}

impl FdmDoubleDigitalEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: FdmConfig) -> Self {
        Self { process, config }
    }

    /// Full backward solve, exposing the value surface.
    pub fn solve(
        &self,
        prod: &DoubleDigitalOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<FdmSolution> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let problem = DoubleDigitalProblem {
            prod: prod.clone(),
            stride: obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year),
            r,
            tau,
        };
        solve_backward(&*self.process, &self.config, s0, tau, n_step, &problem)
    }
}

struct DoubleDigitalProblem {
    prod: DoubleDigitalOption,
    stride: usize,
    r: Real,
    tau: Time,
}

impl DoubleDigitalProblem {
    fn locked_value(&self, rebate: Real, t_k: Time) -> Real {
        match self.prod.payment {
            PaymentType::Hit => rebate,
            PaymentType::Expire => rebate * (-self.r * (self.tau - t_k)).exp(),
        }
    }
}

impl FdmProblem for DoubleDigitalProblem {
    fn terminal(&self, s: &[Real]) -> Vec<Vec<Real>> {
        let (lower, upper) = self.prod.bound;
        vec![s
            .iter()
            .map(|&x| match self.prod.touch {
                TouchType::Touch => {
                    if x <= lower {
                        self.prod.rebate.0
                    } else if x >= upper {
                        self.prod.rebate.1
                    } else {
                        0.0
                    }
                }
                TouchType::NoTouch => {
                    if x > lower && x < upper {
                        self.prod.rebate.0
                    } else {
                        0.0
                    }
                }
            })
            .collect()]
    }

    fn apply_events(&self, k: usize, t_k: Time, s: &[Real], states: &mut [Vec<Real>]) {
        if self.prod.exercise != ExerciseType::American || k % self.stride != 0 {
            return;
        }
        let (lower, upper) = self.prod.bound;
        let values = &mut states[0];
        for (i, &x) in s.iter().enumerate() {
            if x <= lower {
                values[i] = match self.prod.touch {
                    TouchType::Touch => self.locked_value(self.prod.rebate.0, t_k),
                    TouchType::NoTouch => 0.0,
                };
            } else if x >= upper {
                values[i] = match self.prod.touch {
                    TouchType::Touch => self.locked_value(self.prod.rebate.1, t_k),
                    TouchType::NoTouch => 0.0,
                };
            }
        }
    }
}

impl PricingEngine<DoubleDigitalOption> for FdmDoubleDigitalEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &DoubleDigitalOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        Ok(self.solve(prod, t, spot)?.pv)
    }

    fn delta(&self, prod: &DoubleDigitalOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.delta())
    }

    fn gamma(&self, prod: &DoubleDigitalOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.gamma())
    }

    fn theta(&self, prod: &DoubleDigitalOption, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.theta())
    }
}
