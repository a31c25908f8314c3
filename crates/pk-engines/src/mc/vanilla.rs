//! Monte Carlo kernels for vanillas, digitals, and Asians.

use crate::engine::{trading_grid, valuation_or_default, with_spot, PricingEngine};
use crate::mc::{obs_steps, obs_stride, McConfig, McCore};
use pk_core::errors::Result;
use pk_core::{ensure, fail, Real};
use pk_math::Statistics;
use pk_processes::StochasticProcess;
use pk_products::{
    AsianOption, AverageMethod, CallPut, DigitalOption, DoubleDigitalOption, ExerciseType,
    PaymentType, Status, TouchType, VanillaOption,
};
use pk_time::Date;
use std::sync::Arc;

/// Monte Carlo engine for European vanillas (BSM, local vol, or Heston).
#[derive(Debug)]
pub struct McVanillaEngine {
    core: McCore,
}

impl McVanillaEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }

    /// Present value and standard error of the mean.
    pub fn price_with_error(
        &self,
        prod: &VanillaOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<(Real, Real)> {
        ensure!(
            prod.exercise == ExerciseType::European,
            "the MC vanilla kernel prices Europeans; American exercise needs the tree or PDE"
        );
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let df = self.core.disc(tau);
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let terminal = *paths.path(i).last().expect("path has points");
                stats.add(prod.payoff(terminal) * df);
            }
            Ok((
                stats.mean().unwrap_or(0.0),
                stats.error_estimate().unwrap_or(0.0),
            ))
        })
    }
}

impl PricingEngine<VanillaOption> for McVanillaEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &VanillaOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        Ok(self.price_with_error(prod, t, spot)?.0)
    }
}

/// Monte Carlo engine for single digital options.
#[derive(Debug)]
pub struct McDigitalEngine {
    core: McCore,
}

impl McDigitalEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }
}

impl PricingEngine<DigitalOption> for McDigitalEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &DigitalOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;

        match prod.status {
            Status::KnockedOut => fail!(State, "a digital option has no knocked-out state"),
            Status::KnockedIn => {
                return Ok(match prod.payment {
                    PaymentType::Hit => prod.rebate,
                    PaymentType::Expire => prod.rebate * self.core.disc(tau),
                })
            }
            Status::NoTouch => {}
        }

        let stride = obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year);
        let trigger_above = prod.callput == CallPut::Call;

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let df_expiry = self.core.disc(tau);
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let payoff = match prod.exercise {
                    ExerciseType::European => {
                        let terminal = path[n_step];
                        let hit = if trigger_above {
                            terminal >= prod.strike
                        } else {
                            terminal <= prod.strike
                        };
                        if hit {
                            prod.rebate * df_expiry
                        } else {
                            0.0
                        }
                    }
                    ExerciseType::American => {
                        let mut value = 0.0;
                        let mut k = stride;
                        while k <= n_step {
                            let s = path[k];
                            let hit = if trigger_above {
                                s >= prod.strike
                            } else {
                                s <= prod.strike
                            };
                            if hit {
                                value = match prod.payment {
                                    PaymentType::Hit => {
                                        prod.rebate
                                            * self.core.disc(self.core.step_time(k, tau, n_step))
                                    }
                                    PaymentType::Expire => prod.rebate * df_expiry,
                                };
                                break;
                            }
                            k += stride;
                        }
                        value
                    }
                };
                stats.add(payoff);
            }
            Ok(stats.mean().unwrap_or(0.0))
        })
    }
}

/// Monte Carlo engine for double digital options.
#[derive(Debug)]
pub struct McDoubleDigitalEngine {
    core: McCore,
}

impl McDoubleDigitalEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }
}

impl PricingEngine<DoubleDigitalOption> for McDoubleDigitalEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &DoubleDigitalOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let (lower, upper) = prod.bound;
        let stride = obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year);

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let df_expiry = self.core.disc(tau);
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let payoff = match prod.exercise {
                    ExerciseType::European => {
                        let terminal = path[n_step];
                        match prod.touch {
                            TouchType::Touch => {
                                if terminal <= lower {
                                    prod.rebate.0 * df_expiry
                                } else if terminal >= upper {
                                    prod.rebate.1 * df_expiry
                                } else {
                                    0.0
                                }
                            }
                            TouchType::NoTouch => {
                                if terminal > lower && terminal < upper {
                                    prod.rebate.0 * df_expiry
                                } else {
                                    0.0
                                }
                            }
                        }
                    }
                    ExerciseType::American => {
                        // First touch of either bound
                        let mut first_touch: Option<(usize, Real)> = None;
                        let mut k = stride;
                        while k <= n_step {
                            let s = path[k];
                            if s <= lower {
                                first_touch = Some((k, prod.rebate.0));
                                break;
                            }
                            if s >= upper {
                                first_touch = Some((k, prod.rebate.1));
                                break;
                            }
                            k += stride;
                        }
                        match (prod.touch, first_touch) {
                            (TouchType::Touch, Some((k, rebate))) => match prod.payment {
                                PaymentType::Hit => {
                                    rebate * self.core.disc(self.core.step_time(k, tau, n_step))
                                }
                                PaymentType::Expire => rebate * df_expiry,
                            },
                            (TouchType::Touch, None) => 0.0,
                            (TouchType::NoTouch, Some(_)) => 0.0,
                            (TouchType::NoTouch, None) => prod.rebate.0 * df_expiry,
                        }
                    }
                };
                stats.add(payoff);
            }
            Ok(stats.mean().unwrap_or(0.0))
        })
    }
}

/// Monte Carlo engine for Asian options.
#[derive(Debug)]
pub struct McAsianEngine {
    core: McCore,
}

impl McAsianEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }

    /// Present value and standard error of the mean.
    pub fn price_with_error(
        &self,
        prod: &AsianOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<(Real, Real)> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;

        // Daily averaging from the observation-window start
        let first_obs = prod
            .timeline
            .calendar
            .business_days_between(valuation, prod.obs_start)
            .max(0) as usize;
        let steps = obs_steps(
            &(first_obs.max(1)..=n_step).collect::<Vec<_>>(),
            n_step,
        );
        ensure!(!steps.is_empty(), "no averaging observations remain");

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let df = self.core.disc(tau);
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let average = average_of(prod, path, &steps);
                stats.add(prod.payoff(average, path[n_step]) * df);
            }
            Ok((
                stats.mean().unwrap_or(0.0),
                stats.error_estimate().unwrap_or(0.0),
            ))
        })
    }
}

fn average_of(prod: &AsianOption, path: &[Real], steps: &[usize]) -> Real {
    let cap = prod.limited_price.unwrap_or(Real::INFINITY);
    let observe = |s: Real| if prod.enhanced { s.min(cap) } else { s };
    match prod.ave_method {
        AverageMethod::Arithmetic => {
            steps.iter().map(|&k| observe(path[k])).sum::<Real>() / steps.len() as Real
        }
        AverageMethod::Geometric => {
            let log_sum: Real = steps.iter().map(|&k| observe(path[k]).ln()).sum();
            (log_sum / steps.len() as Real).exp()
        }
    }
}

impl PricingEngine<AsianOption> for McAsianEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &AsianOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        Ok(self.price_with_error(prod, t, spot)?.0)
    }
}
