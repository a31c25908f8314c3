//! Monte Carlo kernels for barrier structures.

use crate::engine::{trading_grid, valuation_or_default, with_spot, PricingEngine};
use crate::mc::{obs_stride, McConfig, McCore};
use pk_core::errors::Result;
use pk_core::Real;
use pk_math::Statistics;
use pk_processes::StochasticProcess;
use pk_products::{Airbag, BarrierOption, DoubleShark, InOut, PaymentType, Status};
use pk_time::Date;
use std::sync::Arc;

/// Monte Carlo engine for single-barrier options.
#[derive(Debug)]
pub struct McBarrierEngine {
    core: McCore,
}

impl McBarrierEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }
}

impl PricingEngine<BarrierOption> for McBarrierEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &BarrierOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let df_expiry = self.core.disc(tau);

        match (prod.status, prod.inout) {
            (Status::KnockedOut, InOut::Out) => return Ok(0.0),
            (Status::KnockedOut, InOut::In) => return Ok(prod.rebate * df_expiry),
            _ => {}
        }
        let already_in = prod.status == Status::KnockedIn;

        let stride = obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year);

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let mut touch_step = None;
                if !already_in || prod.inout == InOut::Out {
                    let mut k = stride;
                    while k <= n_step {
                        if prod.breaches(path[k]) {
                            touch_step = Some(k);
                            break;
                        }
                        k += stride;
                    }
                }
                let terminal = path[n_step];
                let payoff = match prod.inout {
                    InOut::Out => match touch_step {
                        Some(k) => match prod.payment {
                            PaymentType::Hit => {
                                prod.rebate * self.core.disc(self.core.step_time(k, tau, n_step))
                            }
                            PaymentType::Expire => prod.rebate * df_expiry,
                        },
                        None => prod.vanilla_payoff(terminal) * df_expiry,
                    },
                    InOut::In => {
                        if already_in || touch_step.is_some() {
                            prod.vanilla_payoff(terminal) * df_expiry
                        } else {
                            prod.rebate * df_expiry
                        }
                    }
                };
                stats.add(payoff);
            }
            Ok(stats.mean().unwrap_or(0.0))
        })
    }
}

/// Monte Carlo engine for double-shark structures.
#[derive(Debug)]
pub struct McDoubleSharkEngine {
    core: McCore,
}

impl McDoubleSharkEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }
}

impl PricingEngine<DoubleShark> for McDoubleSharkEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &DoubleShark,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let df_expiry = self.core.disc(tau);

        if prod.status == Status::KnockedOut {
            return Ok(prod.rebate.0 * df_expiry);
        }

        let (lower, upper) = prod.bound;
        let stride = obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year);

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
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
                let payoff = match first_touch {
                    Some((k, rebate)) => match prod.payment {
                        PaymentType::Hit => {
                            rebate * self.core.disc(self.core.step_time(k, tau, n_step))
                        }
                        PaymentType::Expire => rebate * df_expiry,
                    },
                    None => prod.spread_payoff(path[n_step]) * df_expiry,
                };
                stats.add(payoff);
            }
            Ok(stats.mean().unwrap_or(0.0))
        })
    }
}

/// Monte Carlo engine for airbag structures.
#[derive(Debug)]
pub struct McAirbagEngine {
    core: McCore,
}

impl McAirbagEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }
}

impl PricingEngine<Airbag> for McAirbagEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &Airbag,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let already_in = prod.status == Status::KnockedIn;
        let stride = obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year);

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let df = self.core.disc(tau);
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let mut knocked_in = already_in;
                if !knocked_in {
                    let mut k = stride;
                    while k <= n_step {
                        if path[k] <= prod.barrier {
                            knocked_in = true;
                            break;
                        }
                        k += stride;
                    }
                }
                stats.add(prod.payoff(path[n_step], knocked_in) * df);
            }
            Ok(stats.mean().unwrap_or(0.0))
        })
    }
}
