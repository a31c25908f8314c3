//! Monte Carlo kernels for daily accrual products.

use crate::engine::{trading_grid, valuation_or_default, with_spot, PricingEngine};
use crate::mc::{McConfig, McCore};
use pk_core::errors::Result;
use pk_core::Real;
use pk_math::Statistics;
use pk_processes::StochasticProcess;
use pk_products::{Accumulator, RangeAccrual};
use pk_time::Date;
use std::sync::Arc;

/// Monte Carlo engine for accumulators and decumulators.
#[derive(Debug)]
pub struct McAccumulatorEngine {
    core: McCore,
}

impl McAccumulatorEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }
}

impl PricingEngine<Accumulator> for McAccumulatorEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &Accumulator,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let mut value = 0.0;
                for k in 1..=n_step {
                    let s = path[k];
                    // The barrier day still accrues, then the trade is gone
                    value += prod.s0
                        * prod.daily_accrual(s)
                        * self.core.disc(self.core.step_time(k, tau, n_step));
                    if prod.knocks_out(s) {
                        break;
                    }
                }
                stats.add(value);
            }
            Ok(stats.mean().unwrap_or(0.0))
        })
    }
}

/// Monte Carlo engine for range accruals.
#[derive(Debug)]
pub struct McRangeAccrualEngine {
    core: McCore,
}

impl McRangeAccrualEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }
}

impl PricingEngine<RangeAccrual> for McRangeAccrualEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &RangeAccrual,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let df = self.core.disc(tau);
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let in_range = (1..=n_step).filter(|&k| prod.in_range(path[k])).count();
                let fraction = in_range as Real / n_step as Real;
                stats.add(prod.s0 * prod.payment * fraction * df);
            }
            Ok(stats.mean().unwrap_or(0.0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mc::{LdMethod, RandsMethod};
    use pk_processes::GeneralizedBsmProcess;
    use pk_products::Timeline;
    use pk_time::{AnnualDays, WeekendCalendar};

    fn timeline() -> Timeline {
        Timeline::from_maturity(
            Date::from_ymd_opt(2022, 1, 5).unwrap(),
            2.0,
            Arc::new(WeekendCalendar),
            AnnualDays::N365,
            243,
        )
        .unwrap()
    }

    fn config() -> McConfig {
        McConfig {
            n_path: 8_192,
            rands_method: RandsMethod::LowDiscrepancy,
            antithetic_variate: true,
            ld_method: LdMethod::Sobol,
            seed: 0,
        }
    }

    #[test]
    fn range_accrual_bounded_by_full_coupon() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.04, 0.16));
        let engine = McRangeAccrualEngine::new(process, config()).unwrap();
        let prod = RangeAccrual::new(100.0, 90.0, 110.0, 0.1, timeline()).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let pv = engine.calc_present_value(&prod, valuation, None).unwrap();
        let tau = prod.timeline.tau(valuation.unwrap());
        let cap = 100.0 * 0.1 * (-0.02 * tau as f64).exp();
        assert!(pv > 0.0 && pv <= cap, "pv {pv} outside (0, {cap}]");
    }

    #[test]
    fn wider_range_accrues_more() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.04, 0.16));
        let engine = McRangeAccrualEngine::new(process, config()).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let narrow = RangeAccrual::new(100.0, 95.0, 105.0, 0.1, timeline()).unwrap();
        let wide = RangeAccrual::new(100.0, 80.0, 120.0, 0.1, timeline()).unwrap();
        let pv_narrow = engine.calc_present_value(&narrow, valuation, None).unwrap();
        let pv_wide = engine.calc_present_value(&wide, valuation, None).unwrap();
        assert!(pv_wide > pv_narrow);
    }

    #[test]
    fn accumulator_and_decumulator_both_price() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.04, 0.16));
        let engine = McAccumulatorEngine::new(process, config()).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let acc = Accumulator::new(100.0, 87.14, 110.0, 2.0, 0.2, timeline()).unwrap();
        let dec = Accumulator::new(100.0, 107.63, 90.0, 2.0, 0.2, timeline()).unwrap();
        let pv_acc = engine.calc_present_value(&acc, valuation, None).unwrap();
        let pv_dec = engine.calc_present_value(&dec, valuation, None).unwrap();
        // Struck near fair: both sides land within a band around zero
        assert!(pv_acc.abs() < 30.0, "accumulator PV {pv_acc}");
        assert!(pv_dec.abs() < 30.0, "decumulator PV {pv_dec}");
    }

    #[test]
    fn higher_strike_hurts_the_accumulator() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.04, 0.16));
        let engine = McAccumulatorEngine::new(process, config()).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let cheap = Accumulator::new(100.0, 85.0, 110.0, 2.0, 0.2, timeline()).unwrap();
        let dear = Accumulator::new(100.0, 95.0, 110.0, 2.0, 0.2, timeline()).unwrap();
        let pv_cheap = engine.calc_present_value(&cheap, valuation, None).unwrap();
        let pv_dear = engine.calc_present_value(&dear, valuation, None).unwrap();
        assert!(pv_cheap > pv_dear);
    }
}
