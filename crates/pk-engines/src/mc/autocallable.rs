//! Monte Carlo kernels for autocallables.
//!
//! All notes are quoted per `s0` notional. Knock-out coupons accrue from
//! the trade start date, so a seasoned note keeps its contractual coupon
//! times; cashflows before the valuation date are the host's business and
//! never enter the PV.

use crate::engine::{
    observation_grid, trading_grid, valuation_or_default, with_spot, PricingEngine,
};
use crate::mc::{McConfig, McCore};
use pk_core::errors::Result;
use pk_core::{fail, Real, Time};
use pk_math::Statistics;
use pk_processes::StochasticProcess;
use pk_products::{AutoCall, Phoenix, Snowball, Status};
use pk_time::Date;
use std::sync::Arc;

/// Monte Carlo engine for binary autocall notes.
#[derive(Debug)]
pub struct McAutoCallEngine {
    core: McCore,
}

impl McAutoCallEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }
}

impl PricingEngine<AutoCall> for McAutoCallEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &AutoCall,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let grid = observation_grid(&prod.obs, &prod.timeline, valuation, n_step);
        let total_accrual = prod
            .timeline
            .calendar
            .business_days_between(prod.timeline.start_date, prod.timeline.end_date)
            as Time
            / prod.timeline.steps_per_year as Time;

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let df_expiry = self.core.disc(tau);
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let mut payoff = None;
                for (j, &k) in grid.steps.iter().enumerate() {
                    if prod.knocks_out(path[k]) {
                        let redemption = prod.s0 * (1.0 + prod.coupon_out * grid.accrual[j]);
                        payoff = Some(
                            redemption * self.core.disc(self.core.step_time(k, tau, n_step)),
                        );
                        break;
                    }
                }
                let value = payoff.unwrap_or_else(|| {
                    prod.s0 * (1.0 + prod.coupon_div * total_accrual) * df_expiry
                });
                stats.add(value);
            }
            Ok(stats.mean().unwrap_or(0.0))
        })
    }
}

/// Monte Carlo engine for snowball notes (all barrier variants).
#[derive(Debug)]
pub struct McSnowballEngine {
    core: McCore,
}

impl McSnowballEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }

    /// Present value and standard error of the mean.
    pub fn price_with_error(
        &self,
        prod: &Snowball,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<(Real, Real)> {
        if prod.status == Status::KnockedOut {
            fail!(State, "a knocked-out snowball has already redeemed");
        }
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let grid = observation_grid(&prod.obs, &prod.timeline, valuation, n_step);
        let total_accrual = prod
            .timeline
            .calendar
            .business_days_between(prod.timeline.start_date, prod.timeline.end_date)
            as Time
            / prod.timeline.steps_per_year as Time;
        let already_in = prod.status == Status::KnockedIn;

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let df_expiry = self.core.disc(tau);
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let mut knocked_in = already_in;
                let mut redeemed = None;
                let mut next_obs = 0;
                for k in 1..=n_step {
                    let s = path[k];
                    if s <= prod.barrier_in {
                        knocked_in = true;
                    }
                    if next_obs < grid.steps.len() && grid.steps[next_obs] == k {
                        let barrier = prod.barrier_out[grid.schedule_index[next_obs]];
                        if s >= barrier {
                            let redemption =
                                prod.s0 * (1.0 + prod.coupon_out * grid.accrual[next_obs]);
                            redeemed = Some(
                                redemption * self.core.disc(self.core.step_time(k, tau, n_step)),
                            );
                            break;
                        }
                        next_obs += 1;
                    }
                }
                let value = redeemed.unwrap_or_else(|| {
                    let terminal = path[n_step];
                    if knocked_in {
                        prod.s0 * prod.knocked_in_fraction(terminal) * df_expiry
                    } else {
                        prod.s0
                            * (1.0
                                + prod.survival_coupon() * total_accrual
                                + prod.upside_fraction(terminal))
                            * df_expiry
                    }
                });
                stats.add(value);
            }
            Ok((
                stats.mean().unwrap_or(0.0),
                stats.error_estimate().unwrap_or(0.0),
            ))
        })
    }
}

impl PricingEngine<Snowball> for McSnowballEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &Snowball,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        Ok(self.price_with_error(prod, t, spot)?.0)
    }
}

/// Monte Carlo engine for phoenix / FCN / DCN notes.
#[derive(Debug)]
pub struct McPhoenixEngine {
    core: McCore,
}

impl McPhoenixEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: McConfig) -> Result<Self> {
        Ok(Self {
            core: McCore::new(process, config)?,
        })
    }
}

impl PricingEngine<Phoenix> for McPhoenixEngine {
    fn process(&self) -> &dyn StochasticProcess {
        self.core.process()
    }

    fn calc_present_value(
        &self,
        prod: &Phoenix,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        if prod.status == Status::KnockedOut {
            fail!(State, "a knocked-out phoenix has already redeemed");
        }
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let grid = observation_grid(&prod.obs, &prod.timeline, valuation, n_step);
        let already_in = prod.status == Status::KnockedIn;

        with_spot(self.core.process(), spot, || {
            let paths = self.core.paths(tau, n_step)?;
            let df_expiry = self.core.disc(tau);
            let mut stats = Statistics::new();
            for i in 0..paths.n_paths() {
                let path = paths.path(i);
                let mut knocked_in = already_in;
                let mut value = 0.0;
                let mut redeemed = false;
                let mut next_obs = 0;
                for k in 1..=n_step {
                    let s = path[k];
                    if s <= prod.barrier_in {
                        knocked_in = true;
                    }
                    if next_obs < grid.steps.len() && grid.steps[next_obs] == k {
                        let df = self.core.disc(self.core.step_time(k, tau, n_step));
                        if s >= prod.barrier_yield {
                            value += prod.s0 * prod.coupon * df;
                        }
                        if grid.schedule_index[next_obs] >= prod.lock_periods
                            && s >= prod.barrier_out
                        {
                            value += prod.s0 * df;
                            redeemed = true;
                            break;
                        }
                        next_obs += 1;
                    }
                }
                if !redeemed {
                    let terminal = path[n_step];
                    let fraction = if knocked_in {
                        prod.knocked_in_fraction(terminal)
                    } else {
                        1.0
                    };
                    value += prod.s0 * fraction * df_expiry;
                }
                stats.add(value);
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
    use pk_products::{CallPut, Timeline};
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

    fn sobol_config(n_path: usize, seed: u64) -> McConfig {
        McConfig {
            n_path,
            rands_method: RandsMethod::LowDiscrepancy,
            antithetic_variate: true,
            ld_method: LdMethod::Sobol,
            seed,
        }
    }

    #[test]
    fn standard_snowball_prices_near_par() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.04, 0.16));
        let engine = McSnowballEngine::new(process, sobol_config(20_000, 3)).unwrap();
        let prod =
            Snowball::standard(100.0, 103.0, 80.0, 0.112, None, 3, timeline(1.0)).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let (pv, stderr) = engine.price_with_error(&prod, valuation, None).unwrap();
        // A market-coupon snowball prices within a few points of par
        assert!(
            (pv - 100.0).abs() < 3.0,
            "snowball PV {pv} ± {stderr} far from par"
        );
    }

    #[test]
    fn higher_coupon_raises_pv() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.04, 0.16));
        let engine = McSnowballEngine::new(process, sobol_config(8_192, 3)).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let low = Snowball::standard(100.0, 103.0, 80.0, 0.05, None, 3, timeline(1.0)).unwrap();
        let high = Snowball::standard(100.0, 103.0, 80.0, 0.15, None, 3, timeline(1.0)).unwrap();
        let pv_low = engine.calc_present_value(&low, valuation, None).unwrap();
        let pv_high = engine.calc_present_value(&high, valuation, None).unwrap();
        assert!(pv_high > pv_low);
    }

    #[test]
    fn knocked_in_snowball_cheaper() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.04, 0.16));
        let engine = McSnowballEngine::new(process, sobol_config(8_192, 3)).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let fresh = Snowball::standard(100.0, 103.0, 80.0, 0.112, None, 3, timeline(1.0)).unwrap();
        let seasoned = fresh.clone().with_status(Status::KnockedIn);
        let pv_fresh = engine.calc_present_value(&fresh, valuation, None).unwrap();
        let pv_in = engine.calc_present_value(&seasoned, valuation, None).unwrap();
        assert!(pv_in < pv_fresh, "knocked-in {pv_in} vs fresh {pv_fresh}");
    }

    #[test]
    fn snowball_plus_upside_adds_value() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.03, 0.15));
        let engine = McSnowballEngine::new(process, sobol_config(8_192, 0)).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let base = Snowball::standard(100.0, 103.0, 80.0, 0.115, None, 3, timeline(2.0)).unwrap();
        let plus = base.clone().with_upside(0.5, 103.0);
        let pv_base = engine.calc_present_value(&base, valuation, None).unwrap();
        let pv_plus = engine.calc_present_value(&plus, valuation, None).unwrap();
        assert!(pv_plus > pv_base);
    }

    #[test]
    fn autocall_put_mirror_prices() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.05, 0.2));
        let engine = McAutoCallEngine::new(process, sobol_config(8_192, 0)).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        for callput in [CallPut::Call, CallPut::Put] {
            let barrier = if callput == CallPut::Call { 103.0 } else { 97.0 };
            let note = AutoCall::new(
                100.0,
                barrier,
                0.045,
                0.02,
                callput,
                3,
                1.0,
                timeline(2.0),
            )
            .unwrap();
            let pv = engine.calc_present_value(&note, valuation, None).unwrap();
            assert!((pv - 100.0).abs() < 5.0, "{callput:?} note PV {pv}");
        }
    }

    #[test]
    fn fcn_worth_more_than_dcn() {
        // The unconditional coupon dominates the digital one
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.04, 0.16));
        let engine = McPhoenixEngine::new(process, sobol_config(8_192, 0)).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let fcn = Phoenix::fcn(100.0, 100.0, 80.0, 0.005, 3, timeline(2.0)).unwrap();
        let dcn = Phoenix::dcn(100.0, 100.0, 80.0, 0.005, 3, timeline(2.0)).unwrap();
        let pv_fcn = engine.calc_present_value(&fcn, valuation, None).unwrap();
        let pv_dcn = engine.calc_present_value(&dcn, valuation, None).unwrap();
        assert!(pv_fcn >= pv_dcn, "FCN {pv_fcn} below DCN {pv_dcn}");
    }

    #[test]
    fn knocked_out_snowball_is_a_state_error() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.04, 0.16));
        let engine = McSnowballEngine::new(process, sobol_config(1_024, 0)).unwrap();
        let prod = Snowball::standard(100.0, 103.0, 80.0, 0.112, None, 3, timeline(1.0))
            .unwrap()
            .with_status(Status::KnockedOut);
        assert!(engine.price(&prod).is_err());
    }
}
