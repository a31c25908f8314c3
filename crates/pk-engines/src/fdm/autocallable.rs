//! PDE engines for autocallables.
//!
//! Snowballs and phoenixes run the coupled NoTouch / KnockedIn vectors:
//! daily steps transfer knock-in nodes from the no-touch vector into the
//! knocked-in one, observation dates inject redemptions and coupons, and
//! the terminal condition folds the maturity observation in.

use crate::engine::{
    observation_grid, trading_grid, valuation_or_default, ObsGrid, PricingEngine,
};
use crate::fdm::{solve_backward, FdmConfig, FdmProblem, FdmSolution};
use pk_core::errors::Result;
use pk_core::{fail, Real, Time};
use pk_processes::StochasticProcess;
use pk_products::{Phoenix, Snowball, Status};
use pk_time::Date;
use std::sync::Arc;

/// PDE engine for snowball notes.
#[derive(Debug)]
pub struct FdmSnowballEngine {
    process: Arc<dyn StochasticProcess>,
    config: FdmConfig,
}

impl FdmSnowballEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: FdmConfig) -> Self {
        Self { process, config }
    }

    /// Full backward solve, exposing the value surface of the quoted
    /// status.
    pub fn solve(
        &self,
        prod: &Snowball,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<FdmSolution> {
        if prod.status == Status::KnockedOut {
            fail!(State, "a knocked-out snowball has already redeemed");
        }
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let obs = observation_grid(&prod.obs, &prod.timeline, valuation, n_step);
        let total_accrual = prod
            .timeline
            .calendar
            .business_days_between(prod.timeline.start_date, prod.timeline.end_date)
            as Real
            / prod.timeline.steps_per_year as Real;
        let terminal_is_obs = obs.steps.last() == Some(&n_step);
        let problem = SnowballProblem {
            prod: prod.clone(),
            obs,
            total_accrual,
            terminal_is_obs,
        };
        solve_backward(&*self.process, &self.config, s0, tau, n_step, &problem)
    }
}

struct SnowballProblem {
    prod: Snowball,
    obs: ObsGrid,
    total_accrual: Real,
    terminal_is_obs: bool,
}

impl SnowballProblem {
    fn redemption(&self, accrual: Real) -> Real {
        self.prod.s0 * (1.0 + self.prod.coupon_out * accrual)
    }
}

impl FdmProblem for SnowballProblem {
    fn n_states(&self) -> usize {
        2
    }

    fn quote_state(&self) -> usize {
        // State 0 is knocked-in, state 1 is untouched.
        match self.prod.status {
            Status::KnockedIn => 0,
            _ => 1,
        }
    }

    fn terminal(&self, s: &[Real]) -> Vec<Vec<Real>> {
        let notional = self.prod.s0;
        let last_barrier = *self
            .prod
            .barrier_out
            .last()
            .expect("snowball has observations");
        let knocked: Vec<Real> = s
            .iter()
            .map(|&x| {
                if self.terminal_is_obs && x >= last_barrier {
                    self.redemption(self.total_accrual)
                } else {
                    notional * self.prod.knocked_in_fraction(x)
                }
            })
            .collect();
        let untouched: Vec<Real> = s
            .iter()
            .map(|&x| {
                if self.terminal_is_obs && x >= last_barrier {
                    self.redemption(self.total_accrual)
                } else if x <= self.prod.barrier_in {
                    notional * self.prod.knocked_in_fraction(x)
                } else {
                    notional
                        * (1.0
                            + self.prod.survival_coupon() * self.total_accrual
                            + self.prod.upside_fraction(x))
                }
            })
            .collect();
        vec![knocked, untouched]
    }

    fn apply_events(&self, k: usize, _t_k: Time, s: &[Real], states: &mut [Vec<Real>]) {
        // Early redemption supersedes the knock-in state, so the overwrite
        // applies to both vectors.
        if let Some(j) = self.obs.at_step(k) {
            let barrier = self.prod.barrier_out[self.obs.schedule_index[j]];
            let amount = self.redemption(self.obs.accrual[j]);
            for state in states.iter_mut() {
                for (i, &x) in s.iter().enumerate() {
                    if x >= barrier {
                        state[i] = amount;
                    }
                }
            }
        }
        // Daily knock-in transfer
        let (knocked, rest) = states.split_first_mut().expect("two states");
        let untouched = &mut rest[0];
        for (i, &x) in s.iter().enumerate() {
            if x <= self.prod.barrier_in {
                untouched[i] = knocked[i];
            }
        }
    }
}

impl PricingEngine<Snowball> for FdmSnowballEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &Snowball,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        Ok(self.solve(prod, t, spot)?.pv)
    }

    fn delta(&self, prod: &Snowball, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.delta())
    }

    fn gamma(&self, prod: &Snowball, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.gamma())
    }

    fn theta(&self, prod: &Snowball, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.theta())
    }
}

/// PDE engine for phoenix / FCN / DCN notes.
#[derive(Debug)]
pub struct FdmPhoenixEngine {
    process: Arc<dyn StochasticProcess>,
    config: FdmConfig,
}

impl FdmPhoenixEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: FdmConfig) -> Self {
        Self { process, config }
    }

    /// Full backward solve, exposing the value surface of the quoted
    /// status.
    pub fn solve(
        &self,
        prod: &Phoenix,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<FdmSolution> {
        if prod.status == Status::KnockedOut {
            fail!(State, "a knocked-out phoenix has already redeemed");
        }
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let obs = observation_grid(&prod.obs, &prod.timeline, valuation, n_step);
        let problem = PhoenixProblem {
            prod: prod.clone(),
            obs,
        };
        solve_backward(&*self.process, &self.config, s0, tau, n_step, &problem)
    }
}

struct PhoenixProblem {
    prod: Phoenix,
    obs: ObsGrid,
}

impl FdmProblem for PhoenixProblem {
    fn n_states(&self) -> usize {
        2
    }

    fn quote_state(&self) -> usize {
        match self.prod.status {
            Status::KnockedIn => 0,
            _ => 1,
        }
    }

    fn terminal(&self, s: &[Real]) -> Vec<Vec<Real>> {
        let notional = self.prod.s0;
        let coupon = |x: Real| {
            if x >= self.prod.barrier_yield {
                notional * self.prod.coupon
            } else {
                0.0
            }
        };
        let knocked: Vec<Real> = s
            .iter()
            .map(|&x| notional * self.prod.knocked_in_fraction(x) + coupon(x))
            .collect();
        let untouched: Vec<Real> = s
            .iter()
            .map(|&x| {
                let principal = if x <= self.prod.barrier_in {
                    notional * self.prod.knocked_in_fraction(x)
                } else {
                    notional
                };
                principal + coupon(x)
            })
            .collect();
        vec![knocked, untouched]
    }

    fn apply_events(&self, k: usize, _t_k: Time, s: &[Real], states: &mut [Vec<Real>]) {
        if let Some(j) = self.obs.at_step(k) {
            let notional = self.prod.s0;
            let can_redeem = self.obs.schedule_index[j] >= self.prod.lock_periods;
            for state in states.iter_mut() {
                for (i, &x) in s.iter().enumerate() {
                    let coupon = if x >= self.prod.barrier_yield {
                        notional * self.prod.coupon
                    } else {
                        0.0
                    };
                    if can_redeem && x >= self.prod.barrier_out {
                        state[i] = notional + coupon;
                    } else {
                        state[i] += coupon;
                    }
                }
            }
        }
        // Daily knock-in transfer
        let (knocked, rest) = states.split_first_mut().expect("two states");
        let untouched = &mut rest[0];
        for (i, &x) in s.iter().enumerate() {
            if x <= self.prod.barrier_in {
                untouched[i] = knocked[i];
            }
        }
    }
}

impl PricingEngine<Phoenix> for FdmPhoenixEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &Phoenix,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        Ok(self.solve(prod, t, spot)?.pv)
    }

    fn delta(&self, prod: &Phoenix, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.delta())
    }

    fn gamma(&self, prod: &Phoenix, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.gamma())
    }

    fn theta(&self, prod: &Phoenix, t: Option<Date>) -> Result<Real> {
        Ok(self.solve(prod, t, None)?.theta())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn config() -> FdmConfig {
        FdmConfig {
            s_step: 400,
            n_smax: 2,
            fdm_theta: 1.0,
            rannacher_steps: 2,
        }
    }

    #[test]
    fn snowball_prices_near_par_and_has_positive_delta() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.02, 0.03, 0.15,
        ));
        let engine = FdmSnowballEngine::new(process, config());
        let prod = Snowball::standard(100.0, 103.0, 80.0, 0.0884, None, 3, timeline(1.0)).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let solution = engine.solve(&prod, valuation, None).unwrap();
        assert!(
            (solution.pv - 100.0).abs() < 4.0,
            "snowball PDE PV {}",
            solution.pv
        );
        // Short the down-and-in put: the holder is long the underlying
        assert!(solution.delta() > 0.0, "delta {}", solution.delta());
    }

    #[test]
    fn knocked_in_quote_reads_the_knocked_vector() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.02, 0.04, 0.16,
        ));
        let engine = FdmSnowballEngine::new(process, config());
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let fresh = Snowball::standard(100.0, 103.0, 80.0, 0.112, None, 3, timeline(1.0)).unwrap();
        let seasoned = fresh.clone().with_status(Status::KnockedIn);
        let pv_fresh = engine.calc_present_value(&fresh, valuation, None).unwrap();
        let pv_in = engine.calc_present_value(&seasoned, valuation, None).unwrap();
        assert!(pv_in < pv_fresh, "knocked-in {pv_in} vs fresh {pv_fresh}");
    }

    #[test]
    fn phoenix_coupon_scales_pv() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.02, 0.05, 0.16,
        ));
        let engine = FdmPhoenixEngine::new(process, config());
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let small = Phoenix::new(100.0, 100.0, 75.0, 75.0, 0.003, 3, timeline(2.0)).unwrap();
        let large = Phoenix::new(100.0, 100.0, 75.0, 75.0, 0.009, 3, timeline(2.0)).unwrap();
        let pv_small = engine.calc_present_value(&small, valuation, None).unwrap();
        let pv_large = engine.calc_present_value(&large, valuation, None).unwrap();
        assert!(pv_large > pv_small);
    }

    #[test]
    fn delta_and_gamma_surfaces_have_grid_shape() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.02, 0.04, 0.16,
        ));
        let engine = FdmSnowballEngine::new(process, config());
        let prod = Snowball::standard(100.0, 103.0, 80.0, 0.112, None, 3, timeline(1.0)).unwrap();
        let valuation = Some(Date::from_ymd_opt(2022, 1, 5).unwrap());
        let solution = engine.solve(&prod, valuation, None).unwrap();
        let delta = solution.delta_matrix();
        let gamma = solution.gamma_matrix();
        assert_eq!(delta.len(), solution.s.len());
        assert_eq!(delta[0].len(), solution.columns.len());
        assert_eq!(gamma.len(), solution.s.len());
    }
}
