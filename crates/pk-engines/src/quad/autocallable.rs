//! Quadrature engines for autocallables.
//!
//! Autocall notes only change at observation dates, so the density is
//! rolled observation-to-observation in a handful of steps. Snowballs and
//! coupon notes watch the knock-in barrier daily and roll day by day with
//! the coupled NoTouch / KnockedIn vectors.

use crate::engine::{
    observation_grid, trading_grid, valuation_or_default, PricingEngine,
};
use crate::quad::{DensityStep, QuadConfig, QuadMesh};
use pk_core::errors::Result;
use pk_core::{fail, Real};
use pk_processes::StochasticProcess;
use pk_products::{AutoCall, Phoenix, Snowball, Status};
use pk_time::Date;
use std::sync::Arc;

/// Quadrature engine for binary autocall notes.
#[derive(Debug)]
pub struct QuadAutoCallEngine {
    process: Arc<dyn StochasticProcess>,
    config: QuadConfig,
}

impl QuadAutoCallEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: QuadConfig) -> Self {
        Self { process, config }
    }
}

impl PricingEngine<AutoCall> for QuadAutoCallEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &AutoCall,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, self.process.spot());
        let dt_day = tau / n_step as Real;

        let obs = observation_grid(&prod.obs, &prod.timeline, valuation, n_step);
        let total_accrual = prod
            .timeline
            .calendar
            .business_days_between(prod.timeline.start_date, prod.timeline.end_date)
            as Real
            / prod.timeline.steps_per_year as Real;

        let mesh = QuadMesh::build(&self.config, s0, sigma, tau, Some(prod.barrier_out))?;
        let redemption = |accrual: Real| prod.s0 * (1.0 + prod.coupon_out * accrual);

        // Terminal: the last observation coincides with expiry
        let mut values: Vec<Real> = mesh
            .s
            .iter()
            .map(|&x| {
                if prod.knocks_out(x) {
                    redemption(total_accrual)
                } else {
                    prod.s0 * (1.0 + prod.coupon_div * total_accrual)
                }
            })
            .collect();

        // Roll observation-to-observation, then to the valuation date
        let mut right = n_step;
        for j in (0..obs.steps.len()).rev() {
            let k = obs.steps[j];
            if k == right {
                continue;
            }
            let dt = (right - k) as Real * dt_day;
            let step = DensityStep::new(&mesh, r - q, sigma, r, dt);
            values = step.apply(&mesh, &values);
            for (i, &x) in mesh.s.iter().enumerate() {
                if prod.knocks_out(x) {
                    values[i] = redemption(obs.accrual[j]);
                }
            }
            right = k;
        }
        if right > 0 {
            let step = DensityStep::new(&mesh, r - q, sigma, r, right as Real * dt_day);
            values = step.apply(&mesh, &values);
        }
        Ok(mesh.interpolate(&values, s0))
    }
}

/// Quadrature engine for snowball notes.
#[derive(Debug)]
pub struct QuadSnowballEngine {
    process: Arc<dyn StochasticProcess>,
    config: QuadConfig,
}

impl QuadSnowballEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: QuadConfig) -> Self {
        Self { process, config }
    }
}

impl PricingEngine<Snowball> for QuadSnowballEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &Snowball,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        if prod.status == Status::KnockedOut {
            fail!(State, "a knocked-out snowball has already redeemed");
        }
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, self.process.spot());
        let dt = tau / n_step as Real;

        let obs = observation_grid(&prod.obs, &prod.timeline, valuation, n_step);
        let total_accrual = prod
            .timeline
            .calendar
            .business_days_between(prod.timeline.start_date, prod.timeline.end_date)
            as Real
            / prod.timeline.steps_per_year as Real;
        let terminal_is_obs = obs.steps.last() == Some(&n_step);

        // The daily knock-in barrier dominates the value kink
        let mesh = QuadMesh::build(&self.config, s0, sigma, tau, Some(prod.barrier_in))?;
        let step = DensityStep::new(&mesh, r - q, sigma, r, dt);
        let notional = prod.s0;
        let redemption = |accrual: Real| notional * (1.0 + prod.coupon_out * accrual);
        let last_barrier = *prod.barrier_out.last().expect("snowball has observations");

        let mut knocked: Vec<Real> = mesh
            .s
            .iter()
            .map(|&x| {
                if terminal_is_obs && x >= last_barrier {
                    redemption(total_accrual)
                } else {
                    notional * prod.knocked_in_fraction(x)
                }
            })
            .collect();
        let mut untouched: Vec<Real> = mesh
            .s
            .iter()
            .map(|&x| {
                if terminal_is_obs && x >= last_barrier {
                    redemption(total_accrual)
                } else if x <= prod.barrier_in {
                    notional * prod.knocked_in_fraction(x)
                } else {
                    notional
                        * (1.0
                            + prod.survival_coupon() * total_accrual
                            + prod.upside_fraction(x))
                }
            })
            .collect();

        for k in (1..n_step).rev() {
            knocked = step.apply(&mesh, &knocked);
            untouched = step.apply(&mesh, &untouched);
            if let Some(j) = obs.at_step(k) {
                let barrier = prod.barrier_out[obs.schedule_index[j]];
                let amount = redemption(obs.accrual[j]);
                for (i, &x) in mesh.s.iter().enumerate() {
                    if x >= barrier {
                        knocked[i] = amount;
                        untouched[i] = amount;
                    }
                }
            }
            for (i, &x) in mesh.s.iter().enumerate() {
                if x <= prod.barrier_in {
                    untouched[i] = knocked[i];
                }
            }
        }
        knocked = step.apply(&mesh, &knocked);
        untouched = step.apply(&mesh, &untouched);

        let quoted = match prod.status {
            Status::KnockedIn => &knocked,
            _ => &untouched,
        };
        Ok(mesh.interpolate(quoted, s0))
    }
}

/// Quadrature engine for fixed/digital coupon notes (the phoenix shape).
#[derive(Debug)]
pub struct QuadFcnEngine {
    process: Arc<dyn StochasticProcess>,
    config: QuadConfig,
}

impl QuadFcnEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: QuadConfig) -> Self {
        Self { process, config }
    }
}

impl PricingEngine<Phoenix> for QuadFcnEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &Phoenix,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        if prod.status == Status::KnockedOut {
            fail!(State, "a knocked-out note has already redeemed");
        }
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, self.process.spot());
        let dt = tau / n_step as Real;

        let obs = observation_grid(&prod.obs, &prod.timeline, valuation, n_step);
        let mesh = QuadMesh::build(&self.config, s0, sigma, tau, Some(prod.barrier_in))?;
        let step = DensityStep::new(&mesh, r - q, sigma, r, dt);
        let notional = prod.s0;
        let coupon_at = |x: Real| {
            if x >= prod.barrier_yield {
                notional * prod.coupon
            } else {
                0.0
            }
        };

        let mut knocked: Vec<Real> = mesh
            .s
            .iter()
            .map(|&x| notional * prod.knocked_in_fraction(x) + coupon_at(x))
            .collect();
        let mut untouched: Vec<Real> = mesh
            .s
            .iter()
            .map(|&x| {
                let principal = if x <= prod.barrier_in {
                    notional * prod.knocked_in_fraction(x)
                } else {
                    notional
                };
                principal + coupon_at(x)
            })
            .collect();

        for k in (1..n_step).rev() {
            knocked = step.apply(&mesh, &knocked);
            untouched = step.apply(&mesh, &untouched);
            if let Some(j) = obs.at_step(k) {
                let can_redeem = obs.schedule_index[j] >= prod.lock_periods;
                for state in [&mut knocked, &mut untouched] {
                    for (i, &x) in mesh.s.iter().enumerate() {
                        let coupon = coupon_at(x);
                        if can_redeem && x >= prod.barrier_out {
                            state[i] = notional + coupon;
                        } else {
                            state[i] += coupon;
                        }
                    }
                }
            }
            for (i, &x) in mesh.s.iter().enumerate() {
                if x <= prod.barrier_in {
                    untouched[i] = knocked[i];
                }
            }
        }
        knocked = step.apply(&mesh, &knocked);
        untouched = step.apply(&mesh, &untouched);

        let quoted = match prod.status {
            Status::KnockedIn => &knocked,
            _ => &untouched,
        };
        Ok(mesh.interpolate(quoted, s0))
    }
}
