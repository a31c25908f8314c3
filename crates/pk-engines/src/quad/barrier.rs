//! Quadrature engines for barrier and digital structures.
//!
//! Daily-observed barriers roll the density one trading day at a time and
//! apply the barrier indicator at each landing; knock-ins run the coupled
//! pair of vectors the way the PDE engines do.

use crate::engine::{trading_grid, valuation_or_default, PricingEngine};
use crate::mc::obs_stride;
use crate::quad::{DensityStep, QuadConfig, QuadMesh};
use pk_core::errors::Result;
use pk_core::{fail, Real};
use pk_processes::StochasticProcess;
use pk_products::{
    BarrierOption, CallPut, DigitalOption, DoubleShark, ExerciseType, InOut, PaymentType, Status,
};
use pk_time::Date;
use std::sync::Arc;

/// Quadrature engine for single-barrier options.
#[derive(Debug)]
pub struct QuadBarrierEngine {
    process: Arc<dyn StochasticProcess>,
    config: QuadConfig,
}

impl QuadBarrierEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: QuadConfig) -> Self {
        Self { process, config }
    }
}

impl PricingEngine<BarrierOption> for QuadBarrierEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &BarrierOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, self.process.spot());
        let df_expiry = (-r * tau).exp();

        match (prod.status, prod.inout) {
            (Status::KnockedOut, InOut::Out) => return Ok(0.0),
            (Status::KnockedOut, InOut::In) => return Ok(prod.rebate * df_expiry),
            _ => {}
        }

        let stride = obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year);
        let mesh = QuadMesh::build(&self.config, s0, sigma, tau, Some(prod.barrier))?;
        let dt = tau / n_step as Real;
        let step = DensityStep::new(&mesh, r - q, sigma, r, dt);

        let vanilla: Vec<Real> = mesh.s.iter().map(|&x| prod.vanilla_payoff(x)).collect();
        let already_in = prod.status == Status::KnockedIn;

        match prod.inout {
            InOut::Out => {
                let mut values: Vec<Real> = mesh
                    .s
                    .iter()
                    .zip(&vanilla)
                    .map(|(&x, &v)| if prod.breaches(x) { prod.rebate } else { v })
                    .collect();
                for k in (1..n_step).rev() {
                    values = step.apply(&mesh, &values);
                    if k % stride == 0 {
                        let t_k = k as Real * dt;
                        let locked = match prod.payment {
                            PaymentType::Hit => prod.rebate,
                            PaymentType::Expire => prod.rebate * (-r * (tau - t_k)).exp(),
                        };
                        for (i, &x) in mesh.s.iter().enumerate() {
                            if prod.breaches(x) {
                                values[i] = locked;
                            }
                        }
                    }
                }
                values = step.apply(&mesh, &values);
                Ok(mesh.interpolate(&values, s0))
            }
            InOut::In => {
                if already_in {
                    // Activated: one exact integration to expiry
                    let full = DensityStep::new(&mesh, r - q, sigma, r, tau);
                    let values = full.apply(&mesh, &vanilla);
                    return Ok(mesh.interpolate(&values, s0));
                }
                let mut activated = vanilla.clone();
                let mut untouched: Vec<Real> = mesh
                    .s
                    .iter()
                    .zip(&vanilla)
                    .map(|(&x, &v)| if prod.breaches(x) { v } else { prod.rebate })
                    .collect();
                for k in (1..n_step).rev() {
                    activated = step.apply(&mesh, &activated);
                    untouched = step.apply(&mesh, &untouched);
                    if k % stride == 0 {
                        for (i, &x) in mesh.s.iter().enumerate() {
                            if prod.breaches(x) {
                                untouched[i] = activated[i];
                            }
                        }
                    }
                }
                untouched = step.apply(&mesh, &untouched);
                Ok(mesh.interpolate(&untouched, s0))
            }
        }
    }
}

/// Quadrature engine for single digitals.
#[derive(Debug)]
pub struct QuadDigitalEngine {
    process: Arc<dyn StochasticProcess>,
    config: QuadConfig,
}

impl QuadDigitalEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: QuadConfig) -> Self {
        Self { process, config }
    }
}

impl PricingEngine<DigitalOption> for QuadDigitalEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &DigitalOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, self.process.spot());

        match prod.status {
            Status::KnockedOut => fail!(State, "a digital option has no knocked-out state"),
            Status::KnockedIn => {
                return Ok(match prod.payment {
                    PaymentType::Hit => prod.rebate,
                    PaymentType::Expire => prod.rebate * (-r * tau).exp(),
                })
            }
            Status::NoTouch => {}
        }

        let beyond = |x: Real| match prod.callput {
            CallPut::Call => x >= prod.strike,
            CallPut::Put => x <= prod.strike,
        };

        let mesh = QuadMesh::build(&self.config, s0, sigma, tau, Some(prod.strike))?;
        let mut values: Vec<Real> = mesh
            .s
            .iter()
            .map(|&x| if beyond(x) { prod.rebate } else { 0.0 })
            .collect();

        match prod.exercise {
            ExerciseType::European => {
                let step = DensityStep::new(&mesh, r - q, sigma, r, tau);
                values = step.apply(&mesh, &values);
            }
            ExerciseType::American => {
                let stride = obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year);
                let dt = tau / n_step as Real;
                let step = DensityStep::new(&mesh, r - q, sigma, r, dt);
                for k in (1..n_step).rev() {
                    values = step.apply(&mesh, &values);
                    if k % stride == 0 {
                        let t_k = k as Real * dt;
                        let locked = match prod.payment {
                            PaymentType::Hit => prod.rebate,
                            PaymentType::Expire => prod.rebate * (-r * (tau - t_k)).exp(),
                        };
                        for (i, &x) in mesh.s.iter().enumerate() {
                            if beyond(x) {
                                values[i] = locked;
                            }
                        }
                    }
                }
                values = step.apply(&mesh, &values);
            }
        }
        Ok(mesh.interpolate(&values, s0))
    }
}

/// Quadrature engine for double-shark structures.
#[derive(Debug)]
pub struct QuadDoubleSharkEngine {
    process: Arc<dyn StochasticProcess>,
    config: QuadConfig,
}

impl QuadDoubleSharkEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: QuadConfig) -> Self {
        Self { process, config }
    }
}

impl PricingEngine<DoubleShark> for QuadDoubleSharkEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &DoubleShark,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, n_step) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, self.process.spot());
        let (lower, upper) = prod.bound;

        if prod.status == Status::KnockedOut {
            return Ok(prod.rebate.0 * (-r * tau).exp());
        }

        let stride = obs_stride(prod.discrete_obs_interval, prod.timeline.steps_per_year);
        // Anchor the mesh on the nearer barrier
        let anchor = if (s0 - lower).abs() < (upper - s0).abs() {
            lower
        } else {
            upper
        };
        let mesh = QuadMesh::build(&self.config, s0, sigma, tau, Some(anchor))?;
        let dt = tau / n_step as Real;
        let step = DensityStep::new(&mesh, r - q, sigma, r, dt);

        let mut values: Vec<Real> = mesh
            .s
            .iter()
            .map(|&x| {
                if x <= lower {
                    prod.rebate.0
                } else if x >= upper {
                    prod.rebate.1
                } else {
                    prod.spread_payoff(x)
                }
            })
            .collect();

        for k in (1..n_step).rev() {
            values = step.apply(&mesh, &values);
            if k % stride == 0 {
                let t_k = k as Real * dt;
                let lock = |rebate: Real| match prod.payment {
                    PaymentType::Hit => rebate,
                    PaymentType::Expire => rebate * (-r * (tau - t_k)).exp(),
                };
                for (i, &x) in mesh.s.iter().enumerate() {
                    if x <= lower {
                        values[i] = lock(prod.rebate.0);
                    } else if x >= upper {
                        values[i] = lock(prod.rebate.1);
                    }
                }
            }
        }
        values = step.apply(&mesh, &values);
        Ok(mesh.interpolate(&values, s0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::barrier::AnalyticBarrierEngine;
    use crate::analytic::digital::cash_or_nothing;
    use pk_products::{Timeline, UpDown};
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

    fn config() -> QuadConfig {
        QuadConfig {
            quad_method: crate::quad::QuadMethod::Trapezoid,
            n_points: 801,
            n_max: 5,
        }
    }

    #[test]
    fn quad_barrier_tracks_bgk_analytic() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.03, 0.05, 0.2,
        ));
        let engine = QuadBarrierEngine::new(
            Arc::clone(&process) as Arc<dyn StochasticProcess>,
            config(),
        );
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
        let quad = engine.calc_present_value(&prod, valuation, None).unwrap();
        let analytic = AnalyticBarrierEngine::new(process)
            .calc_present_value(&prod, valuation, None)
            .unwrap();
        assert!(
            (quad - analytic).abs() < 0.05,
            "quad {quad} vs analytic {analytic}"
        );
    }

    #[test]
    fn quad_european_digital_matches_closed_form() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.02, 0.05, 0.16,
        ));
        let engine = QuadDigitalEngine::new(process, config());
        let prod = DigitalOption::new(
            120.0,
            10.0,
            CallPut::Call,
            ExerciseType::European,
            PaymentType::Expire,
            Some(1.0 / 243.0),
            timeline(),
        )
        .unwrap();
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let quad = engine.calc_present_value(&prod, valuation, None).unwrap();
        let tau = prod.timeline.tau(valuation.unwrap());
        let closed = cash_or_nothing(CallPut::Call, 100.0, 120.0, 10.0, 0.02, 0.05, 0.16, tau);
        assert!((quad - closed).abs() < 0.02, "quad {quad} vs closed {closed}");
    }

    #[test]
    fn quad_shark_between_rebate_and_spread_bounds() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.03, 0.03, 0.2,
        ));
        let engine = QuadDoubleSharkEngine::new(process, config());
        let prod = DoubleShark::new(
            (90.0, 110.0),
            (80.0, 120.0),
            (3.0, 3.0),
            (0.5, 0.5),
            ExerciseType::American,
            PaymentType::Expire,
            Some(1.0 / 243.0),
            timeline(),
        )
        .unwrap();
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let pv = engine.calc_present_value(&prod, valuation, None).unwrap();
        // Worst case everything rebates, best case a full spread survives
        assert!(pv > 0.0 && pv < 10.0, "quad shark PV {pv}");
    }
}
