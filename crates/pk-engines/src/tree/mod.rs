//! CRR binomial-tree engines.
//!
//! `u = exp(σ√Δt)`, `d = 1/u`, `p = (exp((r−q)Δt) − d)/(u − d)`. Terminal
//! payoffs are vectorised across the leaves and rolled back node by node;
//! overlays handle early exercise, barrier masks, and touch locks. The
//! Asian engine lives in its own module with the bucketed-average
//! approximation.

pub mod asian;

pub use asian::BiTreeAsianEngine;

use crate::engine::{trading_grid, valuation_or_default, PricingEngine};
use pk_core::errors::Result;
use pk_core::{ensure, fail, Real, Time};
use pk_processes::StochasticProcess;
use pk_products::{
    BarrierOption, CallPut, DigitalOption, ExerciseType, InOut, PaymentType, Status,
    VanillaOption,
};
use pk_time::Date;
use std::sync::Arc;

/// Tree configuration.
#[derive(Debug, Clone, Copy)]
pub struct TreeConfig {
    /// Number of time steps.
    pub tree_branches: usize,
    /// Average buckets per node (Asian engine only).
    pub n_samples: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            tree_branches: 500,
            n_samples: 100,
        }
    }
}

/// A Cox-Ross-Rubinstein lattice.
#[derive(Debug, Clone)]
pub(crate) struct CrrTree {
    pub s0: Real,
    pub u: Real,
    pub p: Real,
    pub dt: Time,
    pub disc: Real,
    pub steps: usize,
}

impl CrrTree {
    /// Build a CRR tree for the given market data.
    pub fn build(
        s0: Real,
        r: Real,
        q: Real,
        sigma: Real,
        tau: Time,
        steps: usize,
    ) -> Result<Self> {
        ensure!(steps >= 2, "tree needs at least 2 steps, got {steps}");
        ensure!(sigma > 0.0, "tree needs positive volatility, got {sigma}");
        let dt = tau / steps as Real;
        let u = (sigma * dt.sqrt()).exp();
        let d = 1.0 / u;
        let p = (((r - q) * dt).exp() - d) / (u - d);
        ensure!(
            (0.0..=1.0).contains(&p),
            "CRR risk-neutral probability {p} outside [0, 1]; use more steps"
        );
        Ok(Self {
            s0,
            u,
            p,
            dt,
            disc: (-r * dt).exp(),
            steps,
        })
    }

    /// Underlying at node `(i, j)`: `j` up-moves out of `i`.
    pub fn node(&self, i: usize, j: usize) -> Real {
        self.s0 * self.u.powi(2 * j as i32 - i as i32)
    }

    /// Expected one-step rollback of the two child values.
    pub fn rollback(&self, down: Real, up: Real) -> Real {
        self.disc * (self.p * up + (1.0 - self.p) * down)
    }
}

/// Binomial engine for vanilla options (European and American).
#[derive(Debug)]
pub struct BiTreeVanillaEngine {
    process: Arc<dyn StochasticProcess>,
    config: TreeConfig,
}

impl BiTreeVanillaEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: TreeConfig) -> Self {
        Self { process, config }
    }
}

impl PricingEngine<VanillaOption> for BiTreeVanillaEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &VanillaOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let (tau, _) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, s0);
        let tree = CrrTree::build(s0, r, q, sigma, tau, self.config.tree_branches)?;

        let n = tree.steps;
        let mut values: Vec<Real> = (0..=n).map(|j| prod.payoff(tree.node(n, j))).collect();
        for i in (0..n).rev() {
            for j in 0..=i {
                let continuation = tree.rollback(values[j], values[j + 1]);
                values[j] = if prod.exercise == ExerciseType::American {
                    continuation.max(prod.payoff(tree.node(i, j)))
                } else {
                    continuation
                };
            }
            values.truncate(i + 1);
        }
        Ok(values[0])
    }
}

/// Binomial engine for digital options.
#[derive(Debug)]
pub struct BiTreeDigitalEngine {
    process: Arc<dyn StochasticProcess>,
    config: TreeConfig,
}

impl BiTreeDigitalEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: TreeConfig) -> Self {
        Self { process, config }
    }
}

impl PricingEngine<DigitalOption> for BiTreeDigitalEngine {
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
        let (tau, _) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, s0);
        let tree = CrrTree::build(s0, r, q, sigma, tau, self.config.tree_branches)?;

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

        let beyond = |s: Real| match prod.callput {
            CallPut::Call => s >= prod.strike,
            CallPut::Put => s <= prod.strike,
        };
        let stride = tree_stride(prod.discrete_obs_interval, tree.dt);

        let n = tree.steps;
        let mut values: Vec<Real> = (0..=n)
            .map(|j| if beyond(tree.node(n, j)) { prod.rebate } else { 0.0 })
            .collect();
        for i in (0..n).rev() {
            for j in 0..=i {
                let mut v = tree.rollback(values[j], values[j + 1]);
                if prod.exercise == ExerciseType::American
                    && i % stride == 0
                    && i > 0
                    && beyond(tree.node(i, j))
                {
                    v = match prod.payment {
                        PaymentType::Hit => prod.rebate,
                        PaymentType::Expire => {
                            prod.rebate * (-r * (tau - i as Real * tree.dt)).exp()
                        }
                    };
                }
                values[j] = v;
            }
            values.truncate(i + 1);
        }
        Ok(values[0])
    }
}

/// Binomial engine for barrier options.
///
/// Knock-outs mask breached nodes to the (locked) rebate at every
/// observation step; knock-ins price by in-out parity on the same lattice
/// plus a no-touch rebate leg.
#[derive(Debug)]
pub struct BiTreeBarrierEngine {
    process: Arc<dyn StochasticProcess>,
    config: TreeConfig,
}

impl BiTreeBarrierEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: TreeConfig) -> Self {
        Self { process, config }
    }

    /// Knock-out rollback with a terminal vector and rebate lock.
    #[allow(clippy::too_many_arguments)]
    fn knockout_value(
        &self,
        tree: &CrrTree,
        prod: &BarrierOption,
        terminal: impl Fn(Real) -> Real,
        rebate: Real,
        r: Real,
        tau: Time,
        stride: usize,
    ) -> Real {
        let n = tree.steps;
        let mut values: Vec<Real> = (0..=n)
            .map(|j| {
                let s = tree.node(n, j);
                if prod.breaches(s) {
                    rebate
                } else {
                    terminal(s)
                }
            })
            .collect();
        for i in (0..n).rev() {
            for j in 0..=i {
                let mut v = tree.rollback(values[j], values[j + 1]);
                if i % stride == 0 && i > 0 && prod.breaches(tree.node(i, j)) {
                    v = match prod.payment {
                        PaymentType::Hit => rebate,
                        PaymentType::Expire => rebate * (-r * (tau - i as Real * tree.dt)).exp(),
                    };
                }
                values[j] = v;
            }
            values.truncate(i + 1);
        }
        values[0]
    }
}

impl PricingEngine<BarrierOption> for BiTreeBarrierEngine {
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
        let (tau, _) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, s0);
        let tree = CrrTree::build(s0, r, q, sigma, tau, self.config.tree_branches)?;
        let stride = tree_stride(prod.discrete_obs_interval, tree.dt);
        let df_expiry = (-r * tau).exp();

        match (prod.status, prod.inout) {
            (Status::KnockedOut, InOut::Out) => return Ok(0.0),
            (Status::KnockedOut, InOut::In) => return Ok(prod.rebate * df_expiry),
            (Status::KnockedIn, _) => {
                // Activated: plain vanilla rollback
                let n = tree.steps;
                let mut values: Vec<Real> =
                    (0..=n).map(|j| prod.vanilla_payoff(tree.node(n, j))).collect();
                for i in (0..n).rev() {
                    for j in 0..=i {
                        values[j] = tree.rollback(values[j], values[j + 1]);
                    }
                    values.truncate(i + 1);
                }
                return Ok(values[0]);
            }
            (Status::NoTouch, _) => {}
        }

        match prod.inout {
            InOut::Out => Ok(self.knockout_value(
                &tree,
                prod,
                |s| prod.vanilla_payoff(s),
                prod.rebate,
                r,
                tau,
                stride,
            )),
            InOut::In => {
                // In-out parity on the same lattice: the activated value is
                // the vanilla minus the zero-rebate knock-out; the rebate
                // pays at expiry when the barrier never trades.
                let n = tree.steps;
                let mut vanilla: Vec<Real> =
                    (0..=n).map(|j| prod.vanilla_payoff(tree.node(n, j))).collect();
                for i in (0..n).rev() {
                    for j in 0..=i {
                        vanilla[j] = tree.rollback(vanilla[j], vanilla[j + 1]);
                    }
                    vanilla.truncate(i + 1);
                }
                let ko_zero =
                    self.knockout_value(&tree, prod, |s| prod.vanilla_payoff(s), 0.0, r, tau, stride);
                // No-touch leg: unit cash at expiry killed on a breach
                let mut no_touch = prod.clone();
                no_touch.payment = PaymentType::Expire;
                let nt_leg = self.knockout_value(
                    &tree,
                    &no_touch,
                    |_| prod.rebate,
                    0.0,
                    r,
                    tau,
                    stride,
                );
                Ok(vanilla[0] - ko_zero + nt_leg)
            }
        }
    }
}

/// Observation stride on the tree grid for a discrete interval.
pub(crate) fn tree_stride(interval: Option<Time>, dt: Time) -> usize {
    match interval {
        None => 1,
        Some(obs_dt) => ((obs_dt / dt).round() as usize).max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::barrier::AnalyticBarrierEngine;
    use crate::analytic::vanilla::black_scholes_merton;
    use pk_processes::GeneralizedBsmProcess;
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

    #[test]
    fn crr_european_call_converges() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.05, 0.0, 0.2));
        let engine = BiTreeVanillaEngine::new(
            process,
            TreeConfig {
                tree_branches: 500,
                n_samples: 0,
            },
        );
        let prod = VanillaOption::new(
            100.0,
            CallPut::Call,
            ExerciseType::European,
            timeline(),
        )
        .unwrap();
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let pv = engine.calc_present_value(&prod, valuation, None).unwrap();
        let tau = prod.timeline.tau(valuation.unwrap());
        let (bs, ..) = black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.05, 0.0, 0.2, tau);
        assert!((pv - bs).abs() < 0.05, "CRR {pv} vs BS {bs}");
    }

    #[test]
    fn american_put_early_exercise_premium() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.05, 0.0, 0.2));
        let engine = BiTreeVanillaEngine::new(process, TreeConfig::default());
        let valuation = Some(Date::from_ymd_opt(2021, 1, 5).unwrap());
        let eu = VanillaOption::new(100.0, CallPut::Put, ExerciseType::European, timeline())
            .unwrap();
        let am = VanillaOption::new(100.0, CallPut::Put, ExerciseType::American, timeline())
            .unwrap();
        let pv_eu = engine.calc_present_value(&eu, valuation, None).unwrap();
        let pv_am = engine.calc_present_value(&am, valuation, None).unwrap();
        assert!(pv_am > pv_eu);
    }

    #[test]
    fn tree_barrier_tracks_analytic() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.05, 0.2));
        let engine = BiTreeBarrierEngine::new(
            Arc::clone(&process) as Arc<dyn StochasticProcess>,
            TreeConfig {
                tree_branches: 500,
                n_samples: 0,
            },
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
        let tree_pv = engine.calc_present_value(&prod, valuation, None).unwrap();
        let analytic = AnalyticBarrierEngine::new(process)
            .calc_present_value(&prod, valuation, None)
            .unwrap();
        // Trees oscillate around barrier levels; keep a loose band
        assert!(
            (tree_pv - analytic).abs() < 0.25,
            "tree {tree_pv} vs analytic {analytic}"
        );
    }

    #[test]
    fn tree_in_out_parity() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.05, 0.2));
        let engine = BiTreeBarrierEngine::new(process, TreeConfig::default());
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
        let prod = make(InOut::Out);
        let tau = prod.timeline.tau(valuation.unwrap());
        let (vanilla, ..) = black_scholes_merton(CallPut::Call, 100.0, 100.0, 0.03, 0.05, 0.2, tau);
        assert!(
            (ki + ko - vanilla).abs() < 0.15,
            "parity broken: {ki} + {ko} vs vanilla {vanilla}"
        );
    }
}
