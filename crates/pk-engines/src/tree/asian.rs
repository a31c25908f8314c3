//! Binomial Asian engine with the Hull-White bucketed-average
//! approximation.
//!
//! Each node carries `n_samples` representative running averages spanning
//! the extreme path averages reachable at that node; backward induction
//! updates the running average along each branch and interpolates in the
//! child's bucket grid.

use crate::engine::{trading_grid, valuation_or_default, PricingEngine};
use crate::tree::{CrrTree, TreeConfig};
use pk_core::errors::Result;
use pk_core::{ensure, Real};
use pk_processes::StochasticProcess;
use pk_products::{AsianOption, AveSubstitution, AverageMethod};
use pk_time::Date;
use std::sync::Arc;

/// Binomial engine for arithmetic average-price Asians.
#[derive(Debug)]
pub struct BiTreeAsianEngine {
    process: Arc<dyn StochasticProcess>,
    config: TreeConfig,
}

impl BiTreeAsianEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: TreeConfig) -> Self {
        Self { process, config }
    }
}

/// Extreme running averages at node `(i, j)`: monotone paths give the
/// bounds (all ups first maximises, all downs first minimises).
fn average_bounds(tree: &CrrTree, i: usize, j: usize) -> (Real, Real) {
    // Ups first maximises the running sum
    let mut max_sum = 0.0;
    let mut s = tree.s0;
    max_sum += s;
    for _ in 0..j {
        s *= tree.u;
        max_sum += s;
    }
    for _ in 0..(i - j) {
        s /= tree.u;
        max_sum += s;
    }

    // Downs first minimises it
    let mut min_sum = 0.0;
    let mut s = tree.s0;
    min_sum += s;
    for _ in 0..(i - j) {
        s /= tree.u;
        min_sum += s;
    }
    for _ in 0..j {
        s *= tree.u;
        min_sum += s;
    }

    let count = (i + 1) as Real;
    (min_sum / count, max_sum / count)
}

impl PricingEngine<AsianOption> for BiTreeAsianEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &AsianOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        ensure!(
            prod.ave_method == AverageMethod::Arithmetic,
            "the bucketed tree prices arithmetic averages; geometric has a closed form"
        );
        ensure!(
            prod.substitute == AveSubstitution::Underlying && !prod.enhanced,
            "the bucketed tree prices plain average-price payoffs only"
        );
        ensure!(
            self.config.n_samples >= 2,
            "need at least 2 average buckets, got {}",
            self.config.n_samples
        );

        let valuation = valuation_or_default(t);
        let (tau, _) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, s0);
        let tree = CrrTree::build(s0, r, q, sigma, tau, self.config.tree_branches)?;

        let n = tree.steps;
        let m = self.config.n_samples;

        // Bucket grids and terminal values
        let bucket_grid = |i: usize, j: usize| -> Vec<Real> {
            let (lo, hi) = average_bounds(&tree, i, j);
            if hi - lo < 1e-12 {
                return vec![lo; m];
            }
            (0..m)
                .map(|k| lo + (hi - lo) * k as Real / (m - 1) as Real)
                .collect()
        };

        let interp = |grid: &[Real], values: &[Real], a: Real| -> Real {
            let lo = grid[0];
            let hi = grid[m - 1];
            if hi - lo < 1e-12 || a <= lo {
                return values[0];
            }
            if a >= hi {
                return values[m - 1];
            }
            let pos = (a - lo) / (hi - lo) * (m - 1) as Real;
            let k = (pos.floor() as usize).min(m - 2);
            let w = pos - k as Real;
            values[k] * (1.0 - w) + values[k + 1] * w
        };

        // Terminal layer
        let mut grids: Vec<Vec<Real>> = (0..=n).map(|j| bucket_grid(n, j)).collect();
        let mut layer: Vec<Vec<Real>> = grids
            .iter()
            .enumerate()
            .map(|(j, grid)| {
                let terminal = tree.node(n, j);
                grid.iter().map(|&a| prod.payoff(a, terminal)).collect()
            })
            .collect();

        // Backward induction
        for i in (0..n).rev() {
            let mut new_grids: Vec<Vec<Real>> = Vec::with_capacity(i + 1);
            let mut new_layer: Vec<Vec<Real>> = Vec::with_capacity(i + 1);
            for j in 0..=i {
                let grid = bucket_grid(i, j);
                let count = (i + 1) as Real;
                let values: Vec<Real> = grid
                    .iter()
                    .map(|&a| {
                        let s_up = tree.node(i + 1, j + 1);
                        let s_down = tree.node(i + 1, j);
                        let a_up = (a * count + s_up) / (count + 1.0);
                        let a_down = (a * count + s_down) / (count + 1.0);
                        let v_up = interp(&grids[j + 1], &layer[j + 1], a_up);
                        let v_down = interp(&grids[j], &layer[j], a_down);
                        tree.rollback(v_down, v_up)
                    })
                    .collect();
                new_grids.push(grid);
                new_layer.push(values);
            }
            grids = new_grids;
            layer = new_layer;
        }

        Ok(layer[0][0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::asian::kemna_vorst;
    use pk_products::{CallPut, Timeline};
    use pk_time::{AnnualDays, WeekendCalendar};

    fn timeline() -> Timeline {
        Timeline::from_maturity(
            Date::from_ymd_opt(2023, 1, 5).unwrap(),
            1.0,
            Arc::new(WeekendCalendar),
            AnnualDays::N365,
            243,
        )
        .unwrap()
    }

    #[test]
    fn arithmetic_tree_above_geometric_closed_form() {
        // Arithmetic mean ≥ geometric mean, so the arithmetic Asian call
        // dominates Kemna-Vorst.
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.02, 0.05, 0.16,
        ));
        let engine = BiTreeAsianEngine::new(
            process,
            TreeConfig {
                tree_branches: 100,
                n_samples: 200,
            },
        );
        let prod = AsianOption::new(
            100.0,
            CallPut::Call,
            AverageMethod::Arithmetic,
            AveSubstitution::Underlying,
            false,
            None,
            None,
            timeline(),
        )
        .unwrap();
        let valuation = Some(Date::from_ymd_opt(2023, 1, 5).unwrap());
        let pv = engine.calc_present_value(&prod, valuation, None).unwrap();
        let tau = prod.timeline.tau(valuation.unwrap());
        let geo = kemna_vorst(CallPut::Call, 100.0, 100.0, 0.02, 0.05, 0.16, tau);
        assert!(pv > geo - 0.15, "arithmetic {pv} vs geometric {geo}");
        assert!(pv < geo + 1.0, "arithmetic {pv} implausibly far above {geo}");
    }

    #[test]
    fn geometric_request_is_rejected() {
        let process = Arc::new(pk_processes::GeneralizedBsmProcess::flat(
            100.0, 0.02, 0.05, 0.16,
        ));
        let engine = BiTreeAsianEngine::new(process, TreeConfig::default());
        let prod = AsianOption::new(
            100.0,
            CallPut::Call,
            AverageMethod::Geometric,
            AveSubstitution::Underlying,
            false,
            None,
            None,
            timeline(),
        )
        .unwrap();
        assert!(engine.price(&prod).is_err());
    }
}
