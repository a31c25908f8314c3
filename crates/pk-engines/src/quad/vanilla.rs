//! Quadrature engine for European vanillas.
//!
//! A single density integration from the terminal payoff — no events, so
//! no intermediate steps are needed.

use crate::engine::{trading_grid, valuation_or_default, PricingEngine};
use crate::quad::{DensityStep, QuadConfig, QuadMesh};
use pk_core::errors::Result;
use pk_core::{ensure, Real};
use pk_processes::StochasticProcess;
use pk_products::{ExerciseType, VanillaOption};
use pk_time::Date;
use std::sync::Arc;

/// Quadrature engine for European vanillas.
#[derive(Debug)]
pub struct QuadVanillaEngine {
    process: Arc<dyn StochasticProcess>,
    config: QuadConfig,
}

impl QuadVanillaEngine {
    /// Create a new engine.
    pub fn new(process: Arc<dyn StochasticProcess>, config: QuadConfig) -> Self {
        Self { process, config }
    }
}

impl PricingEngine<VanillaOption> for QuadVanillaEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &VanillaOption,
        t: Option<Date>,
        spot: Option<Real>,
    ) -> Result<Real> {
        ensure!(
            prod.exercise == ExerciseType::European,
            "the quadrature vanilla kernel prices Europeans only"
        );
        let valuation = valuation_or_default(t);
        let (tau, _) = trading_grid(&prod.timeline, valuation)?;
        let s0 = spot.unwrap_or_else(|| self.process.spot());
        let r = self.process.interest(tau);
        let q = self.process.div(tau);
        let sigma = self.process.vol(tau, s0);

        let mesh = QuadMesh::build(&self.config, s0, sigma, tau, Some(prod.strike))?;
        let step = DensityStep::new(&mesh, r - q, sigma, r, tau);
        let terminal: Vec<Real> = mesh.s.iter().map(|&x| prod.payoff(x)).collect();
        let rolled = step.apply(&mesh, &terminal);
        Ok(mesh.interpolate(&rolled, s0))
    }
}
