//! Cashflow discounting engine.

use crate::engine::{valuation_or_default, PricingEngine};
use pk_core::errors::Result;
use pk_core::{ensure, Real};
use pk_processes::StochasticProcess;
use pk_products::CashFlow;
use pk_time::Date;
use std::sync::Arc;

/// Discounts fixed cashflows off the process's rate curve.
///
/// Delta, gamma, vega, and rho are structurally zero and returned as exact
/// `0.0` without bumping.
#[derive(Debug)]
pub struct CashFlowEngine {
    process: Arc<dyn StochasticProcess>,
}

impl CashFlowEngine {
    /// Create a new engine on the given process.
    pub fn new(process: Arc<dyn StochasticProcess>) -> Self {
        Self { process }
    }
}

impl PricingEngine<CashFlow> for CashFlowEngine {
    fn process(&self) -> &dyn StochasticProcess {
        &*self.process
    }

    fn calc_present_value(
        &self,
        prod: &CashFlow,
        t: Option<Date>,
        _spot: Option<Real>,
    ) -> Result<Real> {
        let valuation = valuation_or_default(t);
        let tau = prod.tau(valuation);
        ensure!(tau >= 0.0, "cashflow already paid: tau = {tau}");
        Ok(prod.amount * self.process.disc_factor(tau))
    }

    fn delta(&self, _prod: &CashFlow, _t: Option<Date>) -> Result<Real> {
        Ok(0.0)
    }

    fn gamma(&self, _prod: &CashFlow, _t: Option<Date>) -> Result<Real> {
        Ok(0.0)
    }

    fn vega(&self, _prod: &CashFlow, _t: Option<Date>) -> Result<Real> {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pk_processes::GeneralizedBsmProcess;

    #[test]
    fn discounts_exactly() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.0, 0.2));
        let engine = CashFlowEngine::new(process);
        let cf = CashFlow::new(Date::from_ymd_opt(2023, 1, 5).unwrap(), 100.0);
        let pv = engine
            .calc_present_value(&cf, Some(Date::from_ymd_opt(2022, 1, 5).unwrap()), None)
            .unwrap();
        assert_abs_diff_eq!(pv, 100.0 * (-0.03_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn structural_greeks_are_exact_zero() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.0, 0.2));
        let engine = CashFlowEngine::new(process);
        let cf = CashFlow::new(Date::from_ymd_opt(2023, 1, 5).unwrap(), 100.0);
        assert_eq!(engine.delta(&cf, None).unwrap(), 0.0);
        assert_eq!(engine.gamma(&cf, None).unwrap(), 0.0);
        assert_eq!(engine.vega(&cf, None).unwrap(), 0.0);
    }

    #[test]
    fn past_cashflow_errors() {
        let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.03, 0.0, 0.2));
        let engine = CashFlowEngine::new(process);
        let cf = CashFlow::new(Date::from_ymd_opt(2021, 1, 5).unwrap(), 100.0);
        assert!(engine
            .calc_present_value(&cf, Some(Date::from_ymd_opt(2022, 1, 5).unwrap()), None)
            .is_err());
    }
}
