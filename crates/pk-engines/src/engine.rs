//! The pricing engine trait and the bump-and-reprice Greek machinery.

use pk_core::errors::Result;
use pk_core::Real;
use pk_processes::StochasticProcess;
use pk_time::Date;

/// Relative spot bump for delta and gamma.
pub const SPOT_BUMP: Real = 0.01;
/// Absolute vol bump for vega.
pub const VOL_BUMP: Real = 0.01;
/// Absolute rate bump for rho.
pub const RATE_BUMP: Real = 1e-4;

/// Present value and first/second-order sensitivities.
///
/// Conventions follow the bump sizes: `vega` is the PV change for a +1 %
/// absolute vol move, `rho` for +1 bp, `theta` for one calendar day; `delta`
/// and `gamma` are per unit of spot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PvGreeks {
    /// Present value.
    pub pv: Real,
    /// ∂PV/∂S.
    pub delta: Real,
    /// ∂²PV/∂S².
    pub gamma: Real,
    /// PV(σ + 1 %) − PV(σ).
    pub vega: Real,
    /// PV(t + 1 day) − PV(t).
    pub theta: Real,
    /// PV(r + 1 bp) − PV(r).
    pub rho: Real,
}

/// A pricing engine for products of type `P`.
///
/// Engines are stateless across calls at the contract level; internal
/// caches are keyed by the process version counter and the grid shape.
pub trait PricingEngine<P> {
    /// The process supplying market data.
    fn process(&self) -> &dyn StochasticProcess;

    /// Present value at the valuation date `t` (global valuation date when
    /// `None`) and spot (process spot when `None`).
    fn calc_present_value(&self, prod: &P, t: Option<Date>, spot: Option<Real>) -> Result<Real>;

    /// Present value at the global valuation date and current spot.
    fn price(&self, prod: &P) -> Result<Real> {
        self.calc_present_value(prod, None, None)
    }

    /// Delta by central difference on a ±1 % spot bump.
    fn delta(&self, prod: &P, t: Option<Date>) -> Result<Real> {
        let s0 = self.process().spot();
        let h = SPOT_BUMP * s0;
        let up = self.calc_present_value(prod, t, Some(s0 + h))?;
        let down = self.calc_present_value(prod, t, Some(s0 - h))?;
        Ok((up - down) / (2.0 * h))
    }

    /// Gamma by second central difference on a ±1 % spot bump.
    fn gamma(&self, prod: &P, t: Option<Date>) -> Result<Real> {
        let s0 = self.process().spot();
        let h = SPOT_BUMP * s0;
        let up = self.calc_present_value(prod, t, Some(s0 + h))?;
        let base = self.calc_present_value(prod, t, None)?;
        let down = self.calc_present_value(prod, t, Some(s0 - h))?;
        Ok((up - 2.0 * base + down) / (h * h))
    }

    /// Vega by a +1 % parallel vol bump, restored before returning.
    fn vega(&self, prod: &P, t: Option<Date>) -> Result<Real> {
        let base = self.calc_present_value(prod, t, None)?;
        self.process().set_vol_shift(VOL_BUMP);
        let bumped = self.calc_present_value(prod, t, None);
        self.process().set_vol_shift(0.0);
        Ok(bumped? - base)
    }

    /// Theta by advancing the valuation date one calendar day.
    fn theta(&self, prod: &P, t: Option<Date>) -> Result<Real> {
        let today = valuation_or_default(t);
        let tomorrow = today.succ_opt().expect("valuation date overflow");
        let base = self.calc_present_value(prod, Some(today), None)?;
        let advanced = self.calc_present_value(prod, Some(tomorrow), None)?;
        Ok(advanced - base)
    }

    /// Rho by a +1 bp parallel rate bump, restored before returning.
    fn rho(&self, prod: &P, t: Option<Date>) -> Result<Real> {
        let base = self.calc_present_value(prod, t, None)?;
        self.process().set_rate_shift(RATE_BUMP);
        let bumped = self.calc_present_value(prod, t, None);
        self.process().set_rate_shift(0.0);
        Ok(bumped? - base)
    }

    /// Present value and the full Greek set in one call.
    fn pv_and_greeks(&self, prod: &P, t: Option<Date>) -> Result<PvGreeks> {
        Ok(PvGreeks {
            pv: self.calc_present_value(prod, t, None)?,
            delta: self.delta(prod, t)?,
            gamma: self.gamma(prod, t)?,
            vega: self.vega(prod, t)?,
            theta: self.theta(prod, t)?,
            rho: self.rho(prod, t)?,
        })
    }
}

/// Run `f` with the process spot temporarily overridden.
///
/// The original spot is restored afterwards, so a bumped reprice leaves the
/// market data bit-for-bit unchanged.
pub(crate) fn with_spot<T>(
    process: &dyn StochasticProcess,
    spot: Option<Real>,
    f: impl FnOnce() -> T,
) -> T {
    match spot {
        None => f(),
        Some(s) => {
            let original = process.spot();
            process.set_spot(s);
            let out = f();
            process.set_spot(original);
            out
        }
    }
}

/// The valuation date to use for a pricing call.
pub(crate) fn valuation_or_default(t: Option<Date>) -> Date {
    t.unwrap_or_else(pk_time::valuation_date)
}

/// The trading-day grid to expiry: `(tau, n_step)` with `Δt` exactly one
/// trading day.
pub(crate) fn trading_grid(
    timeline: &pk_products::Timeline,
    valuation: Date,
) -> Result<(Real, usize)> {
    let n_step = timeline.steps_to_expiry(valuation);
    pk_core::ensure!(
        n_step >= 1,
        "product expired: {} trading days to expiry",
        n_step
    );
    let tau = n_step as Real / timeline.steps_per_year as Real;
    Ok((tau, n_step as usize))
}

/// Remaining observations mapped onto the trading grid.
pub(crate) struct ObsGrid {
    /// Step index of each remaining observation.
    pub(crate) steps: Vec<usize>,
    /// Index of each remaining observation in the full schedule.
    pub(crate) schedule_index: Vec<usize>,
    /// Coupon accrual year-fraction from the trade start.
    pub(crate) accrual: Vec<Real>,
}

impl ObsGrid {
    /// Position within the remaining observations of step `k`, if any.
    pub(crate) fn at_step(&self, k: usize) -> Option<usize> {
        self.steps.iter().position(|&s| s == k)
    }
}

pub(crate) fn observation_grid(
    obs: &pk_time::Schedule,
    timeline: &pk_products::Timeline,
    valuation: Date,
    n_step: usize,
) -> ObsGrid {
    let calendar = &*timeline.calendar;
    let spy = timeline.steps_per_year as Real;
    let mut grid = ObsGrid {
        steps: Vec::new(),
        schedule_index: Vec::new(),
        accrual: Vec::new(),
    };
    for (idx, &date) in obs.dates().iter().enumerate() {
        let offset = calendar.business_days_between(valuation, date);
        if offset <= 0 {
            continue;
        }
        // A maturity observation adjusted past the expiry grid belongs to
        // the terminal step.
        grid.steps.push((offset as usize).min(n_step));
        grid.schedule_index.push(idx);
        grid.accrual
            .push(calendar.business_days_between(timeline.start_date, date) as Real / spy);
    }
    grid
}
