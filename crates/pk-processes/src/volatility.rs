//! Volatility structures.
//!
//! Either a flat Black vol or a local-volatility grid over
//! (expiry, strike) with bilinear interpolation. Vega bumps go through the
//! parallel-shift cell so restoring the shift to zero restores prices
//! exactly.

use crate::quote::SimpleQuote;
use pk_core::errors::Result;
use pk_core::{Real, Time, Volatility};
use pk_math::BilinearInterp;

/// A volatility surface σ(t, S).
pub trait VolSurface: std::fmt::Debug + Send + Sync {
    /// The volatility at year fraction `t` and spot level `s`, including
    /// any parallel shift.
    fn vol(&self, t: Time, s: Real) -> Volatility;

    /// Set the parallel shift (overwrites, does not accumulate).
    fn set_shift(&self, shift: Real);

    /// The current parallel shift.
    fn shift(&self) -> Real;

    /// Monotone mutation counter.
    fn version(&self) -> u64;
}

/// A flat Black volatility.
#[derive(Debug)]
pub struct BlackConstVol {
    value: SimpleQuote,
    shift: SimpleQuote,
}

impl BlackConstVol {
    /// Create a flat vol surface.
    pub fn new(value: Volatility) -> Self {
        Self {
            value: SimpleQuote::new(value),
            shift: SimpleQuote::new(0.0),
        }
    }

    /// Create a labelled flat vol surface.
    pub fn with_label(value: Volatility, label: impl Into<String>) -> Self {
        Self {
            value: SimpleQuote::with_label(value, label),
            shift: SimpleQuote::new(0.0),
        }
    }

    /// The unshifted vol level.
    pub fn value(&self) -> Volatility {
        self.value.value()
    }

    /// Replace the vol level.
    pub fn set_value(&self, value: Volatility) {
        self.value.set_value(value);
    }
}

impl VolSurface for BlackConstVol {
    fn vol(&self, _t: Time, _s: Real) -> Volatility {
        self.value.value() + self.shift.value()
    }

    fn set_shift(&self, shift: Real) {
        self.shift.set_value(shift);
    }

    fn shift(&self) -> Real {
        self.shift.value()
    }

    fn version(&self) -> u64 {
        self.value.version() + self.shift.version()
    }
}

/// A local-volatility grid over (expiry, strike).
#[derive(Debug)]
pub struct LocalVolSurface {
    grid: BilinearInterp,
    shift: SimpleQuote,
}

impl LocalVolSurface {
    /// Build from expiry pillars, strike pillars, and a row-major
    /// `expirations × strikes` vol matrix.
    pub fn from_grid(
        expirations: Vec<Time>,
        strikes: Vec<Real>,
        vols: Vec<Volatility>,
    ) -> Result<Self> {
        Ok(Self {
            grid: BilinearInterp::new(expirations, strikes, vols)?,
            shift: SimpleQuote::new(0.0),
        })
    }
}

impl VolSurface for LocalVolSurface {
    fn vol(&self, t: Time, s: Real) -> Volatility {
        self.grid.value(t, s) + self.shift.value()
    }

    fn set_shift(&self, shift: Real) {
        self.shift.set_value(shift);
    }

    fn shift(&self) -> Real {
        self.shift.value()
    }

    fn version(&self) -> u64 {
        self.shift.version()
    }
}
