//! Rate term structures.
//!
//! A [`RateCurve`] maps a year fraction to a continuously-compounded zero
//! rate and the matching discount factor. Constant rates are the common
//! case; term structures interpolate piecewise-linearly between pillars.
//! Each curve carries a parallel-shift cell used by rho bumps.

use crate::quote::SimpleQuote;
use pk_core::errors::Result;
use pk_core::{DiscountFactor, Rate, Real, Time};
use pk_math::LinearInterp;

/// A zero-rate curve over year fractions.
pub trait RateCurve: std::fmt::Debug + Send + Sync {
    /// The zero rate at year fraction `t`, including any parallel shift.
    fn rate(&self, t: Time) -> Rate;

    /// The discount factor `D(t) = exp(−r(t)·t)`.
    fn discount_factor(&self, t: Time) -> DiscountFactor {
        (-self.rate(t) * t).exp()
    }

    /// Set the parallel shift (overwrites, does not accumulate).
    fn set_shift(&self, shift: Real);

    /// The current parallel shift.
    fn shift(&self) -> Real;

    /// Monotone mutation counter.
    fn version(&self) -> u64;
}

/// A constant continuously-compounded rate.
#[derive(Debug)]
pub struct ConstantRate {
    value: SimpleQuote,
    shift: SimpleQuote,
}

impl ConstantRate {
    /// Create a constant rate curve.
    pub fn new(value: Rate) -> Self {
        Self {
            value: SimpleQuote::new(value),
            shift: SimpleQuote::new(0.0),
        }
    }

    /// Create a labelled constant rate curve.
    pub fn with_label(value: Rate, label: impl Into<String>) -> Self {
        Self {
            value: SimpleQuote::with_label(value, label),
            shift: SimpleQuote::new(0.0),
        }
    }

    /// The unshifted rate value.
    pub fn value(&self) -> Rate {
        self.value.value()
    }

    /// Replace the rate value.
    pub fn set_value(&self, value: Rate) {
        self.value.set_value(value);
    }
}

impl RateCurve for ConstantRate {
    fn rate(&self, _t: Time) -> Rate {
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

/// A piecewise-linear zero curve over year-fraction pillars.
///
/// Queries outside the pillar range clamp to the nearest pillar.
#[derive(Debug)]
pub struct RateTermStructure {
    interp: LinearInterp,
    shift: SimpleQuote,
}

impl RateTermStructure {
    /// Build from parallel arrays of year fractions and zero rates.
    pub fn from_arrays(maturities: Vec<Time>, rates: Vec<Rate>) -> Result<Self> {
        Ok(Self {
            interp: LinearInterp::new(maturities, rates)?,
            shift: SimpleQuote::new(0.0),
        })
    }
}

impl RateCurve for RateTermStructure {
    fn rate(&self, t: Time) -> Rate {
        self.interp.value(t) + self.shift.value()
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
