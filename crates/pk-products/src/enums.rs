//! Shared product enums.

use pk_core::Real;
use std::fmt;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallPut {
    /// Right (or exposure) to the upside.
    Call,
    /// Right (or exposure) to the downside.
    Put,
}

impl CallPut {
    /// +1 for Call, −1 for Put.
    pub fn sign(self) -> Real {
        match self {
            CallPut::Call => 1.0,
            CallPut::Put => -1.0,
        }
    }
}

impl fmt::Display for CallPut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallPut::Call => write!(f, "Call"),
            CallPut::Put => write!(f, "Put"),
        }
    }
}

/// Barrier direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpDown {
    /// Barrier above spot.
    Up,
    /// Barrier below spot.
    Down,
}

impl UpDown {
    /// +1 for Up, −1 for Down.
    pub fn sign(self) -> Real {
        match self {
            UpDown::Up => 1.0,
            UpDown::Down => -1.0,
        }
    }
}

/// Knock-in or knock-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InOut {
    /// Barrier touch activates the option.
    In,
    /// Barrier touch extinguishes the option.
    Out,
}

/// Exercise style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExerciseType {
    /// Exercise at expiry only; barrier/touch conditions observed at expiry.
    European,
    /// Conditions observed over the product's life.
    American,
}

/// When a rebate or touch amount pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentType {
    /// Paid the moment the trigger event happens.
    Hit,
    /// Paid at expiry regardless of when the trigger happened.
    Expire,
}

/// Touch sense for double digital options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchType {
    /// Pays when a bound is touched.
    Touch,
    /// Pays when no bound is ever touched.
    NoTouch,
}

/// Averaging rule for Asian options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AverageMethod {
    /// Geometric mean of the observations.
    Geometric,
    /// Arithmetic mean of the observations.
    Arithmetic,
}

/// Which leg of the Asian payoff the average substitutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AveSubstitution {
    /// Average replaces the terminal underlying price.
    Underlying,
    /// Average replaces the strike.
    Strike,
}

/// Barrier lifecycle of a trade at valuation.
///
/// A tagged state, not a transition machine: engines branch on it at entry
/// and never flip it during pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// No barrier has been touched; the pricing default for new trades.
    NoTouch,
    /// The knock-in barrier has been touched.
    KnockedIn,
    /// The knock-out barrier has been touched.
    KnockedOut,
}
