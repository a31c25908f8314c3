//! # pk-processes
//!
//! Market data (quotes, rate curves, volatility surfaces) and the
//! stochastic processes built on top of them.
//!
//! Market data is mutable-in-place: the Greek bump machinery nudges a quote
//! or a parallel shift, reprices, and restores. Every mutation bumps a
//! monotone version counter, which engines compare against their cached
//! state instead of holding an observer graph.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bsm;
pub mod heston;
pub mod paths;
pub mod process;
pub mod quote;
pub mod rate;
pub mod volatility;

pub use bsm::GeneralizedBsmProcess;
pub use heston::HestonProcess;
pub use paths::PathMatrix;
pub use process::StochasticProcess;
pub use quote::SimpleQuote;
pub use rate::{ConstantRate, RateCurve, RateTermStructure};
pub use volatility::{BlackConstVol, LocalVolSurface, VolSurface};
