//! # pk-engines
//!
//! The pricing engines: closed-form solvers, Monte Carlo kernels, the
//! finite-difference θ-scheme, backward quadrature, and CRR binomial
//! trees.
//!
//! An engine owns its numerical configuration and a process reference;
//! products are passed to [`PricingEngine::calc_present_value`] as plain
//! parameters. Greeks default to bump-and-reprice with the bumps restored
//! before returning; PDE engines read Δ/Γ/θ off the grid instead.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analytic;
pub mod engine;
pub mod fdm;
pub mod mc;
pub mod quad;
pub mod tree;

pub use engine::{PricingEngine, PvGreeks};
