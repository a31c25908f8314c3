//! # pricekit
//!
//! Pricing engines for path-dependent equity structured products:
//! autocallables (snowballs, phoenix, FCN, DCN), barrier and digital
//! options, Asians, accumulators, range accruals, and vanilla portfolios
//! under Black-Scholes-Merton and Heston dynamics.
//!
//! This crate is a **façade** that re-exports the public items of the
//! underlying workspace crates. Application code should depend on this
//! crate rather than the individual `pk-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use pricekit::processes::GeneralizedBsmProcess;
//! use pricekit::products::{CallPut, ExerciseType, Timeline, VanillaOption};
//! use pricekit::engines::analytic::AnalyticVanillaEngine;
//! use pricekit::engines::PricingEngine;
//! use pricekit::time::{AnnualDays, Date, WeekendCalendar};
//!
//! let valuation = Date::from_ymd_opt(2022, 1, 5).unwrap();
//! pricekit::time::set_valuation_date(valuation);
//!
//! let process = Arc::new(GeneralizedBsmProcess::flat(100.0, 0.02, 0.05, 0.16));
//! let engine = AnalyticVanillaEngine::new(process);
//!
//! let timeline = Timeline::from_maturity(
//!     valuation, 0.25, Arc::new(WeekendCalendar), AnnualDays::N365, 243,
//! ).unwrap();
//! let option = VanillaOption::new(
//!     100.0, CallPut::Call, ExerciseType::European, timeline,
//! ).unwrap();
//!
//! let pv = engine.price(&option).unwrap();
//! assert!(pv > 0.0);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, and error definitions.
pub use pk_core as core;

/// Calendar, schedule, and valuation-date handling.
pub use pk_time as time;

/// Numerical kernels: distributions, solvers, random sources.
pub use pk_math as math;

/// Market data and stochastic processes.
pub use pk_processes as processes;

/// Product descriptors.
pub use pk_products as products;

/// Pricing engines.
pub use pk_engines as engines;
