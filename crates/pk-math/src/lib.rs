//! # pk-math
//!
//! Numerical kernels shared by every pricing engine: normal distribution
//! functions, the tridiagonal Thomas solver, linear/bilinear interpolation,
//! pseudo- and quasi-random sources, and a statistics accumulator.
//!
//! Nothing in this crate knows about products or market data; contracts are
//! purely numerical.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod distributions;
pub mod interpolation;
pub mod random;
pub mod statistics;
pub mod tridiagonal;

pub use distributions::{bivariate_normal_cdf, normal_cdf, normal_cdf_inv, normal_pdf};
pub use interpolation::{BilinearInterp, LinearInterp};
pub use random::{NormalSource, ShockMatrix};
pub use statistics::Statistics;
pub use tridiagonal::Tridiagonal;
