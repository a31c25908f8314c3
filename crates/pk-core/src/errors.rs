//! Error types for pricekit-rs.
//!
//! Pricing engines validate at entry and fail fast; partial results are
//! never returned. The four kinds below cover every failure the engines
//! raise, from illegal engine/product pairings to NaNs surfacing out of a
//! PDE solve.

use thiserror::Error;

/// The top-level error type used throughout pricekit-rs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Illegal engine/product combination or parameter.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-convergence, NaN, or other numerical breakdown.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Market data queried outside its domain.
    #[error("missing data: {0}")]
    DataMissing(String),

    /// Product status inconsistent with the requested operation.
    #[error("state error: {0}")]
    State(String),
}

/// Shorthand `Result` type used throughout pricekit-rs.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Validate an engine or product precondition.
///
/// Returns `Err(Error::Configuration(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use pk_core::ensure;
/// fn positive(x: f64) -> pk_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Configuration(
                format!($($msg)*)
            ));
        }
    };
}

/// Return a named error kind immediately.
///
/// # Example
/// ```
/// use pk_core::fail;
/// fn always_err() -> pk_core::errors::Result<()> {
///     fail!(Numerical, "series did not converge");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($kind:ident, $($msg:tt)*) => {
        return Err($crate::errors::Error::$kind(format!($($msg)*)))
    };
}
