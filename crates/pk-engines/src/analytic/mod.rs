//! Closed-form and semi-analytic solvers.
//!
//! Vanillas (Black-Scholes-Merton, BAW, Bjerksund-Stensland 2002),
//! Reiner-Rubinstein barriers with the Broadie-Glasserman-Kou discrete
//! adjustment, Ikeda-Kunitomo / Haug double barriers, cash-or-nothing and
//! touch digitals, the Kemna-Vorst geometric Asian, the airbag
//! decomposition, Heston by characteristic function, and plain discounted
//! cashflows.

pub mod airbag;
pub mod american;
pub mod asian;
pub mod barrier;
pub mod cashflow;
pub mod digital;
pub mod double_barrier;
pub mod heston;
pub mod vanilla;

pub use airbag::AnalyticAirbagEngine;
pub use american::AmericanMethod;
pub use asian::AnalyticAsianEngine;
pub use barrier::AnalyticBarrierEngine;
pub use cashflow::CashFlowEngine;
pub use digital::{AnalyticDigitalEngine, AnalyticDoubleDigitalEngine};
pub use double_barrier::{AnalyticDoubleSharkEngine, DoubleBarrierFormula};
pub use heston::AnalyticHestonVanillaEngine;
pub use vanilla::AnalyticVanillaEngine;
