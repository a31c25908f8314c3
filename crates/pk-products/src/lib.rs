//! # pk-products
//!
//! Immutable product descriptors. A product is a pure parameter bundle —
//! strikes, barriers, coupons, schedules, status — consumed by the pricing
//! engines; products never mutate during pricing and hold no engine
//! back-reference.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod accrual;
pub mod asian;
pub mod autocallable;
pub mod barrier;
pub mod cashflow;
pub mod digital;
pub mod enums;
pub mod timeline;
pub mod vanilla;

pub use accrual::{Accumulator, RangeAccrual};
pub use asian::AsianOption;
pub use autocallable::{AutoCall, Phoenix, Snowball};
pub use barrier::{Airbag, BarrierOption, DoubleShark};
pub use cashflow::CashFlow;
pub use digital::{DigitalOption, DoubleDigitalOption};
pub use enums::{
    AveSubstitution, AverageMethod, CallPut, ExerciseType, InOut, PaymentType, Status, TouchType,
    UpDown,
};
pub use timeline::Timeline;
pub use vanilla::{VanillaOption, VanillaPortfolio};
