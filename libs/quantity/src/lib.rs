//! # qm-quantity
//!
//! Resource quantities in the format used by Kubernetes `ResourceQuota`
//! objects (`500m`, `1.5Gi`, `10`, `2e3`).
//!
//! ## Design Principles
//!
//! - All arithmetic is exact: magnitudes are arbitrary-precision decimals,
//!   never binary floating point
//! - Quantities with different units are only compared after conversion
//!   to a common, unitless base magnitude
//! - Formatting is canonical and roundtrips through parsing
//!   (parse → format → parse)
//!
//! ## Units
//!
//! | Kind    | Suffixes                          | Multiplier |
//! |---------|-----------------------------------|------------|
//! | none    | `""`                              | 1          |
//! | binary  | `Ki Mi Gi Ti Pi Ei`               | 1024^n     |
//! | decimal | `n u m k M G T P E`               | 1000^n     |
//!
//! Conversions between any two units are exact: dividing by `1024^n`
//! only ever introduces powers of two in the denominator, which always
//! have a finite decimal expansion.

mod decimal;
mod error;
mod quantity;
mod unit;

pub use decimal::Decimal;
pub use error::QuantityError;
pub use quantity::Quantity;
pub use unit::{Multiplier, Unit};
