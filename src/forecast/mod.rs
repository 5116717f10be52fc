//! Forecast core - aggregation, CDF sanitization, payload validation.

mod aggregate;
mod cdf;
mod validate;

pub use aggregate::*;
pub use cdf::*;
pub use validate::*;
