//! Core data models for doxa.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Concrete types with compile-time guarantees
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters
//! - I^B (Bounded): Error variants with per-question scoping

mod config;
mod error;
mod forecast;
mod question;
mod world;

pub use config::*;
pub use error::*;
pub use forecast::*;
pub use question::*;
pub use world::*;
