//! Pipeline module - sequential forecasting run.

mod run;

pub use run::*;
