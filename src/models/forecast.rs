//! Canonical forecast and submission types.
//!
//! K_i: These types represent the core data flow from aggregated world
//! samples to the external platform's wire format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of points in a canonical numeric CDF.
pub const CDF_SIZE: usize = 201;

/// The canonical result of aggregating one question's world samples.
///
/// K_i: Exactly one variant per question type; invariants are established
/// by the aggregator and re-checked by the payload validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateForecast {
    /// Binary probability, clamped to [0.01, 0.99]
    Binary { probability: f64 },

    /// Distribution over the question's options; sums to 1.0 within 1e-6
    Categorical { probabilities: BTreeMap<String, f64> },

    /// 201-point non-decreasing CDF in [0, 1], plus the unclamped sample
    /// mean kept as an informational summary only
    Numeric { cdf: Vec<f64>, mean: f64 },
}

impl AggregateForecast {
    /// Short name used in logs and type-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Binary { .. } => "binary",
            Self::Categorical { .. } => "multiple_choice",
            Self::Numeric { .. } => "numeric",
        }
    }
}

/// External-facing submission structure.
///
/// K_i: Exactly one forecast field is populated, matching the question
/// type; the other two are serialized as explicit nulls. Never mutated
/// after creation by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    /// Binary forecast
    pub probability_yes: Option<f64>,

    /// Multiple-choice forecast, keyed by option name
    pub probability_yes_per_category: Option<BTreeMap<String, f64>>,

    /// Numeric forecast: the 201-point CDF
    pub continuous_cdf: Option<Vec<f64>>,
}

impl SubmissionPayload {
    pub fn binary(probability: f64) -> Self {
        Self {
            probability_yes: Some(probability),
            probability_yes_per_category: None,
            continuous_cdf: None,
        }
    }

    pub fn multiple_choice(probabilities: BTreeMap<String, f64>) -> Self {
        Self {
            probability_yes: None,
            probability_yes_per_category: Some(probabilities),
            continuous_cdf: None,
        }
    }

    pub fn numeric(cdf: Vec<f64>) -> Self {
        Self {
            probability_yes: None,
            probability_yes_per_category: None,
            continuous_cdf: Some(cdf),
        }
    }
}

/// Statistics for a forecasting run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Open questions considered
    pub total_questions: usize,

    /// Questions skipped because the ledger already contained them
    pub already_posted: usize,

    /// World draws attempted across all questions
    pub worlds_attempted: usize,

    /// World draws that produced a usable sample
    pub worlds_sampled: usize,

    /// Questions skipped for insufficient samples
    pub insufficient: usize,

    /// Questions whose payload failed validation
    pub invalid: usize,

    /// Questions successfully submitted and recorded
    pub posted: usize,

    /// Questions that failed at the submission step
    pub submit_failed: usize,

    /// Total sampling cost (USD)
    pub sampling_cost_usd: f64,

    /// Total runtime in seconds
    pub runtime_secs: f64,

    /// Usable-sample rate across all attempted worlds (0.0 - 1.0)
    pub sample_yield: f64,
}

impl RunStats {
    /// Calculate derived stats.
    pub fn finalize(&mut self) {
        if self.worlds_attempted > 0 {
            self.sample_yield = self.worlds_sampled as f64 / self.worlds_attempted as f64;
        }
    }
}
