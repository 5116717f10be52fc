//! World sample types.
//!
//! Epistemic foundation:
//! - K_i: One world = one independent draw from an implicit distribution
//! - B_i: A world's JSON reply may be malformed or mismatch the question
//!   type → conversion is fallible and failures are dropped upstream

use crate::models::{QuestionSpec, QuestionType, sanitize_option_name};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A type-tagged value produced by one successful world draw.
///
/// K_i: Owned by the sample collector for one question's processing and
/// discarded after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorldSample {
    /// Did the binary question resolve yes in this world?
    Binary { answer: bool },
    /// Relative-likelihood scores per option name (not probabilities)
    Categorical { scores: HashMap<String, f64> },
    /// The realized value of the numeric quantity in this world
    Numeric { value: f64 },
}

/// The JSON shape a world draw is asked to return.
///
/// Exactly one outcome field should be present, matching the question type;
/// the narrative is kept only for diagnostics.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldReply {
    /// Short narrative of the world's dynamics (diagnostic only)
    #[serde(default)]
    pub world_summary: String,

    /// Binary outcome: {"yes": true/false}
    #[serde(default)]
    pub yes: Option<bool>,

    /// Categorical outcome: scores keyed by option name
    #[serde(default)]
    pub scores: Option<HashMap<String, f64>>,

    /// Numeric outcome: realized value in the question's units
    #[serde(default)]
    pub value: Option<f64>,
}

impl WorldReply {
    /// Convert a reply into a sample for the given question.
    ///
    /// B_i(reply matches question type) → Option. A mismatched or malformed
    /// reply yields None and is dropped by the collector.
    pub fn into_sample(self, spec: &QuestionSpec) -> Option<WorldSample> {
        match spec.question_type {
            QuestionType::Binary => self.yes.map(|answer| WorldSample::Binary { answer }),
            QuestionType::MultipleChoice => {
                let raw = self.scores?;
                let mut scores = HashMap::with_capacity(raw.len());
                for (name, score) in raw {
                    if !score.is_finite() {
                        continue;
                    }
                    scores.insert(sanitize_option_name(&name), score);
                }
                if scores.is_empty() {
                    return None;
                }
                Some(WorldSample::Categorical { scores })
            }
            QuestionType::Numeric => match self.value {
                Some(v) if v.is_finite() => Some(WorldSample::Numeric { value: v }),
                _ => None,
            },
        }
    }
}

/// Provenance record for one world draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldDraw {
    /// Unique identifier for this draw
    pub id: String,

    /// Question this world was drawn for
    pub question_id: u64,

    /// The parsed sample
    pub sample: WorldSample,

    /// Model used for the draw
    pub model: String,

    /// Draw timestamp
    pub drawn_at: DateTime<Utc>,

    /// Draw time in milliseconds
    pub draw_time_ms: u64,

    /// Draw cost in USD
    pub cost_usd: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_spec() -> QuestionSpec {
        QuestionSpec {
            id: 1,
            title: "test".to_string(),
            question_type: QuestionType::Numeric,
            options: vec![],
            lower_bound_open: false,
            upper_bound_open: false,
            unit: None,
        }
    }

    #[test]
    fn test_reply_type_mismatch_is_dropped() {
        let reply = WorldReply {
            world_summary: String::new(),
            yes: Some(true),
            scores: None,
            value: None,
        };
        assert!(reply.into_sample(&numeric_spec()).is_none());
    }

    #[test]
    fn test_non_finite_numeric_is_dropped() {
        let reply = WorldReply {
            world_summary: String::new(),
            yes: None,
            scores: None,
            value: Some(f64::NAN),
        };
        assert!(reply.into_sample(&numeric_spec()).is_none());
    }

    #[test]
    fn test_categorical_keys_are_sanitized() {
        let mut spec = numeric_spec();
        spec.question_type = QuestionType::MultipleChoice;
        spec.options = vec!["Option A".to_string()];

        let mut raw = HashMap::new();
        raw.insert("\"Option A\"".to_string(), 3.0);
        let reply = WorldReply {
            world_summary: String::new(),
            yes: None,
            scores: Some(raw),
            value: None,
        };

        match reply.into_sample(&spec) {
            Some(WorldSample::Categorical { scores }) => {
                assert_eq!(scores.get("Option A"), Some(&3.0));
            }
            other => panic!("unexpected sample: {other:?}"),
        }
    }
}
