//! Forecast aggregator.
//!
//! Epistemic foundation:
//! - K_i: Aggregation is commutative over the sample set; arrival order
//!   carries no information
//! - B_i: A question may end up with zero usable samples → InsufficientSamples
//! - K_i: One operation over a closed set of forecast variants, selected by
//!   the question type

use crate::forecast::cdf::sanitize_numeric_cdf;
use crate::models::{
    AggregateForecast, CDF_SIZE, DoxaError, QuestionSpec, QuestionType, Result, WorldSample,
    sanitize_option_name,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Binary probability clamp. The platform forbids expressed certainty.
const BINARY_MIN: f64 = 0.01;
const BINARY_MAX: f64 = 0.99;

/// Symmetric padding applied to the empirical value range, as a fraction
/// of the range width.
const GRID_PAD_FRACTION: f64 = 0.05;

/// Pad used when every sample landed on the same value.
const DEGENERATE_PAD: f64 = 1e-6;

/// Reduce one question's world samples to a canonical forecast.
///
/// Samples whose variant does not match the question type are ignored;
/// the collector normally filters them, but the aggregator does not trust
/// that. Fewer than one usable sample signals `InsufficientSamples`.
pub fn aggregate(samples: &[WorldSample], spec: &QuestionSpec) -> Result<AggregateForecast> {
    match spec.question_type {
        QuestionType::Binary => aggregate_binary(samples, spec),
        QuestionType::MultipleChoice => aggregate_categorical(samples, spec),
        QuestionType::Numeric => aggregate_numeric(samples, spec),
    }
}

/// Yes-frequency across worlds, clamped away from certainty.
fn aggregate_binary(samples: &[WorldSample], spec: &QuestionSpec) -> Result<AggregateForecast> {
    let answers: Vec<bool> = samples
        .iter()
        .filter_map(|s| match s {
            WorldSample::Binary { answer } => Some(*answer),
            _ => None,
        })
        .collect();

    if answers.is_empty() {
        return Err(DoxaError::InsufficientSamples {
            question_id: spec.id,
        });
    }

    let yes = answers.iter().filter(|a| **a).count();
    let raw = yes as f64 / answers.len() as f64;
    let probability = raw.clamp(BINARY_MIN, BINARY_MAX);

    debug!(
        question_id = spec.id,
        worlds = answers.len(),
        yes = yes,
        probability = probability,
        "Aggregated binary forecast"
    );

    Ok(AggregateForecast::Binary { probability })
}

/// Mean score per option over the worlds that reported it, negatives
/// floored, then normalized to a distribution.
///
/// A world that omits an option is treated as missing, not as an implicit
/// zero: the average is taken over reporters only. Options no world ever
/// scored enter normalization at 0.0.
fn aggregate_categorical(samples: &[WorldSample], spec: &QuestionSpec) -> Result<AggregateForecast> {
    let score_maps: Vec<_> = samples
        .iter()
        .filter_map(|s| match s {
            WorldSample::Categorical { scores } => Some(scores),
            _ => None,
        })
        .collect();

    if score_maps.is_empty() {
        return Err(DoxaError::InsufficientSamples {
            question_id: spec.id,
        });
    }

    // Scores are keyed by sanitized names; payload keys stay as the
    // platform spelled them.
    let mut floored: Vec<(String, f64)> = Vec::with_capacity(spec.options.len());
    for option in &spec.options {
        let key = sanitize_option_name(option);
        let mut sum = 0.0;
        let mut reporters = 0usize;
        for scores in &score_maps {
            if let Some(score) = scores.get(&key) {
                sum += score;
                reporters += 1;
            }
        }
        let mean = if reporters > 0 {
            sum / reporters as f64
        } else {
            0.0
        };
        floored.push((option.clone(), mean.max(0.0)));
    }

    let total: f64 = floored.iter().map(|(_, v)| v).sum();
    if total <= 0.0 {
        // Every world failed to score any known option.
        return Err(DoxaError::InsufficientSamples {
            question_id: spec.id,
        });
    }

    let probabilities: BTreeMap<String, f64> = floored
        .into_iter()
        .map(|(name, v)| (name, v / total))
        .collect();

    debug!(
        question_id = spec.id,
        worlds = score_maps.len(),
        options = probabilities.len(),
        "Aggregated categorical forecast"
    );

    Ok(AggregateForecast::Categorical { probabilities })
}

/// Empirical CDF of the sampled values on a padded 201-point grid, always
/// passed through the sanitizer. The sample mean rides along as an
/// informational summary and is never clamped.
fn aggregate_numeric(samples: &[WorldSample], spec: &QuestionSpec) -> Result<AggregateForecast> {
    let mut values: Vec<f64> = samples
        .iter()
        .filter_map(|s| match s {
            WorldSample::Numeric { value } if value.is_finite() => Some(*value),
            _ => None,
        })
        .collect();

    if values.is_empty() {
        return Err(DoxaError::InsufficientSamples {
            question_id: spec.id,
        });
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.sort_by(f64::total_cmp);

    let lo = values[0];
    let hi = values[values.len() - 1];
    let pad = if hi > lo {
        (hi - lo) * GRID_PAD_FRACTION
    } else {
        DEGENERATE_PAD
    };

    let raw = empirical_cdf(&values, lo - pad, hi + pad);
    let cdf = sanitize_numeric_cdf(&raw, spec);

    debug!(
        question_id = spec.id,
        worlds = values.len(),
        mean = mean,
        lo = lo,
        hi = hi,
        "Aggregated numeric forecast"
    );

    Ok(AggregateForecast::Numeric { cdf, mean })
}

/// Empirical step CDF of sorted `values` on an evenly spaced grid over
/// [start, end]: count(values <= g) / n at each grid point.
fn empirical_cdf(values: &[f64], start: f64, end: f64) -> Vec<f64> {
    let n = values.len();
    let mut out = Vec::with_capacity(CDF_SIZE);
    let mut j = 0usize;
    for i in 0..CDF_SIZE {
        let g = start + (end - start) * i as f64 / (CDF_SIZE - 1) as f64;
        while j < n && values[j] <= g {
            j += 1;
        }
        out.push(j as f64 / n as f64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec(question_type: QuestionType, options: &[&str]) -> QuestionSpec {
        QuestionSpec {
            id: 42,
            title: "test".to_string(),
            question_type,
            options: options.iter().map(|s| s.to_string()).collect(),
            lower_bound_open: false,
            upper_bound_open: false,
            unit: None,
        }
    }

    fn categorical(pairs: &[(&str, f64)]) -> WorldSample {
        let scores: HashMap<String, f64> =
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        WorldSample::Categorical { scores }
    }

    #[test]
    fn test_binary_frequency() {
        let samples = vec![
            WorldSample::Binary { answer: true },
            WorldSample::Binary { answer: true },
            WorldSample::Binary { answer: false },
            WorldSample::Binary { answer: true },
        ];
        match aggregate(&samples, &spec(QuestionType::Binary, &[])).unwrap() {
            AggregateForecast::Binary { probability } => {
                assert!((probability - 0.75).abs() < 1e-12);
            }
            other => panic!("unexpected forecast: {other:?}"),
        }
    }

    #[test]
    fn test_binary_unanimous_is_clamped() {
        let samples = vec![WorldSample::Binary { answer: true }; 3];
        match aggregate(&samples, &spec(QuestionType::Binary, &[])).unwrap() {
            AggregateForecast::Binary { probability } => assert_eq!(probability, 0.99),
            other => panic!("unexpected forecast: {other:?}"),
        }

        let samples = vec![WorldSample::Binary { answer: false }; 3];
        match aggregate(&samples, &spec(QuestionType::Binary, &[])).unwrap() {
            AggregateForecast::Binary { probability } => assert_eq!(probability, 0.01),
            other => panic!("unexpected forecast: {other:?}"),
        }
    }

    #[test]
    fn test_empty_samples_is_insufficient() {
        let err = aggregate(&[], &spec(QuestionType::Binary, &[])).unwrap_err();
        assert!(matches!(
            err,
            DoxaError::InsufficientSamples { question_id: 42 }
        ));
    }

    #[test]
    fn test_categorical_average_floor_normalize() {
        // A reported twice (2, 2); B reported twice (-1, 3).
        // Averages: A=2, B=1 -> normalized 2/3, 1/3.
        let samples = vec![
            categorical(&[("A", 2.0), ("B", -1.0)]),
            categorical(&[("A", 2.0), ("B", 3.0)]),
        ];
        match aggregate(&samples, &spec(QuestionType::MultipleChoice, &["A", "B"])).unwrap() {
            AggregateForecast::Categorical { probabilities } => {
                assert!((probabilities["A"] - 2.0 / 3.0).abs() < 1e-9);
                assert!((probabilities["B"] - 1.0 / 3.0).abs() < 1e-9);
                let sum: f64 = probabilities.values().sum();
                assert!((sum - 1.0).abs() < 1e-6);
            }
            other => panic!("unexpected forecast: {other:?}"),
        }
    }

    #[test]
    fn test_categorical_negative_average_floors_to_zero() {
        let samples = vec![categorical(&[("A", -5.0), ("B", 1.0)])];
        match aggregate(&samples, &spec(QuestionType::MultipleChoice, &["A", "B"])).unwrap() {
            AggregateForecast::Categorical { probabilities } => {
                assert_eq!(probabilities["A"], 0.0);
                assert_eq!(probabilities["B"], 1.0);
            }
            other => panic!("unexpected forecast: {other:?}"),
        }
    }

    #[test]
    fn test_categorical_missing_option_is_not_zero_vote() {
        // Only the first world scores B. Its average is over one reporter,
        // not diluted by the world that omitted it.
        let samples = vec![
            categorical(&[("A", 1.0), ("B", 3.0)]),
            categorical(&[("A", 1.0)]),
        ];
        match aggregate(&samples, &spec(QuestionType::MultipleChoice, &["A", "B"])).unwrap() {
            AggregateForecast::Categorical { probabilities } => {
                // Averages: A = 1.0, B = 3.0 -> 0.25 / 0.75.
                assert!((probabilities["A"] - 0.25).abs() < 1e-9);
                assert!((probabilities["B"] - 0.75).abs() < 1e-9);
            }
            other => panic!("unexpected forecast: {other:?}"),
        }
    }

    #[test]
    fn test_categorical_all_zero_scores_is_insufficient() {
        let samples = vec![categorical(&[("A", 0.0), ("B", 0.0)])];
        let err = aggregate(&samples, &spec(QuestionType::MultipleChoice, &["A", "B"]))
            .unwrap_err();
        assert!(matches!(err, DoxaError::InsufficientSamples { .. }));
    }

    #[test]
    fn test_categorical_unknown_keys_are_ignored() {
        let samples = vec![categorical(&[("C", 7.0)])];
        let err = aggregate(&samples, &spec(QuestionType::MultipleChoice, &["A", "B"]))
            .unwrap_err();
        assert!(matches!(err, DoxaError::InsufficientSamples { .. }));
    }

    #[test]
    fn test_numeric_cdf_shape() {
        let samples: Vec<WorldSample> = (0..20)
            .map(|i| WorldSample::Numeric {
                value: 10.0 + i as f64,
            })
            .collect();
        match aggregate(&samples, &spec(QuestionType::Numeric, &[])).unwrap() {
            AggregateForecast::Numeric { cdf, mean } => {
                assert_eq!(cdf.len(), 201);
                for i in 1..cdf.len() {
                    assert!(cdf[i] >= cdf[i - 1]);
                }
                assert!((mean - 19.5).abs() < 1e-9);
            }
            other => panic!("unexpected forecast: {other:?}"),
        }
    }

    #[test]
    fn test_numeric_single_value_does_not_degenerate() {
        let samples = vec![WorldSample::Numeric { value: 5.0 }; 4];
        match aggregate(&samples, &spec(QuestionType::Numeric, &[])).unwrap() {
            AggregateForecast::Numeric { cdf, mean } => {
                assert_eq!(cdf.len(), 201);
                assert_eq!(mean, 5.0);
                for i in 1..cdf.len() {
                    assert!(cdf[i] >= cdf[i - 1]);
                }
            }
            other => panic!("unexpected forecast: {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_variants_are_ignored() {
        let samples = vec![
            WorldSample::Numeric { value: 1.0 },
            WorldSample::Binary { answer: true },
        ];
        match aggregate(&samples, &spec(QuestionType::Binary, &[])).unwrap() {
            AggregateForecast::Binary { probability } => assert_eq!(probability, 0.99),
            other => panic!("unexpected forecast: {other:?}"),
        }
    }
}
