//! Payload validator.
//!
//! Epistemic foundation:
//! - K_i: The platform's contract is checkable locally; a payload that
//!   fails here would be rejected remotely
//! - K_i: Violations are deterministic for the same input → no retry
//! - B_i: Upstream invariants are re-checked, not assumed

use crate::forecast::cdf::{OPEN_LOWER_FLOOR, OPEN_UPPER_CEIL};
use crate::models::{
    AggregateForecast, CDF_SIZE, DoxaError, PayloadViolation, QuestionSpec, QuestionType, Result,
    SubmissionPayload,
};

/// Tolerance on the categorical probability sum.
const SUM_TOLERANCE: f64 = 1e-6;

/// Last-mile structural check before any external call.
///
/// Returns the wire payload with exactly one populated forecast field, or
/// `PayloadInvalid` carrying the specific rule broken and the offending
/// value. The caller aborts submission for that question without retry.
pub fn validate(forecast: &AggregateForecast, spec: &QuestionSpec) -> Result<SubmissionPayload> {
    let invalid = |violation: PayloadViolation| DoxaError::PayloadInvalid {
        question_id: spec.id,
        violation,
    };

    match (forecast, spec.question_type) {
        (AggregateForecast::Binary { probability }, QuestionType::Binary) => {
            let p = *probability;
            if !p.is_finite() {
                return Err(invalid(PayloadViolation::ProbabilityNotFinite { value: p }));
            }
            if !(0.01..=0.99).contains(&p) {
                return Err(invalid(PayloadViolation::ProbabilityOutOfRange { value: p }));
            }
            Ok(SubmissionPayload::binary(p))
        }

        (AggregateForecast::Categorical { probabilities }, QuestionType::MultipleChoice) => {
            let mut expected: Vec<String> = spec.options.clone();
            expected.sort();
            let mut got: Vec<String> = probabilities.keys().cloned().collect();
            got.sort();
            if expected != got {
                return Err(invalid(PayloadViolation::OptionSetMismatch {
                    expected,
                    got,
                }));
            }

            for (option, value) in probabilities {
                if !value.is_finite() || !(0.0..=1.0).contains(value) {
                    return Err(invalid(PayloadViolation::OptionProbabilityOutOfRange {
                        option: option.clone(),
                        value: *value,
                    }));
                }
            }

            let sum: f64 = probabilities.values().sum();
            if (sum - 1.0).abs() > SUM_TOLERANCE {
                return Err(invalid(PayloadViolation::ProbabilitySumNotOne { sum }));
            }

            Ok(SubmissionPayload::multiple_choice(probabilities.clone()))
        }

        (AggregateForecast::Numeric { cdf, .. }, QuestionType::Numeric) => {
            if cdf.len() != CDF_SIZE {
                return Err(invalid(PayloadViolation::CdfWrongLength { len: cdf.len() }));
            }

            for (i, v) in cdf.iter().enumerate() {
                if !v.is_finite() || !(0.0..=1.0).contains(v) {
                    return Err(invalid(PayloadViolation::CdfValueOutOfRange {
                        index: i,
                        value: *v,
                    }));
                }
                if i > 0 && *v < cdf[i - 1] {
                    return Err(invalid(PayloadViolation::CdfNotMonotonic {
                        index: i,
                        prev: cdf[i - 1],
                        value: *v,
                    }));
                }
            }

            let first = cdf[0];
            let last = cdf[CDF_SIZE - 1];

            if spec.lower_bound_open {
                if first < OPEN_LOWER_FLOOR {
                    return Err(invalid(PayloadViolation::CdfLowerBoundViolation {
                        value: first,
                        rule: "open",
                    }));
                }
            } else if first != 0.0 {
                return Err(invalid(PayloadViolation::CdfLowerBoundViolation {
                    value: first,
                    rule: "closed",
                }));
            }

            if spec.upper_bound_open {
                if last > OPEN_UPPER_CEIL {
                    return Err(invalid(PayloadViolation::CdfUpperBoundViolation {
                        value: last,
                        rule: "open",
                    }));
                }
            } else if last != 1.0 {
                return Err(invalid(PayloadViolation::CdfUpperBoundViolation {
                    value: last,
                    rule: "closed",
                }));
            }

            Ok(SubmissionPayload::numeric(cdf.clone()))
        }

        (forecast, _) => Err(invalid(PayloadViolation::TypeMismatch {
            forecast: forecast.kind(),
            question: spec.question_type.as_str(),
        })),
    }
}
