//! Numeric CDF sanitizer.
//!
//! Epistemic foundation:
//! - K_i: The platform accepts exactly 201 points, non-decreasing, in [0, 1],
//!   with endpoint semantics determined by boundary openness
//! - B_i: Raw CDFs arrive with any length, NaNs, reversals, and drift
//! - K_i: The sanitizer is total; every input maps to a valid CDF
//!
//! The repair is a fixed sequence of passes. Order matters: later passes
//! assume invariants established by earlier ones.

use crate::models::{CDF_SIZE, QuestionSpec};

/// Minimum step between adjacent CDF points, where the 1.0 cap allows it.
pub const MIN_CDF_STEP: f64 = 5e-5;

/// First-point floor when the lower bound is open.
pub const OPEN_LOWER_FLOOR: f64 = 0.001;

/// Last-point ceiling when the upper bound is open.
pub const OPEN_UPPER_CEIL: f64 = 0.999;

/// Sanitize an arbitrary float sequence into a canonical 201-point CDF.
///
/// Total function: every input, including empty and all-NaN sequences,
/// yields a CDF satisfying length 201, monotone non-decrease, values in
/// [0, 1], and the question's boundary-openness endpoint rule.
pub fn sanitize_numeric_cdf(raw: &[f64], spec: &QuestionSpec) -> Vec<f64> {
    let mut cdf = if raw.iter().any(|v| v.is_finite()) {
        raw.to_vec()
    } else {
        // Empty or unanchored input: flat 0 -> 1 ramp.
        flat_ramp()
    };

    repair_non_finite(&mut cdf);
    clamp_unit(&mut cdf);
    forward_monotonic(&mut cdf);
    backward_ceiling(&mut cdf);
    minimum_step(&mut cdf);
    enforce_bounds(&mut cdf, spec);

    if cdf.len() != CDF_SIZE {
        cdf = resample(&cdf, CDF_SIZE);
    }

    // Resampling can reintroduce drift at the boundaries.
    clamp_unit(&mut cdf);
    enforce_bounds(&mut cdf, spec);

    cdf
}

/// Evenly spaced 0 -> 1 over the canonical grid.
fn flat_ramp() -> Vec<f64> {
    (0..CDF_SIZE)
        .map(|i| i as f64 / (CDF_SIZE - 1) as f64)
        .collect()
}

/// Replace non-finite entries by linear interpolation between the nearest
/// finite neighbors; flat-extend from the nearest finite value at the ends.
///
/// Caller guarantees at least one finite entry.
fn repair_non_finite(cdf: &mut [f64]) {
    let n = cdf.len();
    let mut i = 0;
    while i < n {
        if cdf[i].is_finite() {
            i += 1;
            continue;
        }

        // Extent of the non-finite run.
        let run_start = i;
        let mut run_end = i;
        while run_end + 1 < n && !cdf[run_end + 1].is_finite() {
            run_end += 1;
        }

        let left = run_start.checked_sub(1).map(|j| cdf[j]);
        let right = if run_end + 1 < n {
            Some(cdf[run_end + 1])
        } else {
            None
        };

        match (left, right) {
            (Some(a), Some(b)) => {
                let span = (run_end - run_start + 2) as f64;
                for (k, slot) in (run_start..=run_end).enumerate() {
                    let t = (k + 1) as f64 / span;
                    cdf[slot] = a + (b - a) * t;
                }
            }
            // Leading or trailing run: flat extension, not extrapolation.
            (None, Some(b)) => cdf[run_start..=run_end].fill(b),
            (Some(a), None) => cdf[run_start..=run_end].fill(a),
            (None, None) => unreachable!("caller guarantees a finite anchor"),
        }

        i = run_end + 1;
    }
}

fn clamp_unit(cdf: &mut [f64]) {
    for v in cdf.iter_mut() {
        *v = v.clamp(0.0, 1.0);
    }
}

/// Raise each value to at least its predecessor.
fn forward_monotonic(cdf: &mut [f64]) {
    for i in 1..cdf.len() {
        if cdf[i] < cdf[i - 1] {
            cdf[i] = cdf[i - 1];
        }
    }
}

/// Lower each value to at most its successor, scanning right to left.
/// Never drops a value below what the forward pass fixed.
fn backward_ceiling(cdf: &mut [f64]) {
    for i in (0..cdf.len().saturating_sub(1)).rev() {
        if cdf[i] > cdf[i + 1] {
            cdf[i] = cdf[i + 1];
        }
    }
}

/// Push each value at least MIN_CDF_STEP over its predecessor wherever the
/// 1.0 cap allows. Flat plateaus below 1.0 read as numerical artifacts
/// rather than genuine probability mass.
fn minimum_step(cdf: &mut [f64]) {
    for i in 1..cdf.len() {
        let want = cdf[i - 1] + MIN_CDF_STEP;
        if want <= 1.0 {
            if cdf[i] < want {
                cdf[i] = want;
            }
        } else if cdf[i] < cdf[i - 1] {
            cdf[i] = cdf[i - 1];
        }
    }
}

/// Apply the boundary-openness endpoint rule.
///
/// The whole (already monotone) sequence is clamped into [floor, ceil],
/// which preserves monotonicity while guaranteeing the open-bound floor and
/// ceiling; closed endpoints are then pinned exactly.
fn enforce_bounds(cdf: &mut [f64], spec: &QuestionSpec) {
    let n = cdf.len();
    if n == 0 {
        return;
    }

    let floor = if spec.lower_bound_open {
        OPEN_LOWER_FLOOR
    } else {
        0.0
    };
    let ceil = if spec.upper_bound_open {
        OPEN_UPPER_CEIL
    } else {
        1.0
    };

    for v in cdf.iter_mut() {
        *v = v.clamp(floor, ceil);
    }

    if !spec.lower_bound_open {
        cdf[0] = 0.0;
    }
    if !spec.upper_bound_open {
        cdf[n - 1] = 1.0;
    }
}

/// Resample to `len` points by linear interpolation over a uniform
/// parameterization from first to last index.
fn resample(cdf: &[f64], len: usize) -> Vec<f64> {
    let n = cdf.len();
    if n == 1 {
        return vec![cdf[0]; len];
    }

    let mut out = Vec::with_capacity(len);
    let scale = (n - 1) as f64 / (len - 1) as f64;
    for i in 0..len {
        let t = i as f64 * scale;
        let j = (t.floor() as usize).min(n - 2);
        let frac = t - j as f64;
        out.push(cdf[j] * (1.0 - frac) + cdf[j + 1] * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionSpec, QuestionType};

    fn spec(lower_open: bool, upper_open: bool) -> QuestionSpec {
        QuestionSpec {
            id: 123,
            title: "test".to_string(),
            question_type: QuestionType::Numeric,
            options: vec![],
            lower_bound_open: lower_open,
            upper_bound_open: upper_open,
            unit: None,
        }
    }

    fn assert_monotonic(cdf: &[f64]) {
        for i in 1..cdf.len() {
            assert!(
                cdf[i] >= cdf[i - 1],
                "CDF decreases at {}: {} -> {}",
                i,
                cdf[i - 1],
                cdf[i]
            );
        }
    }

    fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| a + (b - a) * i as f64 / (n - 1) as f64)
            .collect()
    }

    #[test]
    fn test_length_for_any_input_size() {
        for n in [0usize, 1, 5, 50, 500] {
            let raw: Vec<f64> = (0..n).map(|i| i as f64 / n.max(1) as f64).collect();
            let result = sanitize_numeric_cdf(&raw, &spec(false, false));
            assert_eq!(result.len(), 201, "input length {n}");
            assert_monotonic(&result);
        }
    }

    #[test]
    fn test_closed_bounds_pin_endpoints() {
        let result = sanitize_numeric_cdf(&linspace(0.0, 1.0, 201), &spec(false, false));
        assert_eq!(result[0], 0.0);
        assert_eq!(result[200], 1.0);
        assert_monotonic(&result);
    }

    #[test]
    fn test_adversarial_reversal_is_repaired() {
        let result = sanitize_numeric_cdf(&[0.0, 0.9, 0.1, 1.0], &spec(false, false));
        assert_eq!(result.len(), 201);
        assert_monotonic(&result);
        assert!(result.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_nan_entries_are_interpolated() {
        let mut raw = linspace(0.0, 1.0, 201);
        raw[50] = f64::NAN;
        raw[100] = f64::INFINITY;
        raw[150] = f64::NEG_INFINITY;

        let result = sanitize_numeric_cdf(&raw, &spec(false, false));
        assert!(result.iter().all(|v| v.is_finite()));
        assert_monotonic(&result);
    }

    #[test]
    fn test_leading_and_trailing_nans_flat_extend() {
        let mut raw = linspace(0.0, 1.0, 50);
        raw[0] = f64::NAN;
        raw[1] = f64::NAN;
        raw[49] = f64::NAN;

        let result = sanitize_numeric_cdf(&raw, &spec(false, false));
        assert!(result.iter().all(|v| v.is_finite()));
        assert_monotonic(&result);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let result = sanitize_numeric_cdf(&linspace(-0.5, 1.5, 201), &spec(false, false));
        assert!(result.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_monotonic(&result);
    }

    #[test]
    fn test_open_lower_bound_floor() {
        let result = sanitize_numeric_cdf(&linspace(0.0, 1.0, 201), &spec(true, false));
        assert!(result[0] >= OPEN_LOWER_FLOOR, "got {}", result[0]);
        assert_eq!(result[200], 1.0);
        assert_monotonic(&result);
    }

    #[test]
    fn test_open_upper_bound_ceiling() {
        let result = sanitize_numeric_cdf(&linspace(0.0, 1.0, 201), &spec(false, true));
        assert_eq!(result[0], 0.0);
        assert!(result[200] <= OPEN_UPPER_CEIL, "got {}", result[200]);
        assert_monotonic(&result);
    }

    #[test]
    fn test_both_bounds_open_near_flat_input() {
        // Near-flat low CDF: the open-lower floor must not break ordering
        // against the open-upper ceiling.
        let raw = vec![0.0005; 201];
        let result = sanitize_numeric_cdf(&raw, &spec(true, true));
        assert!(result[0] >= OPEN_LOWER_FLOOR);
        assert!(result[200] <= OPEN_UPPER_CEIL);
        assert_monotonic(&result);
    }

    #[test]
    fn test_all_ones_with_open_bounds() {
        let raw = vec![1.0; 201];
        let result = sanitize_numeric_cdf(&raw, &spec(true, true));
        assert!(result[0] >= OPEN_LOWER_FLOOR);
        assert!(result[200] <= OPEN_UPPER_CEIL);
        assert_monotonic(&result);
    }

    #[test]
    fn test_empty_input_is_flat_ramp() {
        let result = sanitize_numeric_cdf(&[], &spec(false, false));
        assert_eq!(result.len(), 201);
        assert_eq!(result[0], 0.0);
        assert_eq!(result[200], 1.0);
        assert_monotonic(&result);
    }

    #[test]
    fn test_all_nan_input_treated_as_empty() {
        let raw = vec![f64::NAN; 10];
        let result = sanitize_numeric_cdf(&raw, &spec(false, false));
        assert_eq!(result.len(), 201);
        assert_eq!(result[0], 0.0);
        assert_eq!(result[200], 1.0);
        assert_monotonic(&result);
    }

    #[test]
    fn test_all_zeros_produces_valid_cdf() {
        let result = sanitize_numeric_cdf(&[0.0; 201], &spec(false, false));
        assert_eq!(result.len(), 201);
        assert_monotonic(&result);
        assert_eq!(result[200], 1.0);
    }

    #[test]
    fn test_minimum_step_on_interior_plateau() {
        let mut raw = vec![0.2; 100];
        raw.extend(vec![0.8; 101]);
        let result = sanitize_numeric_cdf(&raw, &spec(false, false));
        // Interior plateaus below the cap get nudged upward.
        for i in 1..150 {
            assert!(
                result[i] > result[i - 1] || result[i] >= 1.0,
                "flat at {i}: {}",
                result[i]
            );
        }
        assert_monotonic(&result);
    }

    #[test]
    fn test_idempotent_on_sanitized_cdf() {
        let raw = linspace(0.05, 0.95, 77);
        let spec = spec(true, true);

        let once = sanitize_numeric_cdf(&raw, &spec);
        let twice = sanitize_numeric_cdf(&once, &spec);

        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-9, "re-run changed {a} -> {b}");
        }
    }
}
