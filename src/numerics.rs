//! Shared numerical tolerance constants.
//!
//! Every component in the pipeline compares floats through these two
//! constants. The reducer, the small-game solver, and the exporter must
//! agree on what "equal" and "negligible" mean: dominance elimination and
//! zero-weight back-fill would otherwise disagree silently on which actions
//! carry mass. No other module defines a local tolerance.

/// General-purpose epsilon for dominance comparisons, probability clamping,
/// and sum-to-one checks.
pub const EPS: f64 = 1e-9;

/// Stricter epsilon used only to detect near-zero denominators in the
/// closed-form 2x2 solution.
pub const EPS_DENOM: f64 = 1e-12;

/// Test two values for equality within [`EPS`].
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS
}

/// Test a value for being negligible within [`EPS`].
pub fn approx_zero(x: f64) -> bool {
    x.abs() <= EPS
}

/// Clamp negatives to zero and rescale to sum to 1.
///
/// Tiny negative entries show up when strategies come back from an LP
/// backend; they are numerical noise, not support. A vector with no positive
/// mass normalizes to the uniform distribution.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let clipped: Vec<f64> = values.iter().map(|&v| v.max(0.0)).collect();
    let total: f64 = clipped.iter().sum();
    if total <= 0.0 {
        if clipped.is_empty() {
            return clipped;
        }
        return vec![1.0 / clipped.len() as f64; clipped.len()];
    }
    clipped.into_iter().map(|v| v / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rescales() {
        let result = normalize(&[1.0, 3.0]);
        assert!(approx_eq(result[0], 0.25));
        assert!(approx_eq(result[1], 0.75));
    }

    #[test]
    fn test_normalize_clamps_negatives() {
        let result = normalize(&[-0.5, 1.0, 1.0]);
        assert_eq!(result[0], 0.0);
        assert!(approx_eq(result[1], 0.5));
        assert!(approx_eq(result[2], 0.5));
    }

    #[test]
    fn test_normalize_zero_mass_is_uniform() {
        let result = normalize(&[0.0, 0.0, -1.0, 0.0]);
        for weight in &result {
            assert!(approx_eq(*weight, 0.25));
        }
    }

    #[test]
    fn test_denominator_epsilon_is_stricter() {
        assert!(EPS_DENOM < EPS);
    }
}
