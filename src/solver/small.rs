//! Small-matrix game solver.
//!
//! Handles matrices whose larger dimension fits under the small-engine
//! threshold using the cheapest sound method: pure strategies for 1x1,
//! support over the argmin/argmax set for single-row/single-column games,
//! the closed-form solution for 2x2, and delegation to the general LP
//! backend for everything else. The closed form is abandoned whenever its
//! denominator is numerically zero or it produces an out-of-range
//! probability (a saddle the reducer did not catch); both cases delegate to
//! the LP backend on the same matrix and are flagged degenerate.
//!
//! Strategies come back in the *reduced* index space; the orchestrator owns
//! the expansion to original indices.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::numerics::{normalize, EPS, EPS_DENOM};
use crate::solver::error::SolveError;
use crate::solver::lp::{solve_lp, BackendKind, BackendPreference};
use crate::solver::matrix::PayoffMatrix;

/// How a node's matrix was ultimately solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Closed-form or direct enumeration (1x1, 1xN, Nx1, 2x2 formula).
    Analytic,
    /// Small engine reduced the matrix, then the LP backend finished it.
    ReducedSmall,
    /// The LP backend solved the original matrix directly.
    GeneralLp,
}

impl Method {
    /// Stable identifier used in artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Analytic => "analytic",
            Method::ReducedSmall => "reduced_small",
            Method::GeneralLp => "general_lp",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of solving a reduced small matrix.
#[derive(Debug, Clone)]
pub struct SmallGameSolution {
    /// Row strategy in reduced index space.
    pub row_strategy: Vec<f64>,
    /// Column strategy in reduced index space.
    pub col_strategy: Vec<f64>,
    /// Game value.
    pub value: f64,
    /// Method that produced the solution.
    pub method: Method,
    /// True when the closed form was judged unusable and the LP backend
    /// took over.
    pub degenerate: bool,
    /// LP backend used, when one was.
    pub backend: Option<BackendKind>,
}

/// Solve a small (already reduced) matrix game.
///
/// The caller guarantees `matrix.max_dim()` fits the small-engine
/// threshold; this function never re-reduces.
pub fn solve_small(
    matrix: &PayoffMatrix,
    preference: BackendPreference,
) -> Result<SmallGameSolution, SolveError> {
    let (rows, cols) = matrix.shape();

    if rows == 1 && cols == 1 {
        return Ok(SmallGameSolution {
            row_strategy: vec![1.0],
            col_strategy: vec![1.0],
            value: matrix.get(0, 0),
            method: Method::Analytic,
            degenerate: false,
            backend: None,
        });
    }

    if rows == 1 {
        // Single hero action: the minimizer mixes over its best responses.
        let row = matrix.row(0);
        let min = row.iter().copied().fold(f64::INFINITY, f64::min);
        let mask: Vec<f64> = row
            .iter()
            .map(|&v| if (v - min).abs() <= EPS { 1.0 } else { 0.0 })
            .collect();
        return Ok(SmallGameSolution {
            row_strategy: vec![1.0],
            col_strategy: normalize(&mask),
            value: min,
            method: Method::Analytic,
            degenerate: false,
            backend: None,
        });
    }

    if cols == 1 {
        let column = matrix.col(0);
        let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mask: Vec<f64> = column
            .iter()
            .map(|&v| if (v - max).abs() <= EPS { 1.0 } else { 0.0 })
            .collect();
        return Ok(SmallGameSolution {
            row_strategy: normalize(&mask),
            col_strategy: vec![1.0],
            value: max,
            method: Method::Analytic,
            degenerate: false,
            backend: None,
        });
    }

    if rows == 2 && cols == 2 {
        let (a, b) = (matrix.get(0, 0), matrix.get(0, 1));
        let (c, d) = (matrix.get(1, 0), matrix.get(1, 1));
        let denom = a - b - c + d;
        if denom.abs() < EPS_DENOM {
            return delegate(matrix, preference, true);
        }
        let p = (d - c) / denom;
        let q = (d - b) / denom;
        if !probability_in_range(p) || !probability_in_range(q) {
            // The closed form found a non-equilibrium saddle; fall through
            // to the LP backend on the same 2x2.
            return delegate(matrix, preference, true);
        }
        return Ok(SmallGameSolution {
            row_strategy: normalize(&[p, 1.0 - p]),
            col_strategy: normalize(&[q, 1.0 - q]),
            value: (a * d - b * c) / denom,
            method: Method::Analytic,
            degenerate: false,
            backend: None,
        });
    }

    delegate(matrix, preference, false)
}

fn probability_in_range(p: f64) -> bool {
    (-EPS..=1.0 + EPS).contains(&p)
}

fn delegate(
    matrix: &PayoffMatrix,
    preference: BackendPreference,
    degenerate: bool,
) -> Result<SmallGameSolution, SolveError> {
    let lp = solve_lp(matrix, preference)?;
    Ok(SmallGameSolution {
        row_strategy: lp.row_strategy,
        col_strategy: lp.col_strategy,
        value: lp.value,
        method: Method::ReducedSmall,
        degenerate,
        backend: Some(lp.backend),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::approx_eq;

    fn matrix(rows: Vec<Vec<f64>>) -> PayoffMatrix {
        PayoffMatrix::from_rows(rows).unwrap()
    }

    fn solve(rows: Vec<Vec<f64>>) -> SmallGameSolution {
        solve_small(&matrix(rows), BackendPreference::Linprog).unwrap()
    }

    #[test]
    fn test_1x1_is_pure() {
        let solution = solve(vec![vec![-0.75]]);
        assert_eq!(solution.row_strategy, vec![1.0]);
        assert_eq!(solution.col_strategy, vec![1.0]);
        assert!(approx_eq(solution.value, -0.75));
        assert_eq!(solution.method, Method::Analytic);
        assert!(!solution.degenerate);
    }

    #[test]
    fn test_1xn_minimizer_picks_argmin() {
        let solution = solve(vec![vec![0.3, -0.2, 0.1]]);
        assert!(approx_eq(solution.value, -0.2));
        assert_eq!(solution.row_strategy, vec![1.0]);
        assert!(approx_eq(solution.col_strategy[1], 1.0));
        assert_eq!(solution.method, Method::Analytic);
    }

    #[test]
    fn test_nx1_maximizer_picks_argmax() {
        let solution = solve(vec![vec![0.3], vec![0.7], vec![0.7]]);
        assert!(approx_eq(solution.value, 0.7));
        // Tied maxima split uniformly.
        assert!(approx_eq(solution.row_strategy[1], 0.5));
        assert!(approx_eq(solution.row_strategy[2], 0.5));
        assert!(approx_eq(solution.row_strategy[0], 0.0));
    }

    #[test]
    fn test_2x2_matching_pennies_closed_form() {
        let solution = solve(vec![vec![1.0, -1.0], vec![-1.0, 1.0]]);
        assert_eq!(solution.method, Method::Analytic);
        assert!(solution.value.abs() < 1e-12);
        assert!(approx_eq(solution.row_strategy[0], 0.5));
        assert!(approx_eq(solution.col_strategy[0], 0.5));
        assert!(solution.backend.is_none());
    }

    #[test]
    fn test_2x2_closed_form_mixed_game() {
        // a=0.2 b=-0.1 c=0.0 d=0.05: denom=0.35, p=1/7, q=3/7, v=1/35.
        let solution = solve(vec![vec![0.2, -0.1], vec![0.0, 0.05]]);
        assert_eq!(solution.method, Method::Analytic);
        assert!((solution.row_strategy[0] - 1.0 / 7.0).abs() < 1e-12);
        assert!((solution.col_strategy[0] - 3.0 / 7.0).abs() < 1e-12);
        assert!((solution.value - 1.0 / 35.0).abs() < 1e-12);
    }

    #[test]
    fn test_2x2_out_of_range_probability_delegates() {
        // [[3,0],[5,1]]: denom = -1, p = (1-5)/-1 = 4, outside [0,1]. The
        // LP finds the saddle at (row 1, col 1) with value 1.
        let solution = solve(vec![vec![3.0, 0.0], vec![5.0, 1.0]]);
        assert!(solution.degenerate);
        assert_eq!(solution.method, Method::ReducedSmall);
        assert_eq!(solution.backend, Some(BackendKind::Linprog));
        assert!((solution.value - 1.0).abs() < 1e-7);
        assert!(approx_eq(solution.row_strategy[1], 1.0));
    }

    #[test]
    fn test_2x2_zero_denominator_delegates() {
        // denom = 1 - 2 - 3 + 4 = 0; saddle at (row 1, col 0), value 3.
        let solution = solve(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert!(solution.degenerate);
        assert!((solution.value - 3.0).abs() < 1e-7);
    }

    #[test]
    fn test_larger_matrix_delegates_without_degeneracy() {
        let solution = solve(vec![
            vec![3.0, 1.0, 2.0],
            vec![1.0, 0.0, 1.0],
            vec![2.0, 3.0, 0.0],
        ]);
        assert_eq!(solution.method, Method::ReducedSmall);
        assert!(!solution.degenerate);
        assert!((solution.value - 1.5).abs() < 1e-7);
    }

    #[test]
    fn test_method_serialization_tags() {
        assert_eq!(
            serde_json::to_string(&Method::ReducedSmall).unwrap(),
            "\"reduced_small\""
        );
        assert_eq!(
            serde_json::to_string(&Method::GeneralLp).unwrap(),
            "\"general_lp\""
        );
        assert_eq!(Method::Analytic.as_str(), "analytic");
    }
}
