//! General LP backend adapter for zero-sum matrix games.
//!
//! The row player's problem is the linear program
//!
//! ```text
//! maximize v
//! subject to  sum_i p_i * M[i][j] >= v   for every column j
//!             sum_i p_i = 1
//!             p_i >= 0
//! ```
//!
//! and the column player's problem is its dual. Two backends implement it:
//!
//! - **highs** — the native HiGHS solver, behind the `highs` cargo feature.
//! - **linprog** — a portable dense-tableau simplex, always compiled in.
//!
//! Backend availability is probed once per process and cached; with the
//! `auto` preference a missing or failing primary backend falls back to the
//! portable simplex with a logged warning. Infeasibility is never retried.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::numerics::{normalize, EPS};
use crate::solver::error::SolveError;
use crate::solver::matrix::PayoffMatrix;

/// Which LP backend actually solved a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Native HiGHS solver.
    Highs,
    /// Portable simplex implementation.
    Linprog,
}

impl BackendKind {
    /// Stable identifier used in artifacts and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Highs => "highs",
            BackendKind::Linprog => "linprog",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller preference for which backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Try HiGHS, fall back to the portable simplex.
    #[default]
    Auto,
    /// Require HiGHS; error if unavailable.
    Highs,
    /// Always use the portable simplex.
    Linprog,
}

impl FromStr for BackendPreference {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "highs" => Ok(BackendPreference::Highs),
            "linprog" => Ok(BackendPreference::Linprog),
            other => Err(SolveError::Configuration(format!(
                "unsupported solver backend '{}' (expected auto, highs, or linprog)",
                other
            ))),
        }
    }
}

/// Equilibrium strategies and value returned by an LP backend.
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// Maximizing player's mixed strategy over rows.
    pub row_strategy: Vec<f64>,
    /// Minimizing player's mixed strategy over columns.
    pub col_strategy: Vec<f64>,
    /// Game value from the row player's perspective.
    pub value: f64,
    /// Backend that produced the solution.
    pub backend: BackendKind,
}

static HIGHS_PROBE: OnceLock<bool> = OnceLock::new();

/// Whether the native HiGHS backend is available in this build.
///
/// Probed once and cached for the life of the process; read-only
/// afterwards.
pub fn highs_available() -> bool {
    *HIGHS_PROBE.get_or_init(|| cfg!(feature = "highs"))
}

/// Solve a matrix game with the preferred backend, normalizing outputs and
/// errors into one interface.
///
/// # Errors
/// - [`SolveError::DependencyUnavailable`] when `Highs` is required but the
///   build lacks it, or when `Auto` finds no working backend.
/// - [`SolveError::Infeasible`] when the program has no solution; this is
///   surfaced, never retried, because a well-formed payoff matrix cannot
///   produce it.
pub fn solve_lp(
    matrix: &PayoffMatrix,
    preference: BackendPreference,
) -> Result<LpSolution, SolveError> {
    match preference {
        BackendPreference::Linprog => solve_linprog(matrix),
        BackendPreference::Highs => {
            if !highs_available() {
                return Err(SolveError::DependencyUnavailable {
                    backend: "highs",
                    reason: "crate built without the 'highs' feature".to_string(),
                });
            }
            solve_highs(matrix)
        }
        BackendPreference::Auto => {
            if !highs_available() {
                log::debug!("highs backend not compiled in; using portable simplex");
                return solve_linprog(matrix);
            }
            match solve_highs(matrix) {
                Ok(solution) => Ok(solution),
                Err(SolveError::DependencyUnavailable { backend, reason }) => {
                    log::warn!(
                        "backend '{}' unavailable ({}); falling back to portable simplex",
                        backend,
                        reason
                    );
                    solve_linprog(matrix)
                }
                Err(other) => Err(other),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Portable simplex backend
// ---------------------------------------------------------------------------

/// Solve with the portable dense simplex.
///
/// Uses the classical shift-positive transformation: with every entry of
/// `M' = M + k` strictly positive, the column player's LP
/// `maximize sum(y)` s.t. `M'y <= 1, y >= 0` is feasible (y = 0) and
/// bounded, its optimum `S` gives the shifted value `1/S`, the primal
/// solution gives the column strategy and the constraint duals give the row
/// strategy. Bland's rule keeps pivoting deterministic and cycle-free.
pub fn solve_linprog(matrix: &PayoffMatrix) -> Result<LpSolution, SolveError> {
    let m = matrix.rows();
    let n = matrix.cols();
    let shift = 1.0 - matrix.min_entry();

    // Tableau: m constraint rows plus the objective row; columns are the n
    // game variables, m slacks, and the right-hand side.
    let width = n + m + 1;
    let mut tab = vec![vec![0.0f64; width]; m + 1];
    for i in 0..m {
        for j in 0..n {
            tab[i][j] = matrix.get(i, j) + shift;
        }
        tab[i][n + i] = 1.0;
        tab[i][width - 1] = 1.0;
    }
    for j in 0..n {
        tab[m][j] = -1.0;
    }
    let mut basis: Vec<usize> = (n..n + m).collect();

    let max_pivots = 200 * (m + n) + 1000;
    let mut pivots = 0;
    loop {
        // Bland's rule: smallest-index column with a negative reduced cost.
        let entering = match (0..n + m).find(|&j| tab[m][j] < -EPS) {
            Some(j) => j,
            None => break,
        };

        // Ratio test; ties go to the smallest basis index.
        let mut leaving: Option<usize> = None;
        let mut best_ratio = f64::INFINITY;
        for i in 0..m {
            let coeff = tab[i][entering];
            if coeff > EPS {
                let ratio = tab[i][width - 1] / coeff;
                let take = match leaving {
                    None => true,
                    Some(current) => {
                        ratio < best_ratio - EPS
                            || ((ratio - best_ratio).abs() <= EPS && basis[i] < basis[current])
                    }
                };
                if take {
                    leaving = Some(i);
                    best_ratio = ratio;
                }
            }
        }
        let leaving = match leaving {
            Some(i) => i,
            None => {
                return Err(SolveError::Infeasible {
                    backend: "linprog",
                    rows: m,
                    cols: n,
                    message: "unbounded direction in simplex tableau".to_string(),
                })
            }
        };

        pivot(&mut tab, leaving, entering);
        basis[leaving] = entering;

        pivots += 1;
        if pivots > max_pivots {
            return Err(SolveError::Infeasible {
                backend: "linprog",
                rows: m,
                cols: n,
                message: format!("simplex did not converge within {} pivots", max_pivots),
            });
        }
    }

    // Optimal objective = sum of the column player's scaled variables.
    let scale = tab[m][width - 1];
    if scale <= EPS {
        return Err(SolveError::Infeasible {
            backend: "linprog",
            rows: m,
            cols: n,
            message: "simplex terminated with zero objective".to_string(),
        });
    }

    let mut col_raw = vec![0.0f64; n];
    for (i, &var) in basis.iter().enumerate() {
        if var < n {
            col_raw[var] = tab[i][width - 1];
        }
    }
    // Constraint duals sit in the slack columns of the final objective row.
    let row_raw: Vec<f64> = (0..m).map(|i| tab[m][n + i]).collect();

    Ok(LpSolution {
        row_strategy: normalize(&row_raw),
        col_strategy: normalize(&col_raw),
        value: 1.0 / scale - shift,
        backend: BackendKind::Linprog,
    })
}

fn pivot(tab: &mut [Vec<f64>], pivot_row: usize, pivot_col: usize) {
    let pivot_value = tab[pivot_row][pivot_col];
    for entry in tab[pivot_row].iter_mut() {
        *entry /= pivot_value;
    }
    let normalized = tab[pivot_row].clone();
    for (i, row) in tab.iter_mut().enumerate() {
        if i == pivot_row {
            continue;
        }
        let factor = row[pivot_col];
        if factor != 0.0 {
            for (entry, &pivot_entry) in row.iter_mut().zip(normalized.iter()) {
                *entry -= factor * pivot_entry;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HiGHS backend
// ---------------------------------------------------------------------------

#[cfg(feature = "highs")]
fn solve_highs(matrix: &PayoffMatrix) -> Result<LpSolution, SolveError> {
    let (row_strategy, value) = highs_row_player(matrix)?;
    // The minimizer of M is the maximizer of -M^T.
    let (col_strategy, _) = highs_row_player(&matrix.transposed_negated())?;
    Ok(LpSolution {
        row_strategy: normalize(&row_strategy),
        col_strategy: normalize(&col_strategy),
        value,
        backend: BackendKind::Highs,
    })
}

#[cfg(feature = "highs")]
fn highs_row_player(matrix: &PayoffMatrix) -> Result<(Vec<f64>, f64), SolveError> {
    use highs::{HighsModelStatus, RowProblem, Sense};

    let rows = matrix.rows();
    let cols = matrix.cols();

    let mut problem = RowProblem::default();
    let game_value = problem.add_column(1.0, ..);
    let weights: Vec<_> = (0..rows).map(|_| problem.add_column(0.0, 0.0..)).collect();

    for j in 0..cols {
        let mut terms: Vec<(highs::Col, f64)> = Vec::with_capacity(rows + 1);
        for (i, &weight) in weights.iter().enumerate() {
            terms.push((weight, matrix.get(i, j)));
        }
        terms.push((game_value, -1.0));
        problem.add_row(0.0.., terms);
    }
    let simplex: Vec<(highs::Col, f64)> = weights.iter().map(|&w| (w, 1.0)).collect();
    problem.add_row(1.0..=1.0, simplex);

    let mut model = problem.optimise(Sense::Maximise);
    model.set_option("output_flag", false);
    let solved = model.solve();
    match solved.status() {
        HighsModelStatus::Optimal => {}
        HighsModelStatus::Infeasible => {
            return Err(SolveError::Infeasible {
                backend: "highs",
                rows,
                cols,
                message: "model reported infeasible".to_string(),
            })
        }
        other => {
            return Err(SolveError::Infeasible {
                backend: "highs",
                rows,
                cols,
                message: format!("unexpected model status: {:?}", other),
            })
        }
    }

    let solution = solved.get_solution();
    let columns = solution.columns();
    let value = columns[0];
    let strategy = columns[1..1 + rows].to_vec();
    Ok((strategy, value))
}

#[cfg(not(feature = "highs"))]
fn solve_highs(_matrix: &PayoffMatrix) -> Result<LpSolution, SolveError> {
    Err(SolveError::DependencyUnavailable {
        backend: "highs",
        reason: "crate built without the 'highs' feature".to_string(),
    })
}
