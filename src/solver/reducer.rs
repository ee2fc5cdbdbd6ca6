//! Dominance and duplicate reduction for payoff matrices.
//!
//! Before a matrix reaches the small-game solver it is shrunk by removing
//! actions that cannot carry equilibrium mass: rows the maximizing player
//! never benefits from (weakly dominated by another row) and columns the
//! minimizing player never benefits from, plus exact duplicates. The
//! reduction records which original indices survive so strategies solved in
//! the reduced space can be expanded back without searching.
//!
//! Reduction is total: a matrix that cannot shrink comes back unchanged
//! with the identity mapping.

use crate::numerics::EPS;
use crate::solver::matrix::PayoffMatrix;

/// Outcome of reducing a payoff matrix.
///
/// `kept_rows` and `kept_cols` are strictly increasing sequences of
/// original indices; every eliminated index appears in neither. Back-fill
/// during expansion is a pure lookup through these maps.
#[derive(Debug, Clone)]
pub struct ReductionResult {
    /// The reduced matrix.
    pub matrix: PayoffMatrix,
    /// Original row indices that survived, in ascending order.
    pub kept_rows: Vec<usize>,
    /// Original column indices that survived, in ascending order.
    pub kept_cols: Vec<usize>,
    /// Number of reduction passes that eliminated something.
    pub domination_steps: usize,
}

impl ReductionResult {
    /// Whether any row or column was eliminated.
    pub fn reduced_anything(&self) -> bool {
        self.domination_steps > 0
    }
}

/// Row `candidate` weakly dominates row `other` for the maximizing player:
/// never worse anywhere, strictly better somewhere.
fn row_dominates(candidate: &[f64], other: &[f64]) -> bool {
    let never_worse = candidate
        .iter()
        .zip(other.iter())
        .all(|(&c, &o)| c >= o - EPS);
    let somewhere_better = candidate
        .iter()
        .zip(other.iter())
        .any(|(&c, &o)| c > o + EPS);
    never_worse && somewhere_better
}

/// Column `candidate` weakly dominates column `other` for the minimizing
/// player: never worse (never larger) anywhere, strictly smaller somewhere.
fn col_dominates(candidate: &[f64], other: &[f64]) -> bool {
    let never_worse = candidate
        .iter()
        .zip(other.iter())
        .all(|(&c, &o)| c <= o + EPS);
    let somewhere_better = candidate
        .iter()
        .zip(other.iter())
        .any(|(&c, &o)| c < o - EPS);
    never_worse && somewhere_better
}

fn rows_equal(a: &[f64], b: &[f64]) -> bool {
    a.iter().zip(b.iter()).all(|(&x, &y)| (x - y).abs() <= EPS)
}

/// Reduce a payoff matrix by coalescing duplicates and eliminating
/// weakly-dominated rows and columns.
///
/// Each pass first coalesces duplicate rows and columns (entrywise equal
/// within the general epsilon; the lowest original index survives, which
/// makes the tie-break deterministic and independent of traversal order),
/// then removes the first weakly-dominated row and the first
/// weakly-dominated column it finds. Passes repeat until nothing changes or
/// neither dimension exceeds 1. An all-duplicate matrix (e.g. all zeros)
/// therefore reduces to its action-0 representative.
pub fn reduce(matrix: &PayoffMatrix) -> ReductionResult {
    let mut current = matrix.clone();
    let mut kept_rows: Vec<usize> = (0..matrix.rows()).collect();
    let mut kept_cols: Vec<usize> = (0..matrix.cols()).collect();
    let mut domination_steps = 0;

    loop {
        if current.rows() <= 1 && current.cols() <= 1 {
            break;
        }
        let mut changed = false;

        // Duplicate rows: keep the first occurrence of each group.
        let dup_rows = duplicate_rows(&current);
        if !dup_rows.is_empty() {
            retain_rows(&mut current, &mut kept_rows, &dup_rows);
            changed = true;
        }

        // Duplicate columns.
        let dup_cols = duplicate_cols(&current);
        if !dup_cols.is_empty() {
            retain_cols(&mut current, &mut kept_cols, &dup_cols);
            changed = true;
        }

        // First weakly-dominated row, scanning candidates in index order.
        if let Some(victim) = first_dominated_row(&current) {
            retain_rows(&mut current, &mut kept_rows, &[victim]);
            changed = true;
        }

        // First weakly-dominated column.
        if let Some(victim) = first_dominated_col(&current) {
            retain_cols(&mut current, &mut kept_cols, &[victim]);
            changed = true;
        }

        if changed {
            domination_steps += 1;
        } else {
            break;
        }
    }

    ReductionResult {
        matrix: current,
        kept_rows,
        kept_cols,
        domination_steps,
    }
}

fn duplicate_rows(matrix: &PayoffMatrix) -> Vec<usize> {
    let mut dups = Vec::new();
    for i in 0..matrix.rows() {
        if dups.contains(&i) {
            continue;
        }
        for j in (i + 1)..matrix.rows() {
            if !dups.contains(&j) && rows_equal(matrix.row(i), matrix.row(j)) {
                dups.push(j);
            }
        }
    }
    dups.sort_unstable();
    dups
}

fn duplicate_cols(matrix: &PayoffMatrix) -> Vec<usize> {
    let mut dups = Vec::new();
    for i in 0..matrix.cols() {
        if dups.contains(&i) {
            continue;
        }
        let col_i = matrix.col(i);
        for j in (i + 1)..matrix.cols() {
            if !dups.contains(&j) && rows_equal(&col_i, &matrix.col(j)) {
                dups.push(j);
            }
        }
    }
    dups.sort_unstable();
    dups
}

fn first_dominated_row(matrix: &PayoffMatrix) -> Option<usize> {
    for i in 0..matrix.rows() {
        for j in 0..matrix.rows() {
            if i != j && row_dominates(matrix.row(j), matrix.row(i)) {
                return Some(i);
            }
        }
    }
    None
}

fn first_dominated_col(matrix: &PayoffMatrix) -> Option<usize> {
    for i in 0..matrix.cols() {
        let col_i = matrix.col(i);
        for j in 0..matrix.cols() {
            if i != j && col_dominates(&matrix.col(j), &col_i) {
                return Some(i);
            }
        }
    }
    None
}

/// Drop the given local row indices from the working matrix and the kept
/// map. `drop` must be sorted ascending.
fn retain_rows(current: &mut PayoffMatrix, kept_rows: &mut Vec<usize>, drop: &[usize]) {
    let keep_local: Vec<usize> = (0..current.rows())
        .filter(|i| !drop.contains(i))
        .collect();
    let all_cols: Vec<usize> = (0..current.cols()).collect();
    *kept_rows = keep_local.iter().map(|&i| kept_rows[i]).collect();
    *current = current.select(&keep_local, &all_cols);
}

fn retain_cols(current: &mut PayoffMatrix, kept_cols: &mut Vec<usize>, drop: &[usize]) {
    let keep_local: Vec<usize> = (0..current.cols())
        .filter(|i| !drop.contains(i))
        .collect();
    let all_rows: Vec<usize> = (0..current.rows()).collect();
    *kept_cols = keep_local.iter().map(|&i| kept_cols[i]).collect();
    *current = current.select(&all_rows, &keep_local);
}
