//! Payoff matrix representation.
//!
//! A [`PayoffMatrix`] is a rectangular array of finite reals: rows indexed
//! by the maximizing player's actions, columns by the minimizing player's.
//! Validation happens once, at construction; everything downstream
//! (reduction, solving, expansion) can assume a well-formed matrix and
//! stays total.

use serde::{Deserialize, Serialize};

use crate::solver::error::SolveError;

/// Largest payoff magnitude accepted from upstream artifacts. Leaf EVs are
/// measured in chips on bounded stacks, so anything beyond this is a data
/// bug, not a real payoff.
pub const MAX_PAYOFF: f64 = 1e6;

/// An immutable rectangular payoff matrix for a two-player zero-sum game.
///
/// Entries are stored row-major. Rows belong to the maximizing (row)
/// player, columns to the minimizing (column) player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl PayoffMatrix {
    /// Build a matrix from row vectors, validating shape and entries.
    ///
    /// # Errors
    /// Returns [`SolveError::InvalidInput`] if the input is empty, ragged,
    /// or contains non-finite or out-of-range entries.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, SolveError> {
        if rows.is_empty() {
            return Err(SolveError::InvalidInput(
                "payoff matrix has no rows".to_string(),
            ));
        }
        let cols = rows[0].len();
        if cols == 0 {
            return Err(SolveError::InvalidInput(
                "payoff matrix has no columns".to_string(),
            ));
        }
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (r, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(SolveError::InvalidInput(format!(
                    "payoff matrix is not rectangular: row 0 has {} columns, row {} has {}",
                    cols,
                    r,
                    row.len()
                )));
            }
            for (c, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(SolveError::InvalidInput(format!(
                        "payoff matrix entry ({}, {}) is not finite: {}",
                        r, c, value
                    )));
                }
                if value.abs() > MAX_PAYOFF {
                    return Err(SolveError::InvalidInput(format!(
                        "payoff matrix entry ({}, {}) is out of range: {}",
                        r, c, value
                    )));
                }
                data.push(value);
            }
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Number of rows (maximizing player's actions).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (minimizing player's actions).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)` pair.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// The larger of the two dimensions.
    pub fn max_dim(&self) -> usize {
        self.rows.max(self.cols)
    }

    /// Entry at `(row, col)`.
    ///
    /// # Panics
    /// Panics in debug builds if the indices are out of bounds; callers
    /// iterate within `shape()`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        debug_assert!(row < self.rows && col < self.cols);
        self.data[row * self.cols + col]
    }

    /// A full row as a slice.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// A full column, copied out.
    pub fn col(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    /// Submatrix restricted to the given row/column index sets, preserving
    /// order. Used by the reducer; the index lists are assumed valid.
    pub fn select(&self, keep_rows: &[usize], keep_cols: &[usize]) -> PayoffMatrix {
        let mut data = Vec::with_capacity(keep_rows.len() * keep_cols.len());
        for &r in keep_rows {
            for &c in keep_cols {
                data.push(self.get(r, c));
            }
        }
        PayoffMatrix {
            rows: keep_rows.len(),
            cols: keep_cols.len(),
            data,
        }
    }

    /// The transposed, negated matrix: the column player's game viewed as a
    /// maximization. Solving it with a row-player method yields the column
    /// player's equilibrium strategy.
    pub fn transposed_negated(&self) -> PayoffMatrix {
        let mut data = Vec::with_capacity(self.data.len());
        for c in 0..self.cols {
            for r in 0..self.rows {
                data.push(-self.get(r, c));
            }
        }
        PayoffMatrix {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }

    /// Minimum entry of the matrix.
    pub fn min_entry(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_valid() {
        let m = PayoffMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m.get(1, 0), 3.0);
        assert_eq!(m.row(0), &[1.0, 2.0]);
        assert_eq!(m.col(1), vec![2.0, 4.0]);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = PayoffMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, SolveError::InvalidInput(_)));
        assert!(err.to_string().contains("rectangular"));
    }

    #[test]
    fn test_from_rows_rejects_nan() {
        let err = PayoffMatrix::from_rows(vec![vec![f64::NAN]]).unwrap_err();
        assert!(matches!(err, SolveError::InvalidInput(_)));
    }

    #[test]
    fn test_from_rows_rejects_empty() {
        assert!(PayoffMatrix::from_rows(vec![]).is_err());
        assert!(PayoffMatrix::from_rows(vec![vec![]]).is_err());
    }

    #[test]
    fn test_from_rows_rejects_out_of_range() {
        let err = PayoffMatrix::from_rows(vec![vec![1e7]]).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_select_preserves_order() {
        let m = PayoffMatrix::from_rows(vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        let sub = m.select(&[0, 2], &[1, 2]);
        assert_eq!(sub.shape(), (2, 2));
        assert_eq!(sub.get(0, 0), 2.0);
        assert_eq!(sub.get(1, 1), 9.0);
    }

    #[test]
    fn test_transposed_negated() {
        let m = PayoffMatrix::from_rows(vec![vec![1.0, -2.0], vec![3.0, 4.0]]).unwrap();
        let t = m.transposed_negated();
        assert_eq!(t.shape(), (2, 2));
        assert_eq!(t.get(0, 0), -1.0);
        assert_eq!(t.get(0, 1), -3.0);
        assert_eq!(t.get(1, 0), 2.0);
    }
}
