//! Per-node solve orchestration.
//!
//! The orchestrator owns the decision between the small-engine path
//! (reduce, then closed forms or a small LP) and the direct LP path, driven
//! by an explicit engine mode and a dimension threshold. Whatever path
//! runs, the returned strategies are expanded back to the *original* action
//! indices: eliminated actions get weight exactly 0, so reduction stays an
//! internal optimization that consumers only see through the audit fields.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::solver::error::SolveError;
use crate::solver::lp::{solve_lp, BackendKind, BackendPreference};
use crate::solver::matrix::PayoffMatrix;
use crate::solver::reducer::reduce;
use crate::solver::small::{solve_small, Method};

/// Small-engine selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineMode {
    /// Use the small engine whenever the matrix fits the threshold.
    #[default]
    Auto,
    /// Require the small engine; an oversized matrix is a caller mistake.
    On,
    /// Never use the small engine.
    Off,
}

impl FromStr for EngineMode {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(EngineMode::Auto),
            "on" => Ok(EngineMode::On),
            "off" => Ok(EngineMode::Off),
            other => Err(SolveError::Configuration(format!(
                "unsupported small engine mode '{}' (expected auto, on, or off)",
                other
            ))),
        }
    }
}

/// Default upper bound on the larger matrix dimension for the small engine.
pub const DEFAULT_SMALL_MAX_DIM: usize = 5;

/// Options controlling one solve call.
#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    /// Small-engine selection mode.
    pub engine_mode: EngineMode,
    /// Preferred LP backend for delegated and direct solves.
    pub backend: BackendPreference,
    /// Largest dimension the small engine accepts.
    pub small_max_dim: usize,
    /// Seed recorded in metadata. Reserved for future randomized
    /// pre-processing; tie-breaks are structural (lowest original index)
    /// and the returned value and support set never depend on it.
    pub seed: Option<u64>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            engine_mode: EngineMode::Auto,
            backend: BackendPreference::Auto,
            small_max_dim: DEFAULT_SMALL_MAX_DIM,
            seed: None,
        }
    }
}

impl SolveOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the engine mode.
    pub fn with_engine_mode(mut self, mode: EngineMode) -> Self {
        self.engine_mode = mode;
        self
    }

    /// Builder method: set the backend preference.
    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    /// Builder method: set the small-engine dimension threshold.
    pub fn with_small_max_dim(mut self, dim: usize) -> Self {
        self.small_max_dim = dim.max(1);
        self
    }

    /// Builder method: set the recorded seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Terminal output of solving one decision node.
///
/// `row_strategy` and `col_strategy` are always expressed over the
/// *original* action counts, never the reduced ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResult {
    /// Maximizing player's strategy over the original rows.
    pub row_strategy: Vec<f64>,
    /// Minimizing player's strategy over the original columns.
    pub col_strategy: Vec<f64>,
    /// Game value for the row player.
    pub value: f64,
    /// Method that produced the solution.
    pub method: Method,
    /// Shape after reduction; absent when no reduction was applied.
    pub reduced_shape: Option<(usize, usize)>,
    /// Reduction passes that eliminated something.
    pub domination_steps: usize,
    /// True when the closed form fell back to the LP backend.
    pub degenerate: bool,
    /// Whether the small engine handled this node.
    pub small_engine_used: bool,
    /// LP backend that ran, when one did.
    pub backend: Option<BackendKind>,
    /// Original row indices that survived reduction, ascending.
    pub row_index_map: Vec<usize>,
    /// Original column indices that survived reduction, ascending.
    pub col_index_map: Vec<usize>,
    /// Row-player action count before reduction.
    pub original_rows: usize,
    /// Column-player action count before reduction.
    pub original_cols: usize,
}

/// Solve one decision node's payoff matrix.
///
/// Matrix validity (rectangular, finite, non-empty) is established by
/// [`PayoffMatrix::from_rows`] before this point; reduction and expansion
/// are total from here on.
///
/// # Errors
/// [`SolveError::Configuration`] when `On` mode meets a matrix larger than
/// `small_max_dim`; backend errors propagate from the LP adapter.
pub fn solve(matrix: &PayoffMatrix, options: &SolveOptions) -> Result<SolveResult, SolveError> {
    let (rows, cols) = matrix.shape();
    let fits = matrix.max_dim() <= options.small_max_dim;

    let use_small = match options.engine_mode {
        EngineMode::Off => false,
        EngineMode::On => {
            if !fits {
                return Err(SolveError::Configuration(format!(
                    "small engine forced on but matrix dimension {} exceeds limit {}",
                    matrix.max_dim(),
                    options.small_max_dim
                )));
            }
            true
        }
        EngineMode::Auto => fits,
    };

    if !use_small {
        let lp = solve_lp(matrix, options.backend)?;
        return Ok(SolveResult {
            row_strategy: lp.row_strategy,
            col_strategy: lp.col_strategy,
            value: lp.value,
            method: Method::GeneralLp,
            reduced_shape: None,
            domination_steps: 0,
            degenerate: false,
            small_engine_used: false,
            backend: Some(lp.backend),
            row_index_map: (0..rows).collect(),
            col_index_map: (0..cols).collect(),
            original_rows: rows,
            original_cols: cols,
        });
    }

    let reduction = reduce(matrix);
    let small = solve_small(&reduction.matrix, options.backend)?;

    Ok(SolveResult {
        row_strategy: expand(&small.row_strategy, &reduction.kept_rows, rows),
        col_strategy: expand(&small.col_strategy, &reduction.kept_cols, cols),
        value: small.value,
        method: small.method,
        reduced_shape: Some(reduction.matrix.shape()),
        domination_steps: reduction.domination_steps,
        degenerate: small.degenerate,
        small_engine_used: true,
        backend: small.backend,
        row_index_map: reduction.kept_rows,
        col_index_map: reduction.kept_cols,
        original_rows: rows,
        original_cols: cols,
    })
}

/// Scatter a reduced-space strategy back onto the original index space.
/// Eliminated positions receive weight exactly 0.
fn expand(strategy: &[f64], kept: &[usize], original_len: usize) -> Vec<f64> {
    let mut full = vec![0.0; original_len];
    for (reduced_index, &original_index) in kept.iter().enumerate() {
        full[original_index] = strategy[reduced_index];
    }
    full
}
