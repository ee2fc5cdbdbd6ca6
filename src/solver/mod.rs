//! Zero-sum matrix-game solving.
//!
//! # Overview
//!
//! Each decision node of the abstracted game tree resolves to a payoff
//! matrix; this module turns such a matrix into a mixed strategy for both
//! players plus the game value, using the cheapest sound method available:
//!
//! 1. **Reduction** ([`reducer`]): strip weakly-dominated and duplicate
//!    rows/columns, keeping a reversible index map.
//! 2. **Small engine** ([`small`]): closed forms for 1x1, 1xN, Nx1 and 2x2
//!    matrices; anything else under the size threshold goes to the LP
//!    backend in reduced form.
//! 3. **General LP** ([`lp`]): a native HiGHS backend (feature-gated) with
//!    a portable simplex fallback, behind one interface.
//!
//! The [`orchestrator`] picks the path per node and expands reduced-space
//! strategies back to the original action set, so every eliminated action
//! shows up downstream with weight exactly zero.

pub mod error;
pub mod lp;
pub mod matrix;
pub mod orchestrator;
pub mod reducer;
pub mod small;

// Re-export main types for convenient access
pub use error::SolveError;
pub use lp::{highs_available, solve_lp, BackendKind, BackendPreference, LpSolution};
pub use matrix::PayoffMatrix;
pub use orchestrator::{solve, EngineMode, SolveOptions, SolveResult, DEFAULT_SMALL_MAX_DIM};
pub use reducer::{reduce, ReductionResult};
pub use small::{solve_small, Method, SmallGameSolution};
