//! # Policy Solver
//!
//! Offline solving and export pipeline for a heads-up card game abstracted
//! into a discrete decision tree. Each decision node resolves to a
//! two-player zero-sum payoff matrix; the pipeline computes a near-optimal
//! mixed strategy per node and exports node-keyed policy tables for the
//! runtime lookup service.
//!
//! ## Features
//!
//! - **Cheapest sound method per node**: closed-form algebra for 2x2 games,
//!   dominance/duplicate reduction for small games, and a general LP
//!   solver as the fallback
//! - **Dual LP backends**: native HiGHS (feature `highs`) with a portable
//!   simplex always compiled in
//! - **Complete exports**: eliminated actions are back-filled with explicit
//!   zero weight, so consumers always see the original action set
//! - **Deterministic artifacts**: stable tie-breaks, node-key ordering, and
//!   byte-identical re-runs apart from the generation timestamp
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────────────────┐     ┌──────────────┐
//! │ tree/buckets │     │       Solve Orchestrator      │     │   Policy     │
//! │ transitions  │ ──▶ │  reduce ─▶ small engine       │ ──▶ │   Exporter   │
//! │ leaf EV      │     │        └▶ LP backend adapter  │     │ (per street) │
//! └──────────────┘     └───────────────────────────────┘     └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`numerics`]: process-wide tolerance constants
//! - [`solver`]: reduction, small-game solving, LP backends, orchestration
//! - [`tree`]: input artifacts and the parallel batch solve
//! - [`export`]: policy records and street-scoped table files

#![warn(missing_docs)]

pub mod export;
pub mod numerics;
pub mod solver;
pub mod tree;

// Re-export commonly used types at crate root for convenience
pub use export::{ExportOptions, PolicyExportError, PolicyRecord, PolicyTable};
pub use solver::{
    solve, BackendKind, BackendPreference, EngineMode, Method, PayoffMatrix, SolveError,
    SolveOptions, SolveResult,
};
pub use tree::{solve_tree, LeafEvTable, Solution, TreeArtifact};
