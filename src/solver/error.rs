//! Error types for the matrix-game solver.
//!
//! The taxonomy separates caller mistakes (`Configuration`), malformed
//! inputs (`InvalidInput`), missing numerical backends
//! (`DependencyUnavailable`), and linear programs with no solution
//! (`Infeasible`). Backend fallback is handled inside the adapter; every
//! other error propagates to the CLI boundary.

use std::fmt;

/// Errors produced by matrix validation, orchestration, and LP backends.
#[derive(Debug, Clone)]
pub enum SolveError {
    /// The caller requested an engine mode or threshold combination that
    /// cannot be honored (e.g. forcing the small engine onto an oversized
    /// matrix).
    Configuration(String),

    /// Malformed payoff matrix or tree artifact: non-rectangular data,
    /// NaN/infinite entries, zero actions for a player, or a reference to a
    /// node or leaf that does not exist.
    InvalidInput(String),

    /// The requested numerical backend is missing or failed to initialize,
    /// and no fallback could take over.
    DependencyUnavailable {
        /// Name of the backend that was unavailable.
        backend: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// The linear program has no solution. A well-formed zero-sum payoff
    /// matrix should never trigger this; its presence indicates an upstream
    /// data bug.
    Infeasible {
        /// Backend that reported infeasibility.
        backend: &'static str,
        /// Shape of the matrix that was being solved.
        rows: usize,
        /// Shape of the matrix that was being solved.
        cols: usize,
        /// Backend-specific status message.
        message: String,
    },
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            SolveError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            SolveError::DependencyUnavailable { backend, reason } => {
                write!(f, "backend '{}' unavailable: {}", backend, reason)
            }
            SolveError::Infeasible {
                backend,
                rows,
                cols,
                message,
            } => write!(
                f,
                "linear program infeasible on {}x{} matrix (backend '{}'): {}",
                rows, cols, backend, message
            ),
        }
    }
}

impl std::error::Error for SolveError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_shape_and_backend() {
        let err = SolveError::Infeasible {
            backend: "linprog",
            rows: 3,
            cols: 4,
            message: "no pivot".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("3x4"));
        assert!(text.contains("linprog"));
    }

    #[test]
    fn test_display_configuration() {
        let err = SolveError::Configuration("small engine forced on 7x2 matrix".to_string());
        assert!(err.to_string().starts_with("configuration error"));
    }
}
