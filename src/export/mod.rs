//! Policy export.
//!
//! Serializes solve-step results into node-keyed policy tables for the
//! runtime lookup service: per-street files of parallel arrays plus audit
//! metadata, with every record enumerating the full original action set
//! (eliminated actions carry explicit zero weight). Export is all-or-
//! nothing — one malformed record fails the run, because an incomplete
//! table would break the completeness contract the consumer relies on.

use std::fmt;

pub mod record;
pub mod table;

// Re-export main types for convenient access
pub use record::{build_record, NodeKeyComponents, PolicyRecord, RecordMeta};
pub use table::{
    build_tables, export_from_solution, ExportOptions, ExportSummary, PolicyTable, StreetExport,
    TableMeta,
};

/// Errors raised by the policy export pipeline.
#[derive(Debug, Clone)]
pub enum PolicyExportError {
    /// A solution node could not be turned into a valid record.
    MalformedRecord {
        /// Position of the node in the solution.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },
    /// Reading the solution artifact failed.
    Read {
        /// Offending path.
        path: String,
        /// Underlying failure.
        reason: String,
    },
    /// Writing a table or sample file failed.
    Write {
        /// Offending path.
        path: String,
        /// Underlying failure.
        reason: String,
    },
}

impl fmt::Display for PolicyExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyExportError::MalformedRecord { index, reason } => {
                write!(f, "malformed solution node #{}: {}", index, reason)
            }
            PolicyExportError::Read { path, reason } => {
                write!(f, "failed to read {}: {}", path, reason)
            }
            PolicyExportError::Write { path, reason } => {
                write!(f, "failed to write {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for PolicyExportError {}
