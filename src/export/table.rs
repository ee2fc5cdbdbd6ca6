//! Street-scoped policy table files.
//!
//! The exporter partitions records into a preflop file and a postflop file,
//! each holding parallel arrays (`node_keys`, `actions`, `weights`,
//! `size_tags`) plus the full per-record metadata and one table-level
//! provenance block. Records are sorted by node key before writing, so a
//! re-run with identical inputs and seed is byte-identical apart from the
//! generation timestamp. Files land via temp-file + rename; a failed export
//! never leaves a partial table behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::tree::Solution;

use super::record::{build_record, PolicyRecord};
use super::PolicyExportError;

/// Table-level provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Generation time, unix seconds. Excluded from the byte-identical
    /// re-run contract.
    pub generated_at: u64,
    /// Backend identifier from the solve step.
    pub solver_backend: String,
    /// Seed the solve step ran with.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Content hash of the source decision tree.
    #[serde(default)]
    pub tree_hash: Option<String>,
    /// Street this file covers.
    pub street: String,
    /// Number of records in this file.
    pub node_count: usize,
    /// Path of the solution artifact this table was exported from.
    #[serde(default)]
    pub source_solution: Option<String>,
}

/// One street-scoped policy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    /// Table-level provenance.
    pub table_meta: TableMeta,
    /// Node keys, sorted ascending.
    pub node_keys: Vec<String>,
    /// Action names per node, aligned with `node_keys`.
    pub actions: Vec<Vec<String>>,
    /// Weights per node, aligned with `actions`.
    pub weights: Vec<Vec<f64>>,
    /// Sizing tags per node, aligned with `actions`.
    pub size_tags: Vec<Vec<Option<String>>>,
    /// Full per-record metadata, same order.
    pub meta: Vec<PolicyRecord>,
}

impl PolicyTable {
    fn from_records(records: Vec<PolicyRecord>, table_meta: TableMeta) -> Self {
        PolicyTable {
            node_keys: records.iter().map(|r| r.node_key.clone()).collect(),
            actions: records.iter().map(|r| r.actions.clone()).collect(),
            weights: records.iter().map(|r| r.weights.clone()).collect(),
            size_tags: records.iter().map(|r| r.size_tags.clone()).collect(),
            meta: records,
            table_meta,
        }
    }
}

/// Export configuration.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Output directory for the street files.
    pub out_dir: PathBuf,
    /// Write gzip-compressed files (`.json.gz`).
    pub compress: bool,
    /// Skip files that already exist.
    pub reuse: bool,
    /// Optional JSONL sample path for spot-checking.
    pub debug_jsonl: Option<PathBuf>,
}

impl ExportOptions {
    /// Options writing plain JSON into `out_dir`.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            compress: false,
            reuse: false,
            debug_jsonl: None,
        }
    }
}

/// What the export run produced, per street.
#[derive(Debug, Clone)]
pub struct StreetExport {
    /// Street name.
    pub street: String,
    /// File the table landed in.
    pub path: PathBuf,
    /// Records in the file.
    pub node_count: usize,
    /// True when `reuse` skipped the write.
    pub reused: bool,
}

/// Summary of one export run.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Per-street outcomes, preflop first.
    pub files: Vec<StreetExport>,
}

/// Number of records sampled into the debug JSONL file.
const DEBUG_SAMPLE_SIZE: usize = 10;

/// Build the street tables from a solution without touching the
/// filesystem. `generated_at` is injected so reproducibility is testable;
/// [`export_from_solution`] stamps the current time.
///
/// # Errors
/// Any malformed solution node fails the whole export.
pub fn build_tables(
    solution: &Solution,
    source_solution: Option<&Path>,
    generated_at: u64,
) -> Result<Vec<PolicyTable>, PolicyExportError> {
    let mut records = solution
        .nodes
        .iter()
        .enumerate()
        .map(|(index, node)| build_record(node, index))
        .collect::<Result<Vec<_>, PolicyExportError>>()?;
    records.sort_by(|a, b| a.node_key.cmp(&b.node_key));

    let (preflop, postflop): (Vec<PolicyRecord>, Vec<PolicyRecord>) = records
        .into_iter()
        .partition(|record| record.components.street.eq_ignore_ascii_case("preflop"));

    let table_meta = |street: &str, count: usize| TableMeta {
        generated_at,
        solver_backend: solution.meta.solver_backend.clone(),
        seed: solution.meta.seed,
        tree_hash: Some(solution.meta.tree_hash.clone()),
        street: street.to_string(),
        node_count: count,
        source_solution: source_solution.map(|p| p.display().to_string()),
    };

    let preflop_meta = table_meta("preflop", preflop.len());
    let postflop_meta = table_meta("postflop", postflop.len());
    Ok(vec![
        PolicyTable::from_records(preflop, preflop_meta),
        PolicyTable::from_records(postflop, postflop_meta),
    ])
}

/// Export a solution into street-scoped policy table files.
///
/// # Errors
/// Malformed records and filesystem failures abort the run; nothing is
/// partially written thanks to the temp-file + rename protocol.
pub fn export_from_solution(
    solution: &Solution,
    source_solution: Option<&Path>,
    options: &ExportOptions,
) -> Result<ExportSummary, PolicyExportError> {
    let tables = build_tables(solution, source_solution, unix_timestamp())?;

    fs::create_dir_all(&options.out_dir).map_err(|e| PolicyExportError::Write {
        path: options.out_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::with_capacity(tables.len());
    for table in &tables {
        let street = table.table_meta.street.clone();
        let file_name = if options.compress {
            format!("{}.json.gz", street)
        } else {
            format!("{}.json", street)
        };
        let path = options.out_dir.join(file_name);

        let reused = options.reuse && path.exists();
        if !reused {
            write_table(&path, table, options.compress)?;
            log::info!(
                "wrote {} policy record(s) for {} to {}",
                table.node_keys.len(),
                street,
                path.display()
            );
        } else {
            log::info!("reusing existing table {}", path.display());
        }

        if street == "postflop" && !reused {
            if let Some(jsonl_path) = &options.debug_jsonl {
                write_debug_jsonl(jsonl_path, table)?;
            }
        }

        files.push(StreetExport {
            street,
            path,
            node_count: table.node_keys.len(),
            reused,
        });
    }

    Ok(ExportSummary { files })
}

fn write_table(path: &Path, table: &PolicyTable, compress: bool) -> Result<(), PolicyExportError> {
    let json = serde_json::to_string_pretty(table).map_err(|e| PolicyExportError::Write {
        path: path.display().to_string(),
        reason: format!("serialization failed: {}", e),
    })?;

    let tmp = path.with_extension("tmp");
    let write_result = if compress {
        fs::File::create(&tmp).and_then(|file| {
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish().map(|_| ())
        })
    } else {
        fs::write(&tmp, json.as_bytes())
    };
    write_result.map_err(|e| PolicyExportError::Write {
        path: tmp.display().to_string(),
        reason: e.to_string(),
    })?;

    fs::rename(&tmp, path).map_err(|e| PolicyExportError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write_debug_jsonl(path: &Path, table: &PolicyTable) -> Result<(), PolicyExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PolicyExportError::Write {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }
    }
    let mut lines = Vec::with_capacity(DEBUG_SAMPLE_SIZE + 1);
    let header = serde_json::json!({ "table_meta": table.table_meta });
    lines.push(header.to_string());
    for record in table.meta.iter().take(DEBUG_SAMPLE_SIZE) {
        lines.push(
            serde_json::to_string(record).map_err(|e| PolicyExportError::Write {
                path: path.display().to_string(),
                reason: format!("serialization failed: {}", e),
            })?,
        );
    }
    fs::write(path, lines.join("\n") + "\n").map_err(|e| PolicyExportError::Write {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn unix_timestamp() -> u64 {
    // Seconds since the epoch; enough provenance without a date dependency.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
