//! Decision-tree artifacts and the batch solve over them.
//!
//! The tree, bucket, transition, and leaf-EV artifacts are produced by
//! external builder tools; this module consumes them. A tree is a list of
//! nodes: hero decision nodes whose actions lead to villain response nodes,
//! which in turn reference leaf-EV entries. Each hero node resolves to one
//! payoff matrix (rows = hero actions, columns = villain responses), solved
//! independently — nodes share nothing, so the batch runs on a rayon pool
//! and only the result collection is ordered.
//!
//! The solution artifact keeps, per node, the solved action weights plus
//! the audit trail (method, reduction maps, backend) the exporter needs to
//! back-fill eliminated actions with explicit zeros.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::numerics::normalize;
use crate::solver::error::SolveError;
use crate::solver::lp::BackendKind;
use crate::solver::matrix::{PayoffMatrix, MAX_PAYOFF};
use crate::solver::orchestrator::{solve, SolveOptions, SolveResult};
use crate::solver::small::Method;

// ---------------------------------------------------------------------------
// Input artifacts
// ---------------------------------------------------------------------------

/// Parsed decision-tree artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeArtifact {
    /// Root node id; defaults to the first node when absent.
    #[serde(default)]
    pub root: Option<String>,
    /// All nodes, hero and villain alike.
    pub nodes: Vec<TreeNode>,
    /// Pre-weighted records passed through to the solution unchanged
    /// (upstream rule-derived policies that need no solving).
    #[serde(default)]
    pub policy_nodes: Vec<PolicySpec>,
}

/// One node of the decision tree.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    /// Node id.
    #[serde(default)]
    pub id: Option<String>,
    /// Legacy spelling of the node id emitted by older tree builders.
    #[serde(default, rename = "node_id")]
    pub legacy_id: Option<String>,
    /// Acting player: "hero" or "villain".
    #[serde(default)]
    pub player: Option<String>,
    /// Street label; "terminal" marks a leaf node.
    #[serde(default)]
    pub street: Option<String>,
    /// Outgoing actions.
    #[serde(default)]
    pub actions: Vec<TreeAction>,
    /// Policy metadata attached to hero decision nodes.
    #[serde(default)]
    pub policy: Option<PolicySpec>,
}

impl TreeNode {
    /// Effective node id, accepting the legacy field.
    pub fn node_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.legacy_id.as_deref())
    }
}

/// One action edge out of a tree node.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeAction {
    /// Action name.
    pub name: String,
    /// Optional sizing tag (e.g. "33", "2.5x").
    #[serde(default)]
    pub size_tag: Option<String>,
    /// Id of the responding node (hero actions).
    #[serde(default)]
    pub next: Option<String>,
    /// Leaf-EV reference (villain actions).
    #[serde(default)]
    pub leaf: Option<Value>,
    /// Alternate leaf-EV reference spelling.
    #[serde(default)]
    pub terminal: Option<Value>,
}

impl TreeAction {
    fn leaf_id(&self) -> Option<String> {
        self.leaf
            .as_ref()
            .or(self.terminal.as_ref())
            .map(value_to_key)
    }
}

/// Policy metadata block: node key, its components, and the exported action
/// list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySpec {
    /// Composite node key.
    pub node_key: String,
    /// Street component.
    #[serde(default)]
    pub street: Option<String>,
    /// Pot-type component.
    #[serde(default)]
    pub pot_type: Option<String>,
    /// Role component.
    #[serde(default)]
    pub role: Option<String>,
    /// Position component.
    #[serde(default)]
    pub pos: Option<String>,
    /// Board-texture component.
    #[serde(default)]
    pub texture: Option<String>,
    /// Stack-to-pot component.
    #[serde(default)]
    pub spr: Option<String>,
    /// Facing-size component; absent means the "no bet" sentinel.
    #[serde(default)]
    pub facing: Option<String>,
    /// Hand bucket or class.
    #[serde(default)]
    pub bucket: Option<Value>,
    /// Action descriptors with optional preset weights.
    #[serde(default)]
    pub actions: Vec<PolicyActionSpec>,
}

/// One action descriptor inside a policy block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyActionSpec {
    /// Action name.
    pub action: String,
    /// Optional sizing tag.
    #[serde(default)]
    pub size_tag: Option<String>,
    /// Preset weight (passthrough records).
    #[serde(default)]
    pub weight: Option<f64>,
}

fn value_to_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Leaf EV table
// ---------------------------------------------------------------------------

/// Leaf-EV lookup table keyed by leaf id or (hero, villain) action pair.
#[derive(Debug, Clone, Default)]
pub struct LeafEvTable {
    by_id: FxHashMap<String, f64>,
    by_pair: FxHashMap<(String, String), f64>,
}

impl LeafEvTable {
    /// Build the table from a JSON mapping. Keys containing `|`, `,` or
    /// `->` are treated as (hero action, villain action) pairs, a JSON-side
    /// convenience where tuple keys cannot be expressed.
    pub fn from_value(value: &Value) -> Result<Self, SolveError> {
        let map = value.as_object().ok_or_else(|| {
            SolveError::InvalidInput("leaf EV artifact must be a JSON object".to_string())
        })?;
        let mut table = LeafEvTable::default();
        for (key, raw) in map {
            let ev = raw.as_f64().ok_or_else(|| {
                SolveError::InvalidInput(format!(
                    "leaf EV for '{}' is not numeric: {}",
                    key, raw
                ))
            })?;
            if !ev.is_finite() || ev.abs() > MAX_PAYOFF {
                return Err(SolveError::InvalidInput(format!(
                    "leaf EV for '{}' is not a finite bounded payoff: {}",
                    key, ev
                )));
            }
            if let Some(pair) = split_pair_key(key) {
                table.by_pair.insert(pair, ev);
            } else {
                table.by_id.insert(key.clone(), ev);
            }
        }
        Ok(table)
    }

    /// Resolve a payoff cell: leaf id first, then the action pair, then the
    /// fixed terminal sentinels.
    pub fn lookup(
        &self,
        leaf_id: Option<&str>,
        hero_action: &str,
        villain_action: &str,
    ) -> Result<f64, SolveError> {
        if let Some(id) = leaf_id {
            if let Some(&ev) = self.by_id.get(id) {
                return Ok(ev);
            }
        }
        let pair = (hero_action.to_string(), villain_action.to_string());
        if let Some(&ev) = self.by_pair.get(&pair) {
            return Ok(ev);
        }
        if let Some(id) = leaf_id {
            if let Some(ev) = terminal_payoff(id) {
                return Ok(ev);
            }
        }
        Err(SolveError::InvalidInput(format!(
            "missing payoff for leaf {:?} (hero={}, villain={})",
            leaf_id, hero_action, villain_action
        )))
    }
}

fn split_pair_key(key: &str) -> Option<(String, String)> {
    for separator in ["|", "->", ","] {
        if let Some((a, b)) = key.split_once(separator) {
            return Some((a.trim().to_string(), b.trim().to_string()));
        }
    }
    None
}

/// Fixed payoffs for terminal sentinel nodes, in chips on a 100-chip stack.
fn terminal_payoff(leaf_id: &str) -> Option<f64> {
    match leaf_id {
        "terminal_fold_pre" => Some(-50.0),
        "terminal_win_pre" => Some(50.0),
        "terminal_fold_post" => Some(-100.0),
        "terminal_showdown" | "terminal_allin" => Some(0.0),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Matrix-game construction
// ---------------------------------------------------------------------------

/// Hero action label with its sizing tag.
#[derive(Debug, Clone)]
pub struct ActionLabel {
    /// Action name.
    pub name: String,
    /// Optional sizing tag.
    pub size_tag: Option<String>,
}

/// One hero decision node resolved into a payoff matrix.
#[derive(Debug, Clone)]
pub struct MatrixGame {
    /// Tree node id.
    pub node_id: String,
    /// Whether this is the tree's root node.
    pub is_root: bool,
    /// Policy metadata, when the node carries one.
    pub policy: Option<PolicySpec>,
    /// Hero action labels, matrix row order.
    pub hero_actions: Vec<ActionLabel>,
    /// Villain action names, matrix column order.
    pub villain_actions: Vec<String>,
    /// The payoff matrix.
    pub payoff: PayoffMatrix,
}

/// Resolve every hero decision node of the tree into a matrix game.
///
/// The root node must belong to hero. Every hero node with a `policy`
/// block is included; the root is included regardless so the run always
/// has a top-level value.
///
/// # Errors
/// [`SolveError::InvalidInput`] for duplicate or missing node ids, villain
/// nodes without actions, villain action order disagreeing across hero
/// branches, or unresolvable payoffs, each naming the offending id.
pub fn build_matrix_games(
    tree: &TreeArtifact,
    leaf_ev: &LeafEvTable,
) -> Result<Vec<MatrixGame>, SolveError> {
    if tree.nodes.is_empty() {
        return Err(SolveError::InvalidInput(
            "tree must define at least one node".to_string(),
        ));
    }

    let mut node_map: FxHashMap<&str, &TreeNode> = FxHashMap::default();
    for node in &tree.nodes {
        let id = node.node_id().ok_or_else(|| {
            SolveError::InvalidInput("each tree node must include a string id".to_string())
        })?;
        if node_map.insert(id, node).is_some() {
            return Err(SolveError::InvalidInput(format!(
                "duplicate node id detected: {}",
                id
            )));
        }
    }

    let root_id = tree
        .root
        .as_deref()
        .or_else(|| tree.nodes[0].node_id())
        .ok_or_else(|| SolveError::InvalidInput("tree must define a root node id".to_string()))?;
    let root = *node_map.get(root_id).ok_or_else(|| {
        SolveError::InvalidInput(format!("root node '{}' missing from nodes list", root_id))
    })?;
    if !is_hero(root) {
        return Err(SolveError::InvalidInput(
            "root node must belong to the hero player".to_string(),
        ));
    }

    let mut games = Vec::new();
    for node in &tree.nodes {
        let id = node.node_id().unwrap_or_default();
        let is_root = id == root_id;
        if !is_hero(node) || (!is_root && node.policy.is_none()) {
            continue;
        }
        games.push(build_one_game(node, id, is_root, &node_map, leaf_ev)?);
    }
    Ok(games)
}

fn is_hero(node: &TreeNode) -> bool {
    node.player
        .as_deref()
        .unwrap_or("hero")
        .eq_ignore_ascii_case("hero")
}

fn build_one_game(
    node: &TreeNode,
    id: &str,
    is_root: bool,
    node_map: &FxHashMap<&str, &TreeNode>,
    leaf_ev: &LeafEvTable,
) -> Result<MatrixGame, SolveError> {
    if node.actions.is_empty() {
        return Err(SolveError::InvalidInput(format!(
            "hero node '{}' requires at least one action",
            id
        )));
    }

    let mut hero_actions = Vec::with_capacity(node.actions.len());
    let mut villain_actions: Option<Vec<String>> = None;
    let mut rows = Vec::with_capacity(node.actions.len());

    for hero_action in &node.actions {
        let next_id = hero_action.next.as_deref().ok_or_else(|| {
            SolveError::InvalidInput(format!(
                "hero action '{}' in node '{}' missing next villain node",
                hero_action.name, id
            ))
        })?;
        let villain_node = *node_map.get(next_id).ok_or_else(|| {
            SolveError::InvalidInput(format!(
                "hero action '{}' references missing node '{}'",
                hero_action.name, next_id
            ))
        })?;

        let (row, names) = if villain_node.street.as_deref() == Some("terminal") {
            // Terminal response node: a single fixed-payoff column.
            let payoff = leaf_ev.lookup(Some(next_id), &hero_action.name, "terminal")?;
            (vec![payoff], vec!["terminal".to_string()])
        } else {
            if villain_node.actions.is_empty() {
                return Err(SolveError::InvalidInput(format!(
                    "villain node '{}' must include actions",
                    next_id
                )));
            }
            let mut row = Vec::with_capacity(villain_node.actions.len());
            let mut names = Vec::with_capacity(villain_node.actions.len());
            for villain_action in &villain_node.actions {
                let leaf_id = villain_action.leaf_id();
                let payoff = leaf_ev.lookup(
                    leaf_id.as_deref(),
                    &hero_action.name,
                    &villain_action.name,
                )?;
                row.push(payoff);
                names.push(villain_action.name.clone());
            }
            (row, names)
        };

        match &villain_actions {
            None => villain_actions = Some(names),
            Some(existing) => {
                if *existing != names {
                    return Err(SolveError::InvalidInput(format!(
                        "villain action order mismatch across hero branches in node '{}'",
                        id
                    )));
                }
            }
        }
        rows.push(row);
        hero_actions.push(ActionLabel {
            name: hero_action.name.clone(),
            size_tag: hero_action.size_tag.clone(),
        });
    }

    Ok(MatrixGame {
        node_id: id.to_string(),
        is_root,
        policy: node.policy.clone(),
        hero_actions,
        villain_actions: villain_actions.unwrap_or_default(),
        payoff: PayoffMatrix::from_rows(rows)?,
    })
}

// ---------------------------------------------------------------------------
// Solution artifact
// ---------------------------------------------------------------------------

/// Audit metadata attached to each solved node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAudit {
    /// Solve method.
    pub method: Method,
    /// Closed-form fallback flag.
    pub degenerate: bool,
    /// Whether the small engine ran.
    pub small_engine_used: bool,
    /// LP backend used, when one was.
    #[serde(default)]
    pub backend: Option<BackendKind>,
    /// Node game value.
    pub value: f64,
    /// Shape after reduction, when reduction was applied.
    #[serde(default)]
    pub reduced_shape: Option<(usize, usize)>,
    /// Reduction passes that eliminated something.
    pub domination_steps: usize,
    /// Original hero action indices that survived reduction.
    pub original_index_map: Vec<usize>,
    /// Hero action count before reduction.
    pub original_action_count_pre_reduction: usize,
}

impl NodeAudit {
    fn from_result(result: &SolveResult) -> Self {
        Self {
            method: result.method,
            degenerate: result.degenerate,
            small_engine_used: result.small_engine_used,
            backend: result.backend,
            value: result.value,
            reduced_shape: result.reduced_shape,
            domination_steps: result.domination_steps,
            original_index_map: result.row_index_map.clone(),
            original_action_count_pre_reduction: result.original_rows,
        }
    }
}

/// One solved action with its final weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolvedAction {
    /// Action name.
    pub action: String,
    /// Optional sizing tag.
    #[serde(default)]
    pub size_tag: Option<String>,
    /// Equilibrium weight.
    pub weight: f64,
}

/// One node of the solution artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionNode {
    /// Composite node key.
    pub node_key: String,
    /// Street component.
    #[serde(default)]
    pub street: Option<String>,
    /// Pot-type component.
    #[serde(default)]
    pub pot_type: Option<String>,
    /// Role component.
    #[serde(default)]
    pub role: Option<String>,
    /// Position component.
    #[serde(default)]
    pub pos: Option<String>,
    /// Board-texture component.
    #[serde(default)]
    pub texture: Option<String>,
    /// Stack-to-pot component.
    #[serde(default)]
    pub spr: Option<String>,
    /// Facing-size component.
    #[serde(default)]
    pub facing: Option<String>,
    /// Hand bucket.
    #[serde(default)]
    pub bucket: Option<Value>,
    /// Actions with final weights, original matrix order.
    pub actions: Vec<SolvedAction>,
    /// Audit metadata; absent for passthrough records.
    #[serde(default)]
    pub meta: Option<NodeAudit>,
}

/// Run-level solution metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionMeta {
    /// Backend identifier mirrored from the top-level field.
    pub solver_backend: String,
    /// Seed the run was invoked with.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Content hash of the input tree.
    pub tree_hash: String,
    /// Number of policy nodes in the solution.
    pub node_count: usize,
    /// Root node game value.
    pub lp_value: f64,
    /// Non-fatal diagnostics accumulated during the run.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Complete solve-step output, consumed by the exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// "small" when the root used the small engine, else the LP backend
    /// name.
    pub backend: String,
    /// Root node game value.
    pub value: f64,
    /// Root hero strategy by action name.
    pub strategy: BTreeMap<String, f64>,
    /// Root villain strategy by action name.
    pub dual_prices: BTreeMap<String, f64>,
    /// Per-node policy records.
    pub nodes: Vec<SolutionNode>,
    /// Run metadata.
    pub meta: SolutionMeta,
}

/// Solve every decision node of a tree and assemble the solution artifact.
///
/// `on_node` is invoked with each node id as it finishes, regardless of
/// worker scheduling; pass `|_| {}` when no progress reporting is wanted.
///
/// # Errors
/// Any node failing to validate or solve aborts the whole run — a partial
/// solution is never produced.
pub fn solve_tree<F>(
    tree: &TreeArtifact,
    tree_raw: &Value,
    buckets: &Value,
    transitions: &Value,
    leaf_ev: &LeafEvTable,
    options: &SolveOptions,
    on_node: F,
) -> Result<Solution, SolveError>
where
    F: Fn(&str) + Sync,
{
    ensure_object(buckets, "buckets")?;
    ensure_object(transitions, "transitions")?;

    let games = build_matrix_games(tree, leaf_ev)?;
    log::info!("solving {} decision node(s)", games.len());

    let results: Vec<SolveResult> = games
        .par_iter()
        .map(|game| {
            let result = solve(&game.payoff, options);
            on_node(&game.node_id);
            result
        })
        .collect::<Result<Vec<_>, SolveError>>()?;

    let mut nodes = Vec::new();
    let mut root: Option<(&MatrixGame, &SolveResult)> = None;
    for (game, result) in games.iter().zip(results.iter()) {
        if game.is_root {
            root = Some((game, result));
        }
        if let Some(policy) = &game.policy {
            nodes.push(solved_node(game, policy, result));
        }
    }
    let (root_game, root_result) = root.ok_or_else(|| {
        SolveError::InvalidInput("tree produced no root decision node".to_string())
    })?;

    for spec in &tree.policy_nodes {
        nodes.push(passthrough_node(spec));
    }

    let backend = if root_result.small_engine_used {
        "small".to_string()
    } else {
        root_result
            .backend
            .map(|b| b.as_str().to_string())
            .unwrap_or_else(|| "small".to_string())
    };

    let strategy: BTreeMap<String, f64> = root_game
        .hero_actions
        .iter()
        .zip(root_result.row_strategy.iter())
        .map(|(label, &weight)| (label.name.clone(), weight))
        .collect();
    let dual_prices: BTreeMap<String, f64> = root_game
        .villain_actions
        .iter()
        .zip(root_result.col_strategy.iter())
        .map(|(name, &weight)| (name.clone(), weight))
        .collect();

    let meta = SolutionMeta {
        solver_backend: backend.clone(),
        seed: options.seed,
        tree_hash: compute_tree_hash(tree_raw),
        node_count: nodes.len(),
        lp_value: root_result.value,
        warnings: Vec::new(),
    };

    Ok(Solution {
        backend,
        value: root_result.value,
        strategy,
        dual_prices,
        nodes,
        meta,
    })
}

fn solved_node(game: &MatrixGame, policy: &PolicySpec, result: &SolveResult) -> SolutionNode {
    // Exported actions follow the matrix row order, so the audit index maps
    // stay valid; sizing tags fall back to the policy block when the tree
    // edge carries none.
    let actions = game
        .hero_actions
        .iter()
        .zip(result.row_strategy.iter())
        .map(|(label, &weight)| SolvedAction {
            action: label.name.clone(),
            size_tag: label.size_tag.clone().or_else(|| {
                policy
                    .actions
                    .iter()
                    .find(|spec| spec.action == label.name)
                    .and_then(|spec| spec.size_tag.clone())
            }),
            weight,
        })
        .collect();

    SolutionNode {
        node_key: policy.node_key.clone(),
        street: policy.street.clone(),
        pot_type: policy.pot_type.clone(),
        role: policy.role.clone(),
        pos: policy.pos.clone(),
        texture: policy.texture.clone(),
        spr: policy.spr.clone(),
        facing: policy.facing.clone(),
        bucket: policy.bucket.clone(),
        actions,
        meta: Some(NodeAudit::from_result(result)),
    }
}

fn passthrough_node(spec: &PolicySpec) -> SolutionNode {
    let raw: Vec<f64> = spec
        .actions
        .iter()
        .map(|action| action.weight.unwrap_or(0.0).max(0.0))
        .collect();
    let weights = normalize(&raw);
    let actions = spec
        .actions
        .iter()
        .zip(weights.iter())
        .map(|(action, &weight)| SolvedAction {
            action: action.action.clone(),
            size_tag: action.size_tag.clone(),
            weight,
        })
        .collect();

    SolutionNode {
        node_key: spec.node_key.clone(),
        street: spec.street.clone(),
        pot_type: spec.pot_type.clone(),
        role: spec.role.clone(),
        pos: spec.pos.clone(),
        texture: spec.texture.clone(),
        spr: spec.spr.clone(),
        facing: spec.facing.clone(),
        bucket: spec.bucket.clone(),
        actions,
        meta: None,
    }
}

fn ensure_object(value: &Value, label: &str) -> Result<(), SolveError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(SolveError::InvalidInput(format!(
            "{} artifact must be a JSON object",
            label
        )))
    }
}

// ---------------------------------------------------------------------------
// Loading and hashing
// ---------------------------------------------------------------------------

/// Parse a JSON file, reporting the path on failure.
pub fn load_json(path: &Path) -> Result<Value, SolveError> {
    let text = fs::read_to_string(path).map_err(|e| {
        SolveError::InvalidInput(format!("failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        SolveError::InvalidInput(format!("failed to parse JSON from {}: {}", path.display(), e))
    })
}

/// Load the tree artifact, returning both the typed form and the raw value
/// used for content hashing.
pub fn load_tree(path: &Path) -> Result<(TreeArtifact, Value), SolveError> {
    let raw = load_json(path)?;
    let tree: TreeArtifact = serde_json::from_value(raw.clone()).map_err(|e| {
        SolveError::InvalidInput(format!("malformed tree artifact {}: {}", path.display(), e))
    })?;
    Ok((tree, raw))
}

/// Load a bucket/transition artifact: a JSON object file, or a directory of
/// `*.json` files merged under their file stems.
pub fn load_mapping(path: &Path, label: &str) -> Result<Value, SolveError> {
    if path.is_dir() {
        let mut entries: Vec<(String, Value)> = Vec::new();
        let dir = fs::read_dir(path).map_err(|e| {
            SolveError::InvalidInput(format!("failed to list {}: {}", path.display(), e))
        })?;
        for entry in dir.flatten() {
            let child = entry.path();
            if child.extension().and_then(|e| e.to_str()) == Some("json") && child.is_file() {
                let stem = child
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                entries.push((stem, load_json(&child)?));
            }
        }
        if entries.is_empty() {
            return Err(SolveError::InvalidInput(format!(
                "directory {} does not contain any JSON files",
                path.display()
            )));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        return Ok(Value::Object(entries.into_iter().collect()));
    }
    let value = load_json(path)?;
    if !value.is_object() {
        return Err(SolveError::InvalidInput(format!(
            "{} artifact {} must be a JSON object",
            label,
            path.display()
        )));
    }
    Ok(value)
}

/// Load the leaf-EV artifact.
pub fn load_leaf_ev(path: &Path) -> Result<LeafEvTable, SolveError> {
    let value = load_json(path)?;
    LeafEvTable::from_value(&value)
}

/// Content hash of the tree: Sha256 over canonical (key-sorted) JSON,
/// truncated to 16 hex characters. Stable across key ordering in the
/// source file.
pub fn compute_tree_hash(tree: &Value) -> String {
    // serde_json objects are BTreeMap-backed, so serialization is already
    // key-sorted and canonical.
    let canonical = serde_json::to_string(tree).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Serialize the solution to pretty JSON and write it atomically
/// (temp file + rename), so a failed run never leaves a partial artifact.
pub fn write_solution(path: &Path, solution: &Solution) -> Result<(), SolveError> {
    let json = serde_json::to_string_pretty(solution).map_err(|e| {
        SolveError::InvalidInput(format!("failed to serialize solution: {}", e))
    })?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                SolveError::InvalidInput(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        SolveError::InvalidInput(format!("failed to write {}: {}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        SolveError::InvalidInput(format!("failed to move solution into {}: {}", path.display(), e))
    })
}

/// Parse a solution artifact back from disk (export step input).
pub fn load_solution(path: &Path) -> Result<Solution, SolveError> {
    let raw = load_json(path)?;
    serde_json::from_value(raw).map_err(|e| {
        SolveError::InvalidInput(format!(
            "malformed solution artifact {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::lp::BackendPreference;
    use serde_json::json;

    fn toy_tree_value() -> Value {
        json!({
            "root": "hero_root",
            "nodes": [
                {
                    "id": "hero_root",
                    "player": "hero",
                    "actions": [
                        {"name": "bet", "size_tag": "2.5x", "next": "villain_after_bet"},
                        {"name": "check", "next": "villain_after_check"}
                    ],
                    "policy": {
                        "node_key": "preflop/single_raised/role:pfr/ip/texture:na/spr:mid/facing:na/bucket:0",
                        "street": "preflop",
                        "pot_type": "single_raised",
                        "role": "pfr",
                        "pos": "ip",
                        "texture": "na",
                        "spr": "mid",
                        "bucket": 0,
                        "actions": [
                            {"action": "bet", "size_tag": "2.5x"},
                            {"action": "check"}
                        ]
                    }
                },
                {
                    "id": "villain_after_bet",
                    "player": "villain",
                    "actions": [
                        {"name": "fold", "leaf": "leaf_bet_fold"},
                        {"name": "call", "leaf": "leaf_bet_call"}
                    ]
                },
                {
                    "id": "villain_after_check",
                    "player": "villain",
                    "actions": [
                        {"name": "fold", "leaf": "leaf_check_fold"},
                        {"name": "call", "leaf": "leaf_check_call"}
                    ]
                }
            ],
            "policy_nodes": [
                {
                    "node_key": "flop/single_raised/role:caller/oop/texture:dry/spr:mid/facing:na/bucket:4",
                    "street": "flop",
                    "pot_type": "single_raised",
                    "role": "caller",
                    "pos": "oop",
                    "texture": "dry",
                    "spr": "mid",
                    "bucket": 4,
                    "actions": [
                        {"action": "bet", "size_tag": "33", "weight": 0.0},
                        {"action": "check", "weight": 1.0}
                    ]
                },
                {
                    "node_key": "turn/single_raised/role:pfr/ip/texture:semi/spr:low/facing:na/bucket:2",
                    "street": "turn",
                    "pot_type": "single_raised",
                    "role": "pfr",
                    "pos": "ip",
                    "texture": "semi",
                    "spr": "low",
                    "bucket": 2,
                    "actions": [
                        {"action": "bet", "size_tag": "75", "weight": 0.4},
                        {"action": "check", "weight": 0.6}
                    ]
                }
            ]
        })
    }

    fn toy_leaf_ev() -> LeafEvTable {
        LeafEvTable::from_value(&json!({
            "leaf_bet_fold": 0.2,
            "leaf_bet_call": -0.1,
            "leaf_check_fold": 0.0,
            "leaf_check_call": 0.05
        }))
        .unwrap()
    }

    fn toy_tree() -> (TreeArtifact, Value) {
        let raw = toy_tree_value();
        let tree: TreeArtifact = serde_json::from_value(raw.clone()).unwrap();
        (tree, raw)
    }

    #[test]
    fn test_build_matrix_game_from_toy_tree() {
        let (tree, _) = toy_tree();
        let games = build_matrix_games(&tree, &toy_leaf_ev()).unwrap();
        assert_eq!(games.len(), 1);
        let game = &games[0];
        assert!(game.is_root);
        assert_eq!(game.payoff.shape(), (2, 2));
        assert_eq!(game.payoff.get(0, 0), 0.2);
        assert_eq!(game.payoff.get(1, 1), 0.05);
        assert_eq!(game.villain_actions, vec!["fold", "call"]);
        assert_eq!(game.hero_actions[0].size_tag.as_deref(), Some("2.5x"));
    }

    #[test]
    fn test_missing_villain_node_is_diagnostic() {
        let mut raw = toy_tree_value();
        raw["nodes"][0]["actions"][1]["next"] = json!("villain_after_missing");
        let tree: TreeArtifact = serde_json::from_value(raw).unwrap();
        let err = build_matrix_games(&tree, &toy_leaf_ev()).unwrap_err();
        assert!(err.to_string().contains("villain_after_missing"));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_villain_order_mismatch_is_rejected() {
        let mut raw = toy_tree_value();
        raw["nodes"][2]["actions"] = json!([
            {"name": "call", "leaf": "leaf_check_call"},
            {"name": "fold", "leaf": "leaf_check_fold"}
        ]);
        let tree: TreeArtifact = serde_json::from_value(raw).unwrap();
        let err = build_matrix_games(&tree, &toy_leaf_ev()).unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let mut raw = toy_tree_value();
        raw["nodes"][2]["id"] = json!("villain_after_bet");
        let tree: TreeArtifact = serde_json::from_value(raw).unwrap();
        let err = build_matrix_games(&tree, &toy_leaf_ev()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_leaf_pair_keys_and_terminal_sentinels() {
        let table = LeafEvTable::from_value(&json!({
            "bet|fold": 1.5,
            "bet -> call": -2.0,
            "shove,fold": 3.0
        }))
        .unwrap();
        assert_eq!(table.lookup(None, "bet", "fold").unwrap(), 1.5);
        assert_eq!(table.lookup(None, "bet", "call").unwrap(), -2.0);
        assert_eq!(table.lookup(None, "shove", "fold").unwrap(), 3.0);
        assert_eq!(
            table.lookup(Some("terminal_fold_pre"), "fold", "terminal").unwrap(),
            -50.0
        );
        assert_eq!(
            table.lookup(Some("terminal_win_pre"), "x", "terminal").unwrap(),
            50.0
        );
        assert!(table.lookup(Some("nowhere"), "a", "b").is_err());
    }

    #[test]
    fn test_leaf_ev_rejects_non_numeric() {
        let err = LeafEvTable::from_value(&json!({"leaf": "much"})).unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn test_solve_tree_end_to_end() {
        let (tree, raw) = toy_tree();
        let options = SolveOptions::new().with_backend(BackendPreference::Linprog);
        let solution = solve_tree(
            &tree,
            &raw,
            &json!({"hero": ["H0"]}),
            &json!({}),
            &toy_leaf_ev(),
            &options,
            |_| {},
        )
        .unwrap();

        // 2x2 root fits the small engine by default.
        assert_eq!(solution.backend, "small");
        assert!((solution.value - 0.0285714286).abs() < 1e-7);
        assert!((solution.strategy["bet"] - 1.0 / 7.0).abs() < 1e-6);
        assert!((solution.strategy["check"] - 6.0 / 7.0).abs() < 1e-6);
        assert!((solution.dual_prices["fold"] - 3.0 / 7.0).abs() < 1e-6);
        assert!((solution.dual_prices["call"] - 4.0 / 7.0).abs() < 1e-6);

        // Root record plus two passthrough records.
        assert_eq!(solution.nodes.len(), 3);
        assert_eq!(solution.meta.node_count, 3);
        assert!(!solution.meta.tree_hash.is_empty());
        assert_eq!(solution.meta.solver_backend, solution.backend);

        let root_node = &solution.nodes[0];
        assert_eq!(root_node.street.as_deref(), Some("preflop"));
        let audit = root_node.meta.as_ref().unwrap();
        assert_eq!(audit.method, Method::Analytic);
        assert!(audit.small_engine_used);
        assert_eq!(audit.original_action_count_pre_reduction, 2);

        // Passthrough weights are normalized, not re-solved.
        let turn = solution
            .nodes
            .iter()
            .find(|n| n.street.as_deref() == Some("turn"))
            .unwrap();
        assert!((turn.actions[0].weight - 0.4).abs() < 1e-9);
        assert!(turn.meta.is_none());
    }

    #[test]
    fn test_solve_tree_engine_off_uses_lp_backend() {
        let (tree, raw) = toy_tree();
        let options = SolveOptions::new()
            .with_backend(BackendPreference::Linprog)
            .with_engine_mode(crate::solver::EngineMode::Off);
        let solution = solve_tree(
            &tree,
            &raw,
            &json!({}),
            &json!({}),
            &toy_leaf_ev(),
            &options,
            |_| {},
        )
        .unwrap();
        assert_eq!(solution.backend, "linprog");
        assert!((solution.value - 0.0285714286).abs() < 1e-7);
    }

    #[test]
    fn test_tree_hash_is_order_independent() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": 2, "x": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": 3, "y": 2}, "b": 1}"#).unwrap();
        assert_eq!(compute_tree_hash(&a), compute_tree_hash(&b));
        assert_eq!(compute_tree_hash(&a).len(), 16);

        let c: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": 2, "x": 4}}"#).unwrap();
        assert_ne!(compute_tree_hash(&a), compute_tree_hash(&c));
    }

    #[test]
    fn test_solution_round_trips_through_json() {
        let (tree, raw) = toy_tree();
        let options = SolveOptions::new().with_backend(BackendPreference::Linprog);
        let solution = solve_tree(
            &tree,
            &raw,
            &json!({}),
            &json!({}),
            &toy_leaf_ev(),
            &options,
            |_| {},
        )
        .unwrap();
        let text = serde_json::to_string_pretty(&solution).unwrap();
        let back: Solution = serde_json::from_str(&text).unwrap();
        assert_eq!(back.nodes.len(), solution.nodes.len());
        assert_eq!(back.meta.tree_hash, solution.meta.tree_hash);
        assert_eq!(back.strategy, solution.strategy);
    }
}
