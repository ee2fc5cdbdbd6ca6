//! Policy record construction.
//!
//! Turns one solved (or passthrough) solution node into the exported
//! record shape: the original action list with aligned weights and sizing
//! tags, the parsed node-key components, and the audit metadata the runtime
//! consumer relies on. The action/weight arrays always cover the full
//! pre-reduction action set; eliminated actions surface through
//! `zero_weight_actions`, never through a shorter array.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::numerics::EPS;
use crate::solver::lp::BackendKind;
use crate::solver::small::Method;
use crate::tree::SolutionNode;

use super::PolicyExportError;

/// Parsed components of a composite node key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeKeyComponents {
    /// Street (preflop, flop, turn, river).
    pub street: String,
    /// Pot type (e.g. single_raised).
    pub pot_type: String,
    /// Role, always carrying the "role:" prefix.
    pub role: String,
    /// Position (ip / oop).
    pub pos: String,
    /// Board texture class.
    pub texture: String,
    /// Stack-to-pot bucket.
    pub spr: String,
    /// Facing-size tag; "na" is the no-bet sentinel.
    pub facing: String,
    /// Hand bucket or class.
    pub bucket: String,
}

fn split_node_key(node_key: &str) -> Vec<&str> {
    if node_key.contains('|') {
        node_key.split('|').collect()
    } else {
        node_key.split('/').collect()
    }
}

fn extract_dimension(parts: &[&str], key: &str, default: &str) -> String {
    for part in parts {
        for prefix in [format!("{}:", key), format!("{}=", key)] {
            if let Some(rest) = part.strip_prefix(prefix.as_str()) {
                if !rest.is_empty() {
                    return rest.to_string();
                }
                return default.to_string();
            }
        }
    }
    default.to_string()
}

fn ensure_role(role: &str) -> String {
    if role.is_empty() {
        "role:na".to_string()
    } else if role.starts_with("role:") {
        role.to_string()
    } else {
        format!("role:{}", role)
    }
}

fn bucket_string(bucket: &Option<Value>) -> Option<String> {
    bucket.as_ref().map(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

impl NodeKeyComponents {
    /// Resolve components for a solution node: explicit fields win, the
    /// parsed node key fills the gaps.
    pub fn resolve(node: &SolutionNode) -> Self {
        let parts = split_node_key(&node.node_key);
        let positional = |idx: usize, default: &str| -> String {
            parts
                .get(idx)
                .map(|s| s.to_string())
                .unwrap_or_else(|| default.to_string())
        };
        NodeKeyComponents {
            street: node
                .street
                .clone()
                .unwrap_or_else(|| positional(0, "unknown")),
            pot_type: node
                .pot_type
                .clone()
                .unwrap_or_else(|| positional(1, "single_raised")),
            role: ensure_role(&node.role.clone().unwrap_or_else(|| positional(2, "role:na"))),
            pos: node.pos.clone().unwrap_or_else(|| positional(3, "na")),
            texture: node
                .texture
                .clone()
                .unwrap_or_else(|| extract_dimension(&parts, "texture", "na")),
            spr: node
                .spr
                .clone()
                .unwrap_or_else(|| extract_dimension(&parts, "spr", "na")),
            facing: extract_dimension(&parts, "facing", "na"),
            bucket: bucket_string(&node.bucket)
                .unwrap_or_else(|| extract_dimension(&parts, "bucket", "-1")),
        }
    }
}

/// Audit metadata carried by every exported record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Solve method; absent for passthrough records that were never solved.
    #[serde(default)]
    pub method: Option<Method>,
    /// Closed-form fallback flag.
    #[serde(default)]
    pub degenerate: bool,
    /// Whether the small engine ran.
    #[serde(default)]
    pub small_engine_used: bool,
    /// LP backend that handled the node, when one did.
    #[serde(default)]
    pub backend: Option<BackendKind>,
    /// Node game value, when the node was solved.
    #[serde(default)]
    pub value: Option<f64>,
    /// Shape after reduction, when reduction was applied.
    #[serde(default)]
    pub reduced_shape: Option<(usize, usize)>,
    /// Reduction passes that eliminated something.
    #[serde(default)]
    pub domination_steps: usize,
    /// How kept indices map back into the exported action ordering.
    pub original_index_map: Vec<usize>,
    /// Exported action count, which equals the pre-reduction count.
    pub original_action_count_pre_reduction: usize,
    /// Indices whose final weight is zero within the general epsilon,
    /// whether from reduction or natural equilibrium sparsity.
    pub zero_weight_actions: Vec<usize>,
    /// True when the facing component degraded to the "na" sentinel.
    pub facing_fallback: bool,
    /// Facing values the record degraded from, oldest first.
    #[serde(default)]
    pub fallback_from: Vec<String>,
}

/// One exported node: the original action list with aligned weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Composite node key.
    pub node_key: String,
    /// Parsed key components.
    pub components: NodeKeyComponents,
    /// Action names, original order.
    pub actions: Vec<String>,
    /// Sizing tags aligned with `actions`.
    pub size_tags: Vec<Option<String>>,
    /// Normalized weights aligned with `actions`.
    pub weights: Vec<f64>,
    /// Audit metadata.
    pub meta: RecordMeta,
}

/// Build the exported record for one solution node.
///
/// # Errors
/// [`PolicyExportError::MalformedRecord`] when the node key is empty, the
/// action list is empty, or any weight is non-finite — a malformed node is
/// a hard export failure, never silently dropped.
pub fn build_record(node: &SolutionNode, index: usize) -> Result<PolicyRecord, PolicyExportError> {
    if node.node_key.is_empty() {
        return Err(PolicyExportError::MalformedRecord {
            index,
            reason: "missing node_key".to_string(),
        });
    }
    if node.actions.is_empty() {
        return Err(PolicyExportError::MalformedRecord {
            index,
            reason: format!("node {} contains no actions", node.node_key),
        });
    }

    let mut actions = Vec::with_capacity(node.actions.len());
    let mut size_tags = Vec::with_capacity(node.actions.len());
    let mut raw_weights = Vec::with_capacity(node.actions.len());
    for arm in &node.actions {
        if !arm.weight.is_finite() {
            return Err(PolicyExportError::MalformedRecord {
                index,
                reason: format!(
                    "node {} action '{}' has non-finite weight",
                    node.node_key, arm.action
                ),
            });
        }
        actions.push(arm.action.clone());
        size_tags.push(arm.size_tag.clone());
        raw_weights.push(arm.weight.max(0.0));
    }

    let total: f64 = raw_weights.iter().sum();
    let weights: Vec<f64> = if total <= EPS {
        // Stable tie-break for a record with no surviving mass: everything
        // on the first action.
        let mut w = vec![0.0; raw_weights.len()];
        w[0] = 1.0;
        w
    } else {
        raw_weights.iter().map(|&w| w / total).collect()
    };

    let zero_weight_actions: Vec<usize> = weights
        .iter()
        .enumerate()
        .filter(|(_, &w)| w <= EPS)
        .map(|(i, _)| i)
        .collect();

    let mut components = NodeKeyComponents::resolve(node);
    let mut fallback_from: Vec<String> = Vec::new();
    let facing_fallback;
    match node.facing.as_deref() {
        Some(facing) if !facing.is_empty() => {
            components.facing = facing.to_string();
            facing_fallback = false;
        }
        _ => {
            // No explicit facing: degrade to the no-bet sentinel, recording
            // what the key claimed so the lookup service can audit it.
            if components.facing != "na" && !components.facing.is_empty() {
                fallback_from.push(components.facing.clone());
            }
            components.facing = "na".to_string();
            facing_fallback = true;
        }
    }

    let meta = match &node.meta {
        Some(audit) => RecordMeta {
            method: Some(audit.method),
            degenerate: audit.degenerate,
            small_engine_used: audit.small_engine_used,
            backend: audit.backend,
            value: Some(audit.value),
            reduced_shape: audit.reduced_shape,
            domination_steps: audit.domination_steps,
            original_index_map: audit.original_index_map.clone(),
            original_action_count_pre_reduction: audit.original_action_count_pre_reduction,
            zero_weight_actions,
            facing_fallback,
            fallback_from,
        },
        None => RecordMeta {
            method: None,
            degenerate: false,
            small_engine_used: false,
            backend: None,
            value: None,
            reduced_shape: None,
            domination_steps: 0,
            original_index_map: (0..actions.len()).collect(),
            original_action_count_pre_reduction: actions.len(),
            zero_weight_actions,
            facing_fallback,
            fallback_from,
        },
    };

    Ok(PolicyRecord {
        node_key: node.node_key.clone(),
        components,
        actions,
        size_tags,
        weights,
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{NodeAudit, SolvedAction};
    use serde_json::json;

    fn node(node_key: &str, weights: &[f64]) -> SolutionNode {
        SolutionNode {
            node_key: node_key.to_string(),
            street: None,
            pot_type: None,
            role: None,
            pos: None,
            texture: None,
            spr: None,
            facing: None,
            bucket: None,
            actions: weights
                .iter()
                .enumerate()
                .map(|(i, &w)| SolvedAction {
                    action: format!("action_{}", i),
                    size_tag: None,
                    weight: w,
                })
                .collect(),
            meta: None,
        }
    }

    #[test]
    fn test_components_parsed_from_key() {
        let n = node(
            "flop/single_raised/role:pfr/ip/texture:dry/spr:mid/facing:half/bucket:3",
            &[1.0],
        );
        let record = build_record(&n, 0).unwrap();
        assert_eq!(record.components.street, "flop");
        assert_eq!(record.components.pot_type, "single_raised");
        assert_eq!(record.components.role, "role:pfr");
        assert_eq!(record.components.pos, "ip");
        assert_eq!(record.components.texture, "dry");
        assert_eq!(record.components.spr, "mid");
        assert_eq!(record.components.bucket, "3");
    }

    #[test]
    fn test_explicit_fields_win_over_key() {
        let mut n = node("flop/single_raised/role:pfr/ip/texture:dry/spr:mid/bucket:3", &[1.0]);
        n.street = Some("turn".to_string());
        n.role = Some("caller".to_string());
        n.bucket = Some(json!(7));
        let record = build_record(&n, 0).unwrap();
        assert_eq!(record.components.street, "turn");
        assert_eq!(record.components.role, "role:caller");
        assert_eq!(record.components.bucket, "7");
    }

    #[test]
    fn test_facing_degrades_to_sentinel_with_bookkeeping() {
        let n = node(
            "river/single_raised/role:caller/oop/texture:wet/spr:low/facing:large/bucket:1",
            &[0.5, 0.5],
        );
        let record = build_record(&n, 0).unwrap();
        assert_eq!(record.components.facing, "na");
        assert!(record.meta.facing_fallback);
        assert_eq!(record.meta.fallback_from, vec!["large".to_string()]);

        let mut explicit = node(
            "river/single_raised/role:caller/oop/texture:wet/spr:low/facing:large/bucket:1",
            &[0.5, 0.5],
        );
        explicit.facing = Some("large".to_string());
        let record = build_record(&explicit, 0).unwrap();
        assert_eq!(record.components.facing, "large");
        assert!(!record.meta.facing_fallback);
        assert!(record.meta.fallback_from.is_empty());
    }

    #[test]
    fn test_weights_renormalize_and_clamp() {
        let record = build_record(&node("k/a/role:x/ip", &[0.2, -0.4, 0.6]), 0).unwrap();
        assert!((record.weights[0] - 0.25).abs() < 1e-12);
        assert_eq!(record.weights[1], 0.0);
        assert!((record.weights[2] - 0.75).abs() < 1e-12);
        assert_eq!(record.meta.zero_weight_actions, vec![1]);
    }

    #[test]
    fn test_zero_mass_puts_weight_on_first_action() {
        let record = build_record(&node("k/a/role:x/ip", &[0.0, 0.0, 0.0]), 0).unwrap();
        assert_eq!(record.weights, vec![1.0, 0.0, 0.0]);
        assert_eq!(record.meta.zero_weight_actions, vec![1, 2]);
    }

    #[test]
    fn test_empty_actions_is_hard_failure() {
        let n = node("k/a/role:x/ip", &[]);
        let err = build_record(&n, 3).unwrap_err();
        assert!(err.to_string().contains("no actions"));
    }

    #[test]
    fn test_missing_node_key_is_hard_failure() {
        let n = node("", &[1.0]);
        assert!(build_record(&n, 0).is_err());
    }

    #[test]
    fn test_reduction_indices_land_in_zero_weight_set() {
        let mut n = node("k/a/role:x/ip", &[0.6, 0.0, 0.4]);
        n.meta = Some(NodeAudit {
            method: Method::ReducedSmall,
            degenerate: false,
            small_engine_used: true,
            backend: Some(BackendKind::Linprog),
            value: 0.1,
            reduced_shape: Some((2, 2)),
            domination_steps: 1,
            original_index_map: vec![0, 2],
            original_action_count_pre_reduction: 3,
        });
        let record = build_record(&n, 0).unwrap();
        assert_eq!(record.actions.len(), record.meta.original_action_count_pre_reduction);
        for index in 0..record.actions.len() {
            if !record.meta.original_index_map.contains(&index) {
                assert!(record.meta.zero_weight_actions.contains(&index));
            }
        }
        assert_eq!(record.meta.reduced_shape, Some((2, 2)));
    }
}
