use std::collections::{BTreeMap, HashSet};

use crate::config::LayoutConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::graph::EquipmentSet;

use super::tree::{PlacementTree, TreeNode};
use super::types::SubtreeSpan;

/// Recursion bound for the span walk. The placement tree is strict, so this
/// only trips on corrupted input.
const MAX_SPAN_DEPTH: usize = 64;
/// Depth beyond which a branch block stops widening.
const MAX_DEPTH_STEPS: usize = 6;
/// Loop groups reserve between one and this many node widths.
const LOOP_GROUP_MAX_WIDTHS: f32 = 3.0;

#[derive(Debug, Clone, Default)]
pub struct SpanTable {
    spans: BTreeMap<String, SubtreeSpan>,
    depths: BTreeMap<String, usize>,
    split_above: BTreeMap<String, bool>,
}

impl SpanTable {
    pub fn get(&self, id: &str) -> SubtreeSpan {
        self.spans.get(id).copied().unwrap_or(SubtreeSpan::ZERO)
    }

    /// Height of the subtree above `id`, counting `id` itself.
    pub fn depth(&self, id: &str) -> usize {
        self.depths.get(id).copied().unwrap_or(0)
    }

    /// Whether an ancestor of `id` already split into both branches.
    pub fn split_above(&self, id: &str) -> bool {
        self.split_above.get(id).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Combined footprint of one child group including inter-sibling gaps.
    pub fn group_footprint(&self, children: &[String], config: &LayoutConfig) -> f32 {
        let widths: Vec<f32> = children
            .iter()
            .map(|child| self.get(child).width)
            .filter(|width| *width > 0.0)
            .collect();
        if widths.is_empty() {
            return 0.0;
        }
        widths.iter().sum::<f32>() + config.min_gap * (widths.len() as f32 - 1.0)
    }

    pub fn group_depth(&self, children: &[String]) -> usize {
        children
            .iter()
            .filter(|child| !self.get(child).is_zero())
            .map(|child| self.depth(child))
            .max()
            .unwrap_or(0)
    }

    pub fn contributing<'a>(&self, children: &'a [String]) -> Vec<&'a String> {
        children
            .iter()
            .filter(|child| !self.get(child).is_zero())
            .collect()
    }
}

/// Gap between the parent's center line and the inner edge of a branch
/// block when both branches are present.
pub fn block_offset(config: &LayoutConfig, group_depth: usize, split_above: bool) -> f32 {
    let steps = group_depth.saturating_sub(1).min(MAX_DEPTH_STEPS) as f32;
    let widen = if split_above { config.split_widen } else { 0.0 };
    config.min_gap / 2.0 + config.branch_depth_step * steps + widen
}

pub fn compute_spans(
    tree: &PlacementTree,
    set: &EquipmentSet,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> SpanTable {
    let mut table = SpanTable::default();
    let mut stack: HashSet<String> = HashSet::new();
    span_of(&tree.root, false, 0, tree, set, config, &mut table, &mut stack, diagnostics);
    diagnostics.debug(Stage::Span, format!("computed {} subtree spans", table.len()));
    table
}

#[allow(clippy::too_many_arguments)]
fn span_of(
    id: &str,
    split_above: bool,
    depth: usize,
    tree: &PlacementTree,
    set: &EquipmentSet,
    config: &LayoutConfig,
    table: &mut SpanTable,
    stack: &mut HashSet<String>,
    diagnostics: &mut Diagnostics,
) -> SubtreeSpan {
    let fallback = SubtreeSpan::leaf(config.node_width);
    if depth > MAX_SPAN_DEPTH || !stack.insert(id.to_string()) {
        diagnostics.warn_node(Stage::Span, id, "cycle guard tripped; using a single-node footprint");
        return fallback;
    }
    let Some(node) = tree.get(id) else {
        stack.remove(id);
        return fallback;
    };
    table.split_above.insert(id.to_string(), split_above);

    let equipment = set.get(id);
    let suppressed = equipment.is_some_and(|node| node.is_suppressed());
    let is_loop_group = equipment.is_some_and(|node| node.is_loop_group());

    // Whether this node itself splits is only known once we know which of
    // its groups contribute, which needs their spans; suppressed members and
    // empty groups never count.
    let has_primary = node.primary.iter().any(|child| !is_suppressed(set, child));
    let has_secondary = node.secondary.iter().any(|child| !is_suppressed(set, child));
    let split_here = split_above || (has_primary && has_secondary);

    let mut subtree_depth = 0usize;
    for child in node.children() {
        span_of(child, split_here, depth + 1, tree, set, config, table, stack, diagnostics);
        subtree_depth = subtree_depth.max(table.depth(child));
    }
    table.depths.insert(id.to_string(), subtree_depth + 1);

    let span = if suppressed {
        SubtreeSpan::ZERO
    } else if is_loop_group {
        loop_group_span(node, table, config)
    } else {
        branch_span(node, split_above, table, config)
    };
    table.spans.insert(id.to_string(), span);
    stack.remove(id);
    span
}

fn is_suppressed(set: &EquipmentSet, id: &str) -> bool {
    set.get(id).is_some_and(|node| node.is_suppressed())
}

fn loop_group_span(node: &TreeNode, table: &SpanTable, config: &LayoutConfig) -> SubtreeSpan {
    let primary = table.group_footprint(&node.primary, config);
    let secondary = table.group_footprint(&node.secondary, config);
    let width = primary.max(secondary).clamp(
        config.node_width,
        config.node_width * LOOP_GROUP_MAX_WIDTHS,
    );
    SubtreeSpan::from_sides(width / 2.0, width / 2.0)
}

fn branch_span(node: &TreeNode, split_above: bool, table: &SpanTable, config: &LayoutConfig) -> SubtreeSpan {
    let half = config.node_width / 2.0;
    let primary = table.contributing(&node.primary);
    let secondary = table.contributing(&node.secondary);

    let (mut left, right) = match (primary.is_empty(), secondary.is_empty()) {
        (true, true) => (half, half),
        (false, false) => {
            let left = table.group_footprint(&node.primary, config)
                + block_offset(config, table.group_depth(&node.primary), split_above);
            let right = table.group_footprint(&node.secondary, config)
                + block_offset(config, table.group_depth(&node.secondary), split_above);
            (left.max(half), right.max(half))
        }
        _ => {
            let (group, children) = if primary.is_empty() {
                (&node.secondary, secondary)
            } else {
                (&node.primary, primary)
            };
            if children.len() == 1 {
                let only = table.get(children[0]);
                (only.left.max(half), only.right.max(half))
            } else {
                let side = table.group_footprint(group, config).max(config.node_width) / 2.0;
                (side, side)
            }
        }
    };

    for (idx, lateral) in node.lateral.iter().enumerate() {
        let span = table.get(lateral);
        if span.is_zero() {
            continue;
        }
        let reach = config.lateral_offset * (idx as f32 + 1.0) + span.left;
        left = left.max(reach);
    }

    SubtreeSpan::from_sides(left, right)
}
