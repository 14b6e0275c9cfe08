mod category;
mod collision;
mod normalize;
mod position;
mod span;
mod tree;
pub(crate) mod types;
mod validate;

pub use category::{AlignmentKey, alignment_key, enforce_category_baselines};
pub use collision::{collides, find_collisions, resolve_collisions, settle_rows};
pub use normalize::{MAX_ANCESTOR_TRACE, lineage_rank, normalize_levels};
pub use position::assign_positions;
pub use span::{SpanTable, block_offset, compute_spans};
pub use tree::{Placement, PlacementTree, TreeNode, is_lateral};
pub use types::*;
pub use validate::{Misalignment, ValidationReport, validate_layout};

use crate::config::LayoutConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::error::{LayoutError, Result};
use crate::graph::{
    ConnectionGraph, ConsolidationPolicy, EquipmentSet, WalkDirection, complete_coverage, consolidate,
    detect_loops, walk,
};
use crate::ir::ConnectionRecord;
use collision::rendered_ids;
use std::collections::HashSet;

/// Lays out the upstream feed tree of `selected`.
pub fn compute_layout(records: &[ConnectionRecord], selected: &str, config: &LayoutConfig) -> Result<LayoutResult> {
    compute_layout_with_policy(records, selected, config, &ConsolidationPolicy::default())
}

pub fn compute_layout_with_policy(
    records: &[ConnectionRecord],
    selected: &str,
    config: &LayoutConfig,
    policy: &ConsolidationPolicy,
) -> Result<LayoutResult> {
    config.validate()?;
    let mut diagnostics = Diagnostics::new();
    let graph = ConnectionGraph::build(records, &mut diagnostics);
    if !graph.contains(selected) {
        return Err(LayoutError::NotFound {
            id: selected.to_string(),
        });
    }

    let occurrences = walk(&graph, selected, WalkDirection::Upstream, &mut diagnostics);
    let mut set = consolidate(&graph, selected, &occurrences, policy, &mut diagnostics).ok_or_else(|| {
        LayoutError::NotFound {
            id: selected.to_string(),
        }
    })?;
    detect_loops(&mut set, &mut diagnostics);
    complete_coverage(&graph, &mut set, &mut diagnostics);

    let mut tree = PlacementTree::build(&graph, &set, &mut diagnostics);
    let spans = compute_spans(&tree, &set, config, &mut diagnostics);
    let mut positions = assign_positions(&tree, &set, &spans, config, &mut diagnostics);
    normalize_levels(&tree, &set, &mut positions, config, &mut diagnostics);
    // Collision drift is measured from the normalized rows.
    positions.freeze_anchors();
    resolve_collisions(&tree, &set, &mut positions, config, &mut diagnostics);
    enforce_category_baselines(&mut tree, &set, &mut positions, config, &mut diagnostics);
    resolve_collisions(&tree, &set, &mut positions, config, &mut diagnostics);
    settle_rows(&tree, &set, &mut positions, config, &mut diagnostics);

    let report = validate_layout(&tree, &set, &positions, config, &mut diagnostics);
    let nodes = positioned_nodes(&tree, &set, &positions);
    let edges = layout_edges(&graph, &tree, &set, &nodes);
    let bounds = compute_bounds(&nodes, config);
    diagnostics.info(
        Stage::Validator,
        format!("laid out {} nodes and {} edges for {selected}", nodes.len(), edges.len()),
    );

    Ok(LayoutResult {
        selected: selected.to_string(),
        nodes,
        edges,
        bounds,
        report,
        diagnostics,
    })
}

fn style_class(tree: &PlacementTree, set: &EquipmentSet, id: &str) -> String {
    let Some(node) = set.get(id) else {
        return String::new();
    };
    let mut class = format!("{} {}", node.kind.css_class(), node.branch.css_class());
    if id == tree.root {
        class.push_str(" root");
    }
    if node.is_loop_group() {
        class.push_str(" loop-group");
    }
    if tree.is_lateral(id) {
        class.push_str(" lateral");
    }
    class
}

fn positioned_nodes(tree: &PlacementTree, set: &EquipmentSet, positions: &Positions) -> Vec<PositionedNode> {
    rendered_ids(tree, set, positions)
        .into_iter()
        .filter_map(|id| {
            let point = positions.get(&id)?;
            let node = set.get(&id)?;
            Some(PositionedNode {
                x: point.x,
                y: point.y,
                label: node.name.clone(),
                style_class: style_class(tree, set, &id),
                level: tree.level(&id).unwrap_or(0),
                id,
            })
        })
        .collect()
}

/// Relations between rendered equipment, remapped onto loop representatives.
/// Edges inside one group vanish and the first relation per pair wins.
fn layout_edges(
    graph: &ConnectionGraph,
    tree: &PlacementTree,
    set: &EquipmentSet,
    nodes: &[PositionedNode],
) -> Vec<LayoutEdge> {
    let rendered: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut edges = Vec::new();

    for relation in graph.relations() {
        let source = set.resolve(&relation.origin);
        let target = set.resolve(&relation.destination);
        if source == target || !rendered.contains(source) || !rendered.contains(target) {
            continue;
        }
        if !seen.insert((source.to_string(), target.to_string())) {
            continue;
        }
        edges.push(LayoutEdge {
            id: format!("e{}:{source}->{target}", relation.seq),
            source_id: source.to_string(),
            target_id: target.to_string(),
            classification: relation.classification,
            source_label: relation.source_label.clone(),
            auxiliary: tree.parent(source) != Some(target),
        });
    }

    // Alternates normally mirror a relation already emitted above.
    for node in nodes {
        let Some(equipment) = set.get(&node.id) else {
            continue;
        };
        for alt in &equipment.alternates {
            let target = set.resolve(&alt.parent);
            if target == node.id || !rendered.contains(target) {
                continue;
            }
            if !seen.insert((node.id.clone(), target.to_string())) {
                continue;
            }
            edges.push(LayoutEdge {
                id: format!("alt:{}->{target}", node.id),
                source_id: node.id.clone(),
                target_id: target.to_string(),
                classification: alt.classification,
                source_label: alt.source_label.clone(),
                auxiliary: true,
            });
        }
    }
    edges
}

fn compute_bounds(nodes: &[PositionedNode], config: &LayoutConfig) -> Bounds {
    if nodes.is_empty() {
        return Bounds::default();
    }
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for node in nodes {
        min_x = min_x.min(node.x);
        min_y = min_y.min(node.y);
        max_x = max_x.max(node.x);
        max_y = max_y.max(node.y);
    }
    Bounds {
        min_x: min_x - config.node_width / 2.0,
        min_y: min_y - config.node_height / 2.0,
        width: max_x - min_x + config.node_width,
        height: max_y - min_y + config.node_height,
    }
}
