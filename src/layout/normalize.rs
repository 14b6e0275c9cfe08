use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::LayoutConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::graph::EquipmentSet;
use crate::ir::Branch;

use super::tree::PlacementTree;
use super::types::{Point, Positions};

/// How far above a group's parent the normalizer looks for a loop group
/// whose branch decides the group's side. Hops count from the parent: the
/// parent itself is checked, then at most this many ancestors above it.
pub const MAX_ANCESTOR_TRACE: usize = 6;

/// Ordering rank for the group hanging off `parent`: the branch of the
/// nearest loop group within the trace bound, else the parent's own branch.
pub fn lineage_rank(tree: &PlacementTree, set: &EquipmentSet, parent: &str) -> u8 {
    let mut current = Some(parent);
    let mut hops = 0;
    while let Some(id) = current {
        if hops > MAX_ANCESTOR_TRACE {
            break;
        }
        if let Some(node) = set.get(id)
            && node.is_loop_group()
        {
            return node.branch.rank();
        }
        current = tree.parent(id);
        hops += 1;
    }
    set.get(parent)
        .map(|node| node.branch.rank())
        .unwrap_or(Branch::None.rank())
}

struct Group {
    parent: String,
    rank: u8,
    parent_x: f32,
    parent_name: String,
    members: Vec<String>,
}

/// Re-lays every row above the root: groups of siblings in lineage order,
/// primary before secondary inside each group, evenly pitched and centered
/// on the root's x. Laterals keep their fixed offset left of their parent.
pub fn normalize_levels(
    tree: &PlacementTree,
    set: &EquipmentSet,
    positions: &mut Positions,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) {
    let Some(anchor_x) = positions.get(&tree.root).map(|point| point.x) else {
        return;
    };

    let mut rows: BTreeMap<i32, Vec<&str>> = BTreeMap::new();
    for id in tree.order() {
        if id == &tree.root || tree.is_lateral(id) || !positions.contains(id) {
            continue;
        }
        if set.get(id).is_some_and(|node| node.is_suppressed()) {
            continue;
        }
        if let Some(level) = tree.level(id) {
            rows.entry(level).or_default().push(id);
        }
    }

    let mut moved = 0usize;
    for (level, ids) in rows {
        let groups = ordered_groups(tree, set, positions, &ids);
        let mut row: Vec<(String, f32)> = Vec::new();
        for group in &groups {
            for member in &group.members {
                let cluster = lateral_cluster(tree, positions, member);
                for (idx, id) in cluster.into_iter().enumerate() {
                    let gap = if row.is_empty() {
                        0.0
                    } else if idx == 0 {
                        config.pitch()
                    } else {
                        config.lateral_offset
                    };
                    row.push((id, gap));
                }
            }
        }

        let extent: f32 = row.iter().map(|(_, gap)| gap).sum();
        let y = config.baseline(level, 0);
        let mut x = anchor_x - extent / 2.0;
        for (id, gap) in &row {
            x += gap;
            if positions.get(id).is_some_and(|point| point.x != x || point.y != y) {
                moved += 1;
            }
            positions.set(id, Point { x, y });
        }
        diagnostics.debug(
            Stage::Normalizer,
            format!("level {level}: {} groups, {} slots", groups.len(), row.len()),
        );
    }
    diagnostics.debug(Stage::Normalizer, format!("normalized {moved} positions"));
}

fn ordered_groups(
    tree: &PlacementTree,
    set: &EquipmentSet,
    positions: &Positions,
    ids: &[&str],
) -> Vec<Group> {
    let mut by_parent: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for id in ids {
        let parent = tree.parent(id).unwrap_or(tree.root.as_str());
        by_parent
            .entry(parent.to_string())
            .or_default()
            .push(id.to_string());
    }

    let mut groups: Vec<Group> = by_parent
        .into_iter()
        .map(|(parent, mut members)| {
            members.sort_by(|a, b| member_order(set, positions, a, b));
            Group {
                rank: lineage_rank(tree, set, &parent),
                parent_x: positions.get(&parent).map(|point| point.x).unwrap_or(0.0),
                parent_name: name_of(set, &parent),
                parent,
                members,
            }
        })
        .collect();
    groups.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.parent_x.total_cmp(&b.parent_x))
            .then_with(|| a.parent_name.cmp(&b.parent_name))
            .then_with(|| a.parent.cmp(&b.parent))
    });
    groups
}

fn member_order(set: &EquipmentSet, positions: &Positions, a: &str, b: &str) -> Ordering {
    let rank = |id: &str| set.get(id).map(|node| node.branch.rank()).unwrap_or(1);
    let x = |id: &str| positions.get(id).map(|point| point.x).unwrap_or(0.0);
    rank(a)
        .cmp(&rank(b))
        .then_with(|| x(a).total_cmp(&x(b)))
        .then_with(|| name_of(set, a).cmp(&name_of(set, b)))
        .then_with(|| a.cmp(b))
}

fn name_of(set: &EquipmentSet, id: &str) -> String {
    set.get(id)
        .map(|node| node.name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// `id` preceded by its laterals, farthest first, each lateral itself
/// preceded by its own laterals.
fn lateral_cluster(tree: &PlacementTree, positions: &Positions, id: &str) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(node) = tree.get(id) {
        for lateral in node.lateral.iter().rev() {
            if positions.contains(lateral) {
                out.extend(lateral_cluster(tree, positions, lateral));
            }
        }
    }
    out.push(id.to_string());
    out
}
