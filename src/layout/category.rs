use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::graph::EquipmentSet;
use crate::ir::EquipmentKind;

use super::tree::PlacementTree;
use super::types::Positions;

/// Type family whose members share one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignmentKey {
    LoopGroup,
    DistributionSwitch,
    /// Power storage riding beside its switch; follows the switch's row.
    PairedStorage,
    Generator,
    Transformer,
    Utility,
}

pub fn alignment_key(tree: &PlacementTree, set: &EquipmentSet, id: &str) -> Option<AlignmentKey> {
    if id == tree.root {
        return None;
    }
    let node = set.get(id)?;
    if node.is_suppressed() {
        return None;
    }
    if node.is_loop_group() {
        return Some(AlignmentKey::LoopGroup);
    }
    match node.kind {
        EquipmentKind::PowerStorage if tree.is_lateral(id) => Some(AlignmentKey::PairedStorage),
        EquipmentKind::DistributionSwitch => Some(AlignmentKey::DistributionSwitch),
        EquipmentKind::Generator => Some(AlignmentKey::Generator),
        EquipmentKind::Transformer => Some(AlignmentKey::Transformer),
        EquipmentKind::Utility => Some(AlignmentKey::Utility),
        _ => None,
    }
}

/// Families in the order they are raised: sources first, so a feed has
/// already moved up before the family below it checks for room. Paired
/// storage is absent; it rides on its switch.
const RAISE_ORDER: [AlignmentKey; 5] = [
    AlignmentKey::Utility,
    AlignmentKey::Generator,
    AlignmentKey::Transformer,
    AlignmentKey::LoopGroup,
    AlignmentKey::DistributionSwitch,
];

/// Lowest level among the feeds above `id`, looking through its laterals.
fn blocking_level(tree: &PlacementTree, id: &str) -> Option<i32> {
    let node = tree.get(id)?;
    let mut lowest: Option<i32> = None;
    for child in node.primary.iter().chain(node.secondary.iter()) {
        if let Some(level) = tree.level(child) {
            lowest = Some(lowest.map_or(level, |current| current.min(level)));
        }
    }
    for lateral in &node.lateral {
        if let Some(level) = blocking_level(tree, lateral) {
            lowest = Some(lowest.map_or(level, |current| current.min(level)));
        }
    }
    lowest
}

fn relevel_with_laterals(tree: &mut PlacementTree, id: &str, level: i32) {
    tree.set_level(id, level);
    let laterals = tree
        .get(id)
        .map(|node| node.lateral.clone())
        .unwrap_or_default();
    for lateral in laterals {
        relevel_with_laterals(tree, &lateral, level);
    }
}

/// Lifts each type family to the highest row any of its members occupies,
/// for members that can rise without passing their own feeds, repeating
/// until no family moves (levels only rise and never past the current
/// maximum, so this terminates). Then snaps
/// every rendered node to its row's baseline. Paired storage takes its
/// partner switch's y. Returns the ids that changed level.
pub fn enforce_category_baselines(
    tree: &mut PlacementTree,
    set: &EquipmentSet,
    positions: &mut Positions,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let mut families: BTreeMap<AlignmentKey, Vec<String>> = BTreeMap::new();
    for id in tree.order() {
        if !positions.contains(id) {
            continue;
        }
        if let Some(key) = alignment_key(tree, set, id) {
            families.entry(key).or_default().push(id.clone());
        }
    }

    let mut releveled: Vec<String> = Vec::new();
    let mut rounds = 0usize;
    loop {
        rounds += 1;
        let mut changed = false;
        for key in RAISE_ORDER {
            let Some(members) = families.get(&key) else {
                continue;
            };
            let Some(target) = members.iter().filter_map(|id| tree.level(id)).max() else {
                continue;
            };
            for id in members {
                let Some(level) = tree.level(id) else {
                    continue;
                };
                if level >= target {
                    continue;
                }
                if blocking_level(tree, id).is_some_and(|blocking| target >= blocking) {
                    diagnostics.debug_node(
                        Stage::Category,
                        id,
                        format!("{key:?} row {target} blocked by its feeds; kept at {level}"),
                    );
                    continue;
                }
                relevel_with_laterals(tree, id, target);
                diagnostics.debug_node(Stage::Category, id, format!("{key:?} raised {level} -> {target}"));
                if !releveled.contains(id) {
                    releveled.push(id.clone());
                }
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    diagnostics.debug(Stage::Category, format!("family levels settled after {rounds} rounds"));

    let ids: Vec<String> = tree.order().to_vec();
    for id in &ids {
        if !positions.contains(id) {
            continue;
        }
        if let Some(level) = tree.level(id) {
            positions.set_y(id, config.baseline(level, 0));
        }
    }
    if let Some(paired) = families.get(&AlignmentKey::PairedStorage) {
        for id in paired {
            let partner_y = tree
                .parent(id)
                .and_then(|parent| positions.get(parent))
                .map(|point| point.y);
            if let Some(y) = partner_y {
                positions.set_y(id, y);
            }
        }
    }

    diagnostics.debug(
        Stage::Category,
        format!("{} families aligned, {} nodes re-leveled", families.len(), releveled.len()),
    );
    releveled
}
