use super::{ConnectionGraph, EquipmentNode, EquipmentSet, Occurrence};
use crate::diagnostics::{Diagnostics, Stage};
use crate::ir::Branch;

/// Precedence rules applied when one piece of equipment is reached by more
/// than one path. The defaults are empirically tuned; callers may swap them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationPolicy {
    /// Convergence equipment that collected both branch labels is forced
    /// onto the primary side.
    pub convergence_forces_primary: bool,
    /// A path with a lower level replaces the canonical one.
    pub prefer_closer_path: bool,
    /// Which branch wins when two paths arrive at the same level.
    pub level_tie_winner: Branch,
    /// Keep non-normal losing parents as alternates for auxiliary edges.
    pub record_alternates: bool,
}

impl Default for ConsolidationPolicy {
    fn default() -> Self {
        Self {
            convergence_forces_primary: true,
            prefer_closer_path: true,
            level_tie_winner: Branch::Secondary,
            record_alternates: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    ForcedPrimary,
    Replaced,
    Kept,
}

pub fn consolidate(
    graph: &ConnectionGraph,
    root: &str,
    occurrences: &[Occurrence],
    policy: &ConsolidationPolicy,
    diagnostics: &mut Diagnostics,
) -> Option<EquipmentSet> {
    let root_info = graph.info(root)?;
    let mut set = EquipmentSet::new(EquipmentNode::from_info(root_info, 0));

    let mut merged = 0usize;
    for occurrence in occurrences {
        if occurrence.id == set.root {
            diagnostics.debug_node(
                Stage::Consolidator,
                &occurrence.parent,
                "path loops back to the selected equipment; ignored",
            );
            continue;
        }
        let Some(node) = set.get_mut(&occurrence.id) else {
            let Some(info) = graph.info(&occurrence.id) else {
                continue;
            };
            let mut node = EquipmentNode::from_info(info, 0);
            node.level = occurrence.level;
            node.branch = occurrence.branch;
            node.branches_seen.insert(occurrence.branch);
            node.parent = Some(occurrence.parent.clone());
            node.parents.insert(occurrence.parent.clone());
            if !occurrence.source_label.is_empty() {
                node.sources.insert(occurrence.source_label.clone());
            }
            node.classification = occurrence.classification;
            set.insert(node);
            continue;
        };

        merged += 1;
        let resolution = merge_occurrence(node, occurrence, policy);
        if resolution == Resolution::ForcedPrimary {
            diagnostics.debug_node(
                Stage::Consolidator,
                &occurrence.id,
                "convergence equipment fed from both branches; forced primary",
            );
        }
    }

    diagnostics.debug(
        Stage::Consolidator,
        format!(
            "consolidated {} occurrences into {} equipment ({merged} duplicates merged)",
            occurrences.len(),
            set.len()
        ),
    );
    Some(set)
}

fn merge_occurrence(
    node: &mut EquipmentNode,
    occurrence: &Occurrence,
    policy: &ConsolidationPolicy,
) -> Resolution {
    node.parents.insert(occurrence.parent.clone());
    node.branches_seen.insert(occurrence.branch);
    if !occurrence.source_label.is_empty() {
        node.sources.insert(occurrence.source_label.clone());
    }

    let closer = occurrence.level < node.level;
    let wins_tie = occurrence.level == node.level
        && occurrence.branch != node.branch
        && occurrence.branch == policy.level_tie_winner;

    if policy.convergence_forces_primary
        && node.kind.is_convergence_point()
        && node.branches_seen.contains(&Branch::Primary)
        && node.branches_seen.contains(&Branch::Secondary)
    {
        if closer {
            adopt(node, occurrence);
        }
        node.branch = Branch::Primary;
        return Resolution::ForcedPrimary;
    }

    if policy.prefer_closer_path && (closer || wins_tie) {
        adopt(node, occurrence);
        return Resolution::Replaced;
    }

    if policy.record_alternates && !occurrence.classification.is_normal() {
        node.add_alternate(
            &occurrence.parent,
            occurrence.classification,
            &occurrence.source_label,
        );
    }
    Resolution::Kept
}

fn adopt(node: &mut EquipmentNode, occurrence: &Occurrence) {
    node.level = occurrence.level;
    node.branch = occurrence.branch;
    node.parent = Some(occurrence.parent.clone());
    node.classification = occurrence.classification;
    node.alternates.retain(|alt| alt.parent != occurrence.parent);
}
