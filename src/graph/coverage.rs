use super::{ConnectionGraph, EquipmentNode, EquipmentSet, MAX_HOPS, first_hop_branch};
use crate::diagnostics::{Diagnostics, Stage};
use std::collections::{HashSet, VecDeque};

/// Breadth-first pass over the raw adjacency that restores ancestors the
/// consolidated set lost, and unions parent/source sets for the ones it kept.
/// Returns the ids that had to be synthesized.
pub fn complete_coverage(
    graph: &ConnectionGraph,
    set: &mut EquipmentSet,
    diagnostics: &mut Diagnostics,
) -> Vec<String> {
    let root = set.root.clone();
    let mut restored = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    visited.insert(root.clone());
    queue.push_back((root.clone(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= MAX_HOPS {
            continue;
        }
        let current_render = set.resolve(&current).to_string();
        let Some((current_level, current_branch)) = set
            .get(&current_render)
            .map(|node| (node.level, node.branch))
        else {
            continue;
        };

        for relation in graph.upstream(&current) {
            let ancestor = relation.origin.as_str();
            if ancestor == root {
                continue;
            }
            match set.get_mut(ancestor) {
                Some(node) => {
                    let own_rep = node.member_of.as_deref() == Some(current_render.as_str());
                    if node.id != current_render && !own_rep {
                        node.parents.insert(current_render.clone());
                    }
                    if !relation.source_label.is_empty() {
                        node.sources.insert(relation.source_label.clone());
                    }
                }
                None => {
                    let Some(info) = graph.info(ancestor) else {
                        continue;
                    };
                    let mut node = EquipmentNode::from_info(info, 0);
                    node.level = current_level + 1;
                    node.branch = if current == root {
                        first_hop_branch(relation)
                    } else {
                        current_branch
                    };
                    node.branches_seen.insert(node.branch);
                    node.parent = Some(current_render.clone());
                    node.parents.insert(current_render.clone());
                    if !relation.source_label.is_empty() {
                        node.sources.insert(relation.source_label.clone());
                    }
                    node.classification = relation.classification;
                    diagnostics.info(
                        Stage::Coverage,
                        format!("restored ancestor {ancestor} under {current_render}"),
                    );
                    restored.push(ancestor.to_string());
                    set.insert(node);
                }
            }
            if visited.insert(ancestor.to_string()) {
                queue.push_back((ancestor.to_string(), depth + 1));
            }
        }
    }

    // Every non-root node keeps at least one parent.
    let root_id = set.root.clone();
    for node in set.values_mut() {
        if node.id == root_id || !node.parents.is_empty() {
            continue;
        }
        let fallback = node.parent.clone().unwrap_or_else(|| root_id.clone());
        diagnostics.warn_node(
            Stage::Coverage,
            &node.id,
            format!("orphaned equipment reattached to {fallback}"),
        );
        node.parents.insert(fallback.clone());
        if node.parent.is_none() {
            node.parent = Some(fallback);
        }
    }

    diagnostics.debug(
        Stage::Coverage,
        format!("coverage restored {} ancestors", restored.len()),
    );
    restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConsolidationPolicy, WalkDirection, consolidate, walk};
    use crate::ir::{Branch, ConnectionRecord, Endpoint};

    fn feed(from: (&str, &str), to: (&str, &str), source: Option<&str>) -> ConnectionRecord {
        ConnectionRecord::new(
            Endpoint::new(from.0, from.0, from.1),
            Endpoint::new(to.0, to.0, to.1),
            source,
        )
    }

    #[test]
    fn restores_ancestors_missing_from_the_walk() {
        let records = vec![
            feed(("A", "Switchboard"), ("R", "Switchboard"), Some("Primary")),
            feed(("B", "Switchboard"), ("R", "Switchboard"), Some("Secondary")),
            feed(("G", "Generator"), ("B", "Switchboard"), None),
        ];
        let mut diagnostics = Diagnostics::new();
        let graph = ConnectionGraph::build(&records, &mut diagnostics);
        // Only the primary side made it through: simulate a lossy walk.
        let occurrences: Vec<_> = walk(&graph, "R", WalkDirection::Upstream, &mut diagnostics)
            .into_iter()
            .filter(|occ| occ.id == "A")
            .collect();
        let mut set = consolidate(
            &graph,
            "R",
            &occurrences,
            &ConsolidationPolicy::default(),
            &mut diagnostics,
        )
        .unwrap();
        assert!(!set.contains("B"));

        let restored = complete_coverage(&graph, &mut set, &mut diagnostics);
        assert_eq!(restored, vec!["B".to_string(), "G".to_string()]);
        let b = set.get("B").unwrap();
        assert_eq!(b.branch, Branch::Secondary);
        assert_eq!(b.level, 1);
        let g = set.get("G").unwrap();
        assert_eq!(g.parent.as_deref(), Some("B"));
        assert_eq!(g.branch, Branch::Secondary);
        assert_eq!(g.level, 2);
    }

    #[test]
    fn unions_parents_of_known_equipment() {
        let records = vec![
            feed(("A", "Switchboard"), ("R", "Switchboard"), Some("Primary")),
            feed(("B", "Switchboard"), ("R", "Switchboard"), Some("Secondary")),
            feed(("U", "Utility"), ("A", "Switchboard"), Some("Normal")),
            feed(("U", "Utility"), ("B", "Switchboard"), Some("Alternate")),
        ];
        let mut diagnostics = Diagnostics::new();
        let graph = ConnectionGraph::build(&records, &mut diagnostics);
        let occurrences: Vec<_> = walk(&graph, "R", WalkDirection::Upstream, &mut diagnostics)
            .into_iter()
            .filter(|occ| occ.parent != "B")
            .collect();
        let mut set = consolidate(
            &graph,
            "R",
            &occurrences,
            &ConsolidationPolicy::default(),
            &mut diagnostics,
        )
        .unwrap();
        complete_coverage(&graph, &mut set, &mut diagnostics);
        let utility = set.get("U").unwrap();
        assert!(utility.parents.contains("A"));
        assert!(utility.parents.contains("B"));
        assert!(utility.sources.contains("Alternate"));
        for node in set.values() {
            if node.id != "R" {
                assert!(!node.parents.is_empty(), "{} lost its parents", node.id);
            }
        }
    }
}
