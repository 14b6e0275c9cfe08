use super::{ConnectionGraph, Relation};
use crate::diagnostics::{Diagnostics, Stage};
use crate::ir::{Branch, Classification};
use serde::Serialize;
use std::collections::HashSet;

/// Hop ceiling for every walk. Equipment further than this from the start is
/// left out of the layout.
pub const MAX_HOPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkDirection {
    /// Toward the equipment that feeds the start.
    Upstream,
    /// Toward the equipment the start feeds.
    Downstream,
}

/// One arrival at a piece of equipment along one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occurrence {
    pub id: String,
    pub level: i32,
    pub branch: Branch,
    pub parent: String,
    pub source_label: String,
    pub classification: Classification,
    pub seq: usize,
}

/// Branch a first-hop relation opens. Unlabeled non-normal feeds count as
/// secondary; everything else unlabeled is primary.
pub fn first_hop_branch(relation: &Relation) -> Branch {
    match relation.label_branch() {
        Branch::None if !relation.classification.is_normal() => Branch::Secondary,
        Branch::None => Branch::Primary,
        branch => branch,
    }
}

struct Walk<'a> {
    graph: &'a ConnectionGraph,
    direction: WalkDirection,
    out: Vec<Occurrence>,
    truncated: HashSet<String>,
}

pub fn walk(
    graph: &ConnectionGraph,
    start: &str,
    direction: WalkDirection,
    diagnostics: &mut Diagnostics,
) -> Vec<Occurrence> {
    if !graph.contains(start) {
        diagnostics.debug_node(Stage::Walker, start, "start id unknown; nothing to walk");
        return Vec::new();
    }
    let mut state = Walk {
        graph,
        direction,
        out: Vec::new(),
        truncated: HashSet::new(),
    };
    let mut visited = HashSet::new();
    visited.insert(start.to_string());
    expand(&mut state, start, 0, Branch::None, &mut visited);

    let mut truncated: Vec<String> = state.truncated.into_iter().collect();
    truncated.sort();
    for id in truncated {
        diagnostics.warn_node(
            Stage::Walker,
            &id,
            format!("hop ceiling of {MAX_HOPS} reached; feeds beyond this equipment dropped"),
        );
    }
    diagnostics.debug(
        Stage::Walker,
        format!("{direction:?} walk from {start} produced {} occurrences", state.out.len()),
    );
    state.out
}

/// `visited` holds the current path only; each branch adds its neighbor
/// before descending and takes it back out on return.
fn expand(state: &mut Walk<'_>, id: &str, depth: usize, branch: Branch, visited: &mut HashSet<String>) {
    let graph = state.graph;
    let relations: Vec<&Relation> = match state.direction {
        WalkDirection::Upstream => graph.upstream(id).collect(),
        WalkDirection::Downstream => graph.downstream(id).collect(),
    };
    for relation in relations {
        let neighbor = match state.direction {
            WalkDirection::Upstream => relation.origin.as_str(),
            WalkDirection::Downstream => relation.destination.as_str(),
        };
        if depth + 1 > MAX_HOPS {
            state.truncated.insert(id.to_string());
            continue;
        }
        let next_branch = if depth == 0 {
            first_hop_branch(relation)
        } else {
            branch
        };

        let bypass = relation.classification == Classification::Bypass;
        if !bypass && visited.contains(neighbor) {
            continue;
        }

        let seq = state.out.len();
        state.out.push(Occurrence {
            id: neighbor.to_string(),
            level: depth as i32 + 1,
            branch: next_branch,
            parent: id.to_string(),
            source_label: relation.source_label.clone(),
            classification: relation.classification,
            seq,
        });

        if bypass {
            // Bypass rings render fully: the branch starts a fresh path.
            let outer = std::mem::take(visited);
            visited.insert(neighbor.to_string());
            expand(state, neighbor, depth + 1, next_branch, visited);
            *visited = outer;
        } else {
            visited.insert(neighbor.to_string());
            expand(state, neighbor, depth + 1, next_branch, visited);
            visited.remove(neighbor);
        }
    }
}
