use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::Serialize;

use crate::diagnostics::{Diagnostics, Stage};
use crate::graph::{ConnectionGraph, EquipmentNode, EquipmentSet};
use crate::ir::{Branch, EquipmentKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Root,
    Primary,
    Secondary,
    Lateral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub parent: Option<String>,
    pub placement: Placement,
    /// Placement level: laterals share their parent's level.
    pub level: i32,
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
    pub lateral: Vec<String>,
}

impl TreeNode {
    fn new(id: &str, parent: Option<&str>, placement: Placement, level: i32) -> Self {
        Self {
            id: id.to_string(),
            parent: parent.map(str::to_string),
            placement,
            level,
            primary: Vec::new(),
            secondary: Vec::new(),
            lateral: Vec::new(),
        }
    }

    pub fn children(&self) -> impl Iterator<Item = &String> {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .chain(self.lateral.iter())
    }
}

/// Strict tree rooted at the selected equipment; children are upstream feeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementTree {
    pub root: String,
    nodes: BTreeMap<String, TreeNode>,
    order: Vec<String>,
}

/// Power storage pairs beside its parent instead of stacking above it.
pub fn is_lateral(graph: &ConnectionGraph, parent: &EquipmentNode, child: &EquipmentNode) -> bool {
    if !child.kind.is_power_storage() {
        return false;
    }
    let bidirectional = graph.feeds(&child.id, &parent.id) && graph.feeds(&parent.id, &child.id);
    bidirectional || parent.kind == EquipmentKind::DistributionSwitch
}

impl PlacementTree {
    pub fn build(graph: &ConnectionGraph, set: &EquipmentSet, diagnostics: &mut Diagnostics) -> Self {
        let mut children_of: BTreeMap<&str, Vec<&EquipmentNode>> = BTreeMap::new();
        for node in set.ordered() {
            if node.id == set.root {
                continue;
            }
            let parent = node
                .parent
                .as_deref()
                .filter(|parent| set.contains(parent))
                .unwrap_or(set.root.as_str());
            children_of.entry(parent).or_default().push(node);
        }

        let mut tree = PlacementTree {
            root: set.root.clone(),
            nodes: BTreeMap::new(),
            order: Vec::new(),
        };
        tree.nodes.insert(
            set.root.clone(),
            TreeNode::new(&set.root, None, Placement::Root, 0),
        );

        let mut queue: VecDeque<String> = VecDeque::new();
        let mut placed: HashSet<String> = HashSet::new();
        queue.push_back(set.root.clone());
        placed.insert(set.root.clone());
        tree.drain(graph, set, &children_of, &mut queue, &mut placed, diagnostics);

        // Anything the parent chain never reached hangs off the root.
        for node in set.ordered() {
            if placed.contains(&node.id) {
                continue;
            }
            diagnostics.warn_node(
                Stage::PlacementTree,
                &node.id,
                "unreachable through parent chain; attached to the selected equipment",
            );
            tree.attach(graph, set, &set.root, node);
            placed.insert(node.id.clone());
            queue.push_back(node.id.clone());
            tree.drain(graph, set, &children_of, &mut queue, &mut placed, diagnostics);
        }

        diagnostics.debug(
            Stage::PlacementTree,
            format!("placement tree holds {} nodes", tree.order.len()),
        );
        tree
    }

    fn drain(
        &mut self,
        graph: &ConnectionGraph,
        set: &EquipmentSet,
        children_of: &BTreeMap<&str, Vec<&EquipmentNode>>,
        queue: &mut VecDeque<String>,
        placed: &mut HashSet<String>,
        diagnostics: &mut Diagnostics,
    ) {
        while let Some(id) = queue.pop_front() {
            self.order.push(id.clone());
            let Some(children) = children_of.get(id.as_str()) else {
                continue;
            };
            for child in children {
                if placed.contains(&child.id) {
                    diagnostics.warn_node(
                        Stage::PlacementTree,
                        &child.id,
                        format!("residual cycle through {id}; second placement skipped"),
                    );
                    continue;
                }
                self.attach(graph, set, &id, child);
                placed.insert(child.id.clone());
                // Laterals still get their own feeds expanded.
                queue.push_back(child.id.clone());
            }
        }
    }

    fn attach(&mut self, graph: &ConnectionGraph, set: &EquipmentSet, parent_id: &str, child: &EquipmentNode) {
        let Some(parent_level) = self.nodes.get(parent_id).map(|node| node.level) else {
            return;
        };
        let placement = match set.get(parent_id) {
            Some(parent) if !child.is_suppressed() && is_lateral(graph, parent, child) => {
                Placement::Lateral
            }
            _ => match child.branch {
                Branch::Secondary => Placement::Secondary,
                Branch::Primary | Branch::None => Placement::Primary,
            },
        };
        let level = if placement == Placement::Lateral {
            parent_level
        } else {
            parent_level + 1
        };
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            match placement {
                Placement::Lateral => parent.lateral.push(child.id.clone()),
                Placement::Secondary => parent.secondary.push(child.id.clone()),
                _ => parent.primary.push(child.id.clone()),
            }
        }
        self.nodes.insert(
            child.id.clone(),
            TreeNode::new(&child.id, Some(parent_id), placement, level),
        );
    }

    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Breadth-first order from the root.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn level(&self, id: &str) -> Option<i32> {
        self.nodes.get(id).map(|node| node.level)
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).and_then(|node| node.parent.as_deref())
    }

    pub fn is_lateral(&self, id: &str) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| node.placement == Placement::Lateral)
    }

    pub(crate) fn set_level(&mut self, id: &str, level: i32) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.level = level;
        }
    }

    /// Parent chain above `id`, nearest first, bounded by `limit` hops.
    pub fn ancestors(&self, id: &str, limit: usize) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if out.len() >= limit {
                break;
            }
            out.push(parent);
            current = self.parent(parent);
        }
        out
    }
}
