mod builder;
mod consolidate;
mod coverage;
mod loops;
mod walker;

pub use builder::*;
pub use consolidate::*;
pub use coverage::*;
pub use loops::*;
pub use walker::*;

use crate::ir::{Branch, Classification, EquipmentKind};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlternateParent {
    pub parent: String,
    pub classification: Classification,
    pub source_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopPattern {
    RingBus,
    DualSourceTransfer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopGroup {
    pub pattern: LoopPattern,
    pub key: String,
    pub members: Vec<String>,
}

/// Consolidated equipment. `parent` is the tree parent: the downstream
/// equipment this node was reached from while walking feeds upward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentNode {
    pub id: String,
    pub name: String,
    pub type_tag: String,
    pub kind: EquipmentKind,
    pub level: i32,
    pub branch: Branch,
    pub branches_seen: BTreeSet<Branch>,
    pub sources: BTreeSet<String>,
    pub parents: BTreeSet<String>,
    pub parent: Option<String>,
    pub alternates: Vec<AlternateParent>,
    pub classification: Classification,
    pub loop_group: Option<LoopGroup>,
    pub member_of: Option<String>,
    pub seq: usize,
}

impl EquipmentNode {
    pub(crate) fn from_info(info: &EquipmentInfo, seq: usize) -> Self {
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            type_tag: info.type_tag.clone(),
            kind: info.kind,
            level: 0,
            branch: Branch::None,
            branches_seen: BTreeSet::new(),
            sources: BTreeSet::new(),
            parents: BTreeSet::new(),
            parent: None,
            alternates: Vec::new(),
            classification: Classification::Normal,
            loop_group: None,
            member_of: None,
            seq,
        }
    }

    pub fn is_loop_group(&self) -> bool {
        self.loop_group.is_some()
    }

    /// Members stay in the set for span bookkeeping but never render.
    pub fn is_suppressed(&self) -> bool {
        self.member_of.is_some()
    }

    pub(crate) fn add_alternate(&mut self, parent: &str, classification: Classification, label: &str) {
        if self.parent.as_deref() == Some(parent)
            || self.alternates.iter().any(|alt| alt.parent == parent)
        {
            return;
        }
        self.alternates.push(AlternateParent {
            parent: parent.to_string(),
            classification,
            source_label: label.to_string(),
        });
    }
}

/// All equipment participating in one layout, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentSet {
    pub root: String,
    nodes: BTreeMap<String, EquipmentNode>,
    next_seq: usize,
}

impl EquipmentSet {
    pub fn new(root: EquipmentNode) -> Self {
        let mut nodes = BTreeMap::new();
        let root_id = root.id.clone();
        let next_seq = root.seq + 1;
        nodes.insert(root_id.clone(), root);
        Self {
            root: root_id,
            nodes,
            next_seq,
        }
    }

    pub fn get(&self, id: &str) -> Option<&EquipmentNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut EquipmentNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn insert(&mut self, mut node: EquipmentNode) {
        node.seq = self.next_seq;
        self.next_seq += 1;
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &EquipmentNode> {
        self.nodes.values()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut EquipmentNode> {
        self.nodes.values_mut()
    }

    /// Nodes in insertion order.
    pub fn ordered(&self) -> Vec<&EquipmentNode> {
        let mut nodes: Vec<&EquipmentNode> = self.nodes.values().collect();
        nodes.sort_by_key(|node| node.seq);
        nodes
    }

    /// Maps a suppressed loop member onto its representative.
    pub fn resolve<'a>(&'a self, id: &'a str) -> &'a str {
        match self.nodes.get(id).and_then(|node| node.member_of.as_deref()) {
            Some(rep) => rep,
            None => id,
        }
    }

    pub fn root_node(&self) -> Option<&EquipmentNode> {
        self.nodes.get(&self.root)
    }
}
