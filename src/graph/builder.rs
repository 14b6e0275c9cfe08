use crate::diagnostics::{Diagnostics, Stage};
use crate::ir::{Branch, Classification, ConnectionRecord, Endpoint, EquipmentKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const PLACEHOLDER_TYPE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentInfo {
    pub id: String,
    pub name: String,
    pub type_tag: String,
    pub kind: EquipmentKind,
    /// First-seen order across all records.
    pub seq: usize,
    pub placeholder_name: bool,
    pub placeholder_type: bool,
}

/// One origin -> destination pair expanded from a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relation {
    pub seq: usize,
    pub origin: String,
    pub destination: String,
    pub source_label: String,
    pub classification: Classification,
}

impl Relation {
    pub fn label_branch(&self) -> Branch {
        Branch::from_label(&self.source_label)
    }
}

/// Bidirectional adjacency over the raw connection records.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    equipment: BTreeMap<String, EquipmentInfo>,
    relations: Vec<Relation>,
    upstream: BTreeMap<String, Vec<usize>>,
    downstream: BTreeMap<String, Vec<usize>>,
}

pub fn placeholder_name(id: &str) -> String {
    format!("Unnamed ({id})")
}

pub fn classify_relation(origin: EquipmentKind, destination: EquipmentKind, label: &str) -> Classification {
    let secondary = crate::ir::is_secondary_label(label);
    if origin.is_power_storage() && secondary {
        Classification::Bypass
    } else if origin.is_power_storage() && destination == EquipmentKind::CriticalPanel {
        Classification::Bypass
    } else if secondary {
        Classification::Redundant
    } else {
        Classification::Normal
    }
}

impl ConnectionGraph {
    pub fn build(records: &[ConnectionRecord], diagnostics: &mut Diagnostics) -> Self {
        let mut graph = ConnectionGraph::default();

        // Pass 1: equipment identity. Later records may fill in a name or
        // type an earlier record left out.
        for record in records {
            for endpoint in record.origins.iter().chain(record.destinations.iter()) {
                graph.register(endpoint, diagnostics);
            }
        }

        // Pass 2: relations, classified against the settled kinds.
        let mut seen: HashSet<(String, String, String)> = HashSet::new();
        for (record_idx, record) in records.iter().enumerate() {
            let label = record.source.clone().unwrap_or_default();
            if record.origins.is_empty() || record.destinations.is_empty() {
                diagnostics.warn(
                    Stage::Builder,
                    format!("record {record_idx} has no origin or no destination; skipped"),
                );
                continue;
            }
            for origin in &record.origins {
                for destination in &record.destinations {
                    let (origin_id, destination_id) = (origin.id.trim(), destination.id.trim());
                    if origin_id.is_empty() || destination_id.is_empty() {
                        continue;
                    }
                    if origin_id == destination_id {
                        diagnostics.warn_node(
                            Stage::Builder,
                            origin_id,
                            format!("record {record_idx} connects equipment to itself; skipped"),
                        );
                        continue;
                    }
                    let key = (
                        origin_id.to_string(),
                        destination_id.to_string(),
                        label.clone(),
                    );
                    if !seen.insert(key) {
                        continue;
                    }
                    let classification =
                        classify_relation(graph.kind(origin_id), graph.kind(destination_id), &label);
                    let seq = graph.relations.len();
                    graph.relations.push(Relation {
                        seq,
                        origin: origin_id.to_string(),
                        destination: destination_id.to_string(),
                        source_label: label.clone(),
                        classification,
                    });
                    graph
                        .upstream
                        .entry(destination_id.to_string())
                        .or_default()
                        .push(seq);
                    graph
                        .downstream
                        .entry(origin_id.to_string())
                        .or_default()
                        .push(seq);
                }
            }
        }

        diagnostics.debug(
            Stage::Builder,
            format!(
                "built graph with {} equipment and {} relations",
                graph.equipment.len(),
                graph.relations.len()
            ),
        );
        graph
    }

    fn register(&mut self, endpoint: &Endpoint, diagnostics: &mut Diagnostics) {
        let id = endpoint.id.trim();
        if id.is_empty() {
            diagnostics.warn(Stage::Builder, "endpoint without an id; skipped");
            return;
        }
        let name = endpoint
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let type_tag = endpoint
            .type_tag
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty());

        let next_seq = self.equipment.len();
        let info = self
            .equipment
            .entry(id.to_string())
            .or_insert_with(|| EquipmentInfo {
                id: id.to_string(),
                name: placeholder_name(id),
                type_tag: PLACEHOLDER_TYPE.to_string(),
                kind: EquipmentKind::Other,
                seq: next_seq,
                placeholder_name: true,
                placeholder_type: true,
            });
        if info.placeholder_name
            && let Some(name) = name
        {
            info.name = name.to_string();
            info.placeholder_name = false;
        }
        if info.placeholder_type
            && let Some(tag) = type_tag
        {
            info.type_tag = tag.to_string();
            info.kind = EquipmentKind::from_type_tag(tag);
            info.placeholder_type = false;
        }
        if name.is_none() || type_tag.is_none() {
            diagnostics.debug_node(Stage::Builder, id, "endpoint missing name or type");
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.equipment.contains_key(id)
    }

    pub fn info(&self, id: &str) -> Option<&EquipmentInfo> {
        self.equipment.get(id)
    }

    pub fn kind(&self, id: &str) -> EquipmentKind {
        self.equipment
            .get(id)
            .map(|info| info.kind)
            .unwrap_or(EquipmentKind::Other)
    }

    pub fn equipment(&self) -> impl Iterator<Item = &EquipmentInfo> {
        self.equipment.values()
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Relations feeding `id`, in record order.
    pub fn upstream(&self, id: &str) -> impl Iterator<Item = &Relation> {
        self.upstream
            .get(id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.relations[idx])
    }

    /// Relations fed by `id`, in record order.
    pub fn downstream(&self, id: &str) -> impl Iterator<Item = &Relation> {
        self.downstream
            .get(id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.relations[idx])
    }

    pub fn feeds(&self, origin: &str, destination: &str) -> bool {
        self.downstream(origin)
            .any(|relation| relation.destination == destination)
    }

    pub fn relation_between(&self, origin: &str, destination: &str) -> Option<&Relation> {
        self.downstream(origin)
            .find(|relation| relation.destination == destination)
    }
}
