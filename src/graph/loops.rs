use super::{EquipmentNode, EquipmentSet, LoopGroup, LoopPattern};
use crate::diagnostics::{Diagnostics, Stage};
use crate::ir::{Branch, EquipmentKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// `RING-A-1`, `DC1 Ring B 2` -> key `RING-A`, `DC1 RING B`.
static RING_MEMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.*\bring[\s_-]*[a-z0-9]+)[\s_-]+\d+$").unwrap());
/// `ATS-1A`, `STS 2-B` -> key `ATS-1`, `STS 2`.
static DUAL_SOURCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.*\b(?:ats|sts)[\s_-]*\d+)[\s_-]*[a-z]$").unwrap());

pub const LOOP_ID_PREFIX: &str = "loop:";
pub const LOOP_NAME_SEPARATOR: &str = " ↔ ";

fn loop_key(node: &EquipmentNode) -> Option<(LoopPattern, String)> {
    for text in [node.name.as_str(), node.id.as_str()] {
        if let Some(caps) = RING_MEMBER_RE.captures(text.trim()) {
            return Some((LoopPattern::RingBus, caps[1].trim().to_uppercase()));
        }
    }
    if node.kind == EquipmentKind::TransferSwitch && node.sources.len() > 1 {
        for text in [node.name.as_str(), node.id.as_str()] {
            if let Some(caps) = DUAL_SOURCE_RE.captures(text.trim()) {
                return Some((LoopPattern::DualSourceTransfer, caps[1].trim().to_uppercase()));
            }
        }
    }
    None
}

/// Picks the member closest to the root; secondary wins a level tie.
fn representative_member<'a>(members: &[&'a EquipmentNode]) -> &'a EquipmentNode {
    let member_ids: HashSet<&str> = members.iter().map(|node| node.id.as_str()).collect();
    let rank = |node: &EquipmentNode| {
        let fed_from_inside = node
            .parent
            .as_deref()
            .is_some_and(|parent| member_ids.contains(parent));
        let tie = if node.branch == Branch::Secondary { 0 } else { 1 };
        (fed_from_inside, node.level, tie, node.seq)
    };
    let mut best = members[0];
    for &member in &members[1..] {
        if rank(member) < rank(best) {
            best = member;
        }
    }
    best
}

/// Collapses ring-bus and dual-source transfer groups into synthetic
/// representatives and rewires every reference to their members.
/// Returns the ids of the created representatives.
pub fn detect_loops(set: &mut EquipmentSet, diagnostics: &mut Diagnostics) -> Vec<String> {
    let mut groups: BTreeMap<(LoopPattern, String), Vec<String>> = BTreeMap::new();
    for node in set.ordered() {
        if node.id == set.root || node.is_loop_group() || node.is_suppressed() {
            continue;
        }
        if let Some(key) = loop_key(node) {
            groups.entry(key).or_default().push(node.id.clone());
        }
    }

    let mut created = Vec::new();
    for ((pattern, key), member_ids) in groups {
        if member_ids.len() < 2 {
            continue;
        }
        let rep_id = unique_loop_id(set, &key);
        let group_node = {
            let mut members: Vec<&EquipmentNode> =
                member_ids.iter().filter_map(|id| set.get(id)).collect();
            members.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            let anchor = representative_member(&members);
            build_group_node(&rep_id, pattern, &key, &members, anchor)
        };
        let members: Vec<String> = group_node
            .loop_group
            .as_ref()
            .map(|group| group.members.clone())
            .unwrap_or_default();
        diagnostics.info(
            Stage::LoopDetector,
            format!("collapsed {} into {rep_id} ({})", members.join(", "), group_node.name),
        );
        set.insert(group_node);
        let seq = members
            .iter()
            .filter_map(|id| set.get(id))
            .map(|node| node.seq)
            .min();
        if let (Some(seq), Some(rep)) = (seq, set.get_mut(&rep_id)) {
            rep.seq = seq;
        }
        rewire(set, &rep_id, &members, diagnostics);
        created.push(rep_id);
    }
    created
}

fn unique_loop_id(set: &EquipmentSet, key: &str) -> String {
    let base = format!("{LOOP_ID_PREFIX}{key}");
    if !set.contains(&base) {
        return base;
    }
    let mut idx = 2;
    loop {
        let candidate = format!("{base}#{idx}");
        if !set.contains(&candidate) {
            return candidate;
        }
        idx += 1;
    }
}

fn build_group_node(
    rep_id: &str,
    pattern: LoopPattern,
    key: &str,
    members: &[&EquipmentNode],
    anchor: &EquipmentNode,
) -> EquipmentNode {
    let member_ids: BTreeSet<&str> = members.iter().map(|node| node.id.as_str()).collect();
    let mut node = anchor.clone();
    node.id = rep_id.to_string();
    node.name = members
        .iter()
        .map(|member| member.name.as_str())
        .collect::<Vec<_>>()
        .join(LOOP_NAME_SEPARATOR);
    node.type_tag = "Loop Group".to_string();
    node.kind = EquipmentKind::LoopGroup;
    node.member_of = None;
    node.alternates.clear();
    node.sources.clear();
    node.parents.clear();
    node.branches_seen.clear();
    for member in members {
        node.sources.extend(member.sources.iter().cloned());
        node.branches_seen.extend(member.branches_seen.iter().copied());
        node.parents.extend(
            member
                .parents
                .iter()
                .filter(|parent| !member_ids.contains(parent.as_str()))
                .cloned(),
        );
        for alt in &member.alternates {
            if !member_ids.contains(alt.parent.as_str()) {
                node.add_alternate(&alt.parent, alt.classification, &alt.source_label);
            }
        }
    }
    node.loop_group = Some(LoopGroup {
        pattern,
        key: key.to_string(),
        members: members.iter().map(|member| member.id.clone()).collect(),
    });
    node
}

fn rewire(set: &mut EquipmentSet, rep_id: &str, members: &[String], diagnostics: &mut Diagnostics) {
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
    for id in members {
        if let Some(member) = set.get_mut(id) {
            member.member_of = Some(rep_id.to_string());
        }
    }

    let mut rewired = Vec::new();
    for node in set.values_mut() {
        if node.id == rep_id || member_set.contains(node.id.as_str()) {
            continue;
        }
        let touches = node.parents.iter().any(|p| member_set.contains(p.as_str()));
        if touches {
            node.parents.retain(|p| !member_set.contains(p.as_str()));
            node.parents.insert(rep_id.to_string());
        }
        if node
            .parent
            .as_deref()
            .is_some_and(|parent| member_set.contains(parent))
        {
            node.parent = Some(rep_id.to_string());
            rewired.push(node.id.clone());
        }
        for alt in &mut node.alternates {
            if member_set.contains(alt.parent.as_str()) {
                alt.parent = rep_id.to_string();
            }
        }
        let parent = node.parent.clone();
        node.alternates
            .retain(|alt| Some(alt.parent.as_str()) != parent.as_deref());
    }

    // Rewired children sit one level above the representative; their own
    // feeds follow so the tree stays level-consistent.
    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in set.values() {
        if let Some(parent) = &node.parent {
            children.entry(parent.clone()).or_default().push(node.id.clone());
        }
    }
    let mut queue: VecDeque<String> = rewired.into_iter().collect();
    let mut seen: HashSet<String> = HashSet::new();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let parent_level = set
            .get(&id)
            .and_then(|node| node.parent.as_deref())
            .and_then(|parent| set.get(parent))
            .map(|parent| parent.level);
        let Some(parent_level) = parent_level else {
            continue;
        };
        if let Some(node) = set.get_mut(&id)
            && node.level != parent_level + 1
        {
            diagnostics.debug_node(
                Stage::LoopDetector,
                &id,
                format!("level {} -> {}", node.level, parent_level + 1),
            );
            node.level = parent_level + 1;
        }
        if let Some(next) = children.get(&id) {
            queue.extend(next.iter().cloned());
        }
    }
}
