use std::collections::BTreeMap;

use crate::config::LayoutConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::graph::EquipmentSet;
use crate::ir::Branch;

use super::tree::PlacementTree;
use super::types::Positions;

const EPS: f32 = 1e-3;

/// Ids that end up on the canvas, in placement-tree order.
pub(crate) fn rendered_ids(tree: &PlacementTree, set: &EquipmentSet, positions: &Positions) -> Vec<String> {
    tree.order()
        .iter()
        .filter(|id| positions.contains(id))
        .filter(|id| !set.get(id).is_some_and(|node| node.is_suppressed()))
        .cloned()
        .collect()
}

pub fn collides(a: (f32, f32), b: (f32, f32), config: &LayoutConfig) -> bool {
    let dx = (a.0 - b.0).abs();
    let dy = (a.1 - b.1).abs();
    dx < config.pitch() - EPS && dy < config.node_height + config.min_gap - EPS
}

pub fn find_collisions(ids: &[String], positions: &Positions, config: &LayoutConfig) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (i, a) in ids.iter().enumerate() {
        let Some(pa) = positions.get(a) else {
            continue;
        };
        for b in &ids[i + 1..] {
            let Some(pb) = positions.get(b) else {
                continue;
            };
            if collides((pa.x, pa.y), (pb.x, pb.y), config) {
                out.push((a.clone(), b.clone()));
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct Mobility {
    movable: bool,
    lateral: bool,
    level: i32,
    branch: Branch,
    seq: usize,
}

impl Mobility {
    fn of(tree: &PlacementTree, set: &EquipmentSet, id: &str) -> Self {
        let node = set.get(id);
        let storage = node.is_some_and(|node| node.kind.is_power_storage());
        Mobility {
            movable: id != tree.root && !storage,
            lateral: tree.is_lateral(id),
            level: tree.level(id).unwrap_or(0),
            branch: node.map(|node| node.branch).unwrap_or(Branch::None),
            seq: node.map(|node| node.seq).unwrap_or(usize::MAX),
        }
    }

    /// Larger keys move first.
    fn priority(&self) -> (bool, i32, bool, usize) {
        (self.lateral, self.level, self.branch == Branch::Secondary, self.seq)
    }
}

/// Pushes overlapping nodes apart in bounded passes, then clamps each node to
/// its drift window. Returns the number of collisions left unresolved.
pub fn resolve_collisions(
    tree: &PlacementTree,
    set: &EquipmentSet,
    positions: &mut Positions,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> usize {
    let ids = rendered_ids(tree, set, positions);
    let mobility: BTreeMap<&str, Mobility> = ids
        .iter()
        .map(|id| (id.as_str(), Mobility::of(tree, set, id)))
        .collect();

    for pass in 0..config.collision_passes {
        let collisions = find_collisions(&ids, positions, config);
        if collisions.is_empty() {
            diagnostics.debug(Stage::Collision, format!("settled after {pass} passes"));
            return 0;
        }
        for (a, b) in &collisions {
            let (Some(pa), Some(pb)) = (positions.get(a), positions.get(b)) else {
                continue;
            };
            if !collides((pa.x, pa.y), (pb.x, pb.y), config) {
                continue;
            }
            let (ma, mb) = (mobility[a.as_str()], mobility[b.as_str()]);
            if ma.level == mb.level && ma.branch.is_opposite(mb.branch) && ma.movable && mb.movable {
                let mid = (pa.x + pb.x) / 2.0;
                let half = config.pitch() / 2.0;
                let (primary, secondary) = if ma.branch == Branch::Primary { (a, b) } else { (b, a) };
                positions.set_x(primary, mid - half);
                positions.set_x(secondary, mid + half);
                continue;
            }
            let (mover, fixed, mover_x, fixed_x) = match (ma.movable, mb.movable) {
                (false, false) => continue,
                (true, false) => (a, b, pa.x, pb.x),
                (false, true) => (b, a, pb.x, pa.x),
                (true, true) => {
                    if mb.priority() > ma.priority() {
                        (b, a, pb.x, pa.x)
                    } else {
                        (a, b, pa.x, pb.x)
                    }
                }
            };
            let direction = if (mover_x - fixed_x).abs() > EPS {
                (mover_x - fixed_x).signum()
            } else {
                match mobility[mover.as_str()].branch.direction() {
                    d if d != 0.0 => d,
                    _ => 1.0,
                }
            };
            diagnostics.debug_node(Stage::Collision, mover, format!("moved away from {fixed}"));
            positions.set_x(mover, fixed_x + direction * config.pitch());
        }
        clamp_to_drift_window(&ids, &mobility, positions, config);
    }

    let remaining = find_collisions(&ids, positions, config).len();
    if remaining > 0 {
        diagnostics.warn(
            Stage::Collision,
            format!("{remaining} collisions left after {} passes", config.collision_passes),
        );
    }
    remaining
}

fn clamp_to_drift_window(
    ids: &[String],
    mobility: &BTreeMap<&str, Mobility>,
    positions: &mut Positions,
    config: &LayoutConfig,
) {
    let w = config.drift_window;
    for id in ids {
        let Some(m) = mobility.get(id.as_str()) else {
            continue;
        };
        if !m.movable {
            continue;
        }
        let (Some(anchor), Some(point)) = (positions.anchor(id), positions.get(id)) else {
            continue;
        };
        // Drift is allowed mostly toward the node's own side.
        let (lo, hi) = match m.branch {
            Branch::Primary => (anchor.x - w, anchor.x + w / 4.0),
            Branch::Secondary => (anchor.x - w / 4.0, anchor.x + w),
            Branch::None => (anchor.x - w / 2.0, anchor.x + w / 2.0),
        };
        let clamped = point.x.clamp(lo, hi);
        if clamped != point.x {
            positions.set_x(id, clamped);
        }
    }
}

/// Final per-row sweep. Sorts each row by x and pushes neighbours outward
/// from a pivot so every pair sits at least one pitch apart.
pub fn settle_rows(
    tree: &PlacementTree,
    set: &EquipmentSet,
    positions: &mut Positions,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) {
    let ids = rendered_ids(tree, set, positions);
    let mut rows: BTreeMap<i64, Vec<(String, f32)>> = BTreeMap::new();
    for id in &ids {
        if let Some(point) = positions.get(id) {
            let key = (point.y * 1000.0).round() as i64;
            rows.entry(key).or_default().push((id.clone(), point.x));
        }
    }

    let pitch = config.pitch();
    for (_, mut row) in rows {
        if row.len() < 2 {
            continue;
        }
        row.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let fixed = |id: &str| !Mobility::of(tree, set, id).movable;
        let pivot = row
            .iter()
            .position(|(id, _)| id == &tree.root)
            .or_else(|| row.iter().position(|(id, _)| fixed(id.as_str())))
            .unwrap_or(row.len() / 2);

        for k in pivot + 1..row.len() {
            let min_x = row[k - 1].1 + pitch;
            if row[k].1 < min_x - EPS {
                if fixed(row[k].0.as_str()) {
                    diagnostics.warn_node(Stage::Collision, &row[k].0, "fixed equipment shifted to clear its row");
                }
                row[k].1 = min_x;
            }
        }
        for k in (0..pivot).rev() {
            let max_x = row[k + 1].1 - pitch;
            if row[k].1 > max_x + EPS {
                if fixed(row[k].0.as_str()) {
                    diagnostics.warn_node(Stage::Collision, &row[k].0, "fixed equipment shifted to clear its row");
                }
                row[k].1 = max_x;
            }
        }
        for (id, x) in row {
            positions.set_x(&id, x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConnectionGraph, ConsolidationPolicy, WalkDirection, consolidate, walk};
    use crate::ir::{ConnectionRecord, Endpoint};
    use crate::layout::types::Point;

    fn feed(from: (&str, &str), to: (&str, &str), source: Option<&str>) -> ConnectionRecord {
        ConnectionRecord::new(
            Endpoint::new(from.0, from.0, from.1),
            Endpoint::new(to.0, to.0, to.1),
            source,
        )
    }

    fn fixture(records: &[ConnectionRecord]) -> (PlacementTree, EquipmentSet) {
        let mut diagnostics = Diagnostics::new();
        let graph = ConnectionGraph::build(records, &mut diagnostics);
        let occurrences = walk(&graph, "R", WalkDirection::Upstream, &mut diagnostics);
        let set = consolidate(
            &graph,
            "R",
            &occurrences,
            &ConsolidationPolicy::default(),
            &mut diagnostics,
        )
        .unwrap();
        (PlacementTree::build(&graph, &set, &mut diagnostics), set)
    }

    fn place(positions: &mut Positions, entries: &[(&str, f32, f32)]) {
        for (id, x, y) in entries {
            positions.set(id, Point { x: *x, y: *y });
        }
        positions.freeze_anchors();
    }

    #[test]
    fn opposite_branches_split_symmetrically() {
        let config = LayoutConfig::default();
        let (tree, set) = fixture(&[
            feed(("P", "Switchboard"), ("R", "Switchboard"), Some("Primary")),
            feed(("S", "Switchboard"), ("R", "Switchboard"), Some("Secondary")),
        ]);
        let mut positions = Positions::default();
        place(&mut positions, &[("R", 0.0, 0.0), ("P", 10.0, -150.0), ("S", 0.0, -150.0)]);
        let left = resolve_collisions(&tree, &set, &mut positions, &config, &mut Diagnostics::new());
        assert_eq!(left, 0);
        let p = positions.get("P").unwrap().x;
        let s = positions.get("S").unwrap().x;
        assert_eq!(p, 5.0 - config.pitch() / 2.0);
        assert_eq!(s, 5.0 + config.pitch() / 2.0);
    }

    #[test]
    fn power_storage_and_root_never_move() {
        let config = LayoutConfig::default();
        let (tree, set) = fixture(&[
            feed(("UPS", "UPS"), ("R", "PDU"), Some("Primary")),
            feed(("A", "Switchboard"), ("R", "PDU"), Some("Primary")),
        ]);
        let mut positions = Positions::default();
        place(&mut positions, &[("R", 0.0, 0.0), ("UPS", 0.0, -150.0), ("A", -20.0, -150.0)]);
        resolve_collisions(&tree, &set, &mut positions, &config, &mut Diagnostics::new());
        assert_eq!(positions.get("UPS").unwrap().x, 0.0);
        assert_eq!(positions.get("R").unwrap().x, 0.0);
        assert_eq!(positions.get("A").unwrap().x, -config.pitch());
    }

    #[test]
    fn deeper_node_moves_first() {
        let config = LayoutConfig {
            level_spacing: 60.0,
            node_height: 20.0,
            ..Default::default()
        };
        let (tree, set) = fixture(&[
            feed(("A", "Switchboard"), ("R", "Switchboard"), None),
            feed(("B", "Switchboard"), ("A", "Switchboard"), None),
        ]);
        let mut positions = Positions::default();
        // Rows closer than node_height + min_gap still count as colliding.
        place(&mut positions, &[("R", 0.0, 0.0), ("A", 300.0, -60.0), ("B", 290.0, -100.0)]);
        resolve_collisions(&tree, &set, &mut positions, &config, &mut Diagnostics::new());
        assert_eq!(positions.get("A").unwrap().x, 300.0);
        assert_eq!(positions.get("B").unwrap().x, 300.0 - config.pitch());
    }

    #[test]
    fn drift_window_bounds_movement() {
        let config = LayoutConfig {
            drift_window: 40.0,
            ..Default::default()
        };
        let (tree, set) = fixture(&[
            feed(("A", "Switchboard"), ("R", "Switchboard"), Some("Primary")),
            feed(("B", "Switchboard"), ("R", "Switchboard"), Some("Primary")),
        ]);
        let mut positions = Positions::default();
        place(&mut positions, &[("R", 0.0, 0.0), ("A", 0.0, -150.0), ("B", 0.0, -150.0)]);
        let left = resolve_collisions(&tree, &set, &mut positions, &config, &mut Diagnostics::new());
        let a = positions.get("A").unwrap().x;
        let b = positions.get("B").unwrap().x;
        assert!(a >= -40.0 && a <= 10.0);
        assert!(b >= -40.0 && b <= 10.0);
        assert!(left > 0);

        let mut diagnostics = Diagnostics::new();
        settle_rows(&tree, &set, &mut positions, &config, &mut diagnostics);
        let ids = rendered_ids(&tree, &set, &positions);
        assert!(find_collisions(&ids, &positions, &config).is_empty());
    }

    #[test]
    fn settle_keeps_root_as_pivot() {
        let config = LayoutConfig::default();
        let (tree, set) = fixture(&[feed(("A", "Switchboard"), ("R", "Switchboard"), None)]);
        let mut positions = Positions::default();
        place(&mut positions, &[("R", 0.0, 0.0), ("A", 50.0, 0.0)]);
        settle_rows(&tree, &set, &mut positions, &config, &mut Diagnostics::new());
        assert_eq!(positions.get("R").unwrap().x, 0.0);
        assert_eq!(positions.get("A").unwrap().x, config.pitch());
    }
}
