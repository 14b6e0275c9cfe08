use std::collections::VecDeque;

use crate::config::LayoutConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::graph::EquipmentSet;

use super::span::{SpanTable, block_offset};
use super::tree::PlacementTree;
use super::types::{Point, Positions};

struct Assigner<'a> {
    tree: &'a PlacementTree,
    set: &'a EquipmentSet,
    spans: &'a SpanTable,
    config: &'a LayoutConfig,
    positions: Positions,
    laterals: VecDeque<(String, String, usize)>,
}

/// Places the root at the configured origin, primary blocks to its left and
/// secondary blocks to its right, then runs the lateral post-pass. The result
/// also records every position as the anchor later passes drift around.
pub fn assign_positions(
    tree: &PlacementTree,
    set: &EquipmentSet,
    spans: &SpanTable,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> Positions {
    let mut assigner = Assigner {
        tree,
        set,
        spans,
        config,
        positions: Positions::default(),
        laterals: VecDeque::new(),
    };
    assigner.place(&tree.root, config.root_x);

    while let Some((lateral, parent, idx)) = assigner.laterals.pop_front() {
        let Some(anchor) = assigner.positions.get(&parent) else {
            continue;
        };
        let x = anchor.x - config.lateral_offset * (idx as f32 + 1.0);
        diagnostics.debug_node(
            Stage::Lateral,
            &lateral,
            format!("paired beside {parent} at x={x}"),
        );
        assigner.place(&lateral, x);
    }

    let mut positions = assigner.positions;
    positions.freeze_anchors();
    diagnostics.debug(Stage::Position, format!("assigned {} positions", positions.len()));
    positions
}

impl Assigner<'_> {
    fn y_for(&self, id: &str) -> f32 {
        let level = self.tree.level(id).unwrap_or(0);
        self.config.baseline(level, 0)
    }

    fn rendered(&self, id: &str) -> bool {
        !self.set.get(id).is_some_and(|node| node.is_suppressed())
    }

    fn place(&mut self, id: &str, x: f32) {
        let y = self.y_for(id);
        self.positions.set(id, Point { x, y });
        let tree = self.tree;
        let Some(node) = tree.get(id) else {
            return;
        };

        let primary: Vec<String> = node
            .primary
            .iter()
            .filter(|child| self.rendered(child))
            .cloned()
            .collect();
        let secondary: Vec<String> = node
            .secondary
            .iter()
            .filter(|child| self.rendered(child))
            .cloned()
            .collect();
        for (idx, lateral) in node.lateral.iter().enumerate() {
            self.laterals
                .push_back((lateral.clone(), id.to_string(), idx));
        }

        let split_above = self.spans.split_above(id);
        match (primary.is_empty(), secondary.is_empty()) {
            (true, true) => {}
            (false, false) => {
                let offset = block_offset(self.config, self.spans.group_depth(&primary), split_above);
                let start = x - offset - self.spans.group_footprint(&primary, self.config);
                self.place_row(&primary, start);
                let offset = block_offset(self.config, self.spans.group_depth(&secondary), split_above);
                self.place_row(&secondary, x + offset);
            }
            _ => {
                let group = if primary.is_empty() { &secondary } else { &primary };
                if group.len() == 1 {
                    self.place(&group[0], x);
                } else {
                    let start = x - self.spans.group_footprint(group, self.config) / 2.0;
                    self.place_row(group, start);
                }
            }
        }
    }

    /// Lays children left to right starting at the block's left edge.
    fn place_row(&mut self, children: &[String], left_edge: f32) {
        let mut cursor = left_edge;
        for child in children {
            let span = self.spans.get(child);
            if span.is_zero() {
                continue;
            }
            self.place(child, cursor + span.left);
            cursor += span.width + self.config.min_gap;
        }
    }
}
