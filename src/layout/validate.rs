use serde::Serialize;

use crate::config::LayoutConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::graph::EquipmentSet;

use super::collision::{find_collisions, rendered_ids};
use super::tree::PlacementTree;
use super::types::Positions;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Misalignment {
    pub id: String,
    pub level: i32,
    pub expected_y: f32,
    pub actual_y: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub misaligned: Vec<Misalignment>,
    pub collisions: Vec<(String, String)>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.misaligned.is_empty() && self.collisions.is_empty()
    }
}

/// Checks row alignment and overlap without touching any position.
pub fn validate_layout(
    tree: &PlacementTree,
    set: &EquipmentSet,
    positions: &Positions,
    config: &LayoutConfig,
    diagnostics: &mut Diagnostics,
) -> ValidationReport {
    let ids = rendered_ids(tree, set, positions);
    let mut report = ValidationReport::default();

    for id in &ids {
        let (Some(level), Some(point)) = (tree.level(id), positions.get(id)) else {
            continue;
        };
        let expected_y = config.baseline(level, 0);
        if (point.y - expected_y).abs() > config.tolerance {
            diagnostics.warn_node(
                Stage::Validator,
                id,
                format!("y={} off level {level} baseline {expected_y}", point.y),
            );
            report.misaligned.push(Misalignment {
                id: id.clone(),
                level,
                expected_y,
                actual_y: point.y,
            });
        }
    }

    report.collisions = find_collisions(&ids, positions, config);
    for (a, b) in &report.collisions {
        diagnostics.warn(Stage::Validator, format!("{a} overlaps {b}"));
    }

    diagnostics.debug(
        Stage::Validator,
        format!(
            "{} nodes checked: {} misaligned, {} collisions",
            ids.len(),
            report.misaligned.len(),
            report.collisions.len()
        ),
    );
    report
}
