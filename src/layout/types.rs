use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::ir::Classification;

use super::validate::ValidationReport;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Horizontal footprint reserved for a node and its upstream subtree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubtreeSpan {
    pub width: f32,
    pub left: f32,
    pub right: f32,
}

impl SubtreeSpan {
    pub const ZERO: SubtreeSpan = SubtreeSpan {
        width: 0.0,
        left: 0.0,
        right: 0.0,
    };

    pub fn leaf(node_width: f32) -> Self {
        Self {
            width: node_width,
            left: node_width / 2.0,
            right: node_width / 2.0,
        }
    }

    pub fn from_sides(left: f32, right: f32) -> Self {
        Self {
            width: left + right,
            left,
            right,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.width <= 0.0
    }
}

/// Mutable coordinate table shared by the geometric passes. `anchors` keeps
/// the positions the assigner produced so later passes can bound drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Positions {
    pub(crate) points: BTreeMap<String, Point>,
    pub(crate) anchors: BTreeMap<String, Point>,
}

impl Positions {
    pub fn get(&self, id: &str) -> Option<Point> {
        self.points.get(id).copied()
    }

    pub fn anchor(&self, id: &str) -> Option<Point> {
        self.anchors.get(id).copied()
    }

    pub fn set(&mut self, id: &str, point: Point) {
        self.points.insert(id.to_string(), point);
    }

    pub fn set_x(&mut self, id: &str, x: f32) {
        if let Some(point) = self.points.get_mut(id) {
            point.x = x;
        }
    }

    pub fn set_y(&mut self, id: &str, y: f32) {
        if let Some(point) = self.points.get_mut(id) {
            point.y = y;
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.points.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub(crate) fn freeze_anchors(&mut self) {
        self.anchors = self.points.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub label: String,
    pub style_class: String,
    pub level: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub classification: Classification,
    pub source_label: String,
    /// Not the tree edge between the two nodes; drawn as an auxiliary path.
    pub auxiliary: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub selected: String,
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<LayoutEdge>,
    pub bounds: Bounds,
    pub report: ValidationReport,
    pub diagnostics: Diagnostics,
}

impl LayoutResult {
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edges_touching<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a LayoutEdge> {
        self.edges
            .iter()
            .filter(move |edge| edge.source_id == id || edge.target_id == id)
    }
}
