use crate::config::LayoutConfig;
use crate::layout::{Bounds, LayoutResult};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub selected: String,
    pub node_width: f32,
    pub node_height: f32,
    pub bounds: Bounds,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub label: String,
    pub style_class: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDump {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub classification: String,
    pub source_label: String,
    pub auxiliary: bool,
}

impl LayoutDump {
    pub fn from_layout(layout: &LayoutResult, config: &LayoutConfig) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                x: node.x,
                y: node.y,
                label: node.label.clone(),
                style_class: node.style_class.clone(),
            })
            .collect();

        let edges = layout
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                source_id: edge.source_id.clone(),
                target_id: edge.target_id.clone(),
                classification: format!("{:?}", edge.classification).to_lowercase(),
                source_label: edge.source_label.clone(),
                auxiliary: edge.auxiliary,
            })
            .collect();

        let warnings = layout
            .diagnostics
            .warnings()
            .map(|entry| match &entry.node {
                Some(node) => format!("{:?} [{node}]: {}", entry.stage, entry.message),
                None => format!("{:?}: {}", entry.stage, entry.message),
            })
            .collect();

        LayoutDump {
            selected: layout.selected.clone(),
            node_width: config.node_width,
            node_height: config.node_height,
            bounds: layout.bounds,
            nodes,
            edges,
            warnings,
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or stdout when absent.
pub fn write_layout_dump(path: Option<&Path>, layout: &LayoutResult, config: &LayoutConfig) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout, config);
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
