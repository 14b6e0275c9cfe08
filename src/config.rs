use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Spacing and sizing constants threaded through every layout pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    pub min_gap: f32,
    pub level_spacing: f32,
    pub root_x: f32,
    pub root_y: f32,
    pub lateral_offset: f32,
    /// Extra block offset per level of branch subtree depth.
    pub branch_depth_step: f32,
    /// Extra block offset once an ancestor has split into both branches.
    pub split_widen: f32,
    pub drift_window: f32,
    pub collision_passes: usize,
    pub tolerance: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 140.0,
            node_height: 60.0,
            min_gap: 30.0,
            level_spacing: 150.0,
            root_x: 0.0,
            root_y: 0.0,
            lateral_offset: 180.0,
            branch_depth_step: 12.0,
            split_widen: 24.0,
            drift_window: 340.0,
            collision_passes: 12,
            tolerance: 0.5,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("node_width", self.node_width),
            ("node_height", self.node_height),
            ("min_gap", self.min_gap),
            ("level_spacing", self.level_spacing),
            ("lateral_offset", self.lateral_offset),
            ("tolerance", self.tolerance),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        let non_negative = [
            ("branch_depth_step", self.branch_depth_step),
            ("split_widen", self.split_widen),
            ("drift_window", self.drift_window),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Negative { field, value });
            }
        }
        if !(self.root_x.is_finite() && self.root_y.is_finite()) {
            return Err(ConfigError::NonFiniteOrigin);
        }
        if self.collision_passes == 0 {
            return Err(ConfigError::NoCollisionPasses);
        }
        if self.level_spacing < self.node_height + self.min_gap {
            return Err(ConfigError::LevelSpacingTooTight {
                level_spacing: self.level_spacing,
                required: self.node_height + self.min_gap,
            });
        }
        Ok(())
    }

    /// Minimum center-to-center distance between two nodes on one row.
    pub fn pitch(&self) -> f32 {
        self.node_width + self.min_gap
    }

    pub fn baseline(&self, level: i32, root_level: i32) -> f32 {
        self.root_y - (level - root_level) as f32 * self.level_spacing
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    node_width: Option<f32>,
    node_height: Option<f32>,
    min_gap: Option<f32>,
    level_spacing: Option<f32>,
    root_x: Option<f32>,
    root_y: Option<f32>,
    lateral_offset: Option<f32>,
    branch_depth_step: Option<f32>,
    split_widen: Option<f32>,
    drift_window: Option<f32>,
    collision_passes: Option<usize>,
    tolerance: Option<f32>,
}

/// Parses a camelCase JSON or JSON5 document of overrides on top of the
/// defaults. The result is not validated here; `compute_layout` does that.
pub fn parse_config(contents: &str) -> anyhow::Result<LayoutConfig> {
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(_) => json5::from_str(contents)?,
    };
    let mut config = LayoutConfig::default();
    if let Some(v) = parsed.node_width {
        config.node_width = v;
    }
    if let Some(v) = parsed.node_height {
        config.node_height = v;
    }
    if let Some(v) = parsed.min_gap {
        config.min_gap = v;
    }
    if let Some(v) = parsed.level_spacing {
        config.level_spacing = v;
    }
    if let Some(v) = parsed.root_x {
        config.root_x = v;
    }
    if let Some(v) = parsed.root_y {
        config.root_y = v;
    }
    if let Some(v) = parsed.lateral_offset {
        config.lateral_offset = v;
    }
    if let Some(v) = parsed.branch_depth_step {
        config.branch_depth_step = v;
    }
    if let Some(v) = parsed.split_widen {
        config.split_widen = v;
    }
    if let Some(v) = parsed.drift_window {
        config.drift_window = v;
    }
    if let Some(v) = parsed.collision_passes {
        config.collision_passes = v;
    }
    if let Some(v) = parsed.tolerance {
        config.tolerance = v;
    }
    Ok(config)
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}
