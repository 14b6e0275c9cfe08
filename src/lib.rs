#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod input;
pub mod ir;
pub mod layout;
pub mod layout_dump;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{LayoutConfig, load_config, parse_config};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, Stage};
pub use error::{ConfigError, LayoutError, Result};
pub use ir::{Branch, Classification, ConnectionRecord, Endpoint, EquipmentKind};
pub use layout::{LayoutEdge, LayoutResult, PositionedNode, compute_layout, compute_layout_with_policy};
