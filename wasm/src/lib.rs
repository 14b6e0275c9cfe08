use powertree::config::{LayoutConfig, parse_config};
use powertree::input::parse_records;
use powertree::layout::compute_layout;
use powertree::layout_dump::LayoutDump;
use wasm_bindgen::prelude::*;

fn build_config(config_json: Option<String>) -> Result<LayoutConfig, String> {
    match config_json {
        Some(raw) if !raw.trim().is_empty() => parse_config(&raw).map_err(|error| error.to_string()),
        _ => Ok(LayoutConfig::default()),
    }
}

fn layout_to_json(records_json: &str, selected_id: &str, config_json: Option<String>) -> Result<String, String> {
    let config = build_config(config_json)?;
    let records = parse_records(records_json).map_err(|error| error.to_string())?;
    let layout = compute_layout(&records, selected_id, &config).map_err(|error| error.to_string())?;
    let dump = LayoutDump::from_layout(&layout, &config);
    serde_json::to_string(&dump).map_err(|error| error.to_string())
}

/// Lays out the feed tree above `selected_id` and returns the layout as JSON.
#[wasm_bindgen]
pub fn layout_json(records_json: &str, selected_id: &str, config_json: Option<String>) -> Result<String, JsValue> {
    layout_to_json(records_json, selected_id, config_json).map_err(|error| JsValue::from_str(&error))
}
