use crate::ir::ConnectionRecord;
use serde::Deserialize;
use std::io::{self, Read};
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordsDocument {
    List(Vec<ConnectionRecord>),
    Wrapped { records: Vec<ConnectionRecord> },
}

impl RecordsDocument {
    fn into_records(self) -> Vec<ConnectionRecord> {
        match self {
            RecordsDocument::List(records) => records,
            RecordsDocument::Wrapped { records } => records,
        }
    }
}

/// Accepts a bare array of records or an object with a `records` array,
/// written as JSON or JSON5.
pub fn parse_records(contents: &str) -> anyhow::Result<Vec<ConnectionRecord>> {
    let document: RecordsDocument = match serde_json::from_str(contents) {
        Ok(document) => document,
        Err(_) => json5::from_str(contents)?,
    };
    Ok(document.into_records())
}

/// Reads records from `path`, or from stdin when the path is absent or `-`.
pub fn load_records(path: Option<&Path>) -> anyhow::Result<Vec<ConnectionRecord>> {
    let contents = match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)?,
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    parse_records(&contents)
}
