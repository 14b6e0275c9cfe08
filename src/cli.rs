use crate::config::load_config;
use crate::diagnostics::Severity;
use crate::input::load_records;
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ptree", version, about = "Upstream power-feed tree layout")]
pub struct Args {
    /// Connection records (.json/.json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Equipment id to lay out
    #[arg(short = 's', long = "select")]
    pub select: String,

    /// Layout config JSON/JSON5 file (camelCase spacing overrides)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Output file for the layout JSON. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Print collected diagnostics to stderr
    #[arg(short = 'd', long = "diagnostics")]
    pub diagnostics: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let records = load_records(args.input.as_deref())?;
    if records.is_empty() {
        return Err(anyhow::anyhow!("No connection records found in input"));
    }

    let layout = compute_layout(&records, &args.select, &config)?;
    if args.diagnostics {
        for entry in layout.diagnostics.entries() {
            let level = match entry.severity {
                Severity::Debug => "debug",
                Severity::Info => "info",
                Severity::Warn => "warn",
            };
            match &entry.node {
                Some(node) => eprintln!("{level} {:?} [{node}] {}", entry.stage, entry.message),
                None => eprintln!("{level} {:?} {}", entry.stage, entry.message),
            }
        }
    }
    write_layout_dump(args.output.as_deref(), &layout, &config)?;
    Ok(())
}
