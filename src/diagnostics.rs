use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
}

/// Pass that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Builder,
    Walker,
    Consolidator,
    LoopDetector,
    Coverage,
    PlacementTree,
    Span,
    Position,
    Lateral,
    Normalizer,
    Collision,
    Category,
    Validator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// Leveled event log collected during one layout run. Each entry is mirrored
/// to `tracing` so hosts with a subscriber see the same stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(&mut self, stage: Stage, message: impl Into<String>) {
        self.record(Severity::Debug, stage, message.into(), None);
    }

    pub fn info(&mut self, stage: Stage, message: impl Into<String>) {
        self.record(Severity::Info, stage, message.into(), None);
    }

    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) {
        self.record(Severity::Warn, stage, message.into(), None);
    }

    pub fn warn_node(&mut self, stage: Stage, node: &str, message: impl Into<String>) {
        self.record(Severity::Warn, stage, message.into(), Some(node.to_string()));
    }

    pub fn debug_node(&mut self, stage: Stage, node: &str, message: impl Into<String>) {
        self.record(Severity::Debug, stage, message.into(), Some(node.to_string()));
    }

    fn record(&mut self, severity: Severity, stage: Stage, message: String, node: Option<String>) {
        let node_id = node.as_deref().unwrap_or("");
        match severity {
            Severity::Debug => tracing::debug!(?stage, node = node_id, "{message}"),
            Severity::Info => tracing::info!(?stage, node = node_id, "{message}"),
            Severity::Warn => tracing::warn!(?stage, node = node_id, "{message}"),
        }
        self.entries.push(Diagnostic {
            severity,
            stage,
            message,
            node,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|entry| entry.severity == Severity::Warn)
    }

    pub fn has_warning(&self, stage: Stage) -> bool {
        self.warnings().any(|entry| entry.stage == stage)
    }

    pub fn by_stage(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |entry| entry.stage == stage)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
