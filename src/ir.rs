use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SECONDARY_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(secondary|alternate|alt|redundant|backup|emergency|(source|side|feed)[\s_-]*b|b[\s_-]*(side|source|feed))\b")
        .unwrap()
});
static PRIMARY_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(primary|normal|preferred|main|(source|side|feed)[\s_-]*a|a[\s_-]*(side|source|feed))\b")
        .unwrap()
});

static UTILITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(utility|util|service[\s_-]*entrance|grid)\b").unwrap());
static GENERATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(generator|gen(set)?)\b").unwrap());
static SWITCHGEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(switchgear|swgr|mv[\s_-]*gear)\b").unwrap());
static TRANSFORMER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(transformer|xfmr|xfr|tx)\b").unwrap());
static TRANSFER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(ats|sts|transfer[\s_-]*switch|static[\s_-]*switch)\b").unwrap());
static STORAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(ups|battery|bess|energy[\s_-]*storage)\b").unwrap());
static CRITICAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(pdu|rpp|critical([\s_-]*panel)?|remote[\s_-]*power[\s_-]*panel)\b").unwrap());
static DISTRIBUTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(switchboard|swbd|msb|distribution([\s_-]*(switch|board|panel))?|panelboard|mcc)\b").unwrap()
});
static RING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(ring([\s_-]*bus)?|loop[\s_-]*bus)\b").unwrap());

/// Derived classification of one origin -> destination relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Normal,
    Bypass,
    Redundant,
}

impl Classification {
    pub fn is_normal(self) -> bool {
        self == Classification::Normal
    }
}

/// Layout side of an upstream feed. Ordering puts primary first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Primary,
    Secondary,
    None,
}

impl Branch {
    pub fn from_label(label: &str) -> Self {
        if SECONDARY_LABEL_RE.is_match(label) {
            Branch::Secondary
        } else if PRIMARY_LABEL_RE.is_match(label) {
            Branch::Primary
        } else {
            Branch::None
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Branch::Primary => "branch-primary",
            Branch::Secondary => "branch-secondary",
            Branch::None => "branch-none",
        }
    }

    /// Sort rank used when ordering groups left to right.
    pub fn rank(self) -> u8 {
        match self {
            Branch::Primary => 0,
            Branch::None => 1,
            Branch::Secondary => 2,
        }
    }

    /// Horizontal direction this branch grows in: primary left, secondary right.
    pub fn direction(self) -> f32 {
        match self {
            Branch::Primary => -1.0,
            Branch::Secondary => 1.0,
            Branch::None => 0.0,
        }
    }

    pub fn is_opposite(self, other: Branch) -> bool {
        matches!(
            (self, other),
            (Branch::Primary, Branch::Secondary) | (Branch::Secondary, Branch::Primary)
        )
    }
}

pub fn is_secondary_label(label: &str) -> bool {
    Branch::from_label(label) == Branch::Secondary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EquipmentKind {
    Utility,
    Generator,
    Switchgear,
    Transformer,
    TransferSwitch,
    PowerStorage,
    CriticalPanel,
    DistributionSwitch,
    RingBus,
    LoopGroup,
    Other,
}

impl EquipmentKind {
    /// Maps a free-form equipment type tag onto a kind. Order matters:
    /// "static transfer switch" must land on the transfer switch before the
    /// generic distribution patterns get a chance.
    pub fn from_type_tag(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() {
            return EquipmentKind::Other;
        }
        if STORAGE_RE.is_match(tag) {
            EquipmentKind::PowerStorage
        } else if TRANSFER_RE.is_match(tag) {
            EquipmentKind::TransferSwitch
        } else if RING_RE.is_match(tag) {
            EquipmentKind::RingBus
        } else if UTILITY_RE.is_match(tag) {
            EquipmentKind::Utility
        } else if GENERATOR_RE.is_match(tag) {
            EquipmentKind::Generator
        } else if SWITCHGEAR_RE.is_match(tag) {
            EquipmentKind::Switchgear
        } else if TRANSFORMER_RE.is_match(tag) {
            EquipmentKind::Transformer
        } else if CRITICAL_RE.is_match(tag) {
            EquipmentKind::CriticalPanel
        } else if DISTRIBUTION_RE.is_match(tag) {
            EquipmentKind::DistributionSwitch
        } else {
            EquipmentKind::Other
        }
    }

    /// Equipment where several feeds legitimately converge.
    pub fn is_convergence_point(self) -> bool {
        matches!(
            self,
            EquipmentKind::Utility | EquipmentKind::Generator | EquipmentKind::Switchgear
        )
    }

    pub fn is_power_storage(self) -> bool {
        self == EquipmentKind::PowerStorage
    }

    pub fn css_class(self) -> &'static str {
        match self {
            EquipmentKind::Utility => "equipment-utility",
            EquipmentKind::Generator => "equipment-generator",
            EquipmentKind::Switchgear => "equipment-switchgear",
            EquipmentKind::Transformer => "equipment-transformer",
            EquipmentKind::TransferSwitch => "equipment-transfer-switch",
            EquipmentKind::PowerStorage => "equipment-power-storage",
            EquipmentKind::CriticalPanel => "equipment-critical-panel",
            EquipmentKind::DistributionSwitch => "equipment-distribution-switch",
            EquipmentKind::RingBus => "equipment-ring-bus",
            EquipmentKind::LoopGroup => "equipment-loop-group",
            EquipmentKind::Other => "equipment-other",
        }
    }
}

/// One side of a connection record. Name and type may be absent in source
/// data; the graph builder substitutes placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub type_tag: Option<String>,
}

impl Endpoint {
    pub fn new(id: &str, name: &str, type_tag: &str) -> Self {
        Self {
            id: id.to_string(),
            name: Some(name.to_string()),
            type_tag: Some(type_tag.to_string()),
        }
    }

    pub fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            type_tag: None,
        }
    }
}

/// A raw connection: every origin feeds every destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    #[serde(default)]
    pub origins: Vec<Endpoint>,
    #[serde(default)]
    pub destinations: Vec<Endpoint>,
    #[serde(default)]
    pub source: Option<String>,
}

impl ConnectionRecord {
    pub fn new(origin: Endpoint, destination: Endpoint, source: Option<&str>) -> Self {
        Self {
            origins: vec![origin],
            destinations: vec![destination],
            source: source.map(|s| s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_labels_map_to_branches() {
        assert_eq!(Branch::from_label("Primary"), Branch::Primary);
        assert_eq!(Branch::from_label("Source A"), Branch::Primary);
        assert_eq!(Branch::from_label("secondary"), Branch::Secondary);
        assert_eq!(Branch::from_label("Source-B"), Branch::Secondary);
        assert_eq!(Branch::from_label("B side"), Branch::Secondary);
        assert_eq!(Branch::from_label(""), Branch::None);
        assert_eq!(Branch::from_label("feeder 12"), Branch::None);
    }

    #[test]
    fn type_tags_map_to_kinds() {
        assert_eq!(EquipmentKind::from_type_tag("UPS"), EquipmentKind::PowerStorage);
        assert_eq!(
            EquipmentKind::from_type_tag("Static Transfer Switch"),
            EquipmentKind::TransferSwitch
        );
        assert_eq!(EquipmentKind::from_type_tag("ATS"), EquipmentKind::TransferSwitch);
        assert_eq!(EquipmentKind::from_type_tag("Utility"), EquipmentKind::Utility);
        assert_eq!(EquipmentKind::from_type_tag("Generator"), EquipmentKind::Generator);
        assert_eq!(EquipmentKind::from_type_tag("MV Switchgear"), EquipmentKind::Switchgear);
        assert_eq!(EquipmentKind::from_type_tag("Transformer"), EquipmentKind::Transformer);
        assert_eq!(EquipmentKind::from_type_tag("PDU"), EquipmentKind::CriticalPanel);
        assert_eq!(
            EquipmentKind::from_type_tag("Switchboard"),
            EquipmentKind::DistributionSwitch
        );
        assert_eq!(EquipmentKind::from_type_tag("Ring Bus"), EquipmentKind::RingBus);
        assert_eq!(EquipmentKind::from_type_tag("widget"), EquipmentKind::Other);
        assert_eq!(EquipmentKind::from_type_tag(""), EquipmentKind::Other);
    }

    #[test]
    fn records_deserialize_with_missing_fields() {
        let raw = r#"{"origins":[{"id":"U1"}],"destinations":[{"id":"S1","name":"Main","type":"Switchgear"}]}"#;
        let record: ConnectionRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.origins[0].name, None);
        assert_eq!(record.destinations[0].type_tag.as_deref(), Some("Switchgear"));
        assert_eq!(record.source, None);
    }
}
