use std::collections::BTreeMap;

use powertree::diagnostics::Stage;
use powertree::graph::{
    ConnectionGraph, ConsolidationPolicy, WalkDirection, complete_coverage, consolidate, detect_loops, walk,
};
use powertree::ir::{Branch, Classification, ConnectionRecord, Endpoint};
use powertree::layout::{MAX_ANCESTOR_TRACE, PlacementTree, lineage_rank};
use powertree::{ConfigError, LayoutConfig, LayoutError, LayoutResult, compute_layout};
use proptest::prelude::*;

fn feed(from: (&str, &str), to: (&str, &str), source: Option<&str>) -> ConnectionRecord {
    ConnectionRecord::new(
        Endpoint::new(from.0, from.0, from.1),
        Endpoint::new(to.0, to.0, to.1),
        source,
    )
}

fn layout(records: &[ConnectionRecord], selected: &str) -> LayoutResult {
    compute_layout(records, selected, &LayoutConfig::default()).expect("layout failed")
}

fn assert_no_overlap(result: &LayoutResult, config: &LayoutConfig) {
    for (i, a) in result.nodes.iter().enumerate() {
        for b in &result.nodes[i + 1..] {
            let dx = (a.x - b.x).abs();
            let dy = (a.y - b.y).abs();
            assert!(
                dx >= config.pitch() - 1e-2 || dy >= config.node_height + config.min_gap - 1e-2,
                "{} overlaps {} (dx={dx}, dy={dy})",
                a.id,
                b.id
            );
        }
    }
}

fn assert_rows_aligned(result: &LayoutResult, config: &LayoutConfig) {
    let mut rows: BTreeMap<i32, f32> = BTreeMap::new();
    for node in &result.nodes {
        let y = *rows.entry(node.level).or_insert(node.y);
        assert!(
            (node.y - y).abs() <= config.tolerance,
            "{} at level {} has y={} but the row sits at {y}",
            node.id,
            node.level,
            node.y
        );
    }
}

fn data_hall() -> Vec<ConnectionRecord> {
    vec![
        feed(("SB-A", "Switchboard"), ("PDU-1", "PDU"), Some("Source A")),
        feed(("SB-B", "Switchboard"), ("PDU-1", "PDU"), Some("Source B")),
        feed(("UPS-A", "UPS"), ("SB-A", "Switchboard"), None),
        feed(("UPS-B", "UPS"), ("SB-B", "Switchboard"), None),
        feed(("SWGR-1", "Switchgear"), ("UPS-A", "UPS"), None),
        feed(("SWGR-2", "Switchgear"), ("UPS-B", "UPS"), None),
        feed(("XFMR-1", "Transformer"), ("SWGR-1", "Switchgear"), None),
        feed(("XFMR-2", "Transformer"), ("SWGR-2", "Switchgear"), None),
        feed(("GEN-1", "Generator"), ("SWGR-1", "Switchgear"), Some("Emergency")),
        feed(("GEN-2", "Generator"), ("SWGR-2", "Switchgear"), Some("Emergency")),
        feed(("RING-MV-1", "Ring Bus"), ("XFMR-1", "Transformer"), None),
        feed(("RING-MV-2", "Ring Bus"), ("XFMR-2", "Transformer"), None),
        feed(("RING-MV-1", "Ring Bus"), ("RING-MV-2", "Ring Bus"), None),
        feed(("UTIL-1", "Utility"), ("RING-MV-1", "Ring Bus"), None),
        feed(("UTIL-2", "Utility"), ("RING-MV-2", "Ring Bus"), None),
    ]
}

#[test]
fn primary_left_secondary_right_on_one_baseline() {
    let result = layout(
        &[
            feed(("P1", "Switchboard"), ("R", "Switchboard"), Some("Primary")),
            feed(("P2", "Switchboard"), ("R", "Switchboard"), Some("Secondary")),
        ],
        "R",
    );
    let root = result.node("R").unwrap();
    let p1 = result.node("P1").unwrap();
    let p2 = result.node("P2").unwrap();
    assert!(p1.x < root.x);
    assert!(p2.x > root.x);
    assert_eq!(p1.y, p2.y);
    assert!(p1.style_class.contains("branch-primary"));
    assert!(p2.style_class.contains("branch-secondary"));
}

#[test]
fn ring_members_collapse_to_the_lower_member_level() {
    let result = layout(
        &[
            feed(("SW", "Switchboard"), ("R", "Switchboard"), Some("Primary")),
            feed(("RING-A-1", "Ring Bus"), ("SW", "Switchboard"), Some("Primary")),
            feed(("RING-A-3", "Ring Bus"), ("SW", "Switchboard"), Some("Primary")),
            feed(("RING-A-3", "Ring Bus"), ("RING-A-1", "Ring Bus"), None),
        ],
        "R",
    );
    let groups: Vec<_> = result
        .nodes
        .iter()
        .filter(|node| node.style_class.contains("loop-group"))
        .collect();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].label, "RING-A-1 ↔ RING-A-3");
    assert_eq!(groups[0].level, 2);
    assert!(result.node("RING-A-1").is_none());
    assert!(result.node("RING-A-3").is_none());
    // The member feeding the switch is remapped, the internal link is gone.
    assert_eq!(result.edges_touching(&groups[0].id).count(), 1);
}

#[test]
fn storage_under_switch_pairs_to_its_left() {
    let config = LayoutConfig::default();
    let result = layout(
        &[
            feed(("SB", "Switchboard"), ("R", "PDU"), Some("Primary")),
            feed(("UPS", "UPS"), ("SB", "Switchboard"), Some("Primary")),
        ],
        "R",
    );
    let sb = result.node("SB").unwrap();
    let ups = result.node("UPS").unwrap();
    assert!(ups.style_class.contains("lateral"));
    assert_eq!(ups.y, sb.y);
    assert_eq!(sb.x - ups.x, config.lateral_offset);
}

#[test]
fn eleventh_hop_is_excluded() {
    let mut records = Vec::new();
    for hop in 1..=11 {
        let from = format!("N{hop}");
        let to = if hop == 1 { "R".to_string() } else { format!("N{}", hop - 1) };
        records.push(feed((&from, "Breaker"), (&to, "Breaker"), None));
    }
    let result = layout(&records, "R");
    assert!(result.node("N10").is_some());
    assert!(result.node("N11").is_none());
    assert!(result.diagnostics.has_warning(Stage::Walker));
}

#[test]
fn bypass_keeps_both_primary_ancestries() {
    let result = layout(
        &[
            feed(("SB", "Switchboard"), ("R", "PDU"), Some("Primary")),
            feed(("UPS", "UPS"), ("SB", "Switchboard"), Some("Primary")),
            feed(("U", "Utility"), ("UPS", "UPS"), None),
            feed(("B", "Switchboard"), ("R", "PDU"), Some("Secondary")),
            feed(("UPS", "UPS"), ("B", "Switchboard"), Some("Secondary")),
            feed(("G", "Generator"), ("B", "Switchboard"), None),
        ],
        "R",
    );
    for id in ["SB", "UPS", "U", "B", "G"] {
        assert!(result.node(id).is_some(), "{id} missing");
    }
    let pair = |source: &str, target: &str| {
        result
            .edges
            .iter()
            .find(|edge| edge.source_id == source && edge.target_id == target)
    };
    assert!(pair("U", "UPS").is_some());
    assert!(pair("G", "B").is_some());
    assert!(pair("UPS", "SB").is_some());
    let bypass = pair("UPS", "B").expect("bypass edge");
    assert_eq!(bypass.classification, Classification::Bypass);
}

#[test]
fn data_hall_is_clean_and_deterministic() {
    let config = LayoutConfig::default();
    let records = data_hall();
    let first = layout(&records, "PDU-1");
    let second = layout(&records, "PDU-1");
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.edges, second.edges);
    assert!(first.report.is_clean(), "{:?}", first.report);
    assert_no_overlap(&first, &config);
    assert_rows_aligned(&first, &config);

    let ring = first.node("loop:RING-MV").expect("ring collapsed");
    assert_eq!(ring.label, "RING-MV-1 ↔ RING-MV-2");
    // Generators and transformers line up across both halves.
    let gen1 = first.node("GEN-1").unwrap();
    let gen2 = first.node("GEN-2").unwrap();
    assert_eq!(gen1.y, gen2.y);
    let bounds = first.bounds;
    for node in &first.nodes {
        assert!(node.x >= bounds.min_x && node.x <= bounds.min_x + bounds.width);
        assert!(node.y >= bounds.min_y && node.y <= bounds.min_y + bounds.height);
    }
}

#[test]
fn hard_failures_surface_as_errors() {
    let records = data_hall();
    let err = compute_layout(&records, "PDU-404", &LayoutConfig::default()).unwrap_err();
    assert_eq!(
        err,
        LayoutError::NotFound {
            id: "PDU-404".to_string()
        }
    );

    let config = LayoutConfig {
        node_height: -1.0,
        ..Default::default()
    };
    let err = compute_layout(&records, "PDU-1", &config).unwrap_err();
    assert!(matches!(
        err,
        LayoutError::InvalidConfig(ConfigError::NonPositive {
            field: "node_height",
            ..
        })
    ));
}

#[test]
fn malformed_records_get_placeholders() {
    let records = vec![ConnectionRecord::new(
        Endpoint::bare("X-9"),
        Endpoint::new("R", "Root", "PDU"),
        None,
    )];
    let result = layout(&records, "R");
    let node = result.node("X-9").unwrap();
    assert_eq!(node.label, "Unnamed (X-9)");
}

/// Random feed trees: node `i` feeds a node with a smaller index.
fn feed_tree() -> impl Strategy<Value = Vec<ConnectionRecord>> {
    let kinds = prop::sample::select(vec!["Switchboard", "Utility", "Generator", "Transformer", "UPS", "Breaker"]);
    let labels = prop::sample::select(vec!["Primary", "Secondary", ""]);
    prop::collection::vec((any::<prop::sample::Index>(), kinds, labels), 1..40).prop_map(|entries| {
        let mut kinds_by_id = vec!["PDU"];
        let mut records = Vec::new();
        for (idx, (parent, kind, label)) in entries.into_iter().enumerate() {
            let child = idx + 1;
            let parent = parent.index(child);
            let source = if label.is_empty() { None } else { Some(label) };
            records.push(feed(
                (&format!("E{child}"), kind),
                (&format!("E{parent}"), kinds_by_id[parent]),
                source,
            ));
            kinds_by_id.push(kind);
        }
        records
    })
}

/// Random feed meshes: a base tree plus back edges, ring buses, dual-source
/// transfer pairs and UPS/switchboard bypass pairs hung off random nodes.
fn feed_mesh() -> impl Strategy<Value = Vec<ConnectionRecord>> {
    let kinds = prop::sample::select(vec!["Switchboard", "Utility", "Generator", "Transformer", "UPS", "Breaker"]);
    let labels = prop::sample::select(vec!["Primary", "Secondary", ""]);
    (
        prop::collection::vec((any::<prop::sample::Index>(), kinds, labels), 1..20),
        prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 0..5),
        prop::collection::vec((any::<prop::sample::Index>(), 2usize..=4), 0..3),
        prop::collection::vec(any::<prop::sample::Index>(), 0..3),
        prop::collection::vec(any::<prop::sample::Index>(), 0..3),
    )
        .prop_map(|(base, back, rings, transfers, storage)| {
            let mut nodes: Vec<(String, &str)> = vec![("E0".to_string(), "PDU")];
            let mut records = Vec::new();
            for (idx, (parent, kind, label)) in base.into_iter().enumerate() {
                let (target, target_kind) = nodes[parent.index(nodes.len())].clone();
                let id = format!("E{}", idx + 1);
                let source = if label.is_empty() { None } else { Some(label) };
                records.push(feed((id.as_str(), kind), (target.as_str(), target_kind), source));
                nodes.push((id, kind));
            }

            for (from, to) in back {
                let (origin, origin_kind) = &nodes[from.index(nodes.len())];
                let (destination, destination_kind) = &nodes[to.index(nodes.len())];
                if origin != destination {
                    records.push(feed((origin.as_str(), *origin_kind), (destination.as_str(), *destination_kind), None));
                }
            }

            for (ring, (attach, size)) in rings.into_iter().enumerate() {
                let (target, target_kind) = &nodes[attach.index(nodes.len())];
                let member = |m: usize| format!("RING-X{ring}-{m}");
                records.push(feed((member(1).as_str(), "Ring Bus"), (target.as_str(), *target_kind), None));
                records.push(feed((member(size).as_str(), "Ring Bus"), (target.as_str(), *target_kind), None));
                for m in 2..=size {
                    records.push(feed((member(m).as_str(), "Ring Bus"), (member(m - 1).as_str(), "Ring Bus"), None));
                }
                if size > 2 {
                    records.push(feed((member(1).as_str(), "Ring Bus"), (member(size).as_str(), "Ring Bus"), None));
                }
                let utility = format!("U-X{ring}");
                records.push(feed((utility.as_str(), "Utility"), (member(size).as_str(), "Ring Bus"), None));
            }

            for (n, attach) in transfers.into_iter().enumerate() {
                let (target, target_kind) = &nodes[attach.index(nodes.len())];
                let utility = format!("UT-{n}");
                let generator = format!("GN-{n}");
                for side in ["A", "B"] {
                    let ats = format!("ATS-{n}{side}");
                    records.push(feed((ats.as_str(), "ATS"), (target.as_str(), *target_kind), None));
                    records.push(feed((utility.as_str(), "Utility"), (ats.as_str(), "ATS"), Some("Primary")));
                    records.push(feed((generator.as_str(), "Generator"), (ats.as_str(), "ATS"), Some("Secondary")));
                }
            }

            for (n, attach) in storage.into_iter().enumerate() {
                let (target, target_kind) = &nodes[attach.index(nodes.len())];
                let switchboard = format!("SBP-{n}");
                let ups = format!("UPS-{n}");
                let utility = format!("UP-{n}");
                records.push(feed((switchboard.as_str(), "Switchboard"), (target.as_str(), *target_kind), None));
                records.push(feed((ups.as_str(), "UPS"), (switchboard.as_str(), "Switchboard"), Some("Secondary")));
                records.push(feed((switchboard.as_str(), "Switchboard"), (ups.as_str(), "UPS"), None));
                records.push(feed((utility.as_str(), "Utility"), (ups.as_str(), "UPS"), None));
            }
            records
        })
}

proptest! {
    #[test]
    fn random_trees_are_deterministic_aligned_and_overlap_free(records in feed_tree()) {
        let config = LayoutConfig::default();
        let first = compute_layout(&records, "E0", &config).unwrap();
        let second = compute_layout(&records, "E0", &config).unwrap();
        prop_assert_eq!(&first.nodes, &second.nodes);
        prop_assert_eq!(&first.edges, &second.edges);
        prop_assert!(first.report.collisions.is_empty());
        prop_assert!(first.report.misaligned.is_empty());
        assert_no_overlap(&first, &config);
        assert_rows_aligned(&first, &config);
    }

    #[test]
    fn random_meshes_with_rings_and_bypasses_lay_out_cleanly(records in feed_mesh()) {
        let config = LayoutConfig::default();
        let first = compute_layout(&records, "E0", &config).unwrap();
        let second = compute_layout(&records, "E0", &config).unwrap();
        prop_assert_eq!(&first.nodes, &second.nodes);
        prop_assert_eq!(&first.edges, &second.edges);
        prop_assert!(first.report.is_clean(), "{:?}", first.report);
        let ids: std::collections::BTreeSet<&str> = first.nodes.iter().map(|node| node.id.as_str()).collect();
        prop_assert_eq!(ids.len(), first.nodes.len());
        assert_no_overlap(&first, &config);
        assert_rows_aligned(&first, &config);
    }

    #[test]
    fn lineage_trace_falls_back_without_misordering(depth in 1usize..=9) {
        let mut records = vec![
            feed(("RING-S-1", "Ring Bus"), ("R", "PDU"), Some("Secondary")),
            feed(("RING-S-2", "Ring Bus"), ("R", "PDU"), Some("Secondary")),
        ];
        let mut primary_below = "R".to_string();
        let mut secondary_below = "RING-S-1".to_string();
        for hop in 1..=depth {
            let p = format!("P{hop}");
            let s = format!("S{hop}");
            let label = if hop == 1 { Some("Primary") } else { None };
            records.push(feed((&p, "Breaker"), (&primary_below, "Breaker"), label));
            records.push(feed((&s, "Breaker"), (&secondary_below, "Breaker"), None));
            primary_below = p;
            secondary_below = s;
        }

        let result = compute_layout(&records, "R", &LayoutConfig::default()).unwrap();
        for hop in 1..=depth {
            let p = result.node(&format!("P{hop}")).unwrap();
            let s = result.node(&format!("S{hop}")).unwrap();
            prop_assert!(p.x < s.x, "P{} at {} not left of S{} at {}", hop, p.x, hop, s.x);
        }

        let mut diagnostics = powertree::Diagnostics::new();
        let graph = ConnectionGraph::build(&records, &mut diagnostics);
        let occurrences = walk(&graph, "R", WalkDirection::Upstream, &mut diagnostics);
        let mut set = consolidate(&graph, "R", &occurrences, &ConsolidationPolicy::default(), &mut diagnostics).unwrap();
        detect_loops(&mut set, &mut diagnostics);
        complete_coverage(&graph, &mut set, &mut diagnostics);
        let tree = PlacementTree::build(&graph, &set, &mut diagnostics);
        for hop in 1..=depth {
            let id = format!("S{hop}");
            let expected = if hop <= MAX_ANCESTOR_TRACE {
                Branch::Secondary.rank()
            } else {
                set.get(&id).unwrap().branch.rank()
            };
            prop_assert_eq!(lineage_rank(&tree, &set, &id), expected);
        }
    }
}
