// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document integrity checks and cross-document parity.
//!
//! Nothing here fails: every problem becomes a [`Finding`] and the caller
//! decides what to do with it.

use crate::config::ValidationConfig;
use crate::diagnostics::Severity;
use crate::document::Document;
use indexmap::{IndexMap, IndexSet};
use kexedit_graph::{CompositeKey, EdgeId, Graph, NodeId, NodeMeta, NodeType, PortId, PropertyId};
use kexedit_keyframes::RangeIssue;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::Hash;

/// What a validation finding is about
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FindingKind {
    /// Node id used by more than one node
    DuplicateNodeId(NodeId),
    /// Port id used by more than one port
    DuplicatePortId(PortId),
    /// Edge id used by more than one edge
    DuplicateEdgeId(EdgeId),
    /// Edge endpoint port, or its owner, is missing
    OrphanEdge(EdgeId),
    /// Node type code outside the known set
    InvalidNodeType {
        /// Node
        node: NodeId,
        /// Raw code
        code: u32,
    },
    /// Port type code outside the known set
    InvalidPortType {
        /// Port
        port: PortId,
        /// Raw code
        code: u32,
    },
    /// Port owned by a node that does not exist
    PortOwnerMissing {
        /// Port
        port: PortId,
        /// Missing owner
        owner: NodeId,
    },
    /// Two nodes sit on the same spot in the graph editor
    OverlappingPositions {
        /// Node placed first
        first: NodeId,
        /// Node placed on top
        second: NodeId,
    },
    /// Property stored for a node that does not exist
    DanglingProperty(CompositeKey),
    /// Keyframe range outside the keyframe array
    KeyframeRangeOutOfBounds(CompositeKey),
    /// Two keyframe ranges share keyframes
    KeyframeRangeOverlap {
        /// Earlier range
        first: CompositeKey,
        /// Later range
        second: CompositeKey,
    },
    /// UI state refers to a node that does not exist
    UnknownUiNode(NodeId),
    /// Section has keyframes for a property whose override flag is off
    OverrideMismatch {
        /// Node
        node: NodeId,
        /// Property
        property: PropertyId,
    },
    /// Dependency cycle through this node
    Cycle(NodeId),
}

impl FindingKind {
    /// Severity of this kind of finding
    pub fn severity(&self) -> Severity {
        match self {
            Self::DuplicateNodeId(_)
            | Self::DuplicatePortId(_)
            | Self::DuplicateEdgeId(_)
            | Self::OrphanEdge(_)
            | Self::InvalidNodeType { .. }
            | Self::InvalidPortType { .. }
            | Self::PortOwnerMissing { .. }
            | Self::KeyframeRangeOutOfBounds(_)
            | Self::KeyframeRangeOverlap { .. } => Severity::Error,
            Self::OverlappingPositions { .. }
            | Self::DanglingProperty(_)
            | Self::UnknownUiNode(_)
            | Self::OverrideMismatch { .. }
            | Self::Cycle(_) => Severity::Warning,
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNodeId(id) => write!(f, "duplicate node id {id}"),
            Self::DuplicatePortId(id) => write!(f, "duplicate port id {id}"),
            Self::DuplicateEdgeId(id) => write!(f, "duplicate edge id {id}"),
            Self::OrphanEdge(id) => write!(f, "edge {id} has a missing endpoint"),
            Self::InvalidNodeType { node, code } => write!(f, "node {node} has invalid type code {code}"),
            Self::InvalidPortType { port, code } => write!(f, "port {port} has invalid type code {code}"),
            Self::PortOwnerMissing { port, owner } => write!(f, "port {port} owned by missing node {owner}"),
            Self::OverlappingPositions { first, second } => {
                write!(f, "nodes {first} and {second} overlap in the graph editor")
            }
            Self::DanglingProperty(key) => write!(f, "property {key} refers to a missing node"),
            Self::KeyframeRangeOutOfBounds(key) => write!(f, "keyframe range {key} is out of bounds"),
            Self::KeyframeRangeOverlap { first, second } => {
                write!(f, "keyframe ranges {first} and {second} overlap")
            }
            Self::UnknownUiNode(id) => write!(f, "UI state refers to unknown node {id}"),
            Self::OverrideMismatch { node, property } => {
                write!(f, "node {node} has {property:?} keyframes but its override flag is off")
            }
            Self::Cycle(id) => write!(f, "dependency cycle through node {id}"),
        }
    }
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Severity
    pub severity: Severity,
    /// Category and payload
    pub kind: FindingKind,
}

impl From<FindingKind> for Finding {
    fn from(kind: FindingKind) -> Self {
        Self {
            severity: kind.severity(),
            kind,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.kind)
    }
}

/// All findings for one document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Findings in check order
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    /// Whether any finding is an error
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Error findings
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Error)
    }

    /// Warning findings
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Warning)
    }

    /// Whether any finding matches `kind`
    pub fn contains(&self, kind: &FindingKind) -> bool {
        self.findings.iter().any(|f| &f.kind == kind)
    }

    fn push(&mut self, kind: FindingKind) {
        self.findings.push(kind.into());
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors().count(),
            self.warnings().count()
        )?;
        for finding in &self.findings {
            write!(f, "\n  {finding}")?;
        }
        Ok(())
    }
}

/// Ids that occur more than once, each reported once in first-seen order
fn duplicates<T: Copy + Eq + Hash>(ids: impl Iterator<Item = T>) -> IndexSet<T> {
    let mut seen = HashSet::new();
    ids.filter(|id| !seen.insert(*id)).collect()
}

fn check_graph(graph: &Graph, report: &mut ValidationReport) {
    for id in duplicates(graph.nodes().iter().map(|n| n.id)) {
        report.push(FindingKind::DuplicateNodeId(id));
    }
    for id in duplicates(graph.ports().iter().map(|p| p.id)) {
        report.push(FindingKind::DuplicatePortId(id));
    }
    for id in duplicates(graph.edges().iter().map(|e| e.id)) {
        report.push(FindingKind::DuplicateEdgeId(id));
    }

    for node in graph.nodes() {
        if node.node_type().is_none() {
            report.push(FindingKind::InvalidNodeType {
                node: node.id,
                code: node.type_code,
            });
        }
    }
    for port in graph.ports() {
        if port.port_type().is_none() {
            report.push(FindingKind::InvalidPortType {
                port: port.id,
                code: port.type_code,
            });
        }
        if !graph.contains_node(port.owner) {
            report.push(FindingKind::PortOwnerMissing {
                port: port.id,
                owner: port.owner,
            });
        }
    }
    for edge in graph.orphan_edges() {
        report.push(FindingKind::OrphanEdge(edge.id));
    }

    if let Err(cycle) = graph.topological_order() {
        report.push(FindingKind::Cycle(cycle.0));
    }
}

fn check_positions(graph: &Graph, rounding: f32, report: &mut ValidationReport) {
    let step = if rounding > 0.0 { rounding } else { f32::EPSILON };
    let mut cells: IndexMap<(i64, i64), NodeId> = IndexMap::new();
    for node in graph.nodes() {
        let cell = (
            (node.position[0] / step).round() as i64,
            (node.position[1] / step).round() as i64,
        );
        match cells.get(&cell) {
            Some(&first) => report.push(FindingKind::OverlappingPositions {
                first,
                second: node.id,
            }),
            None => {
                cells.insert(cell, node.id);
            }
        }
    }
}

fn check_properties(document: &Document, report: &mut ValidationReport) {
    let graph = &document.graph;
    let dangling: IndexSet<CompositeKey> = document
        .property_keys()
        .filter(|key| !graph.contains_node(key.node()))
        .collect();
    for key in dangling {
        report.push(FindingKind::DanglingProperty(key));
    }

    for issue in document.keyframes.check_ranges() {
        report.push(match issue {
            RangeIssue::OutOfBounds { key, .. } => FindingKind::KeyframeRangeOutOfBounds(key),
            RangeIssue::Overlap { first, second } => FindingKind::KeyframeRangeOverlap { first, second },
        });
    }

    for node in graph.nodes() {
        if !node.node_type().is_some_and(NodeType::is_section) {
            continue;
        }
        for property in PropertyId::ALL {
            let Some(meta) = property.override_meta() else {
                continue;
            };
            let has_keys = document
                .keyframes
                .get(CompositeKey::property(node.id, property))
                .is_some_and(|curve| !curve.is_empty());
            if has_keys && !document.is_flag_set(node.id, meta) {
                report.push(FindingKind::OverrideMismatch {
                    node: node.id,
                    property,
                });
            }
        }
    }
}

fn check_ui_state(document: &Document, report: &mut ValidationReport) {
    let Some(ui) = document.ui_state.as_ref() else {
        return;
    };
    let unknown: IndexSet<NodeId> = ui
        .referenced_nodes()
        .filter(|id| !document.graph.contains_node(*id))
        .collect();
    for id in unknown {
        report.push(FindingKind::UnknownUiNode(id));
    }
}

/// Run every integrity check on a document
pub fn validate(document: &Document, config: &ValidationConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_graph(&document.graph, &mut report);
    check_positions(&document.graph, config.position_rounding, &mut report);
    check_properties(document, &mut report);
    check_ui_state(document, &mut report);

    tracing::debug!(
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "Validated document"
    );
    report
}

/// Per-node override state, as printed by the CLI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverrideEntry {
    /// Node
    pub node: NodeId,
    /// Node type, if known
    pub node_type: Option<NodeType>,
    /// Guarded property
    pub property: PropertyId,
    /// Override flag
    pub flag: NodeMeta,
    /// Whether the flag is set
    pub enabled: bool,
    /// Keyframes stored for the property
    pub keyframes: usize,
}

impl OverrideEntry {
    /// Keyframes present while the override is off
    pub fn is_mismatch(&self) -> bool {
        self.keyframes > 0 && !self.enabled
    }
}

/// Override flags and keyframe counts for every overridable property of every node
pub fn override_report(document: &Document) -> Vec<OverrideEntry> {
    let mut entries = Vec::new();
    for node in document.graph.nodes() {
        for property in PropertyId::ALL {
            let Some(flag) = property.override_meta() else {
                continue;
            };
            let keyframes = document
                .keyframes
                .get(CompositeKey::property(node.id, property))
                .map_or(0, <[_]>::len);
            let enabled = document.is_flag_set(node.id, flag);
            if enabled || keyframes > 0 {
                entries.push(OverrideEntry {
                    node: node.id,
                    node_type: node.node_type(),
                    property,
                    flag,
                    enabled,
                    keyframes,
                });
            }
        }
    }
    entries
}

/// Ids present on only one side of a comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdSetDiff {
    /// Only in the left document
    pub only_left: Vec<u32>,
    /// Only in the right document
    pub only_right: Vec<u32>,
}

impl IdSetDiff {
    fn between(left: impl Iterator<Item = u32>, right: impl Iterator<Item = u32>) -> Self {
        let left: BTreeSet<u32> = left.collect();
        let right: BTreeSet<u32> = right.collect();
        Self {
            only_left: left.difference(&right).copied().collect(),
            only_right: right.difference(&left).copied().collect(),
        }
    }

    /// Whether both sides hold the same ids
    pub fn is_empty(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty()
    }
}

/// A node that differs between two documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeMismatch {
    /// Node id
    pub node: NodeId,
    /// Type codes, left then right
    pub type_codes: (u32, u32),
    /// Input counts, left then right
    pub inputs: (usize, usize),
    /// Output counts, left then right
    pub outputs: (usize, usize),
}

/// A scalar that differs by more than the tolerance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarDiff {
    /// Property key
    pub key: CompositeKey,
    /// Left value
    pub left: f32,
    /// Right value
    pub right: f32,
}

/// Result of comparing two documents
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParityReport {
    /// Node counts, left then right
    pub node_counts: (usize, usize),
    /// Edge counts, left then right
    pub edge_counts: (usize, usize),
    /// Nodes present on one side only
    pub nodes: IdSetDiff,
    /// Nodes whose type or port counts differ
    pub node_mismatches: Vec<NodeMismatch>,
    /// Scalars missing from the right document
    pub missing_right: Vec<CompositeKey>,
    /// Scalars missing from the left document
    pub missing_left: Vec<CompositeKey>,
    /// Scalars that differ beyond the tolerance
    pub scalar_diffs: Vec<ScalarDiff>,
    /// Duplicated node ids on one side only
    pub duplicate_nodes: IdSetDiff,
    /// Duplicated port ids on one side only
    pub duplicate_ports: IdSetDiff,
    /// Duplicated edge ids on one side only
    pub duplicate_edges: IdSetDiff,
    /// Orphan edges on one side only
    pub orphan_edges: IdSetDiff,
}

impl ParityReport {
    /// Whether the documents hold the same data
    pub fn is_equivalent(&self) -> bool {
        self.node_counts.0 == self.node_counts.1
            && self.edge_counts.0 == self.edge_counts.1
            && self.nodes.is_empty()
            && self.node_mismatches.is_empty()
            && self.missing_left.is_empty()
            && self.missing_right.is_empty()
            && self.scalar_diffs.is_empty()
            && self.duplicate_nodes.is_empty()
            && self.duplicate_ports.is_empty()
            && self.duplicate_edges.is_empty()
            && self.orphan_edges.is_empty()
    }
}

impl fmt::Display for ParityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_equivalent() {
            return write!(f, "equivalent ({} nodes, {} edges)", self.node_counts.0, self.edge_counts.0);
        }
        write!(f, "not equivalent")?;
        if self.node_counts.0 != self.node_counts.1 {
            write!(f, "\n  nodes: {} vs {}", self.node_counts.0, self.node_counts.1)?;
        }
        if self.edge_counts.0 != self.edge_counts.1 {
            write!(f, "\n  edges: {} vs {}", self.edge_counts.0, self.edge_counts.1)?;
        }
        for (label, diff) in [
            ("nodes", &self.nodes),
            ("duplicate node ids", &self.duplicate_nodes),
            ("duplicate port ids", &self.duplicate_ports),
            ("duplicate edge ids", &self.duplicate_edges),
            ("orphan edges", &self.orphan_edges),
        ] {
            if !diff.is_empty() {
                write!(f, "\n  {label}: left only {:?}, right only {:?}", diff.only_left, diff.only_right)?;
            }
        }
        for m in &self.node_mismatches {
            write!(
                f,
                "\n  node {}: type {} vs {}, inputs {} vs {}, outputs {} vs {}",
                m.node, m.type_codes.0, m.type_codes.1, m.inputs.0, m.inputs.1, m.outputs.0, m.outputs.1
            )?;
        }
        for key in &self.missing_right {
            write!(f, "\n  scalar {key} missing on the right")?;
        }
        for key in &self.missing_left {
            write!(f, "\n  scalar {key} missing on the left")?;
        }
        for diff in &self.scalar_diffs {
            write!(f, "\n  scalar {}: {} vs {}", diff.key, diff.left, diff.right)?;
        }
        Ok(())
    }
}

fn duplicate_ids(graph: &Graph) -> [Vec<u32>; 3] {
    [
        duplicates(graph.nodes().iter().map(|n| n.id.0)).into_iter().collect(),
        duplicates(graph.ports().iter().map(|p| p.id.0)).into_iter().collect(),
        duplicates(graph.edges().iter().map(|e| e.id.0)).into_iter().collect(),
    ]
}

/// Compare two documents for data equivalence
pub fn compare(left: &Document, right: &Document, tolerance: f32) -> ParityReport {
    let (lg, rg) = (&left.graph, &right.graph);
    let mut report = ParityReport {
        node_counts: (lg.node_count(), rg.node_count()),
        edge_counts: (lg.edge_count(), rg.edge_count()),
        nodes: IdSetDiff::between(lg.node_ids().map(|id| id.0), rg.node_ids().map(|id| id.0)),
        ..ParityReport::default()
    };

    for node in lg.nodes() {
        let Some(other) = rg.node(node.id) else {
            continue;
        };
        let inputs = (lg.inputs(node.id).count(), rg.inputs(node.id).count());
        let outputs = (lg.outputs(node.id).count(), rg.outputs(node.id).count());
        if node.type_code != other.type_code || inputs.0 != inputs.1 || outputs.0 != outputs.1 {
            report.node_mismatches.push(NodeMismatch {
                node: node.id,
                type_codes: (node.type_code, other.type_code),
                inputs,
                outputs,
            });
        }
    }

    for (key, &value) in &left.scalars {
        match right.scalars.get(key) {
            None => report.missing_right.push(*key),
            Some(&other) if (value - other).abs() > tolerance => report.scalar_diffs.push(ScalarDiff {
                key: *key,
                left: value,
                right: other,
            }),
            Some(_) => {}
        }
    }
    report.missing_left = right
        .scalars
        .keys()
        .filter(|key| !left.scalars.contains_key(*key))
        .copied()
        .collect();

    let [ln, lp, le] = duplicate_ids(lg);
    let [rn, rp, re] = duplicate_ids(rg);
    report.duplicate_nodes = IdSetDiff::between(ln.into_iter(), rn.into_iter());
    report.duplicate_ports = IdSetDiff::between(lp.into_iter(), rp.into_iter());
    report.duplicate_edges = IdSetDiff::between(le.into_iter(), re.into_iter());
    report.orphan_edges = IdSetDiff::between(
        lg.orphan_edges().map(|e| e.id.0),
        rg.orphan_edges().map(|e| e.id.0),
    );

    tracing::debug!(equivalent = report.is_equivalent(), "Compared documents");
    report
}
