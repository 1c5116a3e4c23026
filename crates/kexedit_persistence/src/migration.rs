// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conversion of parsed legacy files into documents.
//!
//! Migration never fails. Anything that needs a guess or loses information
//! is recorded as a [`DiagnosticKind::MigrationAnomaly`] and the best
//! reading of the data is kept.
//!
//! [`DiagnosticKind::MigrationAnomaly`]: crate::diagnostics::DiagnosticKind::MigrationAnomaly

use crate::config::MigrationConfig;
use crate::diagnostics::Diagnostic;
use crate::document::{Decoded, Document, DurationType};
use crate::legacy::{
    mesh_path_text, KeyframeLayout, LegacyFile, LegacyKeyframe, LegacyNode, LegacyVersion, PointData,
    PropertyOverrides,
};
use crate::ui_state::{KeyframeUiState, UiState};
use kexedit_graph::{
    CompositeKey, Edge, EdgeId, LegacyNodeType, Node, NodeId, NodeMeta, NodeType, Port, PortId, PortType,
    PortValueKind, PropertyId,
};
use kexedit_keyframes::{HandleType, InterpolationType, Keyframe, KeyframeFlags};
use std::collections::{HashMap, HashSet};

/// Legacy interpolation code meaning Bezier with aligned handles
const LEGACY_ALIGNED_BEZIER: i32 = 3;

/// Override bit, its metadata flag, and the data that implies it
const OVERRIDE_RULES: [(PropertyOverrides, NodeMeta, PropertyId, Option<PortType>); 5] = [
    (PropertyOverrides::FIXED_VELOCITY, NodeMeta::Driven, PropertyId::DrivenVelocity, None),
    (PropertyOverrides::HEART, NodeMeta::OverrideHeart, PropertyId::HeartOffset, Some(PortType::Heart)),
    (PropertyOverrides::FRICTION, NodeMeta::OverrideFriction, PropertyId::Friction, Some(PortType::Friction)),
    (
        PropertyOverrides::RESISTANCE,
        NodeMeta::OverrideResistance,
        PropertyId::Resistance,
        Some(PortType::Resistance),
    ),
    (PropertyOverrides::TRACK_STYLE, NodeMeta::OverrideTrackStyle, PropertyId::TrackStyle, None),
];

/// Migrate a parsed legacy file
pub fn migrate(file: LegacyFile, config: &MigrationConfig) -> Decoded {
    let mut migrator = Migrator::new(&file, config);
    for node in &file.nodes {
        migrator.migrate_node(node);
    }
    migrator.migrate_edges(&file);
    migrator.finish(file.ui)
}

/// A port being assembled before it is committed to the graph
struct PendingPort {
    id: PortId,
    type_code: u32,
    value: PortValue,
}

#[derive(Clone, Copy)]
enum PortValue {
    Legacy(PointData),
    Rotation([f32; 3]),
}

impl PendingPort {
    fn port_type(&self) -> Option<PortType> {
        PortType::from_code(self.type_code)
    }
}

struct Migrator<'a> {
    config: &'a MigrationConfig,
    version: LegacyVersion,
    document: Document,
    diagnostics: Vec<Diagnostic>,
    ui_keyframes: Vec<KeyframeUiState>,
    positions: Vec<(NodeId, [f32; 2])>,
    selected_nodes: Vec<NodeId>,
    selected_edges: Vec<EdgeId>,
    seen_nodes: HashSet<u32>,
    seen_ports: HashSet<u32>,
    duplicated_ports: HashSet<u32>,
    retargets: HashMap<PortId, PortId>,
    stored_anchors: Vec<(NodeId, usize)>,
    next_node: u32,
    next_port: u32,
}

impl<'a> Migrator<'a> {
    fn new(file: &LegacyFile, config: &'a MigrationConfig) -> Self {
        let max_node = file.nodes.iter().map(|n| n.header.id).max().unwrap_or(0);
        let max_port = file
            .nodes
            .iter()
            .flat_map(|n| n.inputs.iter().chain(&n.outputs))
            .map(|p| p.id)
            .max()
            .unwrap_or(0);

        tracing::info!(
            version = file.version.number(),
            nodes = file.nodes.len(),
            edges = file.edges.len(),
            "Migrating legacy document"
        );

        Self {
            config,
            version: file.version,
            document: Document::new(),
            diagnostics: Vec::new(),
            ui_keyframes: Vec::new(),
            positions: Vec::new(),
            selected_nodes: Vec::new(),
            selected_edges: Vec::new(),
            seen_nodes: HashSet::new(),
            seen_ports: HashSet::new(),
            duplicated_ports: HashSet::new(),
            retargets: HashMap::new(),
            stored_anchors: Vec::new(),
            next_node: max_node.saturating_add(1),
            next_port: max_port.saturating_add(1),
        }
    }

    fn anomaly(&mut self, node: Option<NodeId>, message: String) {
        tracing::warn!(node = ?node.map(NodeId::raw), "{message}");
        self.diagnostics.push(Diagnostic::anomaly(node, message));
    }

    fn fresh_port_id(&mut self) -> PortId {
        let id = PortId(self.next_port);
        self.next_port = self.next_port.saturating_add(1);
        id
    }

    fn assign_node_id(&mut self, raw: u32) -> NodeId {
        if self.seen_nodes.insert(raw) {
            return NodeId(raw);
        }
        let id = NodeId(self.next_node);
        self.next_node = self.next_node.saturating_add(1);
        self.seen_nodes.insert(id.0);
        self.anomaly(Some(id), format!("Duplicate node id {raw} renumbered to {id}"));
        id
    }

    fn assign_port_id(&mut self, raw: u32, node: NodeId) -> PortId {
        if self.seen_ports.insert(raw) {
            return PortId(raw);
        }
        let id = self.fresh_port_id();
        self.seen_ports.insert(id.0);
        self.duplicated_ports.insert(raw);
        self.anomaly(Some(node), format!("Duplicate port id {raw} renumbered to {id}"));
        id
    }

    fn node_type(&mut self, legacy: &LegacyNode, id: NodeId) -> u32 {
        let code = legacy.header.type_code;
        match LegacyNodeType::from_code(code) {
            Some(kind) => match kind.to_node_type() {
                Some(node_type) => node_type.code(),
                None => {
                    let path = legacy
                        .mesh_path
                        .as_deref()
                        .and_then(mesh_path_text)
                        .filter(|p| !p.is_empty());
                    let detail = path.map(|p| format!(" (mesh {p:?})")).unwrap_or_default();
                    self.anomaly(Some(id), format!("{kind:?} node has no counterpart, converted to Force{detail}"));
                    NodeType::Force.code()
                }
            },
            None => {
                self.anomaly(Some(id), format!("Unknown legacy node type {code}"));
                u32::try_from(code).unwrap_or(u32::MAX)
            }
        }
    }

    fn collect_ports(&mut self, legacy: &LegacyNode, id: NodeId, is_input: bool) -> Vec<PendingPort> {
        let source = if is_input { &legacy.inputs } else { &legacy.outputs };
        let mut ports = Vec::with_capacity(source.len());
        for port in source {
            if port.is_input != is_input {
                self.anomaly(Some(id), format!("Port {} stored on the wrong side", port.id));
            }
            ports.push(PendingPort {
                id: self.assign_port_id(port.id, id),
                type_code: u32::try_from(port.type_code).unwrap_or(u32::MAX),
                value: PortValue::Legacy(port.value),
            });
        }
        ports
    }

    fn inject_missing(&mut self, inputs: &mut Vec<PendingPort>, id: NodeId, port_type: PortType, value: f32) -> bool {
        if inputs.iter().any(|p| p.port_type() == Some(port_type)) {
            return false;
        }
        let port_id = self.fresh_port_id();
        inputs.push(PendingPort {
            id: port_id,
            type_code: port_type.code(),
            value: PortValue::Legacy(PointData::scalar(value)),
        });
        tracing::debug!(node = id.raw(), port = port_id.raw(), ?port_type, "Injected port");
        true
    }

    fn inject_version_ports(&mut self, inputs: &mut Vec<PendingPort>, id: NodeId, kind: Option<LegacyNodeType>) {
        match kind {
            Some(LegacyNodeType::Bridge) if self.version.needs_bridge_weights() => {
                let weight = self.config.bridge_weight_default;
                for port_type in [PortType::OutWeight, PortType::InWeight] {
                    if self.inject_missing(inputs, id, port_type, weight) {
                        self.anomaly(
                            Some(id),
                            format!("Bridge {port_type} port added with placeholder value {weight}"),
                        );
                    }
                }
            }
            Some(LegacyNodeType::CopyPathSection) if self.version.needs_trim_ports() => {
                self.inject_missing(inputs, id, PortType::Start, 0.0);
                self.inject_missing(inputs, id, PortType::End, -1.0);
            }
            _ => {}
        }
    }

    fn consolidate_rotation(&mut self, inputs: &mut Vec<PendingPort>, id: NodeId) {
        let find = |t: PortType| inputs.iter().position(|p| p.port_type() == Some(t));
        let (roll, pitch, yaw) = (find(PortType::Roll), find(PortType::Pitch), find(PortType::Yaw));

        let (Some(roll), Some(pitch), Some(yaw)) = (roll, pitch, yaw) else {
            if roll.is_some() || pitch.is_some() || yaw.is_some() {
                self.anomaly(Some(id), "Incomplete Roll/Pitch/Yaw set kept as separate ports".to_string());
            }
            return;
        };

        let angle = |index: usize| match inputs[index].value {
            PortValue::Legacy(point) => point.roll.to_radians(),
            PortValue::Rotation(v) => v[0],
        };
        let rotation = [angle(roll), angle(pitch), angle(yaw)];
        let rotation_id = inputs[roll].id;
        self.retargets.insert(inputs[pitch].id, rotation_id);
        self.retargets.insert(inputs[yaw].id, rotation_id);

        inputs[roll] = PendingPort {
            id: rotation_id,
            type_code: PortType::Rotation.code(),
            value: PortValue::Rotation(rotation),
        };
        let (pitch_id, yaw_id) = (inputs[pitch].id, inputs[yaw].id);
        inputs.retain(|p| p.id != pitch_id && p.id != yaw_id);
        tracing::debug!(node = id.raw(), port = rotation_id.raw(), "Consolidated rotation ports");
    }

    fn store_input_values(&mut self, inputs: &[PendingPort], id: NodeId) {
        for (index, port) in inputs.iter().enumerate() {
            let Ok(index) = u8::try_from(index) else {
                self.anomaly(Some(id), format!("Input {index} has no addressable value slot"));
                break;
            };
            let key = CompositeKey::input(id, index);
            match (port.port_type(), port.value) {
                (_, PortValue::Rotation(v)) => {
                    self.document.vectors.insert(key, v);
                }
                (Some(port_type), PortValue::Legacy(point)) => match port_type.value_kind() {
                    PortValueKind::None => {}
                    PortValueKind::Vector => {
                        self.document.vectors.insert(key, point.as_vector());
                    }
                    PortValueKind::Scalar if port_type.is_angular() => {
                        self.document.scalars.insert(key, point.roll.to_radians());
                    }
                    PortValueKind::Scalar => {
                        self.document.scalars.insert(key, point.roll);
                    }
                },
                (None, PortValue::Legacy(_)) => {}
            }
        }
    }

    fn store_metadata(&mut self, legacy: &LegacyNode, id: NodeId) {
        let doc = &mut self.document;
        if let Some(duration) = legacy.duration {
            doc.scalars.insert(CompositeKey::meta(id, NodeMeta::Duration), duration.value);
            if duration.kind == DurationType::Distance {
                doc.flags.insert(CompositeKey::meta(id, NodeMeta::DurationType), 1);
            }
        }
        if legacy.steering() {
            doc.flags.insert(CompositeKey::meta(id, NodeMeta::Steering), 1);
        }
        if legacy.anchor.facing != 1 {
            doc.flags.insert(CompositeKey::meta(id, NodeMeta::Facing), legacy.anchor.facing);
        }
        if legacy.header.priority != 0 {
            doc.scalars.insert(CompositeKey::meta(id, NodeMeta::Priority), legacy.header.priority as f32);
        }
        if !legacy.render() {
            doc.flags.insert(CompositeKey::meta(id, NodeMeta::Render), 1);
        }
    }

    /// Write the stored anchor point into the anchor node's own input slots
    fn store_anchor(&mut self, legacy: &LegacyNode, inputs: &[PendingPort], id: NodeId) {
        let anchor = &legacy.anchor;
        let mut scalars = vec![
            (PortType::Velocity, anchor.velocity),
            (PortType::Heart, anchor.heart_offset),
            (PortType::Friction, anchor.friction),
            (PortType::Resistance, anchor.resistance),
        ];
        let mut vectors = Vec::new();
        if anchor.has_position() {
            vectors.push((PortType::Position, anchor.heart_position));
        }
        if let Some([roll, pitch, yaw]) = anchor.frame_angles() {
            if input_slot(inputs, PortType::Rotation).is_some() {
                vectors.push((PortType::Rotation, [roll, pitch, yaw]));
            } else {
                scalars.extend([(PortType::Roll, roll), (PortType::Pitch, pitch), (PortType::Yaw, yaw)]);
            }
        }

        for (port_type, value) in scalars {
            match input_slot(inputs, port_type) {
                Some(index) => {
                    self.document.scalars.insert(CompositeKey::input(id, index), value);
                }
                None => self.anomaly(Some(id), format!("Anchor has no {port_type} input, stored value dropped")),
            }
        }
        for (port_type, value) in vectors {
            match input_slot(inputs, port_type) {
                Some(index) => {
                    self.document.vectors.insert(CompositeKey::input(id, index), value);
                }
                None => self.anomaly(Some(id), format!("Anchor has no {port_type} input, stored value dropped")),
            }
        }
    }

    fn store_overrides(&mut self, legacy: &LegacyNode, inputs: &[PendingPort], id: NodeId) {
        for (bit, meta, property, port_type) in OVERRIDE_RULES {
            let stored = legacy.overrides.is_some_and(|o| o.contains(bit));
            let implied = self.config.reconstruct_overrides
                && (!legacy.keyframes_for(property).is_empty()
                    || port_type.is_some_and(|t| inputs.iter().any(|p| p.port_type() == Some(t))));

            if stored || implied {
                self.document.flags.insert(CompositeKey::meta(id, meta), 1);
            }
            if implied && !stored {
                self.anomaly(Some(id), format!("{meta:?} flag reconstructed from {property:?} data"));
            }
        }
    }

    fn convert_keyframe(&mut self, legacy: &LegacyKeyframe, layout: KeyframeLayout) -> (Keyframe, HandleType) {
        let mut aligned = false;
        let mut interpolation = |code: i32| {
            if layout == KeyframeLayout::Compact && code == LEGACY_ALIGNED_BEZIER {
                aligned = true;
                return InterpolationType::Bezier;
            }
            u8::try_from(code)
                .ok()
                .and_then(InterpolationType::from_code)
                .unwrap_or_else(|| {
                    let raw = u8::try_from(code).unwrap_or(u8::MAX);
                    tracing::warn!(code, "Unknown legacy interpolation code");
                    self.diagnostics.push(Diagnostic::unknown_interpolation(raw));
                    InterpolationType::Bezier
                })
        };
        let incoming = interpolation(legacy.in_interpolation);
        let outgoing = interpolation(legacy.out_interpolation);

        let handle = match layout {
            KeyframeLayout::Compact if aligned => HandleType::Aligned,
            KeyframeLayout::Compact => HandleType::Free,
            KeyframeLayout::Extended => HandleType::from_code(u8::try_from(legacy.handle_type).unwrap_or(1)),
        };

        let keyframe = Keyframe::new(legacy.time, legacy.value)
            .with_interpolation(incoming, outgoing)
            .with_tangents(legacy.in_tangent, legacy.out_tangent)
            .with_weights(legacy.in_weight, legacy.out_weight);
        (keyframe, handle)
    }

    fn store_keyframes(&mut self, legacy: &LegacyNode, id: NodeId) {
        let layout = self.version.keyframe_layout();
        for property in PropertyId::ALL {
            let source = legacy.keyframes_for(property);
            if source.is_empty() {
                continue;
            }

            let mut curve = Vec::with_capacity(source.len());
            for (index, kf) in source.iter().enumerate() {
                let (keyframe, handle) = self.convert_keyframe(kf, layout);
                curve.push(keyframe);
                self.ui_keyframes.push(KeyframeUiState {
                    node: id,
                    property: property as u8,
                    keyframe_index: i32::try_from(index).unwrap_or(i32::MAX),
                    id: kf.id,
                    handle,
                    flags: KeyframeFlags(kf.flags),
                    selected: kf.selected,
                });
            }

            if let Err(e) = self.document.keyframes.set(CompositeKey::property(id, property), &curve) {
                self.anomaly(Some(id), format!("{property:?} keyframes dropped: {e}"));
            }
        }
    }

    fn migrate_node(&mut self, legacy: &LegacyNode) {
        let id = self.assign_node_id(legacy.header.id);
        let kind = legacy.node_type();
        let type_code = self.node_type(legacy, id);

        let mut inputs = self.collect_ports(legacy, id, true);
        let outputs = self.collect_ports(legacy, id, false);
        self.inject_version_ports(&mut inputs, id, kind);
        if self.config.consolidate_rotation {
            self.consolidate_rotation(&mut inputs, id);
        }

        self.store_input_values(&inputs, id);
        self.store_metadata(legacy, id);
        if kind == Some(LegacyNodeType::Anchor) {
            self.store_anchor(legacy, &inputs, id);
        }
        if let Some(index) = anchor_input(kind) {
            if legacy.anchor.has_position() || legacy.anchor.has_direction() {
                self.stored_anchors.push((id, index));
            }
        }
        self.store_overrides(legacy, &inputs, id);
        self.store_keyframes(legacy, id);

        let graph = &mut self.document.graph;
        let [x, y] = legacy.header.position;
        graph.push_node(
            Node::with_code(id, type_code)
                .with_position(x, y)
                .with_port_counts(count_i32(inputs.len()), count_i32(outputs.len())),
        );
        for port in &inputs {
            graph.push_port(Port {
                id: port.id,
                type_code: port.type_code,
                owner: id,
                is_input: true,
            });
        }
        for port in &outputs {
            graph.push_port(Port {
                id: port.id,
                type_code: port.type_code,
                owner: id,
                is_input: false,
            });
        }

        self.positions.push((id, legacy.header.position));
        if legacy.header.selected {
            self.selected_nodes.push(id);
        }
    }

    fn resolve_port(&mut self, raw: u32, edge: u32) -> PortId {
        if self.duplicated_ports.contains(&raw) {
            self.anomaly(None, format!("Edge {edge} refers to duplicated port id {raw}, bound to the first"));
        }
        let port = PortId(raw);
        self.retargets.get(&port).copied().unwrap_or(port)
    }

    fn migrate_edges(&mut self, file: &LegacyFile) {
        let mut seen = HashSet::new();
        for legacy in &file.edges {
            if !seen.insert(legacy.id) {
                self.anomaly(None, format!("Duplicate edge id {} dropped", legacy.id));
                continue;
            }
            let source = self.resolve_port(legacy.source, legacy.id);
            let target = self.resolve_port(legacy.target, legacy.id);
            self.document.graph.push_edge(Edge::new(EdgeId(legacy.id), source, target));
            if legacy.selected {
                self.selected_edges.push(EdgeId(legacy.id));
            }
        }
        self.document.graph.link_neighbors();
        self.document.graph.sync_next_ids();
        self.report_stored_anchors();
    }

    /// Flag nodes whose anchor input is unconnected while the node itself
    /// stores an anchor point. No Anchor node is synthesized for them.
    fn report_stored_anchors(&mut self) {
        let stored = std::mem::take(&mut self.stored_anchors);
        for (id, index) in stored {
            let graph = &self.document.graph;
            let connected = graph
                .input(id, index)
                .is_some_and(|port| graph.edges_to(port.id).next().is_some());
            if !connected {
                self.anomaly(
                    Some(id),
                    format!("Input {index} is unconnected; the anchor point stored on the node was not converted"),
                );
            }
        }
    }

    fn finish(mut self, legacy_ui: UiState) -> Decoded {
        let mut ui = legacy_ui;
        ui.node_positions = self.positions.into_iter().collect();
        ui.keyframes = self.ui_keyframes;
        ui.selected_nodes = self.selected_nodes;
        ui.selected_edges = self.selected_edges;
        self.document.ui_state = Some(ui);

        let graph = &self.document.graph;
        tracing::info!(
            nodes = graph.node_count(),
            ports = graph.port_count(),
            edges = graph.edge_count(),
            anomalies = self.diagnostics.len(),
            "Legacy migration complete"
        );

        Decoded {
            document: self.document,
            diagnostics: self.diagnostics,
        }
    }
}

/// Index of the first input of `port_type`
fn input_slot(inputs: &[PendingPort], port_type: PortType) -> Option<u8> {
    inputs
        .iter()
        .position(|p| p.port_type() == Some(port_type))
        .and_then(|index| u8::try_from(index).ok())
}

/// Input that receives the node's starting anchor: a section's first input
/// or a bridge's target
fn anchor_input(kind: Option<LegacyNodeType>) -> Option<usize> {
    match kind? {
        LegacyNodeType::ForceSection
        | LegacyNodeType::GeometricSection
        | LegacyNodeType::CurvedSection
        | LegacyNodeType::CopyPathSection => Some(0),
        LegacyNodeType::Bridge => Some(1),
        LegacyNodeType::Anchor
        | LegacyNodeType::Reverse
        | LegacyNodeType::ReversePath
        | LegacyNodeType::Mesh
        | LegacyNodeType::Append => None,
    }
}

fn count_i32(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}
