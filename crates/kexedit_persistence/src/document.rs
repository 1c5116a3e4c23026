// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory document model.

use crate::diagnostics::Diagnostic;
use crate::ui_state::UiState;
use indexmap::IndexMap;
use kexedit_graph::{CompositeKey, Graph, NodeId, NodeMeta};
use kexedit_keyframes::KeyframeStore;
use serde::{Deserialize, Serialize};

/// How a section's duration is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationType {
    /// Seconds
    Time,
    /// Meters along the track
    Distance,
}

/// A complete track document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// Node graph
    pub graph: Graph,
    /// Keyframe curves
    pub keyframes: KeyframeStore,
    /// Scalar port values and node metadata
    pub scalars: IndexMap<CompositeKey, f32>,
    /// Vector port values
    pub vectors: IndexMap<CompositeKey, [f32; 3]>,
    /// Integer node flags
    pub flags: IndexMap<CompositeKey, i32>,
    /// Editor state, absent when the file carried none
    pub ui_state: Option<UiState>,
}

/// A decoded document with its non-fatal diagnostics
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    /// The document
    pub document: Document,
    /// Diagnostics in the order they were raised
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            ..Self::default()
        }
    }

    /// Flag value for a node metadata field
    pub fn meta_flag(&self, node: NodeId, meta: NodeMeta) -> Option<i32> {
        self.flags.get(&CompositeKey::meta(node, meta)).copied()
    }

    /// Scalar value for a node metadata field
    pub fn meta_scalar(&self, node: NodeId, meta: NodeMeta) -> Option<f32> {
        self.scalars.get(&CompositeKey::meta(node, meta)).copied()
    }

    /// Whether a metadata flag is set to a non-zero value
    pub fn is_flag_set(&self, node: NodeId, meta: NodeMeta) -> bool {
        self.meta_flag(node, meta).is_some_and(|v| v != 0)
    }

    /// Build priority, 0 when unset
    pub fn priority(&self, node: NodeId) -> i32 {
        self.meta_scalar(node, NodeMeta::Priority).map_or(0, |p| p as i32)
    }

    /// Facing sign, +1 when unset
    pub fn facing(&self, node: NodeId) -> i32 {
        self.meta_flag(node, NodeMeta::Facing).unwrap_or(1)
    }

    /// Whether the node is hidden from rendering
    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.is_flag_set(node, NodeMeta::Render)
    }

    /// Section duration and its unit
    pub fn duration(&self, node: NodeId) -> Option<(f32, DurationType)> {
        let value = self.meta_scalar(node, NodeMeta::Duration)?;
        let unit = if self.is_flag_set(node, NodeMeta::DurationType) {
            DurationType::Distance
        } else {
            DurationType::Time
        };
        Some((value, unit))
    }

    /// Nodes that take part in the build, ordered by ascending priority.
    ///
    /// Ties keep dependency order. Nodes with negative priority are
    /// cosmetic and left out. A cyclic graph falls back to document order.
    pub fn build_order(&self) -> Vec<NodeId> {
        let mut order = self
            .graph
            .topological_order()
            .unwrap_or_else(|_| self.graph.node_ids().collect());
        order.retain(|id| self.priority(*id) >= 0);
        order.sort_by_key(|id| self.priority(*id));
        order
    }

    /// Remove a node and everything stored under it
    pub fn remove_node(&mut self, node: NodeId) -> bool {
        if self.graph.remove_node(node).is_none() {
            return false;
        }
        self.scalars.retain(|k, _| k.node() != node);
        self.vectors.retain(|k, _| k.node() != node);
        self.flags.retain(|k, _| k.node() != node);
        self.keyframes.remove_node(node);
        if let Some(ui) = self.ui_state.as_mut() {
            ui.remove_node(node);
        }
        true
    }

    /// Copy UI-state positions onto graph nodes
    pub fn apply_ui_positions(&mut self) {
        let Some(ui) = self.ui_state.as_ref() else {
            return;
        };
        for node in self.graph.nodes_mut() {
            if let Some(position) = ui.node_positions.get(&node.id) {
                node.position = *position;
            }
        }
    }

    /// Capture graph node positions into the UI state, creating it if needed
    pub fn capture_ui_positions(&mut self) {
        let positions: Vec<_> = self.graph.nodes().iter().map(|n| (n.id, n.position)).collect();
        let ui = self.ui_state.get_or_insert_with(UiState::default);
        for (id, position) in positions {
            ui.node_positions.entry(id).or_insert(position);
        }
    }

    /// Every property key in the document, across all maps
    pub fn property_keys(&self) -> impl Iterator<Item = CompositeKey> + '_ {
        self.scalars
            .keys()
            .chain(self.vectors.keys())
            .chain(self.flags.keys())
            .chain(self.keyframes.ranges().keys())
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kexedit_graph::{NodeType, PortType, PropertyId};
    use kexedit_keyframes::Keyframe;

    fn two_nodes() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let (a, _, a_out) = doc
            .graph
            .create_node(NodeType::Anchor, [0.0, 0.0], &[], &[PortType::Anchor])
            .unwrap();
        let (b, b_in, _) = doc
            .graph
            .create_node(NodeType::Force, [100.0, 0.0], &[PortType::Anchor], &[PortType::Anchor])
            .unwrap();
        doc.graph.add_edge(a_out[0], b_in[0]).unwrap();
        (doc, a, b)
    }

    #[test]
    fn test_meta_accessors() {
        let (mut doc, a, b) = two_nodes();
        assert_eq!(doc.facing(a), 1);
        assert_eq!(doc.priority(a), 0);
        assert!(doc.duration(b).is_none());

        doc.scalars.insert(CompositeKey::meta(b, NodeMeta::Duration), 12.0);
        doc.flags.insert(CompositeKey::meta(b, NodeMeta::DurationType), 1);
        doc.flags.insert(CompositeKey::meta(b, NodeMeta::Facing), -1);
        doc.flags.insert(CompositeKey::meta(b, NodeMeta::Render), 1);
        assert_eq!(doc.duration(b), Some((12.0, DurationType::Distance)));
        assert_eq!(doc.facing(b), -1);
        assert!(doc.is_hidden(b));
    }

    #[test]
    fn test_build_order() {
        let (mut doc, a, b) = two_nodes();
        assert_eq!(doc.build_order(), vec![a, b]);

        let (c, _, _) = doc.graph.create_node(NodeType::Force, [0.0, 100.0], &[], &[]).unwrap();
        doc.scalars.insert(CompositeKey::meta(c, NodeMeta::Priority), -1.0);
        doc.scalars.insert(CompositeKey::meta(a, NodeMeta::Priority), 2.0);
        assert_eq!(doc.build_order(), vec![b, a]);
    }

    #[test]
    fn test_remove_node_cascades() {
        let (mut doc, a, b) = two_nodes();
        doc.scalars.insert(CompositeKey::input(b, 1), 4.0);
        doc.flags.insert(CompositeKey::meta(a, NodeMeta::Render), 1);
        doc.keyframes
            .set(CompositeKey::property(b, PropertyId::NormalForce), &[Keyframe::new(0.0, 1.0)])
            .unwrap();
        doc.capture_ui_positions();

        assert!(doc.remove_node(b));
        assert!(doc.scalars.is_empty());
        assert_eq!(doc.flags.len(), 1);
        assert!(doc.keyframes.is_empty());
        assert_eq!(doc.graph.edge_count(), 0);
        assert!(!doc.ui_state.as_ref().unwrap().node_positions.contains_key(&b));
        assert!(!doc.remove_node(b));
    }

    #[test]
    fn test_apply_ui_positions() {
        let (mut doc, a, _) = two_nodes();
        let mut ui = UiState::default();
        ui.node_positions.insert(a, [5.0, 6.0]);
        doc.ui_state = Some(ui);
        doc.apply_ui_positions();
        assert_eq!(doc.graph.node(a).unwrap().position, [5.0, 6.0]);
    }
}
