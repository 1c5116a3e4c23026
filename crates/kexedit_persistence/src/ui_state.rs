// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor UI state and its `UIST` chunk codec.
//!
//! None of this influences simulation. It is kept so that reopening a
//! document restores the editor view.

use crate::cursor::{ByteCursor, ByteWriter};
use crate::error::FormatResult;
use indexmap::IndexMap;
use kexedit_graph::{EdgeId, NodeId};
use kexedit_keyframes::{HandleType, KeyframeFlags};
use serde::{Deserialize, Serialize};

/// Editor state for one keyframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeUiState {
    /// Owning node
    pub node: NodeId,
    /// Raw property id
    pub property: u8,
    /// Index within the property's curve
    pub keyframe_index: i32,
    /// Editor-side keyframe id
    pub id: u32,
    /// Bezier handle mode
    pub handle: HandleType,
    /// Editing locks
    pub flags: KeyframeFlags,
    /// Whether the keyframe is selected
    pub selected: bool,
}

/// Editor view state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    /// Node positions in the graph editor
    pub node_positions: IndexMap<NodeId, [f32; 2]>,
    /// Timeline scroll offset
    pub timeline_offset: f32,
    /// Timeline zoom
    pub timeline_zoom: f32,
    /// Playhead time
    pub playhead_time: f32,
    /// Graph pan X
    pub graph_pan_x: f32,
    /// Graph pan Y
    pub graph_pan_y: f32,
    /// Graph zoom
    pub graph_zoom: f32,
    /// Camera position
    pub camera_position: [f32; 3],
    /// Camera position being eased toward
    pub camera_target_position: [f32; 3],
    /// Orbit distance
    pub camera_distance: f32,
    /// Orbit distance being eased toward
    pub camera_target_distance: f32,
    /// Pitch in degrees
    pub camera_pitch: f32,
    /// Pitch being eased toward
    pub camera_target_pitch: f32,
    /// Yaw in degrees
    pub camera_yaw: f32,
    /// Yaw being eased toward
    pub camera_target_yaw: f32,
    /// Camera movement speed multiplier
    pub camera_speed_multiplier: f32,
    /// Per-keyframe editor state
    pub keyframes: Vec<KeyframeUiState>,
    /// Selected nodes
    pub selected_nodes: Vec<NodeId>,
    /// Selected edges
    pub selected_edges: Vec<EdgeId>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            node_positions: IndexMap::new(),
            timeline_offset: 0.0,
            timeline_zoom: 1.0,
            playhead_time: 0.0,
            graph_pan_x: 0.0,
            graph_pan_y: 0.0,
            graph_zoom: 1.0,
            camera_position: [0.0; 3],
            camera_target_position: [0.0; 3],
            camera_distance: 50.0,
            camera_target_distance: 50.0,
            camera_pitch: 30.0,
            camera_target_pitch: 30.0,
            camera_yaw: 0.0,
            camera_target_yaw: 0.0,
            camera_speed_multiplier: 1.0,
            keyframes: Vec::new(),
            selected_nodes: Vec::new(),
            selected_edges: Vec::new(),
        }
    }
}

impl UiState {
    /// Camera used by legacy files that predate the stored UI block
    pub fn legacy_default() -> Self {
        let position = [6.0, 6.0, 6.0];
        let distance = (position.iter().map(|v| v * v).sum::<f32>()).sqrt();
        Self {
            camera_position: position,
            camera_target_position: position,
            camera_distance: distance,
            camera_target_distance: distance,
            camera_yaw: -135.0,
            camera_target_yaw: -135.0,
            ..Self::default()
        }
    }

    /// Node ids referenced anywhere in the UI state
    pub fn referenced_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_positions
            .keys()
            .copied()
            .chain(self.keyframes.iter().map(|k| k.node))
            .chain(self.selected_nodes.iter().copied())
    }

    /// Drop every entry referring to `node`
    pub fn remove_node(&mut self, node: NodeId) {
        self.node_positions.shift_remove(&node);
        self.keyframes.retain(|k| k.node != node);
        self.selected_nodes.retain(|n| *n != node);
    }
}

/// `UIST` layout versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiStateLayout {
    /// Positions, camera, keyframe handles
    Basic,
    /// Adds playhead, keyframe selection and node/edge selection sets
    WithSelection,
}

impl UiStateLayout {
    /// Layout for a chunk version.
    ///
    /// The chunk version is the only discriminator. Writers disagree on whether
    /// a v1 chunk carries the playhead and selection block, so v1 is read as
    /// [`UiStateLayout::Basic`] and v2 and later as
    /// [`UiStateLayout::WithSelection`].
    pub fn from_version(version: u32) -> Self {
        if version >= 2 {
            Self::WithSelection
        } else {
            Self::Basic
        }
    }

    fn has_selection(self) -> bool {
        match self {
            Self::Basic => false,
            Self::WithSelection => true,
        }
    }
}

/// Codec for the `UIST` chunk
pub struct UiStateCodec;

impl UiStateCodec {
    /// Version written by [`UiStateCodec::encode`]
    pub const VERSION: u32 = 2;

    /// Decode a `UIST` payload
    pub fn decode(cursor: &mut ByteCursor<'_>, version: u32) -> FormatResult<UiState> {
        let layout = UiStateLayout::from_version(version);
        let mut state = UiState::default();

        let count = cursor.read_count_of(12)?;
        state.node_positions.reserve(count);
        for _ in 0..count {
            let id = NodeId(cursor.read_u32()?);
            let position = cursor.read_vec2()?;
            state.node_positions.insert(id, position);
        }

        state.timeline_offset = cursor.read_f32()?;
        state.timeline_zoom = cursor.read_f32()?;
        if layout.has_selection() {
            state.playhead_time = cursor.read_f32()?;
        }
        state.graph_pan_x = cursor.read_f32()?;
        state.graph_pan_y = cursor.read_f32()?;
        state.graph_zoom = cursor.read_f32()?;
        state.camera_position = cursor.read_vec3()?;
        state.camera_target_position = cursor.read_vec3()?;
        state.camera_distance = cursor.read_f32()?;
        state.camera_target_distance = cursor.read_f32()?;
        state.camera_pitch = cursor.read_f32()?;
        state.camera_target_pitch = cursor.read_f32()?;
        state.camera_yaw = cursor.read_f32()?;
        state.camera_target_yaw = cursor.read_f32()?;
        state.camera_speed_multiplier = cursor.read_f32()?;

        let record_size = if layout.has_selection() { 16 } else { 15 };
        let count = cursor.read_count_of(record_size)?;
        state.keyframes.reserve(count);
        for _ in 0..count {
            let node = NodeId(cursor.read_u32()?);
            let property = cursor.read_u8()?;
            let keyframe_index = cursor.read_i32()?;
            let id = cursor.read_u32()?;
            let handle = HandleType::from_code(cursor.read_u8()?);
            let flags = KeyframeFlags(cursor.read_u8()?);
            let selected = layout.has_selection() && cursor.read_bool()?;
            state.keyframes.push(KeyframeUiState {
                node,
                property,
                keyframe_index,
                id,
                handle,
                flags,
                selected,
            });
        }

        if layout.has_selection() {
            let count = cursor.read_count_of(4)?;
            for _ in 0..count {
                state.selected_nodes.push(NodeId(cursor.read_u32()?));
            }
            let count = cursor.read_count_of(4)?;
            for _ in 0..count {
                state.selected_edges.push(EdgeId(cursor.read_u32()?));
            }
        }

        Ok(state)
    }

    /// Encode a `UIST` payload at [`UiStateCodec::VERSION`]
    pub fn encode(writer: &mut ByteWriter, state: &UiState) {
        writer.write_count(state.node_positions.len());
        for (id, position) in &state.node_positions {
            writer.write_u32(id.raw());
            writer.write_vec2(*position);
        }

        writer.write_f32(state.timeline_offset);
        writer.write_f32(state.timeline_zoom);
        writer.write_f32(state.playhead_time);
        writer.write_f32(state.graph_pan_x);
        writer.write_f32(state.graph_pan_y);
        writer.write_f32(state.graph_zoom);
        writer.write_vec3(state.camera_position);
        writer.write_vec3(state.camera_target_position);
        writer.write_f32(state.camera_distance);
        writer.write_f32(state.camera_target_distance);
        writer.write_f32(state.camera_pitch);
        writer.write_f32(state.camera_target_pitch);
        writer.write_f32(state.camera_yaw);
        writer.write_f32(state.camera_target_yaw);
        writer.write_f32(state.camera_speed_multiplier);

        writer.write_count(state.keyframes.len());
        for kf in &state.keyframes {
            writer.write_u32(kf.node.raw());
            writer.write_u8(kf.property);
            writer.write_i32(kf.keyframe_index);
            writer.write_u32(kf.id);
            writer.write_u8(kf.handle.code());
            writer.write_u8(kf.flags.0);
            writer.write_bool(kf.selected);
        }

        writer.write_count(state.selected_nodes.len());
        for id in &state.selected_nodes {
            writer.write_u32(id.raw());
        }
        writer.write_count(state.selected_edges.len());
        for id in &state.selected_edges {
            writer.write_u32(id.raw());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UiState {
        let mut state = UiState {
            playhead_time: 3.5,
            graph_zoom: 0.75,
            camera_target_position: [1.0, 2.0, 3.0],
            selected_nodes: vec![NodeId(2)],
            selected_edges: vec![EdgeId(1)],
            ..UiState::default()
        };
        state.node_positions.insert(NodeId(1), [10.0, 20.0]);
        state.node_positions.insert(NodeId(2), [200.0, 20.0]);
        state.keyframes.push(KeyframeUiState {
            node: NodeId(2),
            property: 1,
            keyframe_index: 0,
            id: 77,
            handle: HandleType::Aligned,
            flags: KeyframeFlags::LOCK_TIME,
            selected: true,
        });
        state
    }

    #[test]
    fn test_defaults() {
        let state = UiState::default();
        assert_eq!(state.timeline_zoom, 1.0);
        assert_eq!(state.camera_distance, 50.0);
        assert_eq!(state.camera_pitch, 30.0);
        assert_eq!(state.camera_speed_multiplier, 1.0);

        let legacy = UiState::legacy_default();
        assert_eq!(legacy.camera_target_yaw, -135.0);
        assert!((legacy.camera_distance - 10.392_304).abs() < 1e-4);
    }

    #[test]
    fn test_v2_roundtrip() {
        let state = sample();
        let mut w = ByteWriter::new();
        UiStateCodec::encode(&mut w, &state);
        let bytes = w.into_inner();
        let mut c = ByteCursor::new(&bytes);
        let decoded = UiStateCodec::decode(&mut c, 2).unwrap();
        assert_eq!(decoded, state);
        assert!(c.is_empty());
    }

    #[test]
    fn test_v1_layout() {
        let mut w = ByteWriter::new();
        w.write_i32(1);
        w.write_u32(5);
        w.write_vec2([1.0, 2.0]);
        // timeline offset, zoom, pan x/y, graph zoom
        for v in [4.0, 2.0, 0.0, 0.0, 1.5] {
            w.write_f32(v);
        }
        w.write_vec3([0.0; 3]);
        w.write_vec3([0.0; 3]);
        for v in [50.0, 50.0, 30.0, 30.0, 0.0, 0.0, 1.0] {
            w.write_f32(v);
        }
        w.write_i32(1);
        w.write_u32(5);
        w.write_u8(0);
        w.write_i32(2);
        w.write_u32(9);
        w.write_u8(1);
        w.write_u8(0);
        let bytes = w.into_inner();

        let mut c = ByteCursor::new(&bytes);
        let state = UiStateCodec::decode(&mut c, 1).unwrap();
        assert!(c.is_empty());
        assert_eq!(state.node_positions[&NodeId(5)], [1.0, 2.0]);
        assert_eq!(state.timeline_offset, 4.0);
        assert_eq!(state.graph_zoom, 1.5);
        assert_eq!(state.playhead_time, 0.0);
        assert_eq!(state.keyframes[0].keyframe_index, 2);
        assert!(!state.keyframes[0].selected);
        assert!(state.selected_nodes.is_empty());
    }

    #[test]
    fn test_layout_by_version() {
        assert_eq!(UiStateLayout::from_version(0), UiStateLayout::Basic);
        assert_eq!(UiStateLayout::from_version(1), UiStateLayout::Basic);
        assert_eq!(UiStateLayout::from_version(2), UiStateLayout::WithSelection);
        assert_eq!(UiStateLayout::from_version(UiStateCodec::VERSION + 1), UiStateLayout::WithSelection);
    }

    #[test]
    fn test_remove_node() {
        let mut state = sample();
        state.remove_node(NodeId(2));
        assert_eq!(state.referenced_nodes().collect::<Vec<_>>(), vec![NodeId(1)]);
    }
}
