// SPDX-License-Identifier: MIT OR Apache-2.0
//! Legacy file writing, used for fixtures and down-conversion.

use super::format::{
    KeyframeLayout, LegacyFile, LegacyKeyframe, LegacyNode, LegacyPort, PointData, MESH_PATH_SIZE,
};
use crate::cursor::ByteWriter;
use crate::document::DurationType;

/// Serialize a legacy file in the layout of its `version`
pub fn encode_legacy(file: &LegacyFile) -> Vec<u8> {
    let version = file.version;
    let mut w = ByteWriter::new();
    w.write_i32(version.number());

    if version.has_ui_block() {
        let ui = &file.ui;
        w.write_f32(ui.timeline_offset);
        w.write_f32(ui.timeline_zoom);
        w.write_f32(ui.graph_pan_x);
        w.write_f32(ui.graph_pan_y);
        w.write_f32(ui.graph_zoom);
        w.write_vec3(ui.camera_target_position);
        w.write_f32(ui.camera_target_distance);
        w.write_f32(ui.camera_target_pitch);
        w.write_f32(ui.camera_target_yaw);
        w.write_f32(ui.camera_speed_multiplier);
    }

    w.write_count(file.nodes.len());
    for node in &file.nodes {
        write_node(&mut w, node, file);
    }

    w.write_count(file.edges.len());
    for edge in &file.edges {
        w.write_u32(edge.id);
        w.write_u32(edge.source);
        w.write_u32(edge.target);
        write_padded_bool(&mut w, edge.selected);
    }

    w.into_inner()
}

fn write_padded_bool(w: &mut ByteWriter, value: bool) {
    w.write_bool(value);
    w.write_padding(3);
}

fn write_point_data(w: &mut ByteWriter, p: &PointData) {
    w.write_vec3(p.heart_position);
    w.write_vec3(p.direction);
    w.write_vec3(p.lateral);
    w.write_vec3(p.normal);
    for value in [
        p.roll,
        p.velocity,
        p.energy,
        p.normal_force,
        p.lateral_force,
        p.spine_advance,
        p.heart_advance,
        p.angle_from_last,
        p.pitch_from_last,
        p.yaw_from_last,
        p.roll_speed,
        p.spine_arc,
        p.heart_arc,
        p.friction_origin,
        p.heart_offset,
        p.friction,
        p.resistance,
    ] {
        w.write_f32(value);
    }
    w.write_i32(p.facing);
}

fn write_ports(w: &mut ByteWriter, ports: &[LegacyPort]) {
    w.write_count(ports.len());
    for port in ports {
        w.write_u32(port.id);
        w.write_i32(port.type_code);
        write_padded_bool(w, port.is_input);
        write_point_data(w, &port.value);
    }
}

fn write_keyframes(w: &mut ByteWriter, keyframes: &[LegacyKeyframe], layout: KeyframeLayout) {
    w.write_count(keyframes.len());
    for kf in keyframes {
        w.write_u32(kf.id);
        w.write_f32(kf.time);
        w.write_f32(kf.value);
        w.write_i32(kf.in_interpolation);
        w.write_i32(kf.out_interpolation);
        if layout == KeyframeLayout::Extended {
            w.write_i32(kf.handle_type);
            w.write_u8(kf.flags);
            w.write_padding(3);
        }
        w.write_f32(kf.in_tangent);
        w.write_f32(kf.out_tangent);
        w.write_f32(kf.in_weight);
        w.write_f32(kf.out_weight);
        write_padded_bool(w, kf.selected);
    }
}

fn write_node(w: &mut ByteWriter, node: &LegacyNode, file: &LegacyFile) {
    let version = file.version;
    let header = &node.header;
    if version.has_node_ids() {
        w.write_u32(header.id);
    }
    w.write_vec2(header.position);
    w.write_i32(header.type_code);
    w.write_i32(header.priority);
    write_padded_bool(w, header.selected);
    w.write_i32(header.next.index);
    w.write_i32(header.next.version);
    w.write_i32(header.prev.index);
    w.write_i32(header.prev.version);

    write_point_data(w, &node.anchor);
    w.write_u32(node.effective_field_flags().0);

    if let Some(flags) = node.bool_flags {
        w.write_u8(flags.0);
    }
    if let Some(overrides) = node.overrides {
        w.write_u8(overrides.0);
    }
    if let Some(selected) = node.selected_properties {
        w.write_i32(selected);
    }
    if let Some(curve) = node.curve {
        for value in [curve.radius, curve.arc, curve.axis, curve.lead_in, curve.lead_out] {
            w.write_f32(value);
        }
    }
    if let Some(duration) = node.duration {
        w.write_i32(match duration.kind {
            DurationType::Time => 0,
            DurationType::Distance => 1,
        });
        w.write_f32(duration.value);
    }
    if let Some(path) = &node.mesh_path {
        let mut raw = [0u8; MESH_PATH_SIZE];
        for (dst, src) in raw.iter_mut().zip(path) {
            *dst = *src;
        }
        w.write_bytes(&raw);
    }

    write_ports(w, &node.inputs);
    write_ports(w, &node.outputs);

    for keyframes in node.keyframes.iter().take(version.keyframe_array_count()) {
        write_keyframes(w, keyframes, version.keyframe_layout());
    }
}

#[cfg(test)]
mod tests {
    use super::super::format::{
        CurveData, FieldFlags, LegacyDuration, LegacyEdge, LegacyVersion, NodeFlags, PropertyOverrides,
    };
    use super::super::reader::{decode_legacy, mesh_path_text};
    use super::*;
    use kexedit_graph::{LegacyNodeType, PortType, PropertyId};

    fn sample(version: LegacyVersion) -> LegacyFile {
        let mut file = LegacyFile::new(version);
        let mut anchor = LegacyNode::new(1, LegacyNodeType::Anchor);
        anchor.anchor.velocity = 10.0;
        anchor.outputs.push(LegacyPort {
            id: 1,
            type_code: PortType::Anchor.code() as i32,
            is_input: false,
            value: PointData::default(),
        });

        let mut force = LegacyNode::new(2, LegacyNodeType::ForceSection);
        force.header.position = [200.0, 0.0];
        force.header.priority = 3;
        force.bool_flags = Some(NodeFlags(NodeFlags::RENDER.0 | NodeFlags::STEERING.0));
        force.field_flags = FieldFlags(FieldFlags::HAS_RENDER.0 | FieldFlags::HAS_STEERING.0);
        force.overrides = Some(PropertyOverrides::FIXED_VELOCITY);
        force.curve = Some(CurveData {
            radius: 20.0,
            ..CurveData::default()
        });
        force.duration = Some(LegacyDuration {
            kind: DurationType::Distance,
            value: 40.0,
        });
        let mut path = vec![4, 0];
        path.extend_from_slice(b"a.fbx");
        force.mesh_path = Some(path);
        force.inputs.push(LegacyPort {
            id: 2,
            type_code: PortType::Anchor.code() as i32,
            is_input: true,
            value: PointData::default(),
        });
        force.keyframes[PropertyId::NormalForce as usize].push(LegacyKeyframe::new(1, 0.0, 1.0));
        force.keyframes[PropertyId::TrackStyle as usize].push(LegacyKeyframe::new(2, 0.0, 2.0));

        file.nodes = vec![anchor, force];
        file.edges.push(LegacyEdge {
            id: 1,
            source: 1,
            target: 2,
            selected: true,
        });
        file
    }

    #[test]
    fn test_current_roundtrip() {
        let file = sample(LegacyVersion::CURRENT);
        let bytes = encode_legacy(&file);
        let decoded = decode_legacy(&bytes).unwrap();
        assert_eq!(decoded.nodes[1].header, file.nodes[1].header);
        assert_eq!(decoded.nodes[1].keyframes, file.nodes[1].keyframes);
        assert_eq!(decoded.nodes[1].duration, file.nodes[1].duration);
        assert_eq!(decoded.edges, file.edges);
        assert_eq!(decoded.ui.camera_target_yaw, -135.0);
        assert_eq!(mesh_path_text(decoded.nodes[1].mesh_path.as_deref().unwrap()).as_deref(), Some("a.fb"));
    }

    #[test]
    fn test_old_layouts() {
        let file = sample(LegacyVersion::Initial);
        let bytes = encode_legacy(&file);
        let decoded = decode_legacy(&bytes).unwrap();

        // No stored ids: assigned from a 1-based counter
        assert_eq!(decoded.nodes[0].header.id, 1);
        assert_eq!(decoded.nodes[1].header.id, 2);
        // Nine arrays only, so track style is dropped
        assert!(decoded.nodes[1].keyframes_for(PropertyId::TrackStyle).is_empty());
        assert_eq!(decoded.nodes[1].keyframes_for(PropertyId::NormalForce).len(), 1);
        assert_eq!(decoded.ui.camera_distance, file.ui.camera_distance);
    }

    #[test]
    fn test_record_sizes() {
        let mut file = LegacyFile::new(LegacyVersion::CURRENT);
        let empty = encode_legacy(&file).len();
        assert_eq!(empty, 4 + 12 * 4 + 4 + 4);

        file.nodes.push(LegacyNode::new(1, LegacyNodeType::Reverse));
        let one = encode_legacy(&file).len();
        // header + anchor + flags + bool block + two port counts + ten keyframe counts
        assert_eq!(one - empty, 40 + 120 + 4 + 1 + 8 + 40);
    }

    #[test]
    fn test_truncated_fails() {
        let bytes = encode_legacy(&sample(LegacyVersion::CURRENT));
        for cut in [3, 20, bytes.len() / 2, bytes.len() - 1] {
            assert!(decode_legacy(&bytes[..cut]).is_err());
        }
    }
}
