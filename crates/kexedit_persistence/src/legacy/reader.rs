// SPDX-License-Identifier: MIT OR Apache-2.0
//! Legacy file parsing.

use super::format::{
    CurveData, EntityRef, FieldFlags, KeyframeLayout, LegacyDuration, LegacyEdge, LegacyFile,
    LegacyKeyframe, LegacyNode, LegacyNodeHeader, LegacyPort, LegacyVersion, NodeFlags, PointData,
    PropertyOverrides, MESH_PATH_SIZE, POINT_DATA_SIZE,
};
use crate::cursor::ByteCursor;
use crate::document::DurationType;
use crate::error::FormatResult;
use crate::ui_state::UiState;

const PORT_SIZE: usize = 12 + POINT_DATA_SIZE;
const EDGE_SIZE: usize = 16;

/// Parse a legacy file. No migration is applied.
pub fn decode_legacy(bytes: &[u8]) -> FormatResult<LegacyFile> {
    let mut cursor = ByteCursor::new(bytes);
    let version = LegacyVersion::from_i32(cursor.read_i32()?)?;
    let ui = read_ui_block(&mut cursor, version)?;

    let node_count = cursor.read_count()?;
    let mut nodes = Vec::new();
    let mut id_counter = 1u32;
    for _ in 0..node_count {
        nodes.push(read_node(&mut cursor, version, &mut id_counter)?);
    }

    let edge_count = cursor.read_count_of(EDGE_SIZE)?;
    let mut edges = Vec::with_capacity(edge_count);
    for _ in 0..edge_count {
        let id = cursor.read_u32()?;
        let source = cursor.read_u32()?;
        let target = cursor.read_u32()?;
        let selected = read_padded_bool(&mut cursor)?;
        edges.push(LegacyEdge {
            id,
            source,
            target,
            selected,
        });
    }

    if !cursor.is_empty() {
        tracing::warn!(trailing = cursor.remaining(), "Ignoring trailing bytes after legacy edges");
    }
    tracing::debug!(
        version = version.number(),
        nodes = nodes.len(),
        edges = edges.len(),
        "Parsed legacy file"
    );

    Ok(LegacyFile {
        version,
        ui,
        nodes,
        edges,
    })
}

fn read_ui_block(cursor: &mut ByteCursor<'_>, version: LegacyVersion) -> FormatResult<UiState> {
    if !version.has_ui_block() {
        return Ok(UiState::legacy_default());
    }

    let mut ui = UiState::default();
    ui.timeline_offset = cursor.read_f32()?;
    ui.timeline_zoom = cursor.read_f32()?;
    ui.graph_pan_x = cursor.read_f32()?;
    ui.graph_pan_y = cursor.read_f32()?;
    ui.graph_zoom = cursor.read_f32()?;
    ui.camera_target_position = cursor.read_vec3()?;
    ui.camera_target_distance = cursor.read_f32()?;
    ui.camera_target_pitch = cursor.read_f32()?;
    ui.camera_target_yaw = cursor.read_f32()?;
    ui.camera_speed_multiplier = cursor.read_f32()?;

    ui.camera_position = ui.camera_target_position;
    ui.camera_distance = ui.camera_target_distance;
    ui.camera_pitch = ui.camera_target_pitch;
    ui.camera_yaw = ui.camera_target_yaw;
    Ok(ui)
}

fn read_padded_bool(cursor: &mut ByteCursor<'_>) -> FormatResult<bool> {
    let value = cursor.read_bool()?;
    cursor.skip(3)?;
    Ok(value)
}

fn read_entity(cursor: &mut ByteCursor<'_>) -> FormatResult<EntityRef> {
    Ok(EntityRef {
        index: cursor.read_i32()?,
        version: cursor.read_i32()?,
    })
}

fn read_point_data(cursor: &mut ByteCursor<'_>) -> FormatResult<PointData> {
    Ok(PointData {
        heart_position: cursor.read_vec3()?,
        direction: cursor.read_vec3()?,
        lateral: cursor.read_vec3()?,
        normal: cursor.read_vec3()?,
        roll: cursor.read_f32()?,
        velocity: cursor.read_f32()?,
        energy: cursor.read_f32()?,
        normal_force: cursor.read_f32()?,
        lateral_force: cursor.read_f32()?,
        spine_advance: cursor.read_f32()?,
        heart_advance: cursor.read_f32()?,
        angle_from_last: cursor.read_f32()?,
        pitch_from_last: cursor.read_f32()?,
        yaw_from_last: cursor.read_f32()?,
        roll_speed: cursor.read_f32()?,
        spine_arc: cursor.read_f32()?,
        heart_arc: cursor.read_f32()?,
        friction_origin: cursor.read_f32()?,
        heart_offset: cursor.read_f32()?,
        friction: cursor.read_f32()?,
        resistance: cursor.read_f32()?,
        facing: cursor.read_i32()?,
    })
}

fn read_header(
    cursor: &mut ByteCursor<'_>,
    version: LegacyVersion,
    id_counter: &mut u32,
) -> FormatResult<LegacyNodeHeader> {
    let id = if version.has_node_ids() {
        cursor.read_u32()?
    } else {
        let id = *id_counter;
        *id_counter = id.wrapping_add(1);
        id
    };
    Ok(LegacyNodeHeader {
        id,
        position: cursor.read_vec2()?,
        type_code: cursor.read_i32()?,
        priority: cursor.read_i32()?,
        selected: read_padded_bool(cursor)?,
        next: read_entity(cursor)?,
        prev: read_entity(cursor)?,
    })
}

fn read_ports(cursor: &mut ByteCursor<'_>) -> FormatResult<Vec<LegacyPort>> {
    let count = cursor.read_count_of(PORT_SIZE)?;
    let mut ports = Vec::with_capacity(count);
    for _ in 0..count {
        let id = cursor.read_u32()?;
        let type_code = cursor.read_i32()?;
        let is_input = read_padded_bool(cursor)?;
        let value = read_point_data(cursor)?;
        ports.push(LegacyPort {
            id,
            type_code,
            is_input,
            value,
        });
    }
    Ok(ports)
}

fn read_keyframes(cursor: &mut ByteCursor<'_>, layout: KeyframeLayout) -> FormatResult<Vec<LegacyKeyframe>> {
    let count = cursor.read_count_of(layout.record_size())?;
    let mut keyframes = Vec::with_capacity(count);
    for _ in 0..count {
        let id = cursor.read_u32()?;
        let time = cursor.read_f32()?;
        let value = cursor.read_f32()?;
        let in_interpolation = cursor.read_i32()?;
        let out_interpolation = cursor.read_i32()?;
        let (handle_type, flags) = match layout {
            KeyframeLayout::Compact => (0, 0),
            KeyframeLayout::Extended => {
                let handle = cursor.read_i32()?;
                let flags = cursor.read_u8()?;
                cursor.skip(3)?;
                (handle, flags)
            }
        };
        keyframes.push(LegacyKeyframe {
            id,
            time,
            value,
            in_interpolation,
            out_interpolation,
            handle_type,
            flags,
            in_tangent: cursor.read_f32()?,
            out_tangent: cursor.read_f32()?,
            in_weight: cursor.read_f32()?,
            out_weight: cursor.read_f32()?,
            selected: read_padded_bool(cursor)?,
        });
    }
    Ok(keyframes)
}

fn read_node(cursor: &mut ByteCursor<'_>, version: LegacyVersion, id_counter: &mut u32) -> FormatResult<LegacyNode> {
    let header = read_header(cursor, version, id_counter)?;
    let anchor = read_point_data(cursor)?;
    let field_flags = FieldFlags(cursor.read_u32()?);

    let bool_flags = if field_flags.intersects(FieldFlags::BOOLEAN_BLOCK) {
        Some(NodeFlags(cursor.read_u8()?))
    } else {
        None
    };
    let overrides = if field_flags.contains(FieldFlags::HAS_PROPERTY_OVERRIDES) {
        Some(PropertyOverrides(cursor.read_u8()?))
    } else {
        None
    };
    let selected_properties = if field_flags.contains(FieldFlags::HAS_SELECTED_PROPERTIES) {
        Some(cursor.read_i32()?)
    } else {
        None
    };
    let curve = if field_flags.contains(FieldFlags::HAS_CURVE_DATA) {
        Some(CurveData {
            radius: cursor.read_f32()?,
            arc: cursor.read_f32()?,
            axis: cursor.read_f32()?,
            lead_in: cursor.read_f32()?,
            lead_out: cursor.read_f32()?,
        })
    } else {
        None
    };
    let duration = if field_flags.contains(FieldFlags::HAS_DURATION) {
        let kind = if cursor.read_i32()? == 1 {
            DurationType::Distance
        } else {
            DurationType::Time
        };
        Some(LegacyDuration {
            kind,
            value: cursor.read_f32()?,
        })
    } else {
        None
    };
    let mesh_path = if field_flags.contains(FieldFlags::HAS_MESH_FILE_PATH) {
        Some(cursor.read_bytes(MESH_PATH_SIZE)?.to_vec())
    } else {
        None
    };

    let inputs = read_ports(cursor)?;
    let outputs = read_ports(cursor)?;

    let mut keyframes: [Vec<LegacyKeyframe>; super::format::KEYFRAME_ARRAYS] = Default::default();
    for slot in keyframes.iter_mut().take(version.keyframe_array_count()) {
        *slot = read_keyframes(cursor, version.keyframe_layout())?;
    }

    Ok(LegacyNode {
        header,
        anchor,
        field_flags,
        bool_flags,
        overrides,
        selected_properties,
        curve,
        duration,
        mesh_path,
        inputs,
        outputs,
        keyframes,
    })
}

/// Decode the text of a raw mesh path block
pub fn mesh_path_text(raw: &[u8]) -> Option<String> {
    let mut cursor = ByteCursor::new(raw);
    let length = cursor.read_u16().ok()? as usize;
    let bytes = cursor.read_bytes(length.min(cursor.remaining())).ok()?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}
