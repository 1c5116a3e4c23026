// SPDX-License-Identifier: MIT OR Apache-2.0
//! Record types of the monolithic legacy format.
//!
//! These mirror the on-disk layout closely. Bit-gated blocks are `Option`s
//! so that a record knows exactly which blocks it carried.

use crate::document::DurationType;
use crate::error::{FormatError, FormatResult};
use crate::ui_state::UiState;
use kexedit_graph::{LegacyNodeType, PropertyId};

/// Number of keyframe arrays in the newest layout
pub const KEYFRAME_ARRAYS: usize = 10;
/// Size of a serialized [`PointData`]
pub const POINT_DATA_SIZE: usize = 120;
/// Size of the raw mesh path block
pub const MESH_PATH_SIZE: usize = 514;

/// Legacy format revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LegacyVersion {
    /// First release
    Initial = 1,
    /// Keyframes gained handle type and flags
    PrecisionMigration = 2,
    /// Editor camera and timeline block in the header
    UiStateSerialization = 3,
    /// Track style keyframe array
    TrackStyleProperty = 4,
    /// Copy-path Start/End ports
    CopyPathTrimPorts = 5,
    /// Explicit node ids
    NodeId = 6,
    /// Bridge In/Out weight ports
    BridgeWeightPorts = 7,
}

/// Keyframe record layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyframeLayout {
    /// 40 bytes, no handle type or flags; code 3 means aligned Bezier
    Compact,
    /// 48 bytes
    Extended,
}

impl KeyframeLayout {
    /// Record size in bytes
    pub fn record_size(self) -> usize {
        match self {
            Self::Compact => 40,
            Self::Extended => 48,
        }
    }
}

impl LegacyVersion {
    /// Newest version
    pub const CURRENT: Self = Self::BridgeWeightPorts;

    /// Map a raw header value
    pub fn from_i32(version: i32) -> FormatResult<Self> {
        Ok(match version {
            1 => Self::Initial,
            2 => Self::PrecisionMigration,
            3 => Self::UiStateSerialization,
            4 => Self::TrackStyleProperty,
            5 => Self::CopyPathTrimPorts,
            6 => Self::NodeId,
            7 => Self::BridgeWeightPorts,
            _ => return Err(FormatError::UnsupportedLegacyVersion(version)),
        })
    }

    /// Raw header value
    pub const fn number(self) -> i32 {
        self as i32
    }

    /// Whether the header carries the UI block
    pub fn has_ui_block(self) -> bool {
        match self {
            Self::Initial | Self::PrecisionMigration => false,
            Self::UiStateSerialization
            | Self::TrackStyleProperty
            | Self::CopyPathTrimPorts
            | Self::NodeId
            | Self::BridgeWeightPorts => true,
        }
    }

    /// Whether node headers start with an explicit id
    pub fn has_node_ids(self) -> bool {
        match self {
            Self::NodeId | Self::BridgeWeightPorts => true,
            Self::Initial
            | Self::PrecisionMigration
            | Self::UiStateSerialization
            | Self::TrackStyleProperty
            | Self::CopyPathTrimPorts => false,
        }
    }

    /// Keyframe arrays stored per node
    pub fn keyframe_array_count(self) -> usize {
        match self {
            Self::Initial | Self::PrecisionMigration | Self::UiStateSerialization => 9,
            Self::TrackStyleProperty | Self::CopyPathTrimPorts | Self::NodeId | Self::BridgeWeightPorts => 10,
        }
    }

    /// Keyframe record layout
    pub fn keyframe_layout(self) -> KeyframeLayout {
        match self {
            Self::Initial => KeyframeLayout::Compact,
            Self::PrecisionMigration
            | Self::UiStateSerialization
            | Self::TrackStyleProperty
            | Self::CopyPathTrimPorts
            | Self::NodeId
            | Self::BridgeWeightPorts => KeyframeLayout::Extended,
        }
    }

    /// Copy-path nodes predate the Start/End ports
    pub fn needs_trim_ports(self) -> bool {
        self < Self::CopyPathTrimPorts
    }

    /// Bridge nodes may lack the weight ports
    pub fn needs_bridge_weights(self) -> bool {
        self < Self::BridgeWeightPorts
    }

    /// Node header size in bytes
    pub fn node_header_size(self) -> usize {
        if self.has_node_ids() {
            40
        } else {
            36
        }
    }
}

/// Raw entity handle, kept for fidelity only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityRef {
    /// Entity index
    pub index: i32,
    /// Entity version
    pub version: i32,
}

/// Per-node header
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyNodeHeader {
    /// Node id, read or assigned from a 1-based counter
    pub id: u32,
    /// Graph editor position
    pub position: [f32; 2],
    /// Raw [`LegacyNodeType`] code
    pub type_code: i32,
    /// Build priority
    pub priority: i32,
    /// Editor selection
    pub selected: bool,
    /// Next entity
    pub next: EntityRef,
    /// Previous entity
    pub prev: EntityRef,
}

/// Track point state. Also used as the value slot of every port.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub struct PointData {
    pub heart_position: [f32; 3],
    pub direction: [f32; 3],
    pub lateral: [f32; 3],
    pub normal: [f32; 3],
    pub roll: f32,
    pub velocity: f32,
    pub energy: f32,
    pub normal_force: f32,
    pub lateral_force: f32,
    pub spine_advance: f32,
    pub heart_advance: f32,
    pub angle_from_last: f32,
    pub pitch_from_last: f32,
    pub yaw_from_last: f32,
    pub roll_speed: f32,
    pub spine_arc: f32,
    pub heart_arc: f32,
    pub friction_origin: f32,
    pub heart_offset: f32,
    pub friction: f32,
    pub resistance: f32,
    pub facing: i32,
}

impl Default for PointData {
    fn default() -> Self {
        Self {
            heart_position: [0.0; 3],
            direction: [0.0; 3],
            lateral: [0.0; 3],
            normal: [0.0; 3],
            roll: 0.0,
            velocity: 0.0,
            energy: 0.0,
            normal_force: 0.0,
            lateral_force: 0.0,
            spine_advance: 0.0,
            heart_advance: 0.0,
            angle_from_last: 0.0,
            pitch_from_last: 0.0,
            yaw_from_last: 0.0,
            roll_speed: 0.0,
            spine_arc: 0.0,
            heart_arc: 0.0,
            friction_origin: 0.0,
            heart_offset: 0.0,
            friction: 0.0,
            resistance: 0.0,
            facing: 1,
        }
    }
}

impl PointData {
    /// Port slot carrying a scalar in `roll`
    pub fn scalar(value: f32) -> Self {
        Self {
            roll: value,
            ..Self::default()
        }
    }

    /// Port slot carrying a vector in `(roll, velocity, energy)`
    pub fn vector(value: [f32; 3]) -> Self {
        Self {
            roll: value[0],
            velocity: value[1],
            energy: value[2],
            ..Self::default()
        }
    }

    /// Vector smuggled through `(roll, velocity, energy)`
    pub fn as_vector(&self) -> [f32; 3] {
        [self.roll, self.velocity, self.energy]
    }

    /// Whether the point carries a heart position
    pub fn has_position(&self) -> bool {
        self.heart_position != [0.0; 3]
    }

    /// Whether the point carries an orientation frame
    pub fn has_direction(&self) -> bool {
        self.direction != [0.0; 3]
    }

    /// Roll, pitch and yaw in radians derived from the orientation frame.
    ///
    /// Returns `None` when the point has no direction. Degenerate basis
    /// vectors fall back to back, down and right.
    pub fn frame_angles(&self) -> Option<[f32; 3]> {
        if !self.has_direction() {
            return None;
        }
        let direction = normalize_or(self.direction, [0.0, 0.0, -1.0]);
        let normal = normalize_or(self.normal, [0.0, -1.0, 0.0]);
        let lateral = normalize_or(self.lateral, [1.0, 0.0, 0.0]);

        let roll = lateral[1].atan2(-normal[1]);
        let pitch = direction[1].atan2(direction[0].hypot(direction[2]));
        let yaw = (-direction[0]).atan2(-direction[2]);
        Some([roll, pitch, yaw])
    }
}

fn normalize_or(v: [f32; 3], fallback: [f32; 3]) -> [f32; 3] {
    let length_sq = v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
    if length_sq > f32::MIN_POSITIVE && length_sq.is_finite() {
        let length = length_sq.sqrt();
        [v[0] / length, v[1] / length, v[2] / length]
    } else {
        fallback
    }
}

macro_rules! bit_flags {
    ($(#[$meta:meta])* $name:ident: $repr:ty { $($(#[$fmeta:meta])* $flag:ident = $value:expr;)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub $repr);

        impl $name {
            $($(#[$fmeta])* pub const $flag: Self = Self($value);)*

            /// Whether every bit of `other` is set
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Whether any bit of `other` is set
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            /// Set or clear the bits of `other`
            pub fn set(&mut self, other: Self, on: bool) {
                if on {
                    self.0 |= other.0;
                } else {
                    self.0 &= !other.0;
                }
            }
        }
    };
}

bit_flags! {
    /// Which optional blocks follow a node's anchor data
    FieldFlags: u32 {
        /// Render state present in the boolean block
        HAS_RENDER = 1;
        /// Selection state present in the boolean block
        HAS_SELECTED = 2;
        /// Overrides byte present
        HAS_PROPERTY_OVERRIDES = 4;
        /// Selected-properties mask present
        HAS_SELECTED_PROPERTIES = 8;
        /// Curve data present
        HAS_CURVE_DATA = 16;
        /// Duration present
        HAS_DURATION = 32;
        /// Mesh path present
        HAS_MESH_FILE_PATH = 64;
        /// Steering state present in the boolean block
        HAS_STEERING = 128;
    }
}

impl FieldFlags {
    /// Bits that gate the shared boolean block
    pub const BOOLEAN_BLOCK: Self = Self(1 | 2 | 128);
}

bit_flags! {
    /// Node boolean block
    NodeFlags: u8 {
        /// Node is rendered
        RENDER = 1;
        /// Node is selected
        SELECTED = 2;
        /// Steering enabled
        STEERING = 4;
    }
}

bit_flags! {
    /// Per-node property overrides
    PropertyOverrides: u8 {
        /// Velocity driven by keyframes
        FIXED_VELOCITY = 1;
        /// Heart offset overridden
        HEART = 2;
        /// Friction overridden
        FRICTION = 4;
        /// Resistance overridden
        RESISTANCE = 8;
        /// Track style overridden
        TRACK_STYLE = 16;
    }
}

/// Curved section parameters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[allow(missing_docs)]
pub struct CurveData {
    pub radius: f32,
    pub arc: f32,
    pub axis: f32,
    pub lead_in: f32,
    pub lead_out: f32,
}

/// Section duration block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyDuration {
    /// Unit
    pub kind: DurationType,
    /// Amount
    pub value: f32,
}

/// A port record with its value slot
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyPort {
    /// Port id
    pub id: u32,
    /// Raw port type code
    pub type_code: i32,
    /// Direction
    pub is_input: bool,
    /// Value slot
    pub value: PointData,
}

/// A keyframe record with its raw codes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyKeyframe {
    /// Editor id
    pub id: u32,
    /// Time
    pub time: f32,
    /// Value
    pub value: f32,
    /// Raw incoming interpolation code
    pub in_interpolation: i32,
    /// Raw outgoing interpolation code
    pub out_interpolation: i32,
    /// Raw handle type (extended layout only)
    pub handle_type: i32,
    /// Raw editor flags (extended layout only)
    pub flags: u8,
    /// Incoming tangent
    pub in_tangent: f32,
    /// Outgoing tangent
    pub out_tangent: f32,
    /// Incoming weight
    pub in_weight: f32,
    /// Outgoing weight
    pub out_weight: f32,
    /// Editor selection
    pub selected: bool,
}

impl LegacyKeyframe {
    /// Linear keyframe with no handles
    pub fn new(id: u32, time: f32, value: f32) -> Self {
        Self {
            id,
            time,
            value,
            in_interpolation: 1,
            out_interpolation: 1,
            handle_type: 0,
            flags: 0,
            in_tangent: 0.0,
            out_tangent: 0.0,
            in_weight: 0.0,
            out_weight: 0.0,
            selected: false,
        }
    }
}

/// A complete node record
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyNode {
    /// Header
    pub header: LegacyNodeHeader,
    /// Anchor state
    pub anchor: PointData,
    /// Field flags as read
    pub field_flags: FieldFlags,
    /// Boolean block
    pub bool_flags: Option<NodeFlags>,
    /// Overrides block
    pub overrides: Option<PropertyOverrides>,
    /// Selected-properties mask
    pub selected_properties: Option<i32>,
    /// Curve block
    pub curve: Option<CurveData>,
    /// Duration block
    pub duration: Option<LegacyDuration>,
    /// Raw mesh path block
    pub mesh_path: Option<Vec<u8>>,
    /// Input ports
    pub inputs: Vec<LegacyPort>,
    /// Output ports
    pub outputs: Vec<LegacyPort>,
    /// Keyframes per property, in [`PropertyId::ALL`] order
    pub keyframes: [Vec<LegacyKeyframe>; KEYFRAME_ARRAYS],
}

impl LegacyNode {
    /// Node of a given type with default anchor data and no blocks
    pub fn new(id: u32, node_type: LegacyNodeType) -> Self {
        Self {
            header: LegacyNodeHeader {
                id,
                position: [0.0, 0.0],
                type_code: node_type.code(),
                priority: 0,
                selected: false,
                next: EntityRef::default(),
                prev: EntityRef::default(),
            },
            anchor: PointData::default(),
            field_flags: FieldFlags::HAS_RENDER,
            bool_flags: Some(NodeFlags::RENDER),
            overrides: None,
            selected_properties: None,
            curve: None,
            duration: None,
            mesh_path: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            keyframes: Default::default(),
        }
    }

    /// Typed node type
    pub fn node_type(&self) -> Option<LegacyNodeType> {
        LegacyNodeType::from_code(self.header.type_code)
    }

    /// Whether the node is rendered. A missing boolean block reads as hidden.
    pub fn render(&self) -> bool {
        self.bool_flags.is_some_and(|f| f.contains(NodeFlags::RENDER))
    }

    /// Whether steering is enabled
    pub fn steering(&self) -> bool {
        self.bool_flags.is_some_and(|f| f.contains(NodeFlags::STEERING))
    }

    /// Keyframes of one property
    pub fn keyframes_for(&self, property: PropertyId) -> &[LegacyKeyframe] {
        &self.keyframes[property as usize]
    }

    /// Field flags consistent with the blocks actually present
    pub fn effective_field_flags(&self) -> FieldFlags {
        let mut flags = self.field_flags;
        if self.bool_flags.is_none() {
            flags.set(FieldFlags::BOOLEAN_BLOCK, false);
        } else if !flags.intersects(FieldFlags::BOOLEAN_BLOCK) {
            flags.set(FieldFlags::HAS_RENDER, true);
        }
        flags.set(FieldFlags::HAS_PROPERTY_OVERRIDES, self.overrides.is_some());
        flags.set(FieldFlags::HAS_SELECTED_PROPERTIES, self.selected_properties.is_some());
        flags.set(FieldFlags::HAS_CURVE_DATA, self.curve.is_some());
        flags.set(FieldFlags::HAS_DURATION, self.duration.is_some());
        flags.set(FieldFlags::HAS_MESH_FILE_PATH, self.mesh_path.is_some());
        flags
    }
}

/// An edge record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyEdge {
    /// Edge id
    pub id: u32,
    /// Source port id
    pub source: u32,
    /// Target port id
    pub target: u32,
    /// Editor selection
    pub selected: bool,
}

/// A parsed legacy file
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyFile {
    /// Format revision
    pub version: LegacyVersion,
    /// Camera and timeline state, defaulted for old files
    pub ui: UiState,
    /// Node records
    pub nodes: Vec<LegacyNode>,
    /// Edge records
    pub edges: Vec<LegacyEdge>,
}

impl LegacyFile {
    /// Empty file at `version`
    pub fn new(version: LegacyVersion) -> Self {
        Self {
            version,
            ui: UiState::legacy_default(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}
