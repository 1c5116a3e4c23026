// SPDX-License-Identifier: MIT OR Apache-2.0
//! Composite property keys.
//!
//! Every property map in a document is keyed by a single `u64` that packs a
//! node id with an 8-bit field index: `(node << 8) | field`. The field index
//! lives in one of three namespaces depending on the map being addressed:
//!
//! - an input index for per-port values (scalars, vectors)
//! - a [`NodeMeta`] index (240 and above) for node metadata
//! - a [`PropertyId`] for keyframe curves
//!
//! [`CompositeKey`] is kept opaque so the namespaces cannot be confused by
//! passing raw integers around.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Packed `(node, field)` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(u64);

impl CompositeKey {
    /// Pack a node id and field index
    pub const fn pack(node: NodeId, field: u8) -> Self {
        Self(((node.0 as u64) << 8) | field as u64)
    }

    /// Split into node id and field index
    pub const fn unpack(self) -> (NodeId, u8) {
        (NodeId((self.0 >> 8) as u32), (self.0 & 0xFF) as u8)
    }

    /// Key for the value of a node's input port at `index`
    pub const fn input(node: NodeId, index: u8) -> Self {
        Self::pack(node, index)
    }

    /// Key for a node metadata field
    pub const fn meta(node: NodeId, meta: NodeMeta) -> Self {
        Self::pack(node, meta as u8)
    }

    /// Key for a keyframe curve
    pub const fn property(node: NodeId, property: PropertyId) -> Self {
        Self::pack(node, property as u8)
    }

    /// Wrap a raw on-disk value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw on-disk value
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Node component
    pub const fn node(self) -> NodeId {
        self.unpack().0
    }

    /// Field component
    pub const fn field(self) -> u8 {
        self.unpack().1
    }

    /// The same field rebased onto another node
    pub const fn with_node(self, node: NodeId) -> Self {
        Self::pack(node, self.field())
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (node, field) = self.unpack();
        match NodeMeta::from_field(field) {
            Some(meta) => write!(f, "{node}.{meta:?}"),
            None => write!(f, "{node}.{field}"),
        }
    }
}

/// Keyframed property identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PropertyId {
    /// Roll speed
    RollSpeed = 0,
    /// Normal force
    NormalForce = 1,
    /// Lateral force
    LateralForce = 2,
    /// Pitch speed
    PitchSpeed = 3,
    /// Yaw speed
    YawSpeed = 4,
    /// Driven (fixed) velocity
    DrivenVelocity = 5,
    /// Heart-line offset
    HeartOffset = 6,
    /// Friction
    Friction = 7,
    /// Air resistance
    Resistance = 8,
    /// Track style index
    TrackStyle = 9,
}

impl PropertyId {
    /// All properties in legacy storage order
    pub const ALL: [PropertyId; 10] = [
        Self::RollSpeed,
        Self::NormalForce,
        Self::LateralForce,
        Self::PitchSpeed,
        Self::YawSpeed,
        Self::DrivenVelocity,
        Self::HeartOffset,
        Self::Friction,
        Self::Resistance,
        Self::TrackStyle,
    ];

    /// Decode a property id
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Override flag guarding this property, if any
    pub fn override_meta(self) -> Option<NodeMeta> {
        match self {
            Self::DrivenVelocity => Some(NodeMeta::Driven),
            Self::HeartOffset => Some(NodeMeta::OverrideHeart),
            Self::Friction => Some(NodeMeta::OverrideFriction),
            Self::Resistance => Some(NodeMeta::OverrideResistance),
            Self::TrackStyle => Some(NodeMeta::OverrideTrackStyle),
            _ => None,
        }
    }
}

/// Node metadata field indices (top of the field range, above any input index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeMeta {
    /// Heart offset override enabled (flag)
    OverrideHeart = 240,
    /// Friction override enabled (flag)
    OverrideFriction = 241,
    /// Resistance override enabled (flag)
    OverrideResistance = 242,
    /// Track style override enabled (flag)
    OverrideTrackStyle = 243,
    /// Section duration (scalar)
    Duration = 248,
    /// Build priority (scalar)
    Priority = 249,
    /// Duration measured in distance when 1 (flag)
    DurationType = 250,
    /// Facing sign when not +1 (flag)
    Facing = 251,
    /// Steering enabled (flag)
    Steering = 252,
    /// Driven velocity enabled (flag)
    Driven = 253,
    /// Hidden from rendering when 1 (flag)
    Render = 254,
}

impl NodeMeta {
    /// All metadata fields
    pub const ALL: [NodeMeta; 11] = [
        Self::OverrideHeart,
        Self::OverrideFriction,
        Self::OverrideResistance,
        Self::OverrideTrackStyle,
        Self::Duration,
        Self::Priority,
        Self::DurationType,
        Self::Facing,
        Self::Steering,
        Self::Driven,
        Self::Render,
    ];

    /// Decode a field index
    pub fn from_field(field: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| *m as u8 == field)
    }

    /// Field index
    pub const fn field(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_layout() {
        let key = CompositeKey::property(NodeId(2), PropertyId::NormalForce);
        assert_eq!(key.raw(), (2 << 8) | 1);
        assert_eq!(CompositeKey::meta(NodeId(1), NodeMeta::Render).raw(), 0x1FE);
    }

    #[test]
    fn test_with_node() {
        let key = CompositeKey::meta(NodeId(7), NodeMeta::Driven);
        let moved = key.with_node(NodeId(9));
        assert_eq!(moved.unpack(), (NodeId(9), NodeMeta::Driven.field()));
    }

    #[test]
    fn test_meta_lookup() {
        assert_eq!(NodeMeta::from_field(249), Some(NodeMeta::Priority));
        assert_eq!(NodeMeta::from_field(3), None);
        assert_eq!(PropertyId::from_u8(9), Some(PropertyId::TrackStyle));
        assert_eq!(PropertyId::from_u8(10), None);
        assert_eq!(PropertyId::RollSpeed.override_meta(), None);
    }

    #[test]
    fn test_display() {
        let key = CompositeKey::meta(NodeId(3), NodeMeta::Facing);
        assert_eq!(key.to_string(), "3.Facing");
        assert_eq!(CompositeKey::input(NodeId(3), 2).to_string(), "3.2");
    }

    proptest! {
        #[test]
        fn test_pack_unpack_roundtrip(node in 0u32..(1 << 24), field in any::<u8>()) {
            let key = CompositeKey::pack(NodeId(node), field);
            prop_assert_eq!(key.unpack(), (NodeId(node), field));
        }

        #[test]
        fn test_full_range_roundtrip(node in any::<u32>(), field in any::<u8>()) {
            let key = CompositeKey::pack(NodeId(node), field);
            prop_assert_eq!(CompositeKey::from_raw(key.raw()).unpack(), (NodeId(node), field));
        }
    }
}
