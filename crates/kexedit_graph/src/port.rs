// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PortId(pub u32);

impl PortId {
    /// Raw id value as stored on disk
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Kind of data carried by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum PortType {
    /// Track anchor state
    Anchor = 0,
    /// Sampled path
    Path = 1,
    /// Section duration
    Duration = 2,
    /// World position (vector)
    Position = 3,
    /// Roll angle (legacy, consolidated into `Rotation`)
    Roll = 4,
    /// Pitch angle (legacy, consolidated into `Rotation`)
    Pitch = 5,
    /// Yaw angle (legacy, consolidated into `Rotation`)
    Yaw = 6,
    /// Velocity
    Velocity = 7,
    /// Heart-line offset
    Heart = 8,
    /// Friction coefficient
    Friction = 9,
    /// Air resistance coefficient
    Resistance = 10,
    /// Curve radius
    Radius = 11,
    /// Curve arc
    Arc = 12,
    /// Curve axis
    Axis = 13,
    /// Curve lead-in
    LeadIn = 14,
    /// Curve lead-out
    LeadOut = 15,
    /// Bridge incoming weight
    InWeight = 16,
    /// Bridge outgoing weight
    OutWeight = 17,
    /// Roll/pitch/yaw vector
    Rotation = 18,
    /// Scale factor
    Scale = 19,
    /// Copy-path trim start
    Start = 20,
    /// Copy-path trim end
    End = 21,
}

/// How a port's value is stored in the property maps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortValueKind {
    /// Carries no stored value (structural connection)
    None,
    /// Single float in the scalar map
    Scalar,
    /// Three floats in the vector map
    Vector,
}

impl PortType {
    /// All port types in code order
    pub const ALL: [PortType; 22] = [
        Self::Anchor,
        Self::Path,
        Self::Duration,
        Self::Position,
        Self::Roll,
        Self::Pitch,
        Self::Yaw,
        Self::Velocity,
        Self::Heart,
        Self::Friction,
        Self::Resistance,
        Self::Radius,
        Self::Arc,
        Self::Axis,
        Self::LeadIn,
        Self::LeadOut,
        Self::InWeight,
        Self::OutWeight,
        Self::Rotation,
        Self::Scale,
        Self::Start,
        Self::End,
    ];

    /// Decode a type code, returning `None` for unknown codes
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// On-disk type code
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Storage kind for this port's value
    pub fn value_kind(self) -> PortValueKind {
        match self {
            Self::Anchor | Self::Path | Self::Duration => PortValueKind::None,
            Self::Position | Self::Rotation => PortValueKind::Vector,
            _ => PortValueKind::Scalar,
        }
    }

    /// Whether the value is authored in degrees
    pub fn is_angular(self) -> bool {
        matches!(self, Self::Roll | Self::Pitch | Self::Yaw | Self::Rotation)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A port owned by a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    /// Raw type code, see [`PortType::from_code`]
    pub type_code: u32,
    /// Owning node
    pub owner: NodeId,
    /// Whether this is an input
    pub is_input: bool,
}

impl Port {
    /// Create an input port
    pub fn input(id: PortId, port_type: PortType, owner: NodeId) -> Self {
        Self {
            id,
            type_code: port_type.code(),
            owner,
            is_input: true,
        }
    }

    /// Create an output port
    pub fn output(id: PortId, port_type: PortType, owner: NodeId) -> Self {
        Self {
            is_input: false,
            ..Self::input(id, port_type, owner)
        }
    }

    /// Typed port type, `None` if the code is unknown
    pub fn port_type(&self) -> Option<PortType> {
        PortType::from_code(self.type_code)
    }

    /// Port direction
    pub fn direction(&self) -> PortDirection {
        if self.is_input {
            PortDirection::Input
        } else {
            PortDirection::Output
        }
    }
}
