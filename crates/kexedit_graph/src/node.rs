// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the track graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Raw id value as stored on disk
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node type used by the chunked document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum NodeType {
    /// Force-driven section
    Force = 0,
    /// Geometric (pitch/yaw speed) section
    Geometric = 1,
    /// Curved section with radius and arc
    Curved = 2,
    /// Section copying the shape of another path
    CopyPath = 3,
    /// Bridge connecting two anchors
    Bridge = 4,
    /// Starting anchor
    Anchor = 5,
    /// Direction reversal
    Reverse = 6,
    /// Path reversal
    ReversePath = 7,
}

impl NodeType {
    /// All node types in code order
    pub const ALL: [NodeType; 8] = [
        Self::Force,
        Self::Geometric,
        Self::Curved,
        Self::CopyPath,
        Self::Bridge,
        Self::Anchor,
        Self::Reverse,
        Self::ReversePath,
    ];

    /// Decode a type code, returning `None` for unknown codes
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// On-disk type code
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Get the display name
    pub fn name(self) -> &'static str {
        match self {
            Self::Force => "Force",
            Self::Geometric => "Geometric",
            Self::Curved => "Curved",
            Self::CopyPath => "CopyPath",
            Self::Bridge => "Bridge",
            Self::Anchor => "Anchor",
            Self::Reverse => "Reverse",
            Self::ReversePath => "ReversePath",
        }
    }

    /// Whether this node produces a track section with keyframed properties
    pub fn is_section(self) -> bool {
        matches!(
            self,
            Self::Force | Self::Geometric | Self::Curved | Self::CopyPath | Self::Bridge
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Node type codes of the monolithic legacy format.
///
/// The numbering differs from [`NodeType`]: Bridge moved and Mesh/Append
/// were dropped when the chunked format was introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum LegacyNodeType {
    /// Force section
    ForceSection = 0,
    /// Geometric section
    GeometricSection = 1,
    /// Curved section
    CurvedSection = 2,
    /// Copy-path section
    CopyPathSection = 3,
    /// Anchor
    Anchor = 4,
    /// Reverse
    Reverse = 5,
    /// Reverse path
    ReversePath = 6,
    /// Bridge
    Bridge = 7,
    /// Imported mesh (legacy only)
    Mesh = 8,
    /// Append (legacy only)
    Append = 9,
}

impl LegacyNodeType {
    /// Decode a legacy type code
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::ForceSection,
            1 => Self::GeometricSection,
            2 => Self::CurvedSection,
            3 => Self::CopyPathSection,
            4 => Self::Anchor,
            5 => Self::Reverse,
            6 => Self::ReversePath,
            7 => Self::Bridge,
            8 => Self::Mesh,
            9 => Self::Append,
            _ => return None,
        })
    }

    /// On-disk type code
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Map to the chunked-format node type.
    ///
    /// Mesh and Append have no counterpart and return `None`.
    pub fn to_node_type(self) -> Option<NodeType> {
        match self {
            Self::ForceSection => Some(NodeType::Force),
            Self::GeometricSection => Some(NodeType::Geometric),
            Self::CurvedSection => Some(NodeType::Curved),
            Self::CopyPathSection => Some(NodeType::CopyPath),
            Self::Anchor => Some(NodeType::Anchor),
            Self::Reverse => Some(NodeType::Reverse),
            Self::ReversePath => Some(NodeType::ReversePath),
            Self::Bridge => Some(NodeType::Bridge),
            Self::Mesh | Self::Append => None,
        }
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Raw type code, see [`NodeType::from_code`]
    pub type_code: u32,
    /// Position in the graph editor
    pub position: [f32; 2],
    /// Number of input ports as declared by the document
    pub input_count: i32,
    /// Number of output ports as declared by the document
    pub output_count: i32,
    /// Downstream neighbour, rebuilt from edges
    #[serde(default)]
    pub next: Option<NodeId>,
    /// Upstream neighbour, rebuilt from edges
    #[serde(default)]
    pub prev: Option<NodeId>,
}

impl Node {
    /// Create a node of a known type with no ports
    pub fn new(id: NodeId, node_type: NodeType) -> Self {
        Self::with_code(id, node_type.code())
    }

    /// Create a node from a raw type code
    pub fn with_code(id: NodeId, type_code: u32) -> Self {
        Self {
            id,
            type_code,
            position: [0.0, 0.0],
            input_count: 0,
            output_count: 0,
            next: None,
            prev: None,
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the declared port counts
    pub fn with_port_counts(mut self, inputs: i32, outputs: i32) -> Self {
        self.input_count = inputs;
        self.output_count = outputs;
        self
    }

    /// Typed node type, `None` if the code is unknown
    pub fn node_type(&self) -> Option<NodeType> {
        NodeType::from_code(self.type_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_codes() {
        for ty in NodeType::ALL {
            assert_eq!(NodeType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(NodeType::from_code(8), None);
        assert_eq!(NodeType::Bridge.code(), 4);
        assert_eq!(NodeType::Anchor.code(), 5);
    }

    #[test]
    fn test_legacy_mapping() {
        assert_eq!(LegacyNodeType::Bridge.to_node_type(), Some(NodeType::Bridge));
        assert_eq!(LegacyNodeType::Anchor.to_node_type(), Some(NodeType::Anchor));
        assert_eq!(LegacyNodeType::ReversePath.to_node_type(), Some(NodeType::ReversePath));
        assert_eq!(LegacyNodeType::Mesh.to_node_type(), None);
        assert_eq!(LegacyNodeType::from_code(10), None);
    }

    #[test]
    fn test_unknown_code_preserved() {
        let node = Node::with_code(NodeId(3), 42).with_position(1.0, 2.0);
        assert_eq!(node.node_type(), None);
        assert_eq!(node.type_code, 42);
        assert_eq!(node.position, [1.0, 2.0]);
    }
}
