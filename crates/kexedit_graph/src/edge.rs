// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.

use crate::port::PortId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

impl EdgeId {
    /// Raw id value as stored on disk
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge from an output port to an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge ID
    pub id: EdgeId,
    /// Source port ID
    pub source: PortId,
    /// Target port ID
    pub target: PortId,
}

impl Edge {
    /// Create a new edge
    pub fn new(id: EdgeId, source: PortId, target: PortId) -> Self {
        Self { id, source, target }
    }

    /// Check if this edge touches a specific port
    pub fn involves_port(&self, port_id: PortId) -> bool {
        self.source == port_id || self.target == port_id
    }
}
