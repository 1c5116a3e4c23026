// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph model for KexEdit track documents.
//!
//! This crate provides the structural half of a document:
//! - Typed nodes, ports and edges with raw on-disk type codes
//! - Composite property keys addressing per-node values
//! - A graph container with id allocation and dependency ordering
//!
//! ## Architecture
//!
//! Records are stored exactly as decoded, duplicates included, so that the
//! codecs can round-trip damaged files and the validator can report on them.

pub mod node;
pub mod port;
pub mod edge;
pub mod key;
pub mod graph;

pub use node::{LegacyNodeType, Node, NodeId, NodeType};
pub use port::{Port, PortDirection, PortId, PortType, PortValueKind};
pub use edge::{Edge, EdgeId};
pub use key::{CompositeKey, NodeMeta, PropertyId};
pub use graph::{CycleError, Graph, GraphError};
