// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flat export for the native simulation engine.
//!
//! The engine consumes structure-of-arrays buffers. [`FlatDocument`] holds
//! them and converts back without loss, except for editor UI state.

use crate::document::Document;
use indexmap::IndexMap;
use kexedit_graph::{CompositeKey, Edge, EdgeId, Graph, Node, NodeId, Port, PortId};
use kexedit_keyframes::{Keyframe, KeyframeRange, KeyframeStore};
use serde::Serialize;

/// Record counts of a flattened document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentCounts {
    /// Nodes
    pub nodes: usize,
    /// Ports
    pub ports: usize,
    /// Edges
    pub edges: usize,
    /// Scalar properties
    pub scalars: usize,
    /// Vector properties
    pub vectors: usize,
    /// Flag properties
    pub flags: usize,
    /// Keyframes
    pub keyframes: usize,
    /// Keyframe ranges
    pub ranges: usize,
    /// Next node id
    pub next_node_id: u32,
    /// Next port id
    pub next_port_id: u32,
    /// Next edge id
    pub next_edge_id: u32,
}

/// Structure-of-arrays form of a [`Document`]
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct FlatDocument {
    pub node_ids: Vec<u32>,
    pub node_types: Vec<u32>,
    pub node_input_counts: Vec<i32>,
    pub node_output_counts: Vec<i32>,

    pub port_ids: Vec<u32>,
    pub port_types: Vec<u32>,
    pub port_owners: Vec<u32>,
    pub port_is_input: Vec<u8>,

    pub edge_ids: Vec<u32>,
    pub edge_sources: Vec<u32>,
    pub edge_targets: Vec<u32>,

    pub scalar_keys: Vec<u64>,
    pub scalar_values: Vec<f32>,
    pub vector_keys: Vec<u64>,
    pub vector_values: Vec<[f32; 3]>,
    pub flag_keys: Vec<u64>,
    pub flag_values: Vec<i32>,

    pub keyframes: Vec<Keyframe>,
    pub range_keys: Vec<u64>,
    pub range_starts: Vec<i32>,
    pub range_lengths: Vec<i32>,

    pub next_node_id: u32,
    pub next_port_id: u32,
    pub next_edge_id: u32,
}

impl FlatDocument {
    /// Flatten a document
    pub fn from_document(document: &Document) -> Self {
        let graph = &document.graph;
        let mut flat = Self {
            next_node_id: graph.next_node_id,
            next_port_id: graph.next_port_id,
            next_edge_id: graph.next_edge_id,
            ..Self::default()
        };

        for node in graph.nodes() {
            flat.node_ids.push(node.id.0);
            flat.node_types.push(node.type_code);
            flat.node_input_counts.push(node.input_count);
            flat.node_output_counts.push(node.output_count);
        }
        for port in graph.ports() {
            flat.port_ids.push(port.id.0);
            flat.port_types.push(port.type_code);
            flat.port_owners.push(port.owner.0);
            flat.port_is_input.push(u8::from(port.is_input));
        }
        for edge in graph.edges() {
            flat.edge_ids.push(edge.id.0);
            flat.edge_sources.push(edge.source.0);
            flat.edge_targets.push(edge.target.0);
        }

        for (key, value) in &document.scalars {
            flat.scalar_keys.push(key.raw());
            flat.scalar_values.push(*value);
        }
        for (key, value) in &document.vectors {
            flat.vector_keys.push(key.raw());
            flat.vector_values.push(*value);
        }
        for (key, value) in &document.flags {
            flat.flag_keys.push(key.raw());
            flat.flag_values.push(*value);
        }

        flat.keyframes = document.keyframes.keyframes().to_vec();
        for (key, range) in document.keyframes.ranges() {
            flat.range_keys.push(key.raw());
            flat.range_starts.push(range.start);
            flat.range_lengths.push(range.length);
        }
        flat
    }

    /// Rebuild a document. UI state is not carried and comes back empty.
    pub fn into_document(self) -> Document {
        let mut graph = Graph::new();
        let nodes = self
            .node_ids
            .iter()
            .zip(&self.node_types)
            .zip(self.node_input_counts.iter().zip(&self.node_output_counts));
        for ((&id, &type_code), (&inputs, &outputs)) in nodes {
            graph.push_node(Node::with_code(NodeId(id), type_code).with_port_counts(inputs, outputs));
        }

        let ports = self
            .port_ids
            .iter()
            .zip(&self.port_types)
            .zip(self.port_owners.iter().zip(&self.port_is_input));
        for ((&id, &type_code), (&owner, &is_input)) in ports {
            graph.push_port(Port {
                id: PortId(id),
                type_code,
                owner: NodeId(owner),
                is_input: is_input != 0,
            });
        }

        let edges = self.edge_ids.iter().zip(self.edge_sources.iter().zip(&self.edge_targets));
        for (&id, (&source, &target)) in edges {
            graph.push_edge(Edge::new(EdgeId(id), PortId(source), PortId(target)));
        }

        graph.next_node_id = self.next_node_id;
        graph.next_port_id = self.next_port_id;
        graph.next_edge_id = self.next_edge_id;
        graph.link_neighbors();

        let ranges: IndexMap<_, _> = self
            .range_keys
            .iter()
            .zip(self.range_starts.iter().zip(&self.range_lengths))
            .map(|(&key, (&start, &length))| (CompositeKey::from_raw(key), KeyframeRange::new(start, length)))
            .collect();

        Document {
            graph,
            keyframes: KeyframeStore::from_parts(self.keyframes, ranges),
            scalars: zip_keys(self.scalar_keys, self.scalar_values),
            vectors: zip_keys(self.vector_keys, self.vector_values),
            flags: zip_keys(self.flag_keys, self.flag_values),
            ui_state: None,
        }
    }

    /// Record counts and id counters
    pub fn counts(&self) -> DocumentCounts {
        DocumentCounts {
            nodes: self.node_ids.len(),
            ports: self.port_ids.len(),
            edges: self.edge_ids.len(),
            scalars: self.scalar_keys.len(),
            vectors: self.vector_keys.len(),
            flags: self.flag_keys.len(),
            keyframes: self.keyframes.len(),
            ranges: self.range_keys.len(),
            next_node_id: self.next_node_id,
            next_port_id: self.next_port_id,
            next_edge_id: self.next_edge_id,
        }
    }
}

fn zip_keys<V>(keys: Vec<u64>, values: Vec<V>) -> IndexMap<CompositeKey, V> {
    keys.into_iter().map(CompositeKey::from_raw).zip(values).collect()
}

/// Error reported by a simulation backend
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The backend refused the document
    #[error("Engine rejected document: {0}")]
    Rejected(String),

    /// An operation needed a loaded document
    #[error("No document loaded")]
    NotLoaded,
}

/// A native simulation backend
pub trait SimulationEngine {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Copy a flattened document into the backend, replacing any previous one
    fn load(&mut self, document: &FlatDocument) -> Result<(), EngineError>;

    /// Release everything the backend holds
    fn clear(&mut self);
}

/// Caller-owned handle around a simulation backend.
///
/// Created with [`EngineHandle::new`] and torn down with
/// [`EngineHandle::shutdown`]. There is no shared global instance.
pub struct EngineHandle<E: SimulationEngine> {
    backend: E,
    loaded: Option<DocumentCounts>,
}

impl<E: SimulationEngine> EngineHandle<E> {
    /// Wrap a backend
    pub fn new(backend: E) -> Self {
        tracing::debug!(engine = backend.name(), "Engine handle created");
        Self { backend, loaded: None }
    }

    /// Flatten and hand a document to the backend
    pub fn load(&mut self, document: &Document) -> Result<DocumentCounts, EngineError> {
        let flat = FlatDocument::from_document(document);
        let counts = flat.counts();
        self.loaded = None;
        self.backend.load(&flat)?;
        self.loaded = Some(counts);
        tracing::info!(engine = self.backend.name(), nodes = counts.nodes, "Document loaded into engine");
        Ok(counts)
    }

    /// Counts of the loaded document
    pub fn loaded(&self) -> Result<DocumentCounts, EngineError> {
        self.loaded.ok_or(EngineError::NotLoaded)
    }

    /// The backend
    pub fn backend(&self) -> &E {
        &self.backend
    }

    /// Clear the backend and return it
    pub fn shutdown(mut self) -> E {
        self.backend.clear();
        tracing::debug!(engine = self.backend.name(), "Engine handle shut down");
        self.backend
    }
}
