// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, ports and edges.
//!
//! Records are kept in document order so that a decoded graph re-encodes
//! byte-for-byte. Lookups go through index maps that resolve an id to its
//! first occurrence; later duplicates stay in the record lists where the
//! validator can see them.

use crate::edge::{Edge, EdgeId};
use crate::node::{Node, NodeId, NodeType};
use crate::port::{Port, PortId, PortType};
use indexmap::IndexMap;
use std::collections::HashSet;

/// A track node graph
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    ports: Vec<Port>,
    edges: Vec<Edge>,
    node_index: IndexMap<NodeId, usize>,
    port_index: IndexMap<PortId, usize>,
    edge_index: IndexMap<EdgeId, usize>,
    /// Next node id to hand out
    pub next_node_id: u32,
    /// Next port id to hand out
    pub next_port_id: u32,
    /// Next edge id to hand out
    pub next_edge_id: u32,
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.ports == other.ports
            && self.edges == other.edges
            && self.next_node_id == other.next_node_id
            && self.next_port_id == other.next_port_id
            && self.next_edge_id == other.next_edge_id
    }
}

impl Graph {
    /// Create a new empty graph. Id allocation starts at 1.
    pub fn new() -> Self {
        Self {
            next_node_id: 1,
            next_port_id: 1,
            next_edge_id: 1,
            ..Self::default()
        }
    }

    /// Append a node record. Returns `false` if the id was already present.
    pub fn push_node(&mut self, node: Node) -> bool {
        let index = self.nodes.len();
        let fresh = !self.node_index.contains_key(&node.id);
        if fresh {
            self.node_index.insert(node.id, index);
        }
        self.nodes.push(node);
        fresh
    }

    /// Append a port record. Returns `false` if the id was already present.
    pub fn push_port(&mut self, port: Port) -> bool {
        let index = self.ports.len();
        let fresh = !self.port_index.contains_key(&port.id);
        if fresh {
            self.port_index.insert(port.id, index);
        }
        self.ports.push(port);
        fresh
    }

    /// Append an edge record. Returns `false` if the id was already present.
    pub fn push_edge(&mut self, edge: Edge) -> bool {
        let index = self.edges.len();
        let fresh = !self.edge_index.contains_key(&edge.id);
        if fresh {
            self.edge_index.insert(edge.id, index);
        }
        self.edges.push(edge);
        fresh
    }

    /// Create a node with freshly allocated ids for it and its ports.
    ///
    /// Returns the node id followed by the input and output port ids.
    pub fn create_node(
        &mut self,
        node_type: NodeType,
        position: [f32; 2],
        inputs: &[PortType],
        outputs: &[PortType],
    ) -> Result<(NodeId, Vec<PortId>, Vec<PortId>), GraphError> {
        let node_id = NodeId(self.allocate_node_id()?);
        let node = Node::new(node_id, node_type)
            .with_position(position[0], position[1])
            .with_port_counts(inputs.len() as i32, outputs.len() as i32);
        self.push_node(node);

        let mut input_ids = Vec::with_capacity(inputs.len());
        for &ty in inputs {
            let id = PortId(self.allocate_port_id()?);
            self.push_port(Port::input(id, ty, node_id));
            input_ids.push(id);
        }
        let mut output_ids = Vec::with_capacity(outputs.len());
        for &ty in outputs {
            let id = PortId(self.allocate_port_id()?);
            self.push_port(Port::output(id, ty, node_id));
            output_ids.push(id);
        }
        Ok((node_id, input_ids, output_ids))
    }

    /// Connect an output port to an input port with a fresh edge id
    pub fn add_edge(&mut self, source: PortId, target: PortId) -> Result<EdgeId, GraphError> {
        let source_port = self.port(source).ok_or(GraphError::PortNotFound(source))?;
        let target_port = self.port(target).ok_or(GraphError::PortNotFound(target))?;

        if source_port.is_input || !target_port.is_input {
            return Err(GraphError::DirectionMismatch { from: source, target });
        }
        if source_port.owner == target_port.owner {
            return Err(GraphError::SelfLoop(source_port.owner));
        }

        let id = EdgeId(self.allocate_edge_id()?);
        self.push_edge(Edge::new(id, source, target));
        Ok(id)
    }

    /// Remove every record of a node together with its ports and their edges
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let position = self.nodes.iter().position(|n| n.id == node_id)?;
        let removed = self.nodes.remove(position);
        self.nodes.retain(|n| n.id != node_id);

        let dropped_ports: HashSet<PortId> = self
            .ports
            .iter()
            .filter(|p| p.owner == node_id)
            .map(|p| p.id)
            .collect();
        self.ports.retain(|p| p.owner != node_id);
        self.edges
            .retain(|e| !dropped_ports.contains(&e.source) && !dropped_ports.contains(&e.target));

        self.rebuild_index();
        Some(removed)
    }

    /// Rebuild the id lookup maps after bulk edits
    pub fn rebuild_index(&mut self) {
        self.node_index.clear();
        self.port_index.clear();
        self.edge_index.clear();
        for (i, node) in self.nodes.iter().enumerate() {
            self.node_index.entry(node.id).or_insert(i);
        }
        for (i, port) in self.ports.iter().enumerate() {
            self.port_index.entry(port.id).or_insert(i);
        }
        for (i, edge) in self.edges.iter().enumerate() {
            self.edge_index.entry(edge.id).or_insert(i);
        }
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.node_index.get(&node_id).map(|&i| &self.nodes[i])
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        let index = *self.node_index.get(&node_id)?;
        self.nodes.get_mut(index)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.port_index.get(&port_id).map(|&i| &self.ports[i])
    }

    /// Get an edge by ID
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edge_index.get(&edge_id).map(|&i| &self.edges[i])
    }

    /// Whether a node with this id exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.node_index.contains_key(&node_id)
    }

    /// All node records in document order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Mutable node records, for in-place edits that keep ids unchanged
    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    /// All port records in document order
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// All edge records in document order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of ports
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Input ports of a node in declaration order
    pub fn inputs(&self, node_id: NodeId) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(move |p| p.owner == node_id && p.is_input)
    }

    /// Output ports of a node in declaration order
    pub fn outputs(&self, node_id: NodeId) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(move |p| p.owner == node_id && !p.is_input)
    }

    /// Input port at `index`
    pub fn input(&self, node_id: NodeId, index: usize) -> Option<&Port> {
        self.inputs(node_id).nth(index)
    }

    /// Edges leaving a port
    pub fn edges_from(&self, port_id: PortId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == port_id)
    }

    /// Edges arriving at a port
    pub fn edges_to(&self, port_id: PortId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.target == port_id)
    }

    /// Owner of a port, if both the port and the owning node exist
    pub fn port_owner(&self, port_id: PortId) -> Option<NodeId> {
        let owner = self.port(port_id)?.owner;
        self.contains_node(owner).then_some(owner)
    }

    /// Edges whose source or target port has no owning node
    pub fn orphan_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(|e| self.port_owner(e.source).is_none() || self.port_owner(e.target).is_none())
    }

    /// Allocate a node id
    pub fn allocate_node_id(&mut self) -> Result<u32, GraphError> {
        allocate(&mut self.next_node_id)
    }

    /// Allocate a port id
    pub fn allocate_port_id(&mut self) -> Result<u32, GraphError> {
        allocate(&mut self.next_port_id)
    }

    /// Allocate an edge id
    pub fn allocate_edge_id(&mut self) -> Result<u32, GraphError> {
        allocate(&mut self.next_edge_id)
    }

    /// Raise the id counters above every id in use
    pub fn sync_next_ids(&mut self) {
        let max_node = self.nodes.iter().map(|n| n.id.0).max().unwrap_or(0);
        let max_port = self.ports.iter().map(|p| p.id.0).max().unwrap_or(0);
        let max_edge = self.edges.iter().map(|e| e.id.0).max().unwrap_or(0);
        self.next_node_id = self.next_node_id.max(max_node.saturating_add(1));
        self.next_port_id = self.next_port_id.max(max_port.saturating_add(1));
        self.next_edge_id = self.next_edge_id.max(max_edge.saturating_add(1));
    }

    /// Rebuild `next`/`prev` links from anchor connections.
    ///
    /// An edge into an Anchor-typed input links the source node forward to
    /// the target node. The first such edge wins on either side.
    pub fn link_neighbors(&mut self) {
        let mut links = Vec::new();
        for edge in &self.edges {
            let (Some(source), Some(target)) = (self.port(edge.source), self.port(edge.target)) else {
                continue;
            };
            if target.port_type() == Some(PortType::Anchor) && source.owner != target.owner {
                links.push((source.owner, target.owner));
            }
        }

        for node in &mut self.nodes {
            node.next = None;
            node.prev = None;
        }
        for (from, to) in links {
            if let Some(node) = self.node_mut(from) {
                node.next.get_or_insert(to);
            }
            if let Some(node) = self.node_mut(to) {
                node.prev.get_or_insert(from);
            }
        }
    }

    /// Get nodes in dependency order (upstream first)
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut visited = HashSet::new();
        let mut temp_mark = HashSet::new();
        let mut order = Vec::new();

        for node_id in self.node_index.keys() {
            if !visited.contains(node_id) {
                self.visit(*node_id, &mut visited, &mut temp_mark, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node_id: NodeId,
        visited: &mut HashSet<NodeId>,
        temp_mark: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<(), CycleError> {
        if temp_mark.contains(&node_id) {
            return Err(CycleError(node_id));
        }
        if visited.contains(&node_id) {
            return Ok(());
        }

        temp_mark.insert(node_id);

        // Visit every node feeding one of this node's inputs
        for input in self.inputs(node_id) {
            for edge in self.edges_to(input.id) {
                if let Some(upstream) = self.port_owner(edge.source) {
                    if upstream != node_id {
                        self.visit(upstream, visited, temp_mark, order)?;
                    }
                }
            }
        }

        temp_mark.remove(&node_id);
        visited.insert(node_id);
        order.push(node_id);

        Ok(())
    }
}

fn allocate(counter: &mut u32) -> Result<u32, GraphError> {
    let id = *counter;
    *counter = id.checked_add(1).ok_or(GraphError::IdsExhausted)?;
    Ok(id)
}

/// Error when editing a graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(PortId),

    /// Edge must run from an output to an input
    #[error("Edge {from} -> {target} must connect an output to an input")]
    DirectionMismatch {
        /// Source port
        from: PortId,
        /// Target port
        target: PortId,
    },

    /// Self-loop not allowed
    #[error("Self-loop on node {0} not allowed")]
    SelfLoop(NodeId),

    /// Id counter overflowed
    #[error("Id space exhausted")]
    IdsExhausted,
}

/// Error when graph contains a cycle
#[derive(Debug, thiserror::Error)]
#[error("Graph contains a cycle through node {0}")]
pub struct CycleError(pub NodeId);
