// SPDX-License-Identifier: MIT OR Apache-2.0
//! `GRPH` chunk codec.

use crate::cursor::{ByteCursor, ByteWriter};
use crate::error::{FormatError, FormatResult};
use kexedit_graph::{Edge, EdgeId, Graph, Node, NodeId, Port, PortId};

/// Where node positions live for a given `GRPH` version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphLayout {
    /// Version 1: positions are stored in each node record
    InlinePositions,
    /// Version 2 and later: positions are stored in `UIST`
    Detached,
}

impl GraphLayout {
    /// Layout for a chunk version
    pub fn from_version(version: u32) -> Self {
        if version <= 1 {
            Self::InlinePositions
        } else {
            Self::Detached
        }
    }

    fn has_positions(self) -> bool {
        match self {
            Self::InlinePositions => true,
            Self::Detached => false,
        }
    }
}

/// Codec for the `GRPH` chunk
pub struct GraphCodec;

impl GraphCodec {
    /// Version written by [`GraphCodec::encode`]
    pub const VERSION: u32 = 2;

    /// Decode a `GRPH` payload. Duplicate ids are kept as separate records.
    pub fn decode(cursor: &mut ByteCursor<'_>, version: u32) -> FormatResult<Graph> {
        let layout = GraphLayout::from_version(version);
        let node_count = cursor.read_count()?;
        let port_count = cursor.read_count()?;
        let edge_count = cursor.read_count()?;

        let node_size = if layout.has_positions() { 24 } else { 16 };
        let needed = node_count
            .saturating_mul(node_size)
            .saturating_add(port_count.saturating_mul(13))
            .saturating_add(edge_count.saturating_mul(12));
        if needed > cursor.remaining() {
            return Err(FormatError::UnexpectedEndOfBuffer {
                offset: cursor.position(),
                needed,
                remaining: cursor.remaining(),
            });
        }

        let mut graph = Graph::new();
        for _ in 0..node_count {
            let id = NodeId(cursor.read_u32()?);
            let type_code = cursor.read_u32()?;
            let mut node = Node::with_code(id, type_code);
            if layout.has_positions() {
                node.position = cursor.read_vec2()?;
            }
            node.input_count = cursor.read_i32()?;
            node.output_count = cursor.read_i32()?;
            graph.push_node(node);
        }

        for _ in 0..port_count {
            let id = PortId(cursor.read_u32()?);
            let type_code = cursor.read_u32()?;
            let owner = NodeId(cursor.read_u32()?);
            let is_input = cursor.read_bool()?;
            graph.push_port(Port {
                id,
                type_code,
                owner,
                is_input,
            });
        }

        for _ in 0..edge_count {
            let id = EdgeId(cursor.read_u32()?);
            let source = PortId(cursor.read_u32()?);
            let target = PortId(cursor.read_u32()?);
            graph.push_edge(Edge::new(id, source, target));
        }

        graph.next_node_id = cursor.read_u32()?;
        graph.next_port_id = cursor.read_u32()?;
        graph.next_edge_id = cursor.read_u32()?;
        graph.link_neighbors();

        tracing::debug!(
            nodes = node_count,
            ports = port_count,
            edges = edge_count,
            version,
            "Decoded graph"
        );
        Ok(graph)
    }

    /// Encode a `GRPH` payload at [`GraphCodec::VERSION`]
    pub fn encode(writer: &mut ByteWriter, graph: &Graph) {
        writer.write_count(graph.node_count());
        writer.write_count(graph.port_count());
        writer.write_count(graph.edge_count());

        for node in graph.nodes() {
            writer.write_u32(node.id.raw());
            writer.write_u32(node.type_code);
            writer.write_i32(node.input_count);
            writer.write_i32(node.output_count);
        }
        for port in graph.ports() {
            writer.write_u32(port.id.raw());
            writer.write_u32(port.type_code);
            writer.write_u32(port.owner.raw());
            writer.write_bool(port.is_input);
        }
        for edge in graph.edges() {
            writer.write_u32(edge.id.raw());
            writer.write_u32(edge.source.raw());
            writer.write_u32(edge.target.raw());
        }

        writer.write_u32(graph.next_node_id);
        writer.write_u32(graph.next_port_id);
        writer.write_u32(graph.next_edge_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kexedit_graph::{NodeType, PortType};

    fn sample() -> Graph {
        let mut graph = Graph::new();
        let (_, _, out) = graph
            .create_node(NodeType::Anchor, [0.0, 0.0], &[], &[PortType::Anchor])
            .unwrap();
        let (_, inputs, _) = graph
            .create_node(NodeType::Force, [0.0, 0.0], &[PortType::Anchor], &[PortType::Anchor])
            .unwrap();
        graph.add_edge(out[0], inputs[0]).unwrap();
        graph
    }

    #[test]
    fn test_roundtrip() {
        let graph = sample();
        let mut w = ByteWriter::new();
        GraphCodec::encode(&mut w, &graph);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 12 + 2 * 16 + 3 * 13 + 12 + 12);

        let mut c = ByteCursor::new(&bytes);
        let decoded = GraphCodec::decode(&mut c, GraphCodec::VERSION).unwrap();
        assert!(c.is_empty());
        assert_eq!(decoded.nodes().len(), 2);
        assert_eq!(decoded.ports(), graph.ports());
        assert_eq!(decoded.edges(), graph.edges());
        assert_eq!(decoded.next_port_id, 4);
        assert_eq!(decoded.node(NodeId(1)).unwrap().next, Some(NodeId(2)));
    }

    #[test]
    fn test_v1_inline_positions() {
        let mut w = ByteWriter::new();
        w.write_i32(1);
        w.write_i32(0);
        w.write_i32(0);
        w.write_u32(3);
        w.write_u32(NodeType::Curved.code());
        w.write_vec2([12.0, -4.0]);
        w.write_i32(0);
        w.write_i32(0);
        w.write_u32(4);
        w.write_u32(1);
        w.write_u32(1);
        let bytes = w.into_inner();

        let graph = GraphCodec::decode(&mut ByteCursor::new(&bytes), 1).unwrap();
        let node = graph.node(NodeId(3)).unwrap();
        assert_eq!(node.position, [12.0, -4.0]);
        assert_eq!(node.node_type(), Some(NodeType::Curved));
        assert_eq!(graph.next_node_id, 4);
    }

    #[test]
    fn test_duplicates_preserved() {
        let mut w = ByteWriter::new();
        w.write_i32(2);
        w.write_i32(0);
        w.write_i32(0);
        for _ in 0..2 {
            w.write_u32(7);
            w.write_u32(0);
            w.write_i32(0);
            w.write_i32(0);
        }
        w.write_u32(8);
        w.write_u32(1);
        w.write_u32(1);
        let bytes = w.into_inner();
        let graph = GraphCodec::decode(&mut ByteCursor::new(&bytes), 2).unwrap();
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_hostile_count() {
        let mut w = ByteWriter::new();
        w.write_i32(i32::MAX);
        w.write_i32(0);
        w.write_i32(0);
        let bytes = w.into_inner();
        assert!(matches!(
            GraphCodec::decode(&mut ByteCursor::new(&bytes), 2),
            Err(FormatError::UnexpectedEndOfBuffer { .. })
        ));
    }
}
