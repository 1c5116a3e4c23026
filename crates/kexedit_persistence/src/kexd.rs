// SPDX-License-Identifier: MIT OR Apache-2.0
//! KEXD container reading and writing, plus format sniffing.
//!
//! File layout: `"KEXD"`, a `u32` file version, then top-level chunks.
//! `CORE` nests `GRPH` and `DATA`; `UIST` sits beside it. Chunks with
//! unknown tags are skipped at any depth and reported as diagnostics.

use crate::chunk::{self, ChunkHeader, ChunkWriter, TAG_CORE, TAG_DATA, TAG_GRAPH, TAG_UI_STATE};
use crate::config::MigrationConfig;
use crate::cursor::ByteCursor;
use crate::diagnostics::Diagnostic;
use crate::document::{Decoded, Document};
use crate::error::{FormatError, FormatResult, PersistenceError, Result};
use crate::graph_codec::GraphCodec;
use crate::legacy;
use crate::migration;
use crate::property_codec::PropertyCodec;
use crate::ui_state::{UiState, UiStateCodec};
use std::path::Path;

/// File magic
pub const MAGIC: &[u8; 4] = b"KEXD";
/// File version written by [`encode`]
pub const FILE_VERSION: u32 = 1;
/// `CORE` chunk version
pub const CORE_VERSION: u32 = 1;

/// Whether `bytes` start with the KEXD magic
pub fn is_kexd(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Decode a KEXD file
pub fn decode(bytes: &[u8]) -> FormatResult<Decoded> {
    let mut cursor = ByteCursor::new(bytes);
    let magic = cursor.read_tag()?;
    if magic.as_bytes() != MAGIC {
        return Err(FormatError::BadMagic {
            expected: "KEXD".to_string(),
            found: magic,
        });
    }
    let file_version = cursor.read_u32()?;

    let mut document = Document::new();
    let mut diagnostics = Vec::new();
    let mut ui_state = None;

    while !cursor.is_empty() {
        let (header, mut body) = chunk::read_chunk(&mut cursor)?;
        tracing::debug!(tag = %header.tag, version = header.version, length = header.length, "Reading chunk");
        match header.tag.as_str() {
            TAG_CORE => decode_core(&mut body, &mut document, &mut diagnostics)?,
            TAG_UI_STATE => ui_state = Some(UiStateCodec::decode(&mut body, header.version)?),
            _ => skip_unknown(&header, &mut body, &[], &mut diagnostics)?,
        }
        chunk::expect_consumed(&header, &body)?;
    }

    document.ui_state = ui_state;
    // Inline GRPH v1 positions move into the UI state, which is where encode writes them
    if document.graph.nodes().iter().any(|n| n.position != [0.0, 0.0]) {
        document.capture_ui_positions();
    }
    document.apply_ui_positions();

    tracing::info!(
        file_version,
        nodes = document.graph.node_count(),
        edges = document.graph.edge_count(),
        diagnostics = diagnostics.len(),
        "Decoded KEXD document"
    );
    Ok(Decoded {
        document,
        diagnostics,
    })
}

fn decode_core(
    cursor: &mut ByteCursor<'_>,
    document: &mut Document,
    diagnostics: &mut Vec<Diagnostic>,
) -> FormatResult<()> {
    let path = [TAG_CORE.to_string()];
    while !cursor.is_empty() {
        let (header, mut body) = chunk::read_chunk(cursor)?;
        tracing::debug!(tag = %header.tag, version = header.version, length = header.length, "Reading chunk");
        match header.tag.as_str() {
            TAG_GRAPH => document.graph = GraphCodec::decode(&mut body, header.version)?,
            TAG_DATA => {
                let data = PropertyCodec::decode(&mut body, header.version, diagnostics)?;
                document.keyframes = data.keyframes;
                document.scalars = data.scalars;
                document.vectors = data.vectors;
                document.flags = data.flags;
            }
            _ => skip_unknown(&header, &mut body, &path, diagnostics)?,
        }
        chunk::expect_consumed(&header, &body)?;
    }
    Ok(())
}

fn skip_unknown(
    header: &ChunkHeader,
    body: &mut ByteCursor<'_>,
    path: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) -> FormatResult<()> {
    tracing::warn!(tag = %header.tag, length = header.length, "Skipping unknown chunk");
    body.skip(body.remaining())?;
    diagnostics.push(Diagnostic::unknown_chunk(&header.tag, path, header.length));
    Ok(())
}

/// Encode a document as KEXD
pub fn encode(document: &Document) -> FormatResult<Vec<u8>> {
    let mut writer = ChunkWriter::new();
    writer.body().write_bytes(MAGIC);
    writer.body().write_u32(FILE_VERSION);

    writer.begin_chunk(TAG_CORE, CORE_VERSION);
    writer.begin_chunk(TAG_GRAPH, GraphCodec::VERSION);
    GraphCodec::encode(writer.body(), &document.graph);
    writer.end_chunk()?;
    writer.begin_chunk(TAG_DATA, PropertyCodec::VERSION);
    PropertyCodec::encode(writer.body(), document);
    writer.end_chunk()?;
    writer.end_chunk()?;

    if let Some(ui) = ui_state_for_encode(document) {
        writer.begin_chunk(TAG_UI_STATE, UiStateCodec::VERSION);
        UiStateCodec::encode(writer.body(), &ui);
        writer.end_chunk()?;
    }

    let bytes = writer.finish()?;
    tracing::info!(
        nodes = document.graph.node_count(),
        bytes = bytes.len(),
        "Encoded KEXD document"
    );
    Ok(bytes)
}

/// Graph positions are detached from `GRPH`, so they travel in `UIST`.
fn ui_state_for_encode(document: &Document) -> Option<UiState> {
    let graph = &document.graph;
    let has_positions = graph.nodes().iter().any(|n| n.position != [0.0, 0.0]);
    if document.ui_state.is_none() && !has_positions {
        return None;
    }

    let mut ui = document.ui_state.clone().unwrap_or_default();
    for id in graph.node_ids() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        if ui.node_positions.contains_key(&id) || node.position != [0.0, 0.0] {
            ui.node_positions.insert(id, node.position);
        }
    }
    Some(ui)
}

/// Decode either format. Legacy files are migrated.
pub fn decode_any(bytes: &[u8], config: &MigrationConfig) -> FormatResult<Decoded> {
    if is_kexd(bytes) {
        decode(bytes)
    } else {
        let file = legacy::decode_legacy(bytes)?;
        Ok(migration::migrate(file, config))
    }
}

/// Read and decode a document from disk
pub fn load_document(path: &Path, config: &MigrationConfig) -> Result<Decoded> {
    let bytes = std::fs::read(path).map_err(|e| PersistenceError::io(path, e))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "Loading document");
    Ok(decode_any(&bytes, config)?)
}

/// Encode a document as KEXD and write it to disk
pub fn save_document(path: &Path, document: &Document) -> Result<()> {
    let bytes = encode(document)?;
    std::fs::write(path, bytes).map_err(|e| PersistenceError::io(path, e))?;
    tracing::info!(path = %path.display(), "Saved document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ByteWriter;
    use crate::diagnostics::DiagnosticKind;
    use crate::ui_state::KeyframeUiState;
    use kexedit_graph::{CompositeKey, NodeId, NodeMeta, NodeType, PortId, PortType, PropertyId};
    use kexedit_keyframes::{HandleType, Keyframe, KeyframeFlags, KeyframeRange};
    use proptest::prelude::*;

    /// Anchor (output port 1) feeding a Force section (inputs 2 and 3, output 4)
    fn two_node_document() -> Document {
        let mut doc = Document::new();
        let (_, _, anchor_out) = doc
            .graph
            .create_node(NodeType::Anchor, [0.0, 0.0], &[], &[PortType::Anchor])
            .unwrap();
        let (_, force_in, _) = doc
            .graph
            .create_node(
                NodeType::Force,
                [0.0, 0.0],
                &[PortType::Anchor, PortType::Duration],
                &[PortType::Anchor],
            )
            .unwrap();
        doc.graph.add_edge(anchor_out[0], force_in[0]).unwrap();
        doc.graph.link_neighbors();
        doc
    }

    fn rich_document() -> Document {
        let mut doc = two_node_document();
        let force = NodeId(2);
        doc.graph.node_mut(force).unwrap().position = [250.0, 40.0];
        doc.scalars.insert(CompositeKey::meta(force, NodeMeta::Duration), 3.0);
        doc.scalars.insert(CompositeKey::input(NodeId(1), 4), 10.0);
        doc.vectors.insert(CompositeKey::input(NodeId(1), 0), [0.0, 3.0, 0.0]);
        doc.flags.insert(CompositeKey::meta(force, NodeMeta::Driven), 1);
        doc.keyframes
            .set(
                CompositeKey::property(force, PropertyId::NormalForce),
                &[Keyframe::new(0.0, 1.0), Keyframe::new(3.0, -1.0)],
            )
            .unwrap();
        doc.capture_ui_positions();
        if let Some(ui) = doc.ui_state.as_mut() {
            ui.playhead_time = 1.25;
            ui.selected_nodes.push(force);
            ui.keyframes.push(KeyframeUiState {
                node: force,
                property: PropertyId::NormalForce as u8,
                keyframe_index: 1,
                id: 5,
                handle: HandleType::Free,
                flags: KeyframeFlags::NONE,
                selected: false,
            });
        }
        doc
    }

    #[test]
    fn test_two_node_scenario() {
        let mut doc = two_node_document();
        let normal_force = CompositeKey::property(NodeId(2), PropertyId::NormalForce);
        doc.keyframes
            .set(normal_force, &[Keyframe::new(0.0, 1.0), Keyframe::new(2.0, 3.5)])
            .unwrap();

        let bytes = encode(&doc).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.diagnostics.is_empty());
        let doc = &decoded.document;
        let graph = &doc.graph;

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.port_count(), 4);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.orphan_edges().count(), 0);
        assert!(doc.scalars.is_empty());
        assert!(doc.ui_state.is_none());

        let outputs: Vec<_> = graph.outputs(NodeId(1)).map(|p| p.id).collect();
        assert_eq!(outputs, vec![PortId(1)]);
        let inputs: Vec<_> = graph.inputs(NodeId(2)).map(|p| p.id).collect();
        assert_eq!(inputs, vec![PortId(2), PortId(3)]);
        let outputs: Vec<_> = graph.outputs(NodeId(2)).map(|p| p.id).collect();
        assert_eq!(outputs, vec![PortId(4)]);
        assert_eq!((graph.edges()[0].source, graph.edges()[0].target), (PortId(1), PortId(2)));

        assert_eq!(normal_force.raw(), (2 << 8) | 1);
        assert_eq!(doc.keyframes.range(normal_force), Some(KeyframeRange::new(0, 2)));
        let curve = doc.keyframes.get(normal_force).unwrap();
        assert_eq!((curve[0].time, curve[0].value), (0.0, 1.0));
        assert_eq!((curve[1].time, curve[1].value), (2.0, 3.5));
    }

    #[test]
    fn test_inline_positions_normalized() {
        // CORE { GRPH v1 } with one node at (10, 20) and no UIST
        let mut writer = ChunkWriter::new();
        writer.body().write_bytes(MAGIC);
        writer.body().write_u32(FILE_VERSION);
        writer.begin_chunk(TAG_CORE, CORE_VERSION);
        writer.begin_chunk(TAG_GRAPH, 1);
        let body = writer.body();
        for count in [1, 0, 0] {
            body.write_i32(count);
        }
        body.write_u32(1);
        body.write_u32(NodeType::Anchor.code());
        body.write_vec2([10.0, 20.0]);
        body.write_i32(0);
        body.write_i32(0);
        for next in [2, 1, 1] {
            body.write_u32(next);
        }
        writer.end_chunk().unwrap();
        writer.end_chunk().unwrap();
        let bytes = writer.finish().unwrap();

        let doc = decode(&bytes).unwrap().document;
        assert_eq!(doc.graph.node(NodeId(1)).unwrap().position, [10.0, 20.0]);
        let ui = doc.ui_state.as_ref().unwrap();
        assert_eq!(ui.node_positions.get(&NodeId(1)), Some(&[10.0, 20.0]));

        let reloaded = decode(&encode(&doc).unwrap()).unwrap().document;
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn test_roundtrip() {
        let doc = rich_document();
        let bytes = encode(&doc).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.document, doc);
        assert_eq!(encode(&decoded.document).unwrap(), bytes);
    }

    #[test]
    fn test_chunk_lengths_consistent() {
        let bytes = encode(&rich_document()).unwrap();
        let mut cursor = ByteCursor::new(&bytes);
        cursor.skip(8).unwrap();

        let mut top = Vec::new();
        while !cursor.is_empty() {
            let (header, mut body) = chunk::read_chunk(&mut cursor).unwrap();
            if header.tag == TAG_CORE {
                let mut nested = Vec::new();
                while !body.is_empty() {
                    let (inner, _) = chunk::read_chunk(&mut body).unwrap();
                    nested.push(inner.tag);
                }
                assert_eq!(nested, vec!["GRPH", "DATA"]);
            }
            top.push(header.tag);
        }
        assert_eq!(top, vec!["CORE", "UIST"]);
    }

    #[test]
    fn test_unknown_chunks_skipped() {
        let doc = rich_document();
        let bytes = encode(&doc).unwrap();

        // Rebuild the file with an extra chunk inside CORE and one at top level
        let mut cursor = ByteCursor::new(&bytes);
        cursor.skip(8).unwrap();
        let mut writer = ChunkWriter::new();
        writer.body().write_bytes(MAGIC);
        writer.body().write_u32(FILE_VERSION);
        while !cursor.is_empty() {
            let (header, mut body) = chunk::read_chunk(&mut cursor).unwrap();
            writer.begin_chunk(&header.tag, header.version);
            if header.tag == TAG_CORE {
                writer.begin_chunk("XTRA", 9);
                writer.body().write_u32(0xDEAD_BEEF);
                writer.end_chunk().unwrap();
            }
            writer.body().write_bytes(body.read_bytes(body.remaining()).unwrap());
            writer.end_chunk().unwrap();
        }
        writer.begin_chunk("FUTR", 1);
        writer.body().write_padding(20);
        writer.end_chunk().unwrap();
        let extended = writer.finish().unwrap();

        let decoded = decode(&extended).unwrap();
        assert_eq!(decoded.document, doc);
        assert_eq!(decoded.diagnostics.len(), 2);
        assert!(matches!(
            &decoded.diagnostics[0].kind,
            DiagnosticKind::UnknownChunk { tag, path, length: 4 } if tag == "XTRA" && path == &["CORE".to_string()]
        ));
        assert!(matches!(
            &decoded.diagnostics[1].kind,
            DiagnosticKind::UnknownChunk { tag, length: 20, .. } if tag == "FUTR"
        ));
    }

    #[test]
    fn test_chunk_length_mismatch() {
        // A UIST chunk with trailing bytes its handler does not read
        let mut writer = ChunkWriter::new();
        writer.body().write_bytes(MAGIC);
        writer.body().write_u32(FILE_VERSION);
        writer.begin_chunk(TAG_UI_STATE, UiStateCodec::VERSION);
        UiStateCodec::encode(writer.body(), &UiState::default());
        writer.body().write_u32(0);
        writer.end_chunk().unwrap();
        let bytes = writer.finish().unwrap();

        assert!(matches!(
            decode(&bytes),
            Err(FormatError::ChunkLengthMismatch { ref tag, .. }) if tag == "UIST"
        ));
    }

    #[test]
    fn test_bad_magic_and_truncation() {
        assert!(matches!(decode(b"KEXX\x01\0\0\0"), Err(FormatError::BadMagic { .. })));

        let bytes = encode(&rich_document()).unwrap();
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            decode(truncated),
            Err(FormatError::UnexpectedEndOfBuffer { .. })
        ));
    }

    #[test]
    fn test_decode_any_sniffs() {
        let bytes = encode(&two_node_document()).unwrap();
        let decoded = decode_any(&bytes, &MigrationConfig::default()).unwrap();
        assert_eq!(decoded.document.graph.node_count(), 2);

        let mut legacy = ByteWriter::new();
        legacy.write_i32(99);
        assert_eq!(
            decode_any(legacy.as_slice(), &MigrationConfig::default()).unwrap_err(),
            FormatError::UnsupportedLegacyVersion(99)
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("kexedit-kexd-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("track.kex");

        let doc = rich_document();
        save_document(&path, &doc).unwrap();
        let loaded = load_document(&path, &MigrationConfig::default()).unwrap();
        assert_eq!(loaded.document, doc);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    proptest! {
        #[test]
        fn test_arbitrary_bytes_never_panic(tail in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut bytes = MAGIC.to_vec();
            bytes.extend_from_slice(&FILE_VERSION.to_le_bytes());
            bytes.extend_from_slice(&tail);
            let _ = decode(&bytes);

            let mut old = legacy::LegacyVersion::CURRENT.number().to_le_bytes().to_vec();
            old.extend_from_slice(&tail);
            let _ = decode_any(&old, &MigrationConfig::default());
        }
    }
}
