// SPDX-License-Identifier: MIT OR Apache-2.0
//! Chunk container framing.
//!
//! A chunk is a 12-byte header (4-byte tag, `u32` version, `u32` payload
//! length) followed by its payload. Readers hand each handler a cursor over
//! exactly the declared payload, then require that the handler consumed all
//! of it.

use crate::cursor::{ByteCursor, ByteWriter};
use crate::error::{FormatError, FormatResult};

/// Header size in bytes
pub const CHUNK_HEADER_SIZE: usize = 12;

/// Container of the graph and property chunks
pub const TAG_CORE: &str = "CORE";
/// Graph structure
pub const TAG_GRAPH: &str = "GRPH";
/// Property maps and keyframes
pub const TAG_DATA: &str = "DATA";
/// Editor UI state
pub const TAG_UI_STATE: &str = "UIST";

/// Decoded chunk header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Tag with NUL padding removed
    pub tag: String,
    /// Chunk layout version
    pub version: u32,
    /// Payload length in bytes
    pub length: u32,
}

/// Read a chunk header and split off its payload.
///
/// The outer cursor is advanced past the whole chunk.
pub fn read_chunk<'a>(cursor: &mut ByteCursor<'a>) -> FormatResult<(ChunkHeader, ByteCursor<'a>)> {
    let tag = cursor.read_tag()?;
    let version = cursor.read_u32()?;
    let length = cursor.read_u32()?;
    let payload = cursor.read_bytes(length as usize)?;
    Ok((
        ChunkHeader {
            tag,
            version,
            length,
        },
        ByteCursor::new(payload),
    ))
}

/// Require that a handler consumed its whole payload
pub fn expect_consumed(header: &ChunkHeader, body: &ByteCursor<'_>) -> FormatResult<()> {
    if body.position() != header.length as usize {
        return Err(FormatError::ChunkLengthMismatch {
            tag: header.tag.clone(),
            declared: header.length as usize,
            consumed: body.position(),
        });
    }
    Ok(())
}

/// Writer that back-patches chunk lengths
#[derive(Debug, Default)]
pub struct ChunkWriter {
    writer: ByteWriter,
    open: Vec<(usize, String)>,
}

impl ChunkWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a chunk. The length is filled in by [`ChunkWriter::end_chunk`].
    pub fn begin_chunk(&mut self, tag: &str, version: u32) {
        let start = self.writer.len();
        self.writer.write_tag(tag);
        self.writer.write_u32(version);
        self.writer.write_u32(0);
        self.open.push((start, tag.to_string()));
    }

    /// Close the innermost open chunk
    pub fn end_chunk(&mut self) -> FormatResult<()> {
        let (start, tag) = self.open.pop().ok_or(FormatError::UnbalancedChunk)?;
        let length = self.writer.len() - start - CHUNK_HEADER_SIZE;
        let length_u32 = u32::try_from(length).map_err(|_| FormatError::ChunkTooLarge { tag, length })?;
        self.writer.patch_u32(start + 8, length_u32);
        Ok(())
    }

    /// Payload writer for the open chunk
    pub fn body(&mut self) -> &mut ByteWriter {
        &mut self.writer
    }

    /// Number of chunks still open
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Finish writing. Every chunk must be closed.
    pub fn finish(self) -> FormatResult<Vec<u8>> {
        if !self.open.is_empty() {
            return Err(FormatError::UnbalancedChunk);
        }
        Ok(self.writer.into_inner())
    }
}
