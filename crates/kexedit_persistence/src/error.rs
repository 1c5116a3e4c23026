// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for document persistence.

use std::path::PathBuf;

/// Fatal structural error in a binary document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// A read would run past the end of the buffer
    #[error("Unexpected end of buffer at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEndOfBuffer {
        /// Cursor position at the failed read
        offset: usize,
        /// Bytes the read required
        needed: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },

    /// The file does not start with the expected magic
    #[error("Bad magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// Expected tag
        expected: String,
        /// Tag actually read
        found: String,
    },

    /// A chunk handler consumed a different number of bytes than declared
    #[error("Chunk {tag} declared {declared} bytes but {consumed} were consumed")]
    ChunkLengthMismatch {
        /// Chunk tag
        tag: String,
        /// Length from the chunk header
        declared: usize,
        /// Bytes actually read by the handler
        consumed: usize,
    },

    /// A count field was negative
    #[error("Negative count {count} at offset {offset}")]
    NegativeCount {
        /// Raw count value
        count: i32,
        /// Offset of the count field
        offset: usize,
    },

    /// Legacy file version outside the supported range
    #[error("Unsupported legacy version {0}")]
    UnsupportedLegacyVersion(i32),

    /// `end_chunk` called without an open chunk, or the output ended with one open
    #[error("Unbalanced chunk nesting")]
    UnbalancedChunk,

    /// A chunk grew past the 32-bit length field
    #[error("Chunk {tag} is too large to encode ({length} bytes)")]
    ChunkTooLarge {
        /// Chunk tag
        tag: String,
        /// Payload length
        length: usize,
    },
}

/// Error type for persistence operations
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Binary format error
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Filesystem error
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Configuration could not be parsed or written
    #[error("Config error: {0}")]
    Config(String),

    /// Configuration written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    ConfigVersion {
        /// Version in the file
        found: u32,
        /// Highest supported version
        supported: u32,
    },
}

impl PersistenceError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for structural decoding
pub type FormatResult<T> = std::result::Result<T, FormatError>;

/// Result type for persistence operations
pub type Result<T> = std::result::Result<T, PersistenceError>;
