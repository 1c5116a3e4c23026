// SPDX-License-Identifier: MIT OR Apache-2.0
//! Non-fatal decode diagnostics.

use kexedit_graph::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic or validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational
    Info,
    /// Suspicious but usable
    Warning,
    /// Integrity violation
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// What a diagnostic is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A chunk with an unrecognized tag was skipped
    UnknownChunk {
        /// Tag as read
        tag: String,
        /// Enclosing chunk tags, outermost first
        path: Vec<String>,
        /// Skipped payload length
        length: u32,
    },
    /// Legacy data needed a lossy or guessed conversion
    MigrationAnomaly,
    /// Interpolation code outside the known range, decoded as Bezier
    UnknownInterpolation {
        /// Raw code
        code: u8,
    },
}

/// A non-fatal finding produced while decoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Category and payload
    pub kind: DiagnosticKind,
    /// Node concerned, if any
    pub node: Option<NodeId>,
    /// Human-readable description
    pub message: String,
}

impl Diagnostic {
    /// Skipped chunk
    pub fn unknown_chunk(tag: &str, path: &[String], length: u32) -> Self {
        let location = if path.is_empty() {
            "top level".to_string()
        } else {
            path.join("/")
        };
        Self {
            severity: Severity::Info,
            kind: DiagnosticKind::UnknownChunk {
                tag: tag.to_string(),
                path: path.to_vec(),
                length,
            },
            node: None,
            message: format!("Skipped unknown chunk {tag:?} ({length} bytes) in {location}"),
        }
    }

    /// Migration anomaly on a node
    pub fn anomaly(node: Option<NodeId>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind: DiagnosticKind::MigrationAnomaly,
            node,
            message: message.into(),
        }
    }

    /// Out-of-range interpolation code
    pub fn unknown_interpolation(code: u8) -> Self {
        Self {
            severity: Severity::Warning,
            kind: DiagnosticKind::UnknownInterpolation { code },
            node: None,
            message: format!("Unknown interpolation code {code}, using Bezier"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "[{}] node {}: {}", self.severity, node, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let diag = Diagnostic::anomaly(Some(NodeId(4)), "placeholder weight");
        assert_eq!(diag.to_string(), "[warning] node 4: placeholder weight");

        let chunk = Diagnostic::unknown_chunk("XTRA", &["CORE".to_string()], 12);
        assert_eq!(chunk.severity, Severity::Info);
        assert!(chunk.message.contains("CORE"));
    }
}
