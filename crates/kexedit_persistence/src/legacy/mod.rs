// SPDX-License-Identifier: MIT OR Apache-2.0
//! Monolithic pre-chunk file format, versions 1 through 7.

pub mod format;
mod reader;
mod writer;

pub use format::{
    CurveData, EntityRef, FieldFlags, KeyframeLayout, LegacyDuration, LegacyEdge, LegacyFile, LegacyKeyframe,
    LegacyNode, LegacyNodeHeader, LegacyPort, LegacyVersion, NodeFlags, PointData, PropertyOverrides,
};
pub use reader::{decode_legacy, mesh_path_text};
pub use writer::encode_legacy;
