// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document persistence for KexEdit.
//!
//! This crate reads and writes track documents:
//! - the chunked KEXD container (`CORE` > `GRPH` + `DATA`, plus `UIST`)
//! - the monolithic legacy format, versions 1 to 7, with migration
//! - validation and parity checks between documents
//! - a flat export for the simulation engine

pub mod chunk;
pub mod config;
pub mod cursor;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod ffi;
pub mod graph_codec;
pub mod kexd;
pub mod legacy;
pub mod migration;
pub mod property_codec;
pub mod ui_state;
pub mod validation;

pub use config::{MigrationConfig, PersistenceConfig, ValidationConfig, CONFIG_FORMAT_VERSION};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use document::{Decoded, Document, DurationType};
pub use error::{FormatError, FormatResult, PersistenceError, Result};
pub use ffi::{DocumentCounts, EngineError, EngineHandle, FlatDocument, SimulationEngine};
pub use kexd::{decode, decode_any, encode, is_kexd, load_document, save_document};
pub use migration::migrate;
pub use ui_state::{KeyframeUiState, UiState};
pub use validation::{
    compare, override_report, validate, Finding, FindingKind, OverrideEntry, ParityReport, ValidationReport,
};
