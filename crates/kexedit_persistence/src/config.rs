// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistence settings.
//!
//! Stored as RON. A file written by a newer version is rejected rather than
//! silently reinterpreted.

use crate::error::{PersistenceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Validation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Largest scalar difference parity still treats as equal
    pub parity_tolerance: f32,
    /// Grid size used to detect overlapping node positions
    pub position_rounding: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            parity_tolerance: 0.001,
            position_rounding: 0.1,
        }
    }
}

/// Legacy migration behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Value given to Bridge weight ports missing from old files
    pub bridge_weight_default: f32,
    /// Merge Roll/Pitch/Yaw ports into a single Rotation port
    pub consolidate_rotation: bool,
    /// Infer override flags from keyframes and ports
    pub reconstruct_overrides: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            bridge_weight_default: 0.3,
            consolidate_rotation: true,
            reconstruct_overrides: true,
        }
    }
}

/// Complete persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Settings format version
    pub version: u32,
    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Migration settings
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            validation: ValidationConfig::default(),
            migration: MigrationConfig::default(),
        }
    }
}

impl PersistenceConfig {
    /// Parse settings from RON text
    pub fn from_ron(content: &str) -> Result<Self> {
        let config: PersistenceConfig =
            ron::from_str(content).map_err(|e| PersistenceError::Config(e.to_string()))?;

        if config.version > CONFIG_FORMAT_VERSION {
            return Err(PersistenceError::ConfigVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }

        Ok(config)
    }

    /// Serialize settings to RON text
    pub fn to_ron(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        ron::ser::to_string_pretty(self, pretty).map_err(|e| PersistenceError::Config(e.to_string()))
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
        Self::from_ron(&content)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_ron()?;
        std::fs::write(path, content).map_err(|e| PersistenceError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PersistenceConfig::default();
        assert_eq!(config.version, CONFIG_FORMAT_VERSION);
        assert_eq!(config.migration.bridge_weight_default, 0.3);
        assert_eq!(config.validation.parity_tolerance, 0.001);
    }

    #[test]
    fn test_ron_roundtrip() {
        let mut config = PersistenceConfig::default();
        config.migration.consolidate_rotation = false;
        let text = config.to_ron().unwrap();
        assert_eq!(PersistenceConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_config() {
        let config = PersistenceConfig::from_ron("(version: 1, migration: (bridge_weight_default: 0.5))").unwrap();
        assert_eq!(config.migration.bridge_weight_default, 0.5);
        assert!(config.migration.reconstruct_overrides);
        assert_eq!(config.validation, ValidationConfig::default());
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = PersistenceConfig::from_ron("(version: 9)").unwrap_err();
        assert!(matches!(err, PersistenceError::ConfigVersion { found: 9, supported: 1 }));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("kexedit-config-{}.ron", std::process::id()));
        let config = PersistenceConfig::default();
        config.save(&path).unwrap();
        assert_eq!(PersistenceConfig::load(&path).unwrap(), config);
        std::fs::remove_file(&path).unwrap();
    }
}
