//! TOML configuration for the conversion pipelines.
//!
//! Every key is optional:
//!
//! ```toml
//! [read]
//! only_geometry = true
//!
//! [read.placeholders]
//! rupture_aspect_ratio = 1.5
//!
//! [read.overrides]
//! tectonic_region = "Active Shallow Crust"
//!
//! [write]
//! driver = "ESRI Shapefile"
//! count_mode = "per_row"
//! prefix = "model"
//! ```

use std::fs;
use std::path::Path;

use hazard_shp_source_models::{Placeholders, SourceOverrides};
use hazard_shp_table::{CountMode, Driver};
use serde::{Deserialize, Serialize};

use crate::ConvertError;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Shapefile to source model settings.
    pub read: ReadConfig,
    /// Source model to shapefile settings.
    pub write: WriteConfig,
}

impl ConvertConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Config`] if the TOML is invalid or has
    /// values of the wrong type.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConvertError> {
        toml::de::from_str(toml_str).map_err(|e| ConvertError::Config {
            message: e.to_string(),
        })
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Io`] if the file cannot be read and
    /// [`ConvertError::Config`] if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let toml_str = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&toml_str)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// How shapefile rows become sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Ignore every attribute and fill sources from `placeholders`.
    pub only_geometry: bool,
    /// Values used in geometry-only mode.
    pub placeholders: Placeholders,
    /// Values forced onto every source after decoding.
    pub overrides: SourceOverrides,
}

/// How sources become shapefile rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    /// Output table driver name.
    pub driver: String,
    /// What `num_npd`/`num_hdd` report.
    pub count_mode: CountMode,
    /// Prepended to output file names as `<prefix>_as_trgr.shp`.
    pub prefix: Option<String>,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            driver: Driver::ESRI_SHAPEFILE.to_string(),
            count_mode: CountMode::default(),
            prefix: None,
        }
    }
}
