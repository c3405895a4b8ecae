#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! NRML 0.4 source model documents.
//!
//! Reads and writes the `<sourceModel>` element of an OpenQuake NRML
//! document. Only area sources are modelled; point, fault and
//! characteristic sources are skipped on read.

pub mod parser;
pub mod writer;

use std::fs;
use std::io::Write as _;
use std::path::Path;

use hazard_shp_source_models::SourceModel;
use tempfile::NamedTempFile;
use thiserror::Error;

pub use parser::parse_source_model;
pub use writer::write_source_model;

/// NRML 0.4 namespace.
pub const NRML_NS: &str = "http://openquake.org/xmlns/nrml/0.4";
/// GML namespace used for geometries.
pub const GML_NS: &str = "http://www.opengis.net/gml";

/// Errors that can occur while reading or writing NRML documents.
#[derive(Debug, Error)]
pub enum NrmlError {
    /// File could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not well-formed XML.
    #[error("XML error: {message}")]
    Xml {
        /// Parser error with position.
        message: String,
    },

    /// The XML is well formed but does not describe a valid source model.
    #[error("Malformed source model: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },

    /// Serialization failed.
    #[error("XML write error: {message}")]
    Write {
        /// Description of what went wrong.
        message: String,
    },
}

/// Reads a source model from an NRML file.
///
/// # Errors
///
/// Returns [`NrmlError`] if the file cannot be read or parsed.
pub fn read_source_model(path: impl AsRef<Path>) -> Result<SourceModel, NrmlError> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path)?;
    let model = parse_source_model(&xml)?;
    log::info!(
        "Read {} area sources from {}",
        model.sources.len(),
        path.display()
    );
    Ok(model)
}

/// Writes a source model to an NRML file.
///
/// The document is written to a temporary file next to `path` and renamed
/// into place, so `path` is either the complete document or untouched.
///
/// # Errors
///
/// Returns [`NrmlError`] if serialization or the file write fails.
pub fn write_source_model_to_path(
    model: &SourceModel,
    path: impl AsRef<Path>,
) -> Result<(), NrmlError> {
    let path = path.as_ref();
    let xml = write_source_model(model)?;

    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(xml.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    log::info!(
        "Wrote {} area sources to {}",
        model.sources.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.xml");
        let model = parse_source_model(parser::tests::SAMPLE).unwrap();

        write_source_model_to_path(&model, &path).unwrap();
        let reread = read_source_model(&path).unwrap();

        assert_eq!(reread, model);
    }

    #[test]
    fn write_replaces_existing_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.xml");
        fs::write(&path, "stale").unwrap();
        let model = parse_source_model(parser::tests::SAMPLE).unwrap();

        write_source_model_to_path(&model, &path).unwrap();

        assert_eq!(read_source_model(&path).unwrap(), model);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("model.xml");
        let model = parse_source_model(parser::tests::SAMPLE).unwrap();

        let err = write_source_model_to_path(&model, &path).unwrap_err();

        assert!(matches!(err, NrmlError::Io(_)));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_source_model(dir.path().join("missing.xml")).unwrap_err();
        assert!(matches!(err, NrmlError::Io(_)));
    }
}
