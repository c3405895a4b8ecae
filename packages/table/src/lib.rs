#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flat attribute-table encoding of area sources.
//!
//! A shapefile attribute table has a fixed set of columns, while an area
//! source carries variable-length distributions (nodal planes, hypocentral
//! depths, MFD bins). [`schema`] scans a set of sources for the largest of
//! each distribution and lays out enough numbered columns to hold all of
//! them; [`encode`] and [`decode`] move single sources in and out of that
//! layout; [`shapefile_io`] persists the records next to their polygons.

pub mod decode;
pub mod encode;
pub mod record;
pub mod schema;
pub mod shapefile_io;

use std::path::PathBuf;

use thiserror::Error;

pub use decode::{DecodeMode, decode};
pub use encode::{CountMode, EncodedFeature, encode};
pub use record::{FieldValue, FlatRecord};
pub use schema::{AttributeSchema, Column, ColumnKind, FieldNames, SchemaMaxima};
pub use shapefile_io::{Driver, ShapefileReader, ShapefileWriter};

/// Errors raised while turning a flat record back into a source.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A required field is absent or null.
    #[error("Missing field: {field}")]
    MissingField {
        /// Column name.
        field: String,
    },

    /// The `mfd_type` column holds a discriminator no variant matches.
    #[error("Unknown MFD type: '{value}'")]
    UnknownMfdType {
        /// Raw column value.
        value: String,
    },

    /// A `num_*` column is negative or not integral.
    #[error("Invalid count in {field}: {value}")]
    InvalidCount {
        /// Column name.
        field: String,
        /// Raw column value.
        value: String,
    },
}

/// Errors that can occur while reading or writing attribute tables.
#[derive(Debug, Error)]
pub enum TableError {
    /// The input path does not reference an existing file.
    #[error("Shapefile not found: {}", path.display())]
    NotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The storage driver rejected the input path.
    #[error("Cannot open shapefile {}: {message}", path.display())]
    OpenFailure {
        /// Requested path.
        path: PathBuf,
        /// Driver error.
        message: String,
    },

    /// The requested storage driver is not registered.
    #[error("Driver not available: {name}")]
    DriverUnavailable {
        /// Requested driver name.
        name: String,
    },

    /// The output table could not be created.
    #[error("Cannot create shapefile {}: {message}", path.display())]
    CreateFailure {
        /// Output path.
        path: PathBuf,
        /// Driver error.
        message: String,
    },

    /// A feature or field write was rejected.
    #[error("Failed to write feature to {}: {message}", path.display())]
    WriteFailure {
        /// Output path.
        path: PathBuf,
        /// Driver error.
        message: String,
    },

    /// A feature could not be read from an opened table.
    #[error("Failed to read feature from {}: {message}", path.display())]
    ReadFailure {
        /// Input path.
        path: PathBuf,
        /// Driver error.
        message: String,
    },

    /// A feature holds something other than a polygon.
    #[error("Unsupported geometry in {}: {shape}", path.display())]
    UnsupportedGeometry {
        /// Input path.
        path: PathBuf,
        /// Shape type found.
        shape: String,
    },

    /// A feature's attributes could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl TableError {
    /// Name of the stage that failed, for operator diagnostics.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::OpenFailure { .. } => "open",
            Self::DriverUnavailable { .. } | Self::CreateFailure { .. } => "create",
            Self::WriteFailure { .. } => "write",
            Self::ReadFailure { .. } | Self::UnsupportedGeometry { .. } => "read",
            Self::Decode(_) => "decode",
        }
    }
}
