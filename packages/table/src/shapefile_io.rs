//! ESRI shapefile storage for flattened area sources.
//!
//! Wraps the `shapefile` crate (and the `dbase` crate it re-exports) behind
//! a reader that yields [`EncodedFeature`]s and a writer that accepts them.
//! The writer removes everything it created unless [`ShapefileWriter::finish`]
//! is reached, so an aborted conversion never leaves a half-written table.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use geo::{Coord, LineString};
use shapefile::dbase::{FieldName, FieldValue as DbfValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing, Shape};

use crate::TableError;
use crate::encode::EncodedFeature;
use crate::record::{FieldValue, FlatRecord};
use crate::schema::{AttributeSchema, Column, ColumnKind};

/// Width of integer (count) columns.
const INTEGER_WIDTH: u8 = 9;
/// Width of real columns.
const REAL_WIDTH: u8 = 24;
/// Decimal places of real columns.
const REAL_DECIMALS: u8 = 15;

/// Contents of the `.prj` sidecar. Coordinates are WGS84 lon/lat.
const WGS84_PRJ: &str = "GEOGCS[\"GCS_WGS_1984\",DATUM[\"D_WGS_1984\",\
SPHEROID[\"WGS_1984\",6378137.0,298.257223563]],PRIMEM[\"Greenwich\",0.0],\
UNIT[\"Degree\",0.0174532925199433]]";

/// Sidecar extensions written next to the `.shp` file.
const SIDECAR_EXTENSIONS: &[&str] = &["shp", "shx", "dbf", "prj"];

/// Registered storage drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// ESRI shapefile (`.shp` + `.shx` + `.dbf`).
    EsriShapefile,
}

impl Driver {
    /// Name of the ESRI shapefile driver.
    pub const ESRI_SHAPEFILE: &'static str = "ESRI Shapefile";

    /// Looks up a driver by name.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::DriverUnavailable`] for unknown names.
    pub fn by_name(name: &str) -> Result<Self, TableError> {
        match name {
            Self::ESRI_SHAPEFILE => Ok(Self::EsriShapefile),
            _ => Err(TableError::DriverUnavailable {
                name: name.to_string(),
            }),
        }
    }

    /// Driver name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EsriShapefile => Self::ESRI_SHAPEFILE,
        }
    }
}

/// An opened shapefile.
pub struct ShapefileReader {
    path: PathBuf,
    reader: shapefile::Reader<BufReader<File>, BufReader<File>>,
}

impl ShapefileReader {
    /// Opens the shapefile at `path` (and its `.shx`/`.dbf` sidecars).
    ///
    /// # Errors
    ///
    /// * [`TableError::NotFound`] if `path` is not an existing file
    /// * [`TableError::OpenFailure`] if the files cannot be parsed as a
    ///   shapefile
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TableError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let reader =
            shapefile::Reader::from_path(path).map_err(|e| TableError::OpenFailure {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        log::debug!("Opened {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            reader,
        })
    }

    /// Path of the `.shp` file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the features in file order.
    ///
    /// The iterator is single pass: once drained, the reader has nothing
    /// left to yield.
    pub fn features(&mut self) -> impl Iterator<Item = Result<EncodedFeature, TableError>> + '_ {
        let path = &self.path;
        self.reader
            .iter_shapes_and_records()
            .map(move |item| match item {
                Ok((shape, record)) => to_feature(path, shape, record),
                Err(e) => Err(TableError::ReadFailure {
                    path: path.clone(),
                    message: e.to_string(),
                }),
            })
    }
}

fn to_feature(path: &Path, shape: Shape, record: Record) -> Result<EncodedFeature, TableError> {
    let ring = match shape {
        Shape::Polygon(polygon) => first_ring(path, polygon.rings(), |p| (p.x, p.y)),
        Shape::PolygonM(polygon) => first_ring(path, polygon.rings(), |p| (p.x, p.y)),
        Shape::PolygonZ(polygon) => first_ring(path, polygon.rings(), |p| (p.x, p.y)),
        other => {
            return Err(TableError::UnsupportedGeometry {
                path: path.to_path_buf(),
                shape: format!("{:?}", other.shapetype()),
            });
        }
    };

    Ok(EncodedFeature {
        attributes: flatten_record(record),
        ring,
    })
}

/// Only the first ring of a polygon is kept.
fn first_ring<P>(
    path: &Path,
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> (f64, f64),
) -> LineString<f64> {
    if rings.len() > 1 {
        log::warn!(
            "{}: polygon has {} rings, keeping the first",
            path.display(),
            rings.len()
        );
    }

    rings.first().map_or_else(
        || LineString::new(Vec::new()),
        |ring| {
            ring.points()
                .iter()
                .map(|point| {
                    let (x, y) = xy(point);
                    Coord { x, y }
                })
                .collect()
        },
    )
}

fn flatten_record(record: Record) -> FlatRecord {
    HashMap::<String, DbfValue>::from(record)
        .into_iter()
        .filter_map(|(name, value)| from_dbf_value(value).map(|value| (name, value)))
        .collect()
}

fn from_dbf_value(value: DbfValue) -> Option<FieldValue> {
    match value {
        DbfValue::Character(Some(text)) => {
            let text = text.trim();
            (!text.is_empty()).then(|| FieldValue::Text(text.to_string()))
        }
        DbfValue::Numeric(Some(number)) | DbfValue::Double(number) => {
            Some(FieldValue::Real(number))
        }
        DbfValue::Float(Some(number)) => Some(FieldValue::Real(f64::from(number))),
        DbfValue::Integer(number) => Some(FieldValue::Integer(i64::from(number))),
        _ => None,
    }
}

/// A shapefile being written.
///
/// Dropping the writer without calling [`Self::finish`] deletes every file
/// it created.
pub struct ShapefileWriter {
    path: PathBuf,
    columns: Vec<Column>,
    writer: Option<shapefile::Writer<BufWriter<File>>>,
    created: Vec<PathBuf>,
    written: usize,
    finished: bool,
}

impl ShapefileWriter {
    /// Creates the shapefile at `path` with the columns of `schema`.
    ///
    /// Missing parent directories are created. A WGS84 `.prj` is written
    /// alongside.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::CreateFailure`] if a column cannot be declared
    /// (dBase names are limited to 10 characters) or a file cannot be
    /// created.
    pub fn create(
        driver: Driver,
        path: impl AsRef<Path>,
        schema: &AttributeSchema,
    ) -> Result<Self, TableError> {
        let path = path.as_ref().to_path_buf();
        let create_failure = |message: String| TableError::CreateFailure {
            path: path.clone(),
            message,
        };

        let builder = table_builder(schema).map_err(create_failure)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| create_failure(e.to_string()))?;
            }
        }

        let mut table = Self {
            path: path.clone(),
            columns: schema.columns().to_vec(),
            writer: None,
            created: SIDECAR_EXTENSIONS
                .iter()
                .map(|ext| path.with_extension(ext))
                .collect(),
            written: 0,
            finished: false,
        };

        table.writer = Some(
            shapefile::Writer::from_path(&path, builder)
                .map_err(|e| create_failure(e.to_string()))?,
        );
        fs::write(path.with_extension("prj"), WGS84_PRJ)
            .map_err(|e| create_failure(e.to_string()))?;

        log::info!(
            "Created {} ({}, {} columns, {} numbered)",
            path.display(),
            driver.name(),
            schema.columns().len(),
            schema.numbered_column_count()
        );

        Ok(table)
    }

    /// Path of the `.shp` file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one feature. Attributes without a matching column are
    /// ignored; columns without an attribute are written as null.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::WriteFailure`] if the ring is degenerate or the
    /// storage layer rejects the feature.
    pub fn append(&mut self, feature: &EncodedFeature) -> Result<(), TableError> {
        let write_failure = |message: String| TableError::WriteFailure {
            path: self.path.clone(),
            message,
        };

        if feature.ring.0.len() < 4 {
            return Err(write_failure(format!(
                "polygon ring needs at least 4 points, got {}",
                feature.ring.0.len()
            )));
        }

        let polygon = Polygon::new(PolygonRing::Outer(
            feature
                .ring
                .coords()
                .map(|c| Point::new(c.x, c.y))
                .collect(),
        ));
        let record = to_dbf_record(&self.columns, &feature.attributes);

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| write_failure("writer already closed".to_string()))?;
        writer
            .write_shape_and_record(&polygon, &record)
            .map_err(|e| write_failure(e.to_string()))?;

        self.written += 1;
        Ok(())
    }

    /// Flushes and closes the table, keeping its files. Returns the number
    /// of features written.
    pub fn finish(mut self) -> usize {
        drop(self.writer.take());
        self.finished = true;
        log::info!("Wrote {} features to {}", self.written, self.path.display());
        self.written
    }
}

impl Drop for ShapefileWriter {
    fn drop(&mut self) {
        // Close the handles before removing the files.
        drop(self.writer.take());

        if self.finished {
            return;
        }
        for path in &self.created {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    log::warn!("Failed to remove {}: {e}", path.display());
                }
            }
        }
        log::debug!("Discarded unfinished {}", self.path.display());
    }
}

fn table_builder(schema: &AttributeSchema) -> Result<TableWriterBuilder, String> {
    let mut builder = TableWriterBuilder::new();
    for column in schema.columns() {
        let name = FieldName::try_from(column.name.as_str())
            .map_err(|e| format!("invalid field name '{}': {e:?}", column.name))?;
        builder = match column.kind {
            ColumnKind::String { width } => builder.add_character_field(name, width),
            ColumnKind::Integer => builder.add_numeric_field(name, INTEGER_WIDTH, 0),
            ColumnKind::Real => builder.add_numeric_field(name, REAL_WIDTH, REAL_DECIMALS),
        };
    }
    Ok(builder)
}

fn to_dbf_record(columns: &[Column], attributes: &FlatRecord) -> Record {
    let mut record = Record::default();
    for column in columns {
        let value = attributes.get(&column.name);
        let cell = match column.kind {
            ColumnKind::String { .. } => DbfValue::Character(value.map(ToString::to_string)),
            ColumnKind::Integer | ColumnKind::Real => {
                DbfValue::Numeric(value.and_then(FieldValue::as_f64))
            }
        };
        record.insert(column.name.clone(), cell);
    }
    record
}
