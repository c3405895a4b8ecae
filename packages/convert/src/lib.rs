#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Conversion pipelines between hazard source models and shapefiles.
//!
//! The write path groups sources by MFD variant, derives one attribute
//! schema per group and writes one shapefile per group. The read path
//! decodes every feature of a single shapefile back into area sources.

pub mod config;
pub mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hazard_shp_nrml::NrmlError;
use hazard_shp_source_models::{AreaSource, MfdKind, SourceModel};
use hazard_shp_table::{
    AttributeSchema, DecodeMode, Driver, ShapefileReader, ShapefileWriter, TableError, decode,
    encode,
};
use thiserror::Error;

use crate::config::{ReadConfig, WriteConfig};
use crate::progress::ProgressCallback;

/// Errors that can occur during a conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Shapefile access or row decoding failed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Source model document could not be read or written.
    #[error(transparent)]
    Nrml(#[from] NrmlError),

    /// I/O error outside of the table and document layers.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is invalid.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Parser error.
        message: String,
    },
}

impl ConvertError {
    /// Name of the stage that failed, for operator diagnostics.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Table(e) => e.stage(),
            Self::Nrml(NrmlError::Write { .. }) => "write",
            Self::Nrml(_) => "nrml",
            Self::Io(_) => "io",
            Self::Config { .. } => "config",
        }
    }
}

/// Reads every feature of an area source shapefile.
///
/// Sources are returned in file order. In geometry-only mode every
/// attribute except the polygon is replaced by the configured
/// placeholders. Overrides are applied last, in both modes.
///
/// # Errors
///
/// Returns [`ConvertError::Table`] if the file cannot be opened, a feature
/// cannot be read, or a row cannot be decoded.
pub fn parse_area_source_shp(
    path: impl AsRef<Path>,
    config: &ReadConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<AreaSource>, ConvertError> {
    let path = path.as_ref();
    let mut reader = ShapefileReader::open(path)?;

    let mode = if config.only_geometry {
        log::info!("Reading {} geometry only", path.display());
        DecodeMode::GeometryOnly(&config.placeholders)
    } else {
        DecodeMode::Full
    };

    let mut sources = Vec::new();
    for (index, feature) in reader.features().enumerate() {
        let feature = feature?;
        let mut source = decode(&feature.attributes, &feature.ring, mode).map_err(|e| {
            log::error!("Feature {index} of {} could not be decoded", path.display());
            TableError::from(e)
        })?;
        config.overrides.apply(&mut source);

        log::debug!("Decoded source '{}' ({})", source.id, source.mfd.kind());
        sources.push(source);
        progress.inc(1);
    }

    log::info!("Read {} area sources from {}", sources.len(), path.display());
    progress.finish(format!("Read {} area sources", sources.len()));

    Ok(sources)
}

/// Writes `model` as one shapefile per MFD variant present in it.
///
/// Each table's columns are sized for its own group of sources. Nothing is
/// left on disk if any table fails: tables already written in this call are
/// removed too.
///
/// Returns the paths of the written `.shp` files.
///
/// # Errors
///
/// Returns [`ConvertError::Table`] if the driver is unknown or a table
/// cannot be created or written.
pub fn write_shapefiles(
    model: &SourceModel,
    out_dir: impl AsRef<Path>,
    config: &WriteConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<PathBuf>, ConvertError> {
    let out_dir = out_dir.as_ref();
    let driver = Driver::by_name(&config.driver)?;

    for source in &model.sources {
        source.check_probabilities();
    }

    progress.set_total(model.sources.len() as u64);

    let mut writers = Vec::new();
    for &kind in MfdKind::ALL {
        let group: Vec<&AreaSource> = model.sources_of_kind(kind).collect();
        if group.is_empty() {
            log::debug!("No {kind} sources, skipping {} table", kind.table_suffix());
            continue;
        }

        let schema = AttributeSchema::derive(kind, group.iter().copied());
        let path = output_path(out_dir, config.prefix.as_deref(), kind.table_suffix());
        progress.set_message(format!("Writing {}", path.display()));

        let mut writer = ShapefileWriter::create(driver, &path, &schema)?;
        for source in group {
            writer.append(&encode(source, &schema, config.count_mode))?;
            progress.inc(1);
        }
        writers.push(writer);
    }

    let paths: Vec<PathBuf> = writers
        .into_iter()
        .map(|writer| {
            let path = writer.path().to_path_buf();
            let written = writer.finish();
            log::info!("Wrote {written} sources to {}", path.display());
            path
        })
        .collect();

    progress.finish(format!("Wrote {} tables", paths.len()));

    Ok(paths)
}

/// Converts an NRML source model file to shapefiles in `out_dir`.
///
/// # Errors
///
/// Returns [`ConvertError`] if the document cannot be read or any table
/// cannot be written.
pub fn nrml_to_shapefiles(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &WriteConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<PathBuf>, ConvertError> {
    let model = hazard_shp_nrml::read_source_model(input)?;
    write_shapefiles(&model, out_dir, config, progress)
}

/// Converts an area source shapefile to an NRML source model file.
///
/// The model is named `name`, or after the input file stem when `None`.
///
/// # Errors
///
/// Returns [`ConvertError`] if the shapefile cannot be read or the document
/// cannot be written.
pub fn shapefile_to_nrml(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    name: Option<String>,
    config: &ReadConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<SourceModel, ConvertError> {
    let input = input.as_ref();
    let sources = parse_area_source_shp(input, config, progress)?;

    let name = name.or_else(|| {
        input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    });
    let model = SourceModel::new(name, sources);

    hazard_shp_nrml::write_source_model_to_path(&model, output)?;

    Ok(model)
}

/// Path of the table holding one MFD variant, e.g. `out/model_as_trgr.shp`.
#[must_use]
pub fn output_path(out_dir: &Path, prefix: Option<&str>, suffix: &str) -> PathBuf {
    match prefix {
        Some(prefix) if !prefix.is_empty() => out_dir.join(format!("{prefix}_{suffix}.shp")),
        _ => out_dir.join(format!("{suffix}.shp")),
    }
}

#[cfg(test)]
mod tests {
    use hazard_shp_source_models::{
        AreaGeometry, HypocentralDepth, Mfd, NodalPlane, SourceOverrides,
    };
    use hazard_shp_table::CountMode;

    use super::*;
    use crate::progress::null_progress;

    const TOLERANCE: f64 = 1e-6;

    fn sample_source() -> AreaSource {
        AreaSource {
            id: "1".to_string(),
            name: "Sample OQ area source".to_string(),
            tectonic_region: "Active Shallow Crust".to_string(),
            geometry: AreaGeometry::from_points(
                [(-122.5, 37.5), (-122.5, 38.5), (-121.5, 38.5), (-121.5, 37.5)],
                0.0,
                20.0,
            ),
            magnitude_scaling_relation: "WC1994".to_string(),
            rupture_aspect_ratio: 2.0,
            mfd: Mfd::TruncatedGutenbergRichter {
                a_value: 3.001,
                b_value: 1.001,
                min_magnitude: 4.0,
                max_magnitude: 4.1,
            },
            nodal_plane_distribution: vec![NodalPlane {
                probability: 1.0,
                strike: 359.9,
                dip: 89.99,
                rake: 179.9,
            }],
            hypocentral_depth_distribution: vec![HypocentralDepth {
                probability: 1.0,
                depth: 10.0,
            }],
        }
    }

    fn incremental_source(id: &str, bins: usize) -> AreaSource {
        AreaSource {
            id: id.to_string(),
            mfd: Mfd::Incremental {
                min_magnitude: 5.05,
                bin_width: 0.1,
                occurrence_rates: (1..=bins).map(|i| 0.1 / i as f64).collect(),
            },
            ..sample_source()
        }
    }

    fn assert_close(actual: f64, expected: f64, what: &str) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "{what}: expected {expected}, got {actual}"
        );
    }

    fn write_config(prefix: Option<&str>) -> WriteConfig {
        WriteConfig {
            prefix: prefix.map(str::to_string),
            ..WriteConfig::default()
        }
    }

    #[test]
    fn sample_source_survives_a_shapefile() {
        let dir = tempfile::tempdir().unwrap();
        let expected = sample_source();
        let model = SourceModel::new(None, vec![expected.clone()]);

        let paths =
            write_shapefiles(&model, dir.path(), &write_config(Some("model")), &null_progress())
                .unwrap();
        assert_eq!(paths, vec![dir.path().join("model_as_trgr.shp")]);
        assert!(!dir.path().join("model_as_incr.shp").exists());

        let sources =
            parse_area_source_shp(&paths[0], &ReadConfig::default(), &null_progress()).unwrap();
        assert_eq!(sources.len(), 1);
        let actual = &sources[0];

        assert_eq!(actual.id, "1");
        assert_eq!(actual.name, "Sample OQ area source");
        assert_eq!(actual.tectonic_region, "Active Shallow Crust");
        assert_eq!(actual.magnitude_scaling_relation, "WC1994");
        assert_close(actual.rupture_aspect_ratio, 2.0, "rupture aspect ratio");
        assert_close(actual.geometry.upper_seismo_depth, 0.0, "upper depth");
        assert_close(actual.geometry.lower_seismo_depth, 20.0, "lower depth");

        let Mfd::TruncatedGutenbergRichter {
            a_value,
            b_value,
            min_magnitude,
            max_magnitude,
        } = actual.mfd
        else {
            panic!("expected TGR MFD, got {:?}", actual.mfd);
        };
        assert_close(a_value, 3.001, "a");
        assert_close(b_value, 1.001, "b");
        assert_close(min_magnitude, 4.0, "min mag");
        assert_close(max_magnitude, 4.1, "max mag");

        assert_eq!(actual.nodal_plane_distribution.len(), 1);
        let plane = actual.nodal_plane_distribution[0];
        assert_close(plane.probability, 1.0, "plane probability");
        assert_close(plane.strike, 359.9, "strike");
        assert_close(plane.dip, 89.99, "dip");
        assert_close(plane.rake, 179.9, "rake");

        assert_eq!(actual.hypocentral_depth_distribution.len(), 1);
        let depth = actual.hypocentral_depth_distribution[0];
        assert_close(depth.probability, 1.0, "depth probability");
        assert_close(depth.depth, 10.0, "depth");

        let ring = &actual.geometry.boundary;
        let expected_ring = expected.geometry.closed_boundary();
        assert_eq!(ring.0.len(), expected_ring.0.len());
        for (a, e) in ring.0.iter().zip(&expected_ring.0) {
            assert_close(a.x, e.x, "lon");
            assert_close(a.y, e.y, "lat");
        }
    }

    #[test]
    fn mixed_model_writes_one_table_per_variant() {
        let dir = tempfile::tempdir().unwrap();
        let model = SourceModel::new(
            Some("mixed".to_string()),
            vec![
                incremental_source("i3", 3),
                sample_source(),
                incremental_source("i5", 5),
            ],
        );

        let paths = write_shapefiles(&model, dir.path(), &write_config(None), &null_progress())
            .unwrap();
        assert_eq!(
            paths,
            vec![dir.path().join("as_incr.shp"), dir.path().join("as_trgr.shp")]
        );

        let incremental =
            parse_area_source_shp(&paths[0], &ReadConfig::default(), &null_progress()).unwrap();
        assert_eq!(incremental.len(), 2);
        assert_eq!(incremental[0].id, "i3");
        let Mfd::Incremental {
            occurrence_rates, ..
        } = &incremental[0].mfd
        else {
            panic!("expected incremental MFD");
        };
        assert_eq!(occurrence_rates.len(), 3);
        let Mfd::Incremental {
            occurrence_rates, ..
        } = &incremental[1].mfd
        else {
            panic!("expected incremental MFD");
        };
        assert_eq!(occurrence_rates.len(), 5);
        assert_close(occurrence_rates[4], 0.02, "fifth rate");
    }

    #[test]
    fn per_row_counts_read_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let mut wide = sample_source();
        wide.id = "wide".to_string();
        wide.nodal_plane_distribution = vec![
            NodalPlane {
                probability: 0.5,
                strike: 0.0,
                dip: 90.0,
                rake: 0.0,
            },
            NodalPlane {
                probability: 0.5,
                strike: 90.0,
                dip: 45.0,
                rake: 90.0,
            },
        ];
        let model = SourceModel::new(None, vec![wide, sample_source()]);
        let config = WriteConfig {
            count_mode: CountMode::PerRow,
            ..WriteConfig::default()
        };

        let paths = write_shapefiles(&model, dir.path(), &config, &null_progress()).unwrap();
        let sources =
            parse_area_source_shp(&paths[0], &ReadConfig::default(), &null_progress()).unwrap();

        assert_eq!(sources[0].nodal_plane_distribution.len(), 2);
        assert_eq!(sources[1].nodal_plane_distribution.len(), 1);
    }

    #[test]
    fn empty_model_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_shapefiles(
            &SourceModel::default(),
            dir.path(),
            &WriteConfig::default(),
            &null_progress(),
        )
        .unwrap();

        assert!(paths.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unknown_driver_fails_before_creating_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = WriteConfig {
            driver: "GeoJSON".to_string(),
            ..WriteConfig::default()
        };
        let model = SourceModel::new(None, vec![sample_source()]);

        let err = write_shapefiles(&model, dir.path(), &config, &null_progress()).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Table(TableError::DriverUnavailable { .. })
        ));
        assert_eq!(err.stage(), "create");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn geometry_only_read_applies_placeholders_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let model = SourceModel::new(None, vec![sample_source()]);
        let paths = write_shapefiles(&model, dir.path(), &write_config(None), &null_progress())
            .unwrap();

        let config = ReadConfig {
            only_geometry: true,
            overrides: SourceOverrides {
                tectonic_region: Some("Stable Continental Crust".to_string()),
                ..SourceOverrides::default()
            },
            ..ReadConfig::default()
        };
        let sources = parse_area_source_shp(&paths[0], &config, &null_progress()).unwrap();
        let source = &sources[0];

        assert_eq!(source.id, "Null");
        assert_eq!(source.tectonic_region, "Stable Continental Crust");
        assert_close(source.rupture_aspect_ratio, 0.1, "placeholder aspect ratio");
        assert_eq!(source.nodal_plane_distribution.len(), 1);
        assert_close(
            source.nodal_plane_distribution[0].probability,
            1.0,
            "plane probability",
        );
        assert_eq!(source.hypocentral_depth_distribution.len(), 1);
        assert_close(
            source.hypocentral_depth_distribution[0].probability,
            1.0,
            "depth probability",
        );
    }

    #[test]
    fn missing_shapefile_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_area_source_shp(
            dir.path().join("pippo.shp"),
            &ReadConfig::default(),
            &null_progress(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ConvertError::Table(TableError::NotFound { .. })
        ));
        assert_eq!(err.stage(), "open");
    }

    #[test]
    fn nrml_round_trips_through_shapefiles() {
        let dir = tempfile::tempdir().unwrap();
        let model = SourceModel::new(
            Some("round trip".to_string()),
            vec![sample_source(), incremental_source("2", 4)],
        );
        let xml_in = dir.path().join("in.xml");
        hazard_shp_nrml::write_source_model_to_path(&model, &xml_in).unwrap();

        let out_dir = dir.path().join("shp");
        let paths =
            nrml_to_shapefiles(&xml_in, &out_dir, &write_config(Some("rt")), &null_progress())
                .unwrap();
        assert_eq!(paths.len(), 2);

        let xml_out = dir.path().join("out.xml");
        let converted = shapefile_to_nrml(
            &paths[1],
            &xml_out,
            None,
            &ReadConfig::default(),
            &null_progress(),
        )
        .unwrap();
        assert_eq!(converted.name.as_deref(), Some("rt_as_trgr"));

        let reread = hazard_shp_nrml::read_source_model(&xml_out).unwrap();
        assert_eq!(reread.sources.len(), 1);
        assert_eq!(reread.sources[0].id, "1");
        assert_eq!(reread.sources[0].mfd.kind(), MfdKind::TruncatedGutenbergRichter);
        assert_eq!(reread.sources[0].geometry.boundary.0.len(), 4);
    }

    #[test]
    fn output_paths_follow_prefix() {
        let dir = Path::new("out");
        assert_eq!(
            output_path(dir, Some("model"), "as_trgr"),
            Path::new("out/model_as_trgr.shp")
        );
        assert_eq!(output_path(dir, None, "as_incr"), Path::new("out/as_incr.shp"));
        assert_eq!(output_path(dir, Some(""), "as_incr"), Path::new("out/as_incr.shp"));
    }
}
