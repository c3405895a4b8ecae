//! Flattens an [`AreaSource`] into one attribute-table row.

use geo::LineString;
use hazard_shp_source_models::{AreaSource, Mfd};
use serde::{Deserialize, Serialize};

use crate::record::{FieldValue, FlatRecord};
use crate::schema::{AttributeSchema, ColumnKind, FieldNames, numbered};

/// What the `num_npd` and `num_hdd` columns report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMode {
    /// Every row reports the table-wide maximum. Readers infer the true
    /// count from the populated columns. Existing shapefiles use this form.
    #[default]
    TableMaximum,
    /// Every row reports its own distribution size.
    PerRow,
}

/// A flattened source ready to be appended to a table.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeature {
    /// Attribute cells keyed by column name. Unset cells are absent.
    pub attributes: FlatRecord,
    /// Closed polygon ring.
    pub ring: LineString<f64>,
}

/// Flattens `source` into the layout described by `schema`.
///
/// Numbered columns past the end of a distribution are left unset. Strings
/// longer than their column are truncated.
#[must_use]
pub fn encode(source: &AreaSource, schema: &AttributeSchema, counts: CountMode) -> EncodedFeature {
    let mut row = Row {
        schema,
        attributes: FlatRecord::new(),
    };

    row.text(FieldNames::SRC_ID, &source.id);
    row.text(FieldNames::SRC_NAME, &source.name);
    row.text(FieldNames::TECT_REG, &source.tectonic_region);
    row.real(FieldNames::UPP_SEISMO, source.geometry.upper_seismo_depth);
    row.real(FieldNames::LOW_SEISMO, source.geometry.lower_seismo_depth);
    row.text(FieldNames::MAG_SCAL_R, &source.magnitude_scaling_relation);
    row.real(FieldNames::RUP_ASP_RA, source.rupture_aspect_ratio);
    row.text(FieldNames::MFD_TYPE, source.mfd.kind().as_ref());

    match &source.mfd {
        Mfd::TruncatedGutenbergRichter {
            a_value,
            b_value,
            min_magnitude,
            max_magnitude,
        } => {
            row.real(FieldNames::MIN_MAG, *min_magnitude);
            row.real(FieldNames::MAX_MAG, *max_magnitude);
            row.real(FieldNames::A_VALUE, *a_value);
            row.real(FieldNames::B_VALUE, *b_value);
        }
        Mfd::Incremental {
            min_magnitude,
            bin_width,
            occurrence_rates,
        } => {
            row.real(FieldNames::MIN_MAG, *min_magnitude);
            row.real(FieldNames::BIN_WIDTH, *bin_width);
            row.count(FieldNames::NUM_BINS, occurrence_rates.len());
            for (i, rate) in occurrence_rates.iter().enumerate() {
                row.real(&numbered(FieldNames::OR_PREFIX, i + 1), *rate);
            }
        }
    }

    let maxima = schema.maxima();

    let planes = &source.nodal_plane_distribution;
    row.count(
        FieldNames::NUM_NPD,
        match counts {
            CountMode::TableMaximum => maxima.nodal_planes,
            CountMode::PerRow => planes.len(),
        },
    );
    for (i, plane) in planes.iter().enumerate() {
        let index = i + 1;
        row.real(&numbered(FieldNames::WEIGHT_PREFIX, index), plane.probability);
        row.real(&numbered(FieldNames::STRIKE_PREFIX, index), plane.strike);
        row.real(&numbered(FieldNames::RAKE_PREFIX, index), plane.rake);
        row.real(&numbered(FieldNames::DIP_PREFIX, index), plane.dip);
    }

    let depths = &source.hypocentral_depth_distribution;
    row.count(
        FieldNames::NUM_HDD,
        match counts {
            CountMode::TableMaximum => maxima.hypo_depths,
            CountMode::PerRow => depths.len(),
        },
    );
    for (i, depth) in depths.iter().enumerate() {
        let index = i + 1;
        row.real(&numbered(FieldNames::HDD_DEPTH_PREFIX, index), depth.depth);
        row.real(
            &numbered(FieldNames::HDD_WEIGHT_PREFIX, index),
            depth.probability,
        );
    }

    EncodedFeature {
        attributes: row.attributes,
        ring: source.geometry.closed_boundary(),
    }
}

struct Row<'a> {
    schema: &'a AttributeSchema,
    attributes: FlatRecord,
}

impl Row<'_> {
    fn text(&mut self, name: &str, value: &str) {
        let value = match self.schema.column(name).map(|c| c.kind) {
            Some(ColumnKind::String { width }) => {
                let clipped = truncate_to_width(value, usize::from(width));
                if clipped.len() < value.len() {
                    log::warn!("Truncating {name} value '{value}' to {width} bytes");
                }
                clipped
            }
            _ => value,
        };
        self.attributes
            .insert(name.to_string(), FieldValue::Text(value.to_string()));
    }

    fn real(&mut self, name: &str, value: f64) {
        self.attributes
            .insert(name.to_string(), FieldValue::Real(value));
    }

    fn count(&mut self, name: &str, value: usize) {
        self.attributes.insert(
            name.to_string(),
            FieldValue::Integer(i64::try_from(value).unwrap_or(i64::MAX)),
        );
    }
}

/// Longest prefix of `value` that fits in `width` bytes without splitting
/// a character.
fn truncate_to_width(value: &str, width: usize) -> &str {
    if value.len() <= width {
        return value;
    }
    let mut end = width;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
