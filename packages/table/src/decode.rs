//! Rebuilds an [`AreaSource`] from one attribute-table row.
//!
//! The `num_npd`/`num_hdd` columns may hold the table-wide maximum rather
//! than the row's own count, so the numbered columns are read up to that
//! count and unset slots are skipped.

use std::str::FromStr;

use geo::LineString;
use hazard_shp_source_models::{
    AreaGeometry, AreaSource, HypocentralDepth, Mfd, MfdKind, NodalPlane, Placeholders,
};

use crate::DecodeError;
use crate::record::{FieldValue, FlatRecord};
use crate::schema::{FieldNames, numbered};

/// How much of the row to trust.
#[derive(Debug, Clone, Copy)]
pub enum DecodeMode<'a> {
    /// Decode every attribute.
    Full,
    /// Keep only the ring; fill everything else from the placeholders.
    GeometryOnly(&'a Placeholders),
}

/// Rebuilds a source from its attributes and polygon ring.
///
/// The ring is kept as read, closing point included.
///
/// # Errors
///
/// * [`DecodeError::MissingField`] if a required attribute is unset, or a
///   numbered slot is only partially populated
/// * [`DecodeError::UnknownMfdType`] if `mfd_type` names no known variant
/// * [`DecodeError::InvalidCount`] if a `num_*` column is not a
///   non-negative whole number
pub fn decode(
    attributes: &FlatRecord,
    ring: &LineString<f64>,
    mode: DecodeMode<'_>,
) -> Result<AreaSource, DecodeError> {
    if let DecodeMode::GeometryOnly(placeholders) = mode {
        return Ok(placeholders.source(ring.clone()));
    }

    Ok(AreaSource {
        id: text(attributes, FieldNames::SRC_ID),
        name: text(attributes, FieldNames::SRC_NAME),
        tectonic_region: text(attributes, FieldNames::TECT_REG),
        geometry: AreaGeometry {
            boundary: ring.clone(),
            upper_seismo_depth: real(attributes, FieldNames::UPP_SEISMO)?,
            lower_seismo_depth: real(attributes, FieldNames::LOW_SEISMO)?,
        },
        magnitude_scaling_relation: text(attributes, FieldNames::MAG_SCAL_R),
        rupture_aspect_ratio: real(attributes, FieldNames::RUP_ASP_RA)?,
        mfd: decode_mfd(attributes)?,
        nodal_plane_distribution: decode_nodal_planes(attributes)?,
        hypocentral_depth_distribution: decode_hypo_depths(attributes)?,
    })
}

fn decode_mfd(attributes: &FlatRecord) -> Result<Mfd, DecodeError> {
    let raw = text(attributes, FieldNames::MFD_TYPE);
    let kind = MfdKind::from_str(raw.trim())
        .map_err(|_| DecodeError::UnknownMfdType { value: raw.clone() })?;

    Ok(match kind {
        MfdKind::TruncatedGutenbergRichter => Mfd::TruncatedGutenbergRichter {
            a_value: real(attributes, FieldNames::A_VALUE)?,
            b_value: real(attributes, FieldNames::B_VALUE)?,
            min_magnitude: real(attributes, FieldNames::MIN_MAG)?,
            max_magnitude: real(attributes, FieldNames::MAX_MAG)?,
        },
        MfdKind::Incremental => {
            let bins = count(attributes, FieldNames::NUM_BINS)?;
            Mfd::Incremental {
                min_magnitude: real(attributes, FieldNames::MIN_MAG)?,
                bin_width: real(attributes, FieldNames::BIN_WIDTH)?,
                // Bins are positional; a gap inside `num_bins` is an error.
                occurrence_rates: (1..=bins)
                    .map(|i| real(attributes, &numbered(FieldNames::OR_PREFIX, i)))
                    .collect::<Result<Vec<_>, DecodeError>>()?,
            }
        }
    })
}

fn decode_nodal_planes(attributes: &FlatRecord) -> Result<Vec<NodalPlane>, DecodeError> {
    let slots = populated_slots(
        attributes,
        FieldNames::NUM_NPD,
        &[
            FieldNames::WEIGHT_PREFIX,
            FieldNames::STRIKE_PREFIX,
            FieldNames::RAKE_PREFIX,
            FieldNames::DIP_PREFIX,
        ],
    )?;
    let mut planes = Vec::new();

    for i in 1..=slots {
        let names = [
            numbered(FieldNames::WEIGHT_PREFIX, i),
            numbered(FieldNames::STRIKE_PREFIX, i),
            numbered(FieldNames::RAKE_PREFIX, i),
            numbered(FieldNames::DIP_PREFIX, i),
        ];
        let values = names.each_ref().map(|name| optional_real(attributes, name));

        match values {
            [None, None, None, None] => {}
            [Some(probability), Some(strike), Some(rake), Some(dip)] => planes.push(NodalPlane {
                probability,
                strike,
                dip,
                rake,
            }),
            _ => {
                let missing = values
                    .iter()
                    .position(Option::is_none)
                    .map_or_else(String::new, |at| names[at].clone());
                return Err(DecodeError::MissingField { field: missing });
            }
        }
    }

    Ok(planes)
}

fn decode_hypo_depths(attributes: &FlatRecord) -> Result<Vec<HypocentralDepth>, DecodeError> {
    let slots = populated_slots(
        attributes,
        FieldNames::NUM_HDD,
        &[FieldNames::HDD_DEPTH_PREFIX, FieldNames::HDD_WEIGHT_PREFIX],
    )?;
    let mut depths = Vec::new();

    for i in 1..=slots {
        let depth_field = numbered(FieldNames::HDD_DEPTH_PREFIX, i);
        let Some(depth) = optional_real(attributes, &depth_field) else {
            log::debug!("No value in {depth_field}, skipping");
            continue;
        };
        let probability = real(attributes, &numbered(FieldNames::HDD_WEIGHT_PREFIX, i))?;
        depths.push(HypocentralDepth { probability, depth });
    }

    Ok(depths)
}

/// Number of numbered slots to scan: the `count_field` value, capped at the
/// highest index of any populated `<prefix>_<i>` cell. Table-maximum counts
/// routinely exceed the row's own slots.
fn populated_slots(
    attributes: &FlatRecord,
    count_field: &str,
    prefixes: &[&str],
) -> Result<usize, DecodeError> {
    let declared = count(attributes, count_field)?;
    let highest = attributes
        .keys()
        .filter_map(|key| {
            let (prefix, index) = key.rsplit_once('_')?;
            if prefixes.contains(&prefix) {
                index.parse::<usize>().ok()
            } else {
                None
            }
        })
        .max()
        .unwrap_or(0);
    Ok(declared.min(highest))
}

/// Unset string cells decode to an empty string.
fn text(attributes: &FlatRecord, field: &str) -> String {
    attributes
        .get(field)
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn optional_real(attributes: &FlatRecord, field: &str) -> Option<f64> {
    attributes.get(field).and_then(FieldValue::as_f64)
}

fn real(attributes: &FlatRecord, field: &str) -> Result<f64, DecodeError> {
    optional_real(attributes, field).ok_or_else(|| DecodeError::MissingField {
        field: field.to_string(),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count(attributes: &FlatRecord, field: &str) -> Result<usize, DecodeError> {
    let value = real(attributes, field)?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(DecodeError::InvalidCount {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value as usize)
}
