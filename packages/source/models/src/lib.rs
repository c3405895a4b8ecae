#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Seismic hazard area source model types.
//!
//! An [`AreaSource`] describes a polygonal region of distributed seismicity
//! together with its magnitude-frequency distribution, nodal-plane
//! distribution and hypocentral-depth distribution. These types are shared by
//! the NRML document reader/writer and the shapefile attribute codec.

pub mod overrides;
pub mod placeholders;

use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use overrides::SourceOverrides;
pub use placeholders::Placeholders;

/// Tolerance used when checking that a distribution's probabilities sum
/// to one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// An ordered collection of area sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceModel {
    /// Optional model name (the NRML `sourceModel/@name` attribute).
    pub name: Option<String>,
    /// Sources in document order.
    pub sources: Vec<AreaSource>,
}

impl SourceModel {
    /// Creates a named source model.
    #[must_use]
    pub fn new(name: Option<String>, sources: Vec<AreaSource>) -> Self {
        Self { name, sources }
    }

    /// Iterates over the sources whose MFD is of the given kind.
    pub fn sources_of_kind(&self, kind: MfdKind) -> impl Iterator<Item = &AreaSource> {
        self.sources.iter().filter(move |s| s.mfd.kind() == kind)
    }
}

/// A seismic source with distributed seismicity over a polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaSource {
    /// Source identifier, unique within a model.
    pub id: String,
    /// Human-readable source name.
    pub name: String,
    /// Tectonic region type (e.g. "Active Shallow Crust").
    pub tectonic_region: String,
    /// Polygon boundary and seismogenic depth bounds.
    pub geometry: AreaGeometry,
    /// Magnitude scaling relationship name (e.g. "WC1994").
    pub magnitude_scaling_relation: String,
    /// Rupture aspect ratio (length / width).
    pub rupture_aspect_ratio: f64,
    /// Magnitude-frequency distribution.
    pub mfd: Mfd,
    /// Nodal-plane distribution.
    pub nodal_plane_distribution: Vec<NodalPlane>,
    /// Hypocentral-depth distribution.
    pub hypocentral_depth_distribution: Vec<HypocentralDepth>,
}

impl AreaSource {
    /// Sum of the nodal-plane probabilities.
    #[must_use]
    pub fn nodal_plane_probability(&self) -> f64 {
        self.nodal_plane_distribution
            .iter()
            .map(|plane| plane.probability)
            .sum()
    }

    /// Sum of the hypocentral-depth probabilities.
    #[must_use]
    pub fn hypo_depth_probability(&self) -> f64 {
        self.hypocentral_depth_distribution
            .iter()
            .map(|depth| depth.probability)
            .sum()
    }

    /// Logs a warning for each distribution whose probabilities do not sum
    /// to one. Returns `true` when both distributions are well formed.
    ///
    /// Never fails: the sum-to-one rule is advisory.
    pub fn check_probabilities(&self) -> bool {
        let mut ok = true;

        let npd = self.nodal_plane_probability();
        if !sums_to_one(npd) {
            log::warn!(
                "Source {}: nodal plane probabilities sum to {npd}, expected 1.0",
                self.id
            );
            ok = false;
        }

        let hdd = self.hypo_depth_probability();
        if !sums_to_one(hdd) {
            log::warn!(
                "Source {}: hypocentral depth probabilities sum to {hdd}, expected 1.0",
                self.id
            );
            ok = false;
        }

        ok
    }
}

fn sums_to_one(total: f64) -> bool {
    (total - 1.0).abs() <= PROBABILITY_TOLERANCE
}

/// Polygon boundary of an area source plus its seismogenic depth range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaGeometry {
    /// Boundary as (longitude, latitude) coordinates.
    pub boundary: LineString<f64>,
    /// Upper seismogenic depth in km.
    pub upper_seismo_depth: f64,
    /// Lower seismogenic depth in km.
    pub lower_seismo_depth: f64,
}

impl AreaGeometry {
    /// Builds a geometry from `(lon, lat)` pairs.
    #[must_use]
    pub fn from_points(
        points: impl IntoIterator<Item = (f64, f64)>,
        upper_seismo_depth: f64,
        lower_seismo_depth: f64,
    ) -> Self {
        Self {
            boundary: points
                .into_iter()
                .map(|(x, y)| Coord { x, y })
                .collect(),
            upper_seismo_depth,
            lower_seismo_depth,
        }
    }

    /// Returns the boundary with the first point appended if the ring is
    /// not already closed.
    #[must_use]
    pub fn closed_boundary(&self) -> LineString<f64> {
        let mut ring = self.boundary.clone();
        ring.close();
        ring
    }
}

/// Magnitude-frequency distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mfd {
    /// Doubly truncated Gutenberg-Richter distribution.
    TruncatedGutenbergRichter {
        /// Gutenberg-Richter a-value.
        a_value: f64,
        /// Gutenberg-Richter b-value.
        b_value: f64,
        /// Lower magnitude bound.
        min_magnitude: f64,
        /// Upper magnitude bound.
        max_magnitude: f64,
    },
    /// Discrete occurrence rates per magnitude bin.
    Incremental {
        /// Magnitude at the center of the first bin.
        min_magnitude: f64,
        /// Width of each magnitude bin.
        bin_width: f64,
        /// Annual occurrence rate per bin, in increasing magnitude order.
        occurrence_rates: Vec<f64>,
    },
}

impl Mfd {
    /// Returns the variant discriminator.
    #[must_use]
    pub const fn kind(&self) -> MfdKind {
        match self {
            Self::TruncatedGutenbergRichter { .. } => MfdKind::TruncatedGutenbergRichter,
            Self::Incremental { .. } => MfdKind::Incremental,
        }
    }
}

/// Fieldless discriminator for [`Mfd`] variants.
///
/// The string form is the `mfd_type` value stored in shapefile attribute
/// tables.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
pub enum MfdKind {
    /// `truncGutenbergRichterMFD`
    #[strum(serialize = "truncGutenbergRichterMFD")]
    TruncatedGutenbergRichter,
    /// `IncrementalMFD`
    #[strum(serialize = "IncrementalMFD")]
    Incremental,
}

impl MfdKind {
    /// Every variant, in output-table order.
    pub const ALL: &[Self] = &[Self::Incremental, Self::TruncatedGutenbergRichter];

    /// Suffix used to name the output table holding sources of this kind.
    #[must_use]
    pub const fn table_suffix(self) -> &'static str {
        match self {
            Self::TruncatedGutenbergRichter => "as_trgr",
            Self::Incremental => "as_incr",
        }
    }
}

/// One weighted nodal plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodalPlane {
    /// Weight of this plane within the distribution.
    pub probability: f64,
    /// Strike in degrees.
    pub strike: f64,
    /// Dip in degrees.
    pub dip: f64,
    /// Rake in degrees.
    pub rake: f64,
}

/// One weighted hypocentral depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypocentralDepth {
    /// Weight of this depth within the distribution.
    pub probability: f64,
    /// Depth in km.
    pub depth: f64,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn sample_source() -> AreaSource {
        AreaSource {
            id: "1".to_string(),
            name: "Sample".to_string(),
            tectonic_region: "Active Shallow Crust".to_string(),
            geometry: AreaGeometry::from_points(
                [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)],
                0.0,
                20.0,
            ),
            magnitude_scaling_relation: "WC1994".to_string(),
            rupture_aspect_ratio: 2.0,
            mfd: Mfd::TruncatedGutenbergRichter {
                a_value: 3.0,
                b_value: 1.0,
                min_magnitude: 4.0,
                max_magnitude: 7.0,
            },
            nodal_plane_distribution: vec![
                NodalPlane {
                    probability: 0.3,
                    strike: 0.0,
                    dip: 90.0,
                    rake: 0.0,
                },
                NodalPlane {
                    probability: 0.7,
                    strike: 90.0,
                    dip: 45.0,
                    rake: 90.0,
                },
            ],
            hypocentral_depth_distribution: vec![HypocentralDepth {
                probability: 1.0,
                depth: 10.0,
            }],
        }
    }

    #[test]
    fn mfd_kind_strings_match_table_discriminators() {
        assert_eq!(
            MfdKind::TruncatedGutenbergRichter.as_ref(),
            "truncGutenbergRichterMFD"
        );
        assert_eq!(MfdKind::Incremental.to_string(), "IncrementalMFD");
        assert_eq!(
            MfdKind::from_str("IncrementalMFD").ok(),
            Some(MfdKind::Incremental)
        );
        assert!(MfdKind::from_str("arbitraryMFD").is_err());
    }

    #[test]
    fn closed_boundary_appends_first_point_once() {
        let geometry = sample_source().geometry;
        let closed = geometry.closed_boundary();
        assert_eq!(closed.0.len(), 5);
        assert_eq!(closed.0.first(), closed.0.last());

        let again = AreaGeometry {
            boundary: closed.clone(),
            ..geometry
        }
        .closed_boundary();
        assert_eq!(again, closed);
    }

    #[test]
    fn probability_sums() {
        let mut source = sample_source();
        assert!(source.check_probabilities());

        source.nodal_plane_distribution[0].probability = 0.5;
        assert!((source.nodal_plane_probability() - 1.2).abs() < 1e-12);
        assert!(!source.check_probabilities());
    }

    #[test]
    fn sources_of_kind_filters_by_variant() {
        let tgr = sample_source();
        let mut incr = sample_source();
        incr.id = "2".to_string();
        incr.mfd = Mfd::Incremental {
            min_magnitude: 5.0,
            bin_width: 0.1,
            occurrence_rates: vec![0.1, 0.01],
        };
        let model = SourceModel::new(None, vec![tgr, incr]);

        let ids: Vec<&str> = model
            .sources_of_kind(MfdKind::Incremental)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["2"]);
    }
}
