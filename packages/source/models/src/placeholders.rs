//! Neutral values used when only the geometry of a source is read.
//!
//! A geometry-only read ignores the attribute table entirely, yet still has
//! to produce complete [`AreaSource`] values. [`Placeholders`] names every
//! value that fills the gaps so callers can see (and configure) them.

use geo::LineString;
use serde::{Deserialize, Serialize};

use crate::{AreaGeometry, AreaSource, HypocentralDepth, Mfd, NodalPlane};

/// Values substituted for everything but the boundary on a geometry-only
/// read.
///
/// Built once per read and shared across every feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placeholders {
    /// Source id.
    pub id: String,
    /// Source name.
    pub name: String,
    /// Tectonic region type.
    pub tectonic_region: String,
    /// Magnitude scaling relationship.
    pub magnitude_scaling_relation: String,
    /// Rupture aspect ratio.
    pub rupture_aspect_ratio: f64,
    /// Upper seismogenic depth.
    pub upper_seismo_depth: f64,
    /// Lower seismogenic depth.
    pub lower_seismo_depth: f64,
    /// Magnitude-frequency distribution.
    pub mfd: Mfd,
    /// Strike of the single nodal plane.
    pub strike: f64,
    /// Dip of the single nodal plane.
    pub dip: f64,
    /// Rake of the single nodal plane.
    pub rake: f64,
    /// Depth of the single hypocentral depth.
    pub depth: f64,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            id: "Null".to_string(),
            name: "Null".to_string(),
            tectonic_region: "Null".to_string(),
            magnitude_scaling_relation: "Null".to_string(),
            rupture_aspect_ratio: 0.1,
            upper_seismo_depth: 0.0,
            lower_seismo_depth: 1.0,
            mfd: Mfd::TruncatedGutenbergRichter {
                a_value: 1.0,
                b_value: 1.0,
                min_magnitude: 4.0,
                max_magnitude: 4.1,
            },
            strike: 0.0,
            dip: 0.0,
            rake: 0.0,
            depth: 1.0,
        }
    }
}

impl Placeholders {
    /// Builds a placeholder source around `boundary`.
    ///
    /// The nodal-plane and hypocentral-depth distributions always hold
    /// exactly one entry with probability 1.0.
    #[must_use]
    pub fn source(&self, boundary: LineString<f64>) -> AreaSource {
        AreaSource {
            id: self.id.clone(),
            name: self.name.clone(),
            tectonic_region: self.tectonic_region.clone(),
            geometry: AreaGeometry {
                boundary,
                upper_seismo_depth: self.upper_seismo_depth,
                lower_seismo_depth: self.lower_seismo_depth,
            },
            magnitude_scaling_relation: self.magnitude_scaling_relation.clone(),
            rupture_aspect_ratio: self.rupture_aspect_ratio,
            mfd: self.mfd.clone(),
            nodal_plane_distribution: vec![NodalPlane {
                probability: 1.0,
                strike: self.strike,
                dip: self.dip,
                rake: self.rake,
            }],
            hypocentral_depth_distribution: vec![HypocentralDepth {
                probability: 1.0,
                depth: self.depth,
            }],
        }
    }
}
