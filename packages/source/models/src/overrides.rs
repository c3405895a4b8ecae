//! Attribute overrides applied to every source read from a table.

use serde::{Deserialize, Serialize};

use crate::{AreaSource, HypocentralDepth, Mfd, NodalPlane};

/// Values that replace the decoded ones on every parsed source.
///
/// Unset fields leave the decoded value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOverrides {
    /// Tectonic region type.
    pub tectonic_region: Option<String>,
    /// Magnitude scaling relationship.
    pub magnitude_scaling_relation: Option<String>,
    /// Rupture aspect ratio.
    pub rupture_aspect_ratio: Option<f64>,
    /// Upper seismogenic depth.
    pub upper_seismo_depth: Option<f64>,
    /// Lower seismogenic depth.
    pub lower_seismo_depth: Option<f64>,
    /// Magnitude-frequency distribution.
    pub mfd: Option<Mfd>,
    /// Nodal-plane distribution.
    pub nodal_plane_distribution: Option<Vec<NodalPlane>>,
    /// Hypocentral-depth distribution.
    pub hypocentral_depth_distribution: Option<Vec<HypocentralDepth>>,
}

impl SourceOverrides {
    /// Returns `true` when no field is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Overwrites the fields of `source` that are set here.
    pub fn apply(&self, source: &mut AreaSource) {
        if let Some(trt) = &self.tectonic_region {
            source.tectonic_region.clone_from(trt);
        }
        if let Some(msr) = &self.magnitude_scaling_relation {
            source.magnitude_scaling_relation.clone_from(msr);
        }
        if let Some(ratio) = self.rupture_aspect_ratio {
            source.rupture_aspect_ratio = ratio;
        }
        if let Some(depth) = self.upper_seismo_depth {
            source.geometry.upper_seismo_depth = depth;
        }
        if let Some(depth) = self.lower_seismo_depth {
            source.geometry.lower_seismo_depth = depth;
        }
        if let Some(mfd) = &self.mfd {
            source.mfd = mfd.clone();
        }
        if let Some(planes) = &self.nodal_plane_distribution {
            source.nodal_plane_distribution.clone_from(planes);
        }
        if let Some(depths) = &self.hypocentral_depth_distribution {
            source.hypocentral_depth_distribution.clone_from(depths);
        }
    }
}
