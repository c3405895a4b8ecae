//! Attribute table layout for area sources.
//!
//! Every table starts with the same fixed columns, followed by the columns
//! of one MFD variant, followed by two repeated blocks (nodal planes and
//! hypocentral depths). The number of repetitions is the largest
//! distribution found among the sources that go into the table, so any
//! row can hold its full distribution.

use hazard_shp_source_models::{AreaSource, Mfd, MfdKind};
use serde::Serialize;

/// Names of the attribute table columns.
///
/// Repeated columns are formed with [`numbered`] from one of the `*_PREFIX`
/// constants.
pub struct FieldNames;

impl FieldNames {
    /// Source id.
    pub const SRC_ID: &'static str = "src_id";
    /// Source name.
    pub const SRC_NAME: &'static str = "src_name";
    /// Tectonic region type.
    pub const TECT_REG: &'static str = "tect_reg";
    /// Upper seismogenic depth.
    pub const UPP_SEISMO: &'static str = "upp_seismo";
    /// Lower seismogenic depth.
    pub const LOW_SEISMO: &'static str = "low_seismo";
    /// Magnitude scaling relationship.
    pub const MAG_SCAL_R: &'static str = "mag_scal_r";
    /// Rupture aspect ratio.
    pub const RUP_ASP_RA: &'static str = "rup_asp_ra";
    /// MFD discriminator.
    pub const MFD_TYPE: &'static str = "mfd_type";
    /// Minimum magnitude (both MFD variants).
    pub const MIN_MAG: &'static str = "min_mag";
    /// Maximum magnitude.
    pub const MAX_MAG: &'static str = "max_mag";
    /// Gutenberg-Richter a-value.
    pub const A_VALUE: &'static str = "a_value";
    /// Gutenberg-Richter b-value.
    pub const B_VALUE: &'static str = "b_value";
    /// Incremental MFD bin width.
    pub const BIN_WIDTH: &'static str = "bin_width";
    /// Number of populated occurrence-rate columns.
    pub const NUM_BINS: &'static str = "num_bins";
    /// Occurrence rate (`or_1`, `or_2`, ...).
    pub const OR_PREFIX: &'static str = "or";
    /// Nodal-plane count.
    pub const NUM_NPD: &'static str = "num_npd";
    /// Nodal-plane weight.
    pub const WEIGHT_PREFIX: &'static str = "weight";
    /// Nodal-plane strike.
    pub const STRIKE_PREFIX: &'static str = "strike";
    /// Nodal-plane rake.
    pub const RAKE_PREFIX: &'static str = "rake";
    /// Nodal-plane dip.
    pub const DIP_PREFIX: &'static str = "dip";
    /// Hypocentral-depth count.
    pub const NUM_HDD: &'static str = "num_hdd";
    /// Hypocentral depth.
    pub const HDD_DEPTH_PREFIX: &'static str = "hdd_d";
    /// Hypocentral-depth weight.
    pub const HDD_WEIGHT_PREFIX: &'static str = "hdd_w";
}

/// Declared width of `src_id`.
pub const SRC_ID_WIDTH: u8 = 10;
/// Declared width of `src_name` and `tect_reg`.
pub const NAME_WIDTH: u8 = 30;
/// Declared width of `mag_scal_r`.
pub const MAG_SCAL_WIDTH: u8 = 15;
/// Declared width of `mfd_type`; fits `truncGutenbergRichterMFD`.
pub const MFD_TYPE_WIDTH: u8 = 24;

/// Builds the name of the `index`-th (1-based) repeated column.
#[must_use]
pub fn numbered(prefix: &str, index: usize) -> String {
    format!("{prefix}_{index}")
}

/// Largest distribution sizes across a set of sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchemaMaxima {
    /// Most nodal planes on any source.
    pub nodal_planes: usize,
    /// Most hypocentral depths on any source.
    pub hypo_depths: usize,
    /// Most occurrence rates on any incremental MFD.
    pub mfd_bins: usize,
}

impl SchemaMaxima {
    /// Scans `sources` for the largest distributions.
    ///
    /// The result does not depend on the order of `sources`.
    #[must_use]
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a AreaSource>) -> Self {
        let mut maxima = Self::default();
        for source in sources {
            maxima.observe(source);
        }
        maxima
    }

    /// Raises each maximum to cover `source`. Never lowers one.
    pub fn observe(&mut self, source: &AreaSource) {
        self.nodal_planes = self
            .nodal_planes
            .max(source.nodal_plane_distribution.len());
        self.hypo_depths = self
            .hypo_depths
            .max(source.hypocentral_depth_distribution.len());

        match &source.mfd {
            Mfd::Incremental {
                occurrence_rates, ..
            } => {
                self.mfd_bins = self.mfd_bins.max(occurrence_rates.len());
            }
            Mfd::TruncatedGutenbergRichter { .. } => {}
        }
    }
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnKind {
    /// Character column of fixed byte width.
    String {
        /// Declared width in bytes.
        width: u8,
    },
    /// Whole number column.
    Integer,
    /// Floating point column.
    Real,
}

/// One column declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name (at most 10 characters in a dBase table).
    pub name: String,
    /// Storage type.
    pub kind: ColumnKind,
}

impl Column {
    fn string(name: &str, width: u8) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::String { width },
        }
    }

    fn integer(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Integer,
        }
    }

    fn real(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Real,
        }
    }
}

/// Ordered column list of one output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSchema {
    mfd_kind: MfdKind,
    maxima: SchemaMaxima,
    columns: Vec<Column>,
}

impl AttributeSchema {
    /// Lays out the columns for sources of `mfd_kind` with the given
    /// distribution sizes.
    #[must_use]
    pub fn build(mfd_kind: MfdKind, maxima: SchemaMaxima) -> Self {
        let mut columns = vec![
            Column::string(FieldNames::SRC_ID, SRC_ID_WIDTH),
            Column::string(FieldNames::SRC_NAME, NAME_WIDTH),
            Column::string(FieldNames::TECT_REG, NAME_WIDTH),
            Column::real(FieldNames::UPP_SEISMO),
            Column::real(FieldNames::LOW_SEISMO),
            Column::string(FieldNames::MAG_SCAL_R, MAG_SCAL_WIDTH),
            Column::real(FieldNames::RUP_ASP_RA),
            Column::string(FieldNames::MFD_TYPE, MFD_TYPE_WIDTH),
        ];

        match mfd_kind {
            MfdKind::TruncatedGutenbergRichter => {
                columns.extend([
                    Column::real(FieldNames::MIN_MAG),
                    Column::real(FieldNames::MAX_MAG),
                    Column::real(FieldNames::A_VALUE),
                    Column::real(FieldNames::B_VALUE),
                ]);
            }
            MfdKind::Incremental => {
                columns.push(Column::real(FieldNames::MIN_MAG));
                columns.push(Column::real(FieldNames::BIN_WIDTH));
                columns.push(Column::integer(FieldNames::NUM_BINS));
                columns.extend(
                    (1..=maxima.mfd_bins)
                        .map(|i| Column::real(numbered(FieldNames::OR_PREFIX, i))),
                );
            }
        }

        columns.push(Column::integer(FieldNames::NUM_NPD));
        for i in 1..=maxima.nodal_planes {
            columns.push(Column::real(numbered(FieldNames::WEIGHT_PREFIX, i)));
            columns.push(Column::real(numbered(FieldNames::STRIKE_PREFIX, i)));
            columns.push(Column::real(numbered(FieldNames::RAKE_PREFIX, i)));
            columns.push(Column::real(numbered(FieldNames::DIP_PREFIX, i)));
        }

        columns.push(Column::integer(FieldNames::NUM_HDD));
        for i in 1..=maxima.hypo_depths {
            columns.push(Column::real(numbered(FieldNames::HDD_DEPTH_PREFIX, i)));
            columns.push(Column::real(numbered(FieldNames::HDD_WEIGHT_PREFIX, i)));
        }

        Self {
            mfd_kind,
            maxima,
            columns,
        }
    }

    /// Derives the schema for the sources of `mfd_kind` among `sources`.
    /// Sources of other MFD variants are ignored.
    #[must_use]
    pub fn derive<'a>(
        mfd_kind: MfdKind,
        sources: impl IntoIterator<Item = &'a AreaSource>,
    ) -> Self {
        let maxima = SchemaMaxima::from_sources(
            sources
                .into_iter()
                .filter(|source| source.mfd.kind() == mfd_kind),
        );
        Self::build(mfd_kind, maxima)
    }

    /// MFD variant this table holds.
    #[must_use]
    pub const fn mfd_kind(&self) -> MfdKind {
        self.mfd_kind
    }

    /// Distribution sizes the layout was built for.
    #[must_use]
    pub const fn maxima(&self) -> SchemaMaxima {
        self.maxima
    }

    /// All columns in table order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Number of numbered (repeated) columns in the layout.
    #[must_use]
    pub const fn numbered_column_count(&self) -> usize {
        let bins = match self.mfd_kind {
            MfdKind::Incremental => self.maxima.mfd_bins,
            MfdKind::TruncatedGutenbergRichter => 0,
        };
        bins + 4 * self.maxima.nodal_planes + 2 * self.maxima.hypo_depths
    }
}
