//! Event-driven NRML reader.

use std::collections::HashMap;
use std::fmt::Display;

use hazard_shp_source_models::{
    AreaGeometry, AreaSource, HypocentralDepth, Mfd, NodalPlane, SourceModel,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::NrmlError;

/// Source typologies that are recognised but not converted.
const SKIPPED_SOURCES: &[&str] = &[
    "pointSource",
    "simpleFaultSource",
    "complexFaultSource",
    "characteristicFaultSource",
];

/// Parses an NRML document and returns its area sources.
///
/// Other source typologies are skipped with a warning.
///
/// # Errors
///
/// * [`NrmlError::Xml`] if the document is not well-formed
/// * [`NrmlError::Malformed`] if an area source is missing required parts
pub fn parse_source_model(xml: &str) -> Result<SourceModel, NrmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut model_name = None;
    let mut sources = Vec::new();
    let mut current: Option<AreaSourceBuilder> = None;
    let mut incremental: Option<(f64, f64)> = None;
    let mut text = String::new();
    let mut skip_depth = 0_usize;
    let mut skipped = 0_usize;

    loop {
        let event = reader.read_event().map_err(|e| NrmlError::Xml {
            message: format!("at byte {}: {e}", reader.buffer_position()),
        })?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = local_name(e);
                text.clear();

                match name.as_str() {
                    "sourceModel" => {
                        model_name = attributes(e)?.remove("name");
                    }
                    "areaSource" => {
                        let mut attrs = attributes(e)?;
                        current = Some(AreaSourceBuilder {
                            id: attrs.remove("id").unwrap_or_default(),
                            name: attrs.remove("name").unwrap_or_default(),
                            tectonic_region: attrs.remove("tectonicRegion").unwrap_or_default(),
                            ..AreaSourceBuilder::default()
                        });
                    }
                    skip if SKIPPED_SOURCES.contains(&skip) => {
                        let id = attributes(e)?.remove("id").unwrap_or_default();
                        log::warn!("Skipping {skip} '{id}': only area sources are converted");
                        skipped += 1;
                        if !is_empty {
                            skip_depth = 1;
                        }
                    }
                    "truncGutenbergRichterMFD" => {
                        let attrs = attributes(e)?;
                        let builder = in_source(&mut current, &name)?;
                        builder.mfd = Some(Mfd::TruncatedGutenbergRichter {
                            a_value: number(&attrs, "aValue", &name)?,
                            b_value: number(&attrs, "bValue", &name)?,
                            min_magnitude: number(&attrs, "minMag", &name)?,
                            max_magnitude: number(&attrs, "maxMag", &name)?,
                        });
                    }
                    "incrementalMFD" => {
                        let attrs = attributes(e)?;
                        in_source(&mut current, &name)?;
                        incremental = Some((
                            number(&attrs, "minMag", &name)?,
                            number(&attrs, "binWidth", &name)?,
                        ));
                    }
                    "nodalPlane" => {
                        let attrs = attributes(e)?;
                        let builder = in_source(&mut current, &name)?;
                        builder.nodal_planes.push(NodalPlane {
                            probability: number(&attrs, "probability", &name)?,
                            strike: number(&attrs, "strike", &name)?,
                            dip: number(&attrs, "dip", &name)?,
                            rake: number(&attrs, "rake", &name)?,
                        });
                    }
                    "hypoDepth" => {
                        let attrs = attributes(e)?;
                        let builder = in_source(&mut current, &name)?;
                        builder.hypo_depths.push(HypocentralDepth {
                            probability: number(&attrs, "probability", &name)?,
                            depth: number(&attrs, "depth", &name)?,
                        });
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                let value = e.unescape().map_err(xml_error)?;
                text.push_str(&value);
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let Some(builder) = current.as_mut() else {
                    continue;
                };

                match name.as_str() {
                    "posList" => builder.boundary = parse_pos_list(&text, &builder.id)?,
                    "upperSeismoDepth" => {
                        builder.upper_seismo_depth = Some(parse_number(&text, &name)?);
                    }
                    "lowerSeismoDepth" => {
                        builder.lower_seismo_depth = Some(parse_number(&text, &name)?);
                    }
                    "magScaleRel" => builder.magnitude_scaling_relation = Some(text.clone()),
                    "ruptAspectRatio" => {
                        builder.rupture_aspect_ratio = Some(parse_number(&text, &name)?);
                    }
                    "occurRates" => {
                        let Some((min_magnitude, bin_width)) = incremental.take() else {
                            return Err(malformed("occurRates outside of incrementalMFD"));
                        };
                        let occurrence_rates = text
                            .split_whitespace()
                            .map(|v| parse_number(v, "occurRates"))
                            .collect::<Result<Vec<_>, _>>()?;
                        builder.mfd = Some(Mfd::Incremental {
                            min_magnitude,
                            bin_width,
                            occurrence_rates,
                        });
                    }
                    "areaSource" => {
                        if let Some(builder) = current.take() {
                            sources.push(builder.build()?);
                        }
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        return Err(malformed("document ended inside an areaSource"));
    }

    log::debug!(
        "Parsed {} area sources, skipped {skipped} other sources",
        sources.len()
    );

    Ok(SourceModel::new(model_name, sources))
}

#[derive(Debug, Default)]
struct AreaSourceBuilder {
    id: String,
    name: String,
    tectonic_region: String,
    boundary: Vec<(f64, f64)>,
    upper_seismo_depth: Option<f64>,
    lower_seismo_depth: Option<f64>,
    magnitude_scaling_relation: Option<String>,
    rupture_aspect_ratio: Option<f64>,
    mfd: Option<Mfd>,
    nodal_planes: Vec<NodalPlane>,
    hypo_depths: Vec<HypocentralDepth>,
}

impl AreaSourceBuilder {
    fn build(self) -> Result<AreaSource, NrmlError> {
        let id = self.id;
        let missing = |what: &str| malformed(format!("areaSource '{id}' has no {what}"));

        if self.boundary.len() < 3 {
            return Err(missing("polygon with at least three vertices"));
        }

        Ok(AreaSource {
            geometry: AreaGeometry::from_points(
                self.boundary,
                self.upper_seismo_depth
                    .ok_or_else(|| missing("upperSeismoDepth"))?,
                self.lower_seismo_depth
                    .ok_or_else(|| missing("lowerSeismoDepth"))?,
            ),
            magnitude_scaling_relation: self
                .magnitude_scaling_relation
                .ok_or_else(|| missing("magScaleRel"))?,
            rupture_aspect_ratio: self
                .rupture_aspect_ratio
                .ok_or_else(|| missing("ruptAspectRatio"))?,
            mfd: self.mfd.ok_or_else(|| missing("magnitude frequency distribution"))?,
            nodal_plane_distribution: self.nodal_planes,
            hypocentral_depth_distribution: self.hypo_depths,
            name: self.name,
            tectonic_region: self.tectonic_region,
            id,
        })
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>, NrmlError> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn in_source<'a>(
    current: &'a mut Option<AreaSourceBuilder>,
    element: &str,
) -> Result<&'a mut AreaSourceBuilder, NrmlError> {
    current
        .as_mut()
        .ok_or_else(|| malformed(format!("{element} outside of an areaSource")))
}

fn number(attrs: &HashMap<String, String>, key: &str, element: &str) -> Result<f64, NrmlError> {
    let value = attrs
        .get(key)
        .ok_or_else(|| malformed(format!("{element} is missing attribute {key}")))?;
    parse_number(value, &format!("{element}@{key}"))
}

fn parse_number(value: &str, context: &str) -> Result<f64, NrmlError> {
    value
        .trim()
        .parse()
        .map_err(|_| malformed(format!("{context}: '{value}' is not a number")))
}

/// Splits a 2D `gml:posList` into lon/lat pairs.
fn parse_pos_list(text: &str, id: &str) -> Result<Vec<(f64, f64)>, NrmlError> {
    let values = text
        .split_whitespace()
        .map(|v| parse_number(v, "posList"))
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() % 2 != 0 {
        return Err(malformed(format!(
            "areaSource '{id}': posList has an odd number of values ({})",
            values.len()
        )));
    }

    Ok(values.chunks_exact(2).map(|p| (p[0], p[1])).collect())
}

fn malformed(message: impl Into<String>) -> NrmlError {
    NrmlError::Malformed {
        message: message.into(),
    }
}

fn xml_error(e: impl Display) -> NrmlError {
    NrmlError::Xml {
        message: e.to_string(),
    }
}
