//! NRML serializer for area sources.

use std::fmt::Display;

use geo::LineString;
use hazard_shp_source_models::{AreaSource, Mfd, SourceModel};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::{GML_NS, NRML_NS, NrmlError};

/// Name written when the model has none.
const DEFAULT_MODEL_NAME: &str = "Source Model";

/// Serializes `model` as an NRML 0.4 document.
///
/// Polygon boundaries are written without the closing vertex.
///
/// # Errors
///
/// Returns [`NrmlError::Write`] if an event cannot be serialized.
pub fn write_source_model(model: &SourceModel) -> Result<String, NrmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
    )?;

    let mut nrml = BytesStart::new("nrml");
    nrml.push_attribute(("xmlns:gml", GML_NS));
    nrml.push_attribute(("xmlns", NRML_NS));
    emit(&mut writer, Event::Start(nrml))?;

    let mut source_model = BytesStart::new("sourceModel");
    source_model.push_attribute((
        "name",
        model.name.as_deref().unwrap_or(DEFAULT_MODEL_NAME),
    ));
    emit(&mut writer, Event::Start(source_model))?;

    for source in &model.sources {
        write_area_source(&mut writer, source)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("sourceModel")))?;
    emit(&mut writer, Event::End(BytesEnd::new("nrml")))?;

    String::from_utf8(writer.into_inner()).map_err(write_error)
}

fn write_area_source(writer: &mut Writer<Vec<u8>>, source: &AreaSource) -> Result<(), NrmlError> {
    let mut start = BytesStart::new("areaSource");
    start.push_attribute(("id", source.id.as_str()));
    start.push_attribute(("name", source.name.as_str()));
    start.push_attribute(("tectonicRegion", source.tectonic_region.as_str()));
    emit(writer, Event::Start(start))?;

    open(writer, "areaGeometry")?;
    open(writer, "gml:Polygon")?;
    open(writer, "gml:exterior")?;
    open(writer, "gml:LinearRing")?;
    text_element(writer, "gml:posList", &pos_list(&source.geometry.boundary))?;
    close(writer, "gml:LinearRing")?;
    close(writer, "gml:exterior")?;
    close(writer, "gml:Polygon")?;
    text_element(
        writer,
        "upperSeismoDepth",
        &source.geometry.upper_seismo_depth.to_string(),
    )?;
    text_element(
        writer,
        "lowerSeismoDepth",
        &source.geometry.lower_seismo_depth.to_string(),
    )?;
    close(writer, "areaGeometry")?;

    text_element(writer, "magScaleRel", &source.magnitude_scaling_relation)?;
    text_element(
        writer,
        "ruptAspectRatio",
        &source.rupture_aspect_ratio.to_string(),
    )?;

    write_mfd(writer, &source.mfd)?;

    open(writer, "nodalPlaneDist")?;
    for plane in &source.nodal_plane_distribution {
        empty(
            writer,
            "nodalPlane",
            &[
                ("probability", plane.probability),
                ("strike", plane.strike),
                ("dip", plane.dip),
                ("rake", plane.rake),
            ],
        )?;
    }
    close(writer, "nodalPlaneDist")?;

    open(writer, "hypoDepthDist")?;
    for depth in &source.hypocentral_depth_distribution {
        empty(
            writer,
            "hypoDepth",
            &[("probability", depth.probability), ("depth", depth.depth)],
        )?;
    }
    close(writer, "hypoDepthDist")?;

    close(writer, "areaSource")
}

fn write_mfd(writer: &mut Writer<Vec<u8>>, mfd: &Mfd) -> Result<(), NrmlError> {
    match mfd {
        Mfd::TruncatedGutenbergRichter {
            a_value,
            b_value,
            min_magnitude,
            max_magnitude,
        } => empty(
            writer,
            "truncGutenbergRichterMFD",
            &[
                ("aValue", *a_value),
                ("bValue", *b_value),
                ("minMag", *min_magnitude),
                ("maxMag", *max_magnitude),
            ],
        ),
        Mfd::Incremental {
            min_magnitude,
            bin_width,
            occurrence_rates,
        } => {
            let mut start = BytesStart::new("incrementalMFD");
            start.push_attribute(("minMag", min_magnitude.to_string().as_str()));
            start.push_attribute(("binWidth", bin_width.to_string().as_str()));
            emit(writer, Event::Start(start))?;
            text_element(writer, "occurRates", &join(occurrence_rates.iter()))?;
            close(writer, "incrementalMFD")
        }
    }
}

/// Space-separated `lon lat` pairs, dropping the closing vertex.
fn pos_list(boundary: &LineString<f64>) -> String {
    let coords = match boundary.0.split_last() {
        Some((_, open)) if boundary.is_closed() => open,
        _ => boundary.0.as_slice(),
    };
    join(coords.iter().flat_map(|c| [c.x, c.y]))
}

fn join<T: Display>(values: impl Iterator<Item = T>) -> String {
    values
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn open(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), NrmlError> {
    emit(writer, Event::Start(BytesStart::new(name)))
}

fn close(writer: &mut Writer<Vec<u8>>, name: &str) -> Result<(), NrmlError> {
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn empty(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    attributes: &[(&str, f64)],
) -> Result<(), NrmlError> {
    let mut start = BytesStart::new(name);
    for (key, value) in attributes {
        start.push_attribute((*key, value.to_string().as_str()));
    }
    emit(writer, Event::Empty(start))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), NrmlError> {
    open(writer, name)?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    close(writer, name)
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), NrmlError> {
    writer.write_event(event).map_err(write_error)
}

fn write_error(e: impl Display) -> NrmlError {
    NrmlError::Write {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use hazard_shp_source_models::{AreaGeometry, HypocentralDepth, NodalPlane};

    use super::*;
    use crate::parse_source_model;
    use crate::parser::tests::SAMPLE;

    #[test]
    fn written_document_parses_back() {
        let model = parse_source_model(SAMPLE).unwrap();
        let xml = write_source_model(&model).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<truncGutenbergRichterMFD"));
        assert!(xml.contains("<occurRates>"));
        assert_eq!(parse_source_model(&xml).unwrap(), model);
    }

    #[test]
    fn closing_vertex_is_not_repeated() {
        let ring: LineString<f64> = vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)].into();
        assert_eq!(pos_list(&ring), "0 0 0 1 1 1");

        let open: LineString<f64> = vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)].into();
        assert_eq!(pos_list(&open), "0 0 0 1 1 1");
    }

    #[test]
    fn escapes_names_and_defaults_model_name() {
        let model = SourceModel::new(
            None,
            vec![AreaSource {
                id: "a<1>".to_string(),
                name: "North & South".to_string(),
                tectonic_region: "Active Shallow Crust".to_string(),
                geometry: AreaGeometry::from_points(
                    [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (0.0, 0.0)],
                    0.0,
                    20.0,
                ),
                magnitude_scaling_relation: "WC1994".to_string(),
                rupture_aspect_ratio: 2.0,
                mfd: Mfd::TruncatedGutenbergRichter {
                    a_value: 4.0,
                    b_value: 1.1,
                    min_magnitude: 5.0,
                    max_magnitude: 7.0,
                },
                nodal_plane_distribution: vec![NodalPlane {
                    probability: 1.0,
                    strike: 10.0,
                    dip: 30.0,
                    rake: 90.0,
                }],
                hypocentral_depth_distribution: vec![HypocentralDepth {
                    probability: 1.0,
                    depth: 7.5,
                }],
            }],
        );

        let xml = write_source_model(&model).unwrap();
        assert!(xml.contains(r#"name="Source Model""#));
        assert!(xml.contains("North &amp; South"));

        let reparsed = parse_source_model(&xml).unwrap();
        assert_eq!(reparsed.sources[0].id, "a<1>");
        assert_eq!(reparsed.sources[0].name, "North & South");
        assert_eq!(reparsed.sources[0].geometry.boundary.0.len(), 3);
    }
}
