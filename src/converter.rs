use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{MapError, Result};
use crate::gpx::GpxParser;
use crate::kml;
use crate::options::{ConvertOptions, MapSource};
use crate::transform::relabel;
use crate::xml::{self, XmlNode, descendants};

/// Leading bytes of every zip archive.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// A geotagged photo to show on a post map.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoLocation {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub preview_url: String,
}

/// An empty collection, for posts without a track.
pub fn empty() -> FeatureCollection {
    collection(Vec::new())
}

/// Convert a GPX document: tracks, then routes, then waypoints.
pub fn from_gpx(gpx: &str, opts: &ConvertOptions) -> Result<FeatureCollection> {
    let doc = xml::parse(gpx)?;
    Ok(gpx_features(&doc, opts))
}

pub fn gpx_features(doc: &XmlNode, opts: &ConvertOptions) -> FeatureCollection {
    let parser = GpxParser::new(opts);
    let mut features = Vec::new();

    features.extend(descendants(doc, "trk").into_iter().filter_map(|n| parser.track(n)));
    features.extend(descendants(doc, "rte").into_iter().filter_map(|n| parser.route(n)));
    features.extend(descendants(doc, "wpt").into_iter().filter_map(|n| parser.point(n)));

    log::debug!("converted {} GPX features", features.len());
    collection(features)
}

/// Convert a KML document's placemarks in document order.
pub fn from_kml(kml: &str) -> Result<FeatureCollection> {
    let doc = xml::parse(kml)?;
    Ok(kml_features(&doc))
}

pub fn from_kmz(archive: &[u8]) -> Result<FeatureCollection> {
    let doc = kml::from_kmz(archive)?;
    Ok(kml_features(&doc))
}

pub fn kml_features(doc: &XmlNode) -> FeatureCollection {
    let features: Vec<Feature> = descendants(doc, "Placemark")
        .into_iter()
        .filter_map(|p| kml::point(p).or_else(|| kml::line_feature(p)))
        .collect();

    log::debug!("converted {} KML placemarks", features.len());
    collection(features)
}

/// Convert a downloaded map source, relabeling properties for its provider.
///
/// The payload is read as KMZ when the source URL says so or the bytes are a
/// zip archive, otherwise as KML text.
pub fn from_map_source(source: &MapSource, bytes: &[u8]) -> Result<FeatureCollection> {
    let mut fc = if source.is_kmz() || bytes.starts_with(ZIP_MAGIC) {
        from_kmz(bytes)?
    } else {
        let text = std::str::from_utf8(bytes).map_err(|source| MapError::InvalidUtf8 {
            context: "KML document",
            source,
        })?;
        from_kml(text)?
    };

    log::info!(
        "loaded {} features from map source {}",
        fc.features.len(),
        source.name
    );
    relabel_features(&mut fc, &source.provider);
    Ok(fc)
}

/// KML text or KMZ bytes relabeled for `provider` when one is given.
pub fn from_layer(layer: Layer<'_>, provider: Option<&str>) -> Result<FeatureCollection> {
    let mut fc = match layer {
        Layer::Kml(text) => from_kml(text)?,
        Layer::Kmz(bytes) => from_kmz(bytes)?,
    };
    if let Some(provider) = provider {
        relabel_features(&mut fc, provider);
    }
    Ok(fc)
}

/// Raw map layer payload.
#[derive(Debug, Clone, Copy)]
pub enum Layer<'a> {
    Kml(&'a str),
    Kmz(&'a [u8]),
}

/// Apply the provider's property relabeling to every feature.
pub fn relabel_features(fc: &mut FeatureCollection, provider: &str) {
    for f in &mut fc.features {
        if let Some(props) = f.properties.take() {
            f.properties = Some(relabel(provider, props));
        }
    }
}

/// Point features for photos with coordinates. `part_key` tags each feature
/// with the post it belongs to when one map shows a whole series.
pub fn from_photos(photos: &[PhotoLocation], part_key: Option<&str>) -> FeatureCollection {
    let features = photos
        .iter()
        .filter_map(|photo| {
            let (Some(lon), Some(lat)) = (photo.longitude, photo.latitude) else {
                return None;
            };
            let mut props = JsonObject::new();
            props.insert("url".to_string(), JsonValue::String(photo.preview_url.clone()));
            if let Some(key) = part_key {
                props.insert("partKey".to_string(), JsonValue::String(key.to_string()));
            }
            Some(feature(Value::Point(vec![lon, lat]), props))
        })
        .collect();

    collection(features)
}

pub(crate) fn feature(value: Value, props: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

/// JSON number, or `null` for NaN and infinities.
pub(crate) fn number(n: f64) -> JsonValue {
    serde_json::Number::from_f64(n)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::MapBounds;

    fn geometry_type(f: &Feature) -> &'static str {
        match f.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Point(_)) => "Point",
            Some(Value::LineString(_)) => "LineString",
            Some(Value::MultiLineString(_)) => "MultiLineString",
            _ => "other",
        }
    }

    #[test]
    fn test_gpx_encounter_order() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <wpt lat="43.5" lon="-116.5"><name>Camp</name></wpt>
  <rte><name>Planned</name><rtept lat="43.0" lon="-116.0"/><rtept lat="43.1" lon="-116.1"/></rte>
  <trk><name>Ridden</name><trkseg><trkpt lat="43.0" lon="-116.0"/><trkpt lat="43.2" lon="-116.2"/></trkseg></trk>
</gpx>"#;
        let fc = from_gpx(xml, &ConvertOptions::default()).unwrap();
        let names: Vec<&str> = fc
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap()["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Ridden", "Planned", "Camp"]);

        let types: Vec<&str> = fc.features.iter().map(geometry_type).collect();
        assert_eq!(types, vec!["LineString", "LineString", "Point"]);
    }

    #[test]
    fn test_multi_segment_track() {
        let xml = r#"<gpx><trk>
    <trkseg><trkpt lat="43.0" lon="-116.0"><ele>1000</ele></trkpt><trkpt lat="43.1" lon="-116.1"/></trkseg>
    <trkseg><trkpt lat="44.0" lon="-117.0"/></trkseg>
</trk></gpx>"#;
        let fc = from_gpx(xml, &ConvertOptions::default()).unwrap();
        assert_eq!(fc.features.len(), 1);
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::MultiLineString(lines) => {
                assert_eq!(lines.len(), 2);
                assert_eq!(lines[0][0], vec![-116.0, 43.0, 3281.0]);
                assert_eq!(lines[1][0], vec![-117.0, 44.0]);
            }
            _ => panic!("Expected MultiLineString"),
        }
    }

    #[test]
    fn test_redacted_waypoints_omitted() {
        let xml = r#"<gpx>
  <wpt lat="43.6" lon="-116.2"><name>Home</name></wpt>
  <wpt lat="44.6" lon="-116.2"><name>Away</name></wpt>
</gpx>"#;
        let opts = ConvertOptions {
            check_privacy: true,
            privacy_center: Some([-116.2, 43.6]),
            ..Default::default()
        };
        let fc = from_gpx(xml, &opts).unwrap();
        assert_eq!(fc.features.len(), 1);
        assert_eq!(fc.features[0].properties.as_ref().unwrap()["name"], "Away");
    }

    #[test]
    fn test_malformed_gpx_fails_whole_document() {
        let xml = r#"<gpx><wpt lat="43.6" lon="-116.2"><name>Camp</wpt></gpx>"#;
        assert!(from_gpx(xml, &ConvertOptions::default()).is_err());
    }

    #[test]
    fn test_kml_placemarks_in_order() {
        let xml = r#"<kml><Document><Folder>
  <Placemark><name>first road</name><LineString><coordinates>-116,43 -116.1,43.1</coordinates></LineString></Placemark>
  <Placemark><name>no geometry</name></Placemark>
  <Placemark><name>second point</name><Point><coordinates>-116.5,43.5</coordinates></Point></Placemark>
</Folder></Document></kml>"#;
        let fc = from_kml(xml).unwrap();
        assert_eq!(fc.features.len(), 2);
        assert_eq!(geometry_type(&fc.features[0]), "LineString");
        assert_eq!(fc.features[0].properties.as_ref().unwrap()["name"], "First Road");
        assert_eq!(geometry_type(&fc.features[1]), "Point");
    }

    #[test]
    fn test_map_source_relabels() {
        let xml = r#"<kml><Placemark>
  <name>Tanner</name>
  <description><![CDATA[<html><table><tr><td>DEPOSIT</td><td>Tanner Manganese Prospect</td></tr><tr><td>LAND_OWNER</td><td>FOREST SERVICE</td></tr></table></html>]]></description>
  <Point><coordinates>-113.29,44.70,0</coordinates></Point>
</Placemark></kml>"#;
        let source = MapSource {
            name: "Mines".to_string(),
            provider: "Idaho Geological Survey".to_string(),
            url: "https://example.com/mines.kml".to_string(),
        };
        let fc = from_map_source(&source, xml.as_bytes()).unwrap();
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props["Label"], "Tanner Manganese Prospect");
        assert_eq!(props["Land Owner"], "Forest Service");
        assert_eq!(props["name"], "Tanner");
        assert!(!props.contains_key("description"));
    }

    #[test]
    fn test_layer_relabels_only_with_provider() {
        let xml = r#"<kml><Placemark>
  <description><![CDATA[<table><tr><td>NAME</td><td>RIDGE ROAD</td></tr><tr><td>UTV</td><td>Yes</td></tr></table>]]></description>
  <LineString><coordinates>-116,43 -116.1,43.1</coordinates></LineString>
</Placemark></kml>"#;

        let raw = from_layer(Layer::Kml(xml), None).unwrap();
        let props = raw.features[0].properties.as_ref().unwrap();
        assert_eq!(props["NAME"], "RIDGE ROAD");
        assert_eq!(props["UTV"], "Yes");

        let relabeled = from_layer(Layer::Kml(xml), Some("Idaho Parks & Recreation")).unwrap();
        let props = relabeled.features[0].properties.as_ref().unwrap();
        assert_eq!(props["Label"], "Ridge Road");
        assert_eq!(props["UTV Allowed"], "Yes");

        assert!(from_layer(Layer::Kmz(b"not a zip"), None).unwrap_err().is_parse_failure());
    }

    #[test]
    fn test_photo_locations_deserialize() {
        let photos: Vec<PhotoLocation> = serde_json::from_str(
            r#"[
                { "longitude": -116.2, "latitude": 43.6, "previewUrl": "https://example.com/1.jpg" },
                { "latitude": 43.6, "previewUrl": "https://example.com/2.jpg" }
            ]"#,
        )
        .unwrap();
        assert_eq!(photos[0].longitude, Some(-116.2));
        assert_eq!(photos[1].longitude, None);
        assert_eq!(from_photos(&photos, None).features.len(), 1);

        assert!(serde_json::from_str::<Vec<PhotoLocation>>(r#"[{ "longitude": 1.0 }]"#).is_err());
    }

    #[test]
    fn test_photos() {
        let photos = vec![
            PhotoLocation {
                longitude: Some(-116.2),
                latitude: Some(43.6),
                preview_url: "https://example.com/1.jpg".to_string(),
            },
            PhotoLocation {
                longitude: None,
                latitude: None,
                preview_url: "https://example.com/2.jpg".to_string(),
            },
        ];
        let fc = from_photos(&photos, Some("part-2"));
        assert_eq!(fc.features.len(), 1);
        let f = &fc.features[0];
        match &f.geometry.as_ref().unwrap().value {
            Value::Point(pos) => assert_eq!(pos, &vec![-116.2, 43.6]),
            _ => panic!("Expected Point"),
        }
        let props = f.properties.as_ref().unwrap();
        assert_eq!(props["url"], "https://example.com/1.jpg");
        assert_eq!(props["partKey"], "part-2");

        let fc = from_photos(&photos, None);
        assert!(!fc.features[0].properties.as_ref().unwrap().contains_key("partKey"));
    }

    #[test]
    fn test_empty_and_bounds() {
        let fc = empty();
        assert!(fc.features.is_empty());
        assert!(MapBounds::from_features(&fc).is_none());

        let photos = [
            PhotoLocation {
                longitude: Some(-116.2),
                latitude: Some(43.6),
                preview_url: String::new(),
            },
            PhotoLocation {
                longitude: Some(-114.0),
                latitude: Some(42.0),
                preview_url: String::new(),
            },
        ];
        let bounds = MapBounds::from_features(&from_photos(&photos, None)).unwrap();
        assert_eq!(bounds.southwest, [-116.2, 42.0]);
        assert_eq!(bounds.northeast, [-114.0, 43.6]);
    }

    #[test]
    fn test_number_nan_is_null() {
        assert_eq!(number(f64::NAN), JsonValue::Null);
        assert_eq!(number(1.5), 1.5);
    }
}
