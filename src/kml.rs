//! KML placemarks as GeoJSON features, including KMZ extraction and the
//! attribute tables GIS exports embed in placemark descriptions.

use std::io::{Cursor, Read};

use geojson::{Feature, JsonObject, Value};
use scraper::{ElementRef, Html};
use serde_json::Value as JsonValue;

use crate::converter::{feature, number};
use crate::error::{MapError, Result};
use crate::measure::round_to;
use crate::point::Point;
use crate::transform::title_case;
use crate::xml::{self, XmlNode, descendants, first_value};

/// Largest KML document read out of a KMZ archive.
const MAX_KML_BYTES: u64 = 64 * 1024 * 1024;

/// Markers some exporters write into empty attribute cells.
const NULL_MARKERS: [&str; 2] = ["&lt;Null&gt;", "<Null>"];

/// Extract and parse the first `.kml` document in a KMZ archive.
pub fn from_kmz(archive: &[u8]) -> Result<XmlNode> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;

    let mut kml_index = None;
    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        if entry.name().to_ascii_lowercase().ends_with(".kml") {
            kml_index = Some(i);
            break;
        }
    }
    let Some(index) = kml_index else {
        log::warn!("KMZ archive with {} entries has no .kml document", zip.len());
        return Err(MapError::SourceNotFound);
    };

    let mut entry = zip.by_index(index)?;
    log::debug!("reading {} from KMZ archive", entry.name());

    let bytes = read_member(&mut entry, MAX_KML_BYTES)?;
    let text = std::str::from_utf8(&bytes).map_err(|source| MapError::InvalidUtf8 {
        context: "KMZ document",
        source,
    })?;

    xml::parse(text)
}

/// Read at most `limit` bytes of an archive member. The size the archive
/// declares for the member is not trusted.
fn read_member(member: impl Read, limit: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    member
        .take(limit + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| MapError::Archive(e.into()))?;
    if bytes.len() as u64 > limit {
        return Err(MapError::Malformed(format!(
            "KML document in KMZ archive exceeds {limit} bytes"
        )));
    }
    Ok(bytes)
}

/// Coordinate lists of every `tag` element under `node`, one list per
/// element. Components are rounded to 6 decimal places.
pub fn coordinates(node: &XmlNode, tag: &str) -> Option<Vec<Vec<Point>>> {
    let lines: Vec<Vec<Point>> = descendants(node, tag)
        .into_iter()
        .map(|element| parse_coordinates(&first_value(element, "coordinates")))
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() { None } else { Some(lines) }
}

/// Whitespace-separated `lon,lat[,ele]` tuples.
pub fn parse_coordinates(text: &str) -> Vec<Point> {
    text.split_whitespace()
        .filter_map(|tuple| {
            let slots: Vec<f64> = tuple
                .split(',')
                .map(|n| round_to(n.trim().parse::<f64>().unwrap_or(f64::NAN), 6))
                .collect();
            Point::from_slots(&slots)
        })
        .collect()
}

/// First point of the placemark's `Point`.
pub fn location(node: &XmlNode) -> Option<Point> {
    coordinates(node, "Point").and_then(|lines| lines.into_iter().next()?.into_iter().next())
}

/// Every `LineString` under the placemark.
pub fn line(node: &XmlNode) -> Option<Vec<Vec<Point>>> {
    coordinates(node, "LineString")
}

/// `extras`, `name` and `description` values, with any attribute table in the
/// description expanded into properties.
pub fn properties(node: &XmlNode, extras: &[&str]) -> JsonObject {
    let mut props = JsonObject::new();
    for key in extras.iter().chain(["name", "description"].iter()) {
        let text = first_value(node, key);
        if text.is_empty() {
            continue;
        }
        let text = if *key == "name" { title_case(&text) } else { text };
        props.insert(key.to_string(), JsonValue::String(text));
    }
    parse_description(props)
}

/// Replace an HTML `description` with the rows of its largest table.
///
/// The `description` key is removed whether or not a table is found.
pub fn parse_description(mut props: JsonObject) -> JsonObject {
    let html = match props.shift_remove("description") {
        Some(JsonValue::String(html)) => html,
        _ => return props,
    };
    let lower = html.to_ascii_lowercase();
    if !lower.contains("<html") && !lower.contains("<table") {
        return props;
    }

    let document = Html::parse_document(&html);
    let tables = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "table");

    let mut largest: Option<(usize, ElementRef)> = None;
    for table in tables {
        let size = direct_rows(table).len();
        if largest.as_ref().is_none_or(|(most, _)| size > *most) {
            largest = Some((size, table));
        }
    }
    let Some((_, table)) = largest else {
        return props;
    };

    for row in direct_rows(table) {
        let cells = direct_cells(row);
        if cells.len() < 2 {
            continue;
        }
        let key = clean(&cells[0].text().collect::<String>())
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        if key.is_empty() {
            continue;
        }
        let text = clean(&cells[1].text().collect::<String>());
        let value = match text.parse::<f64>() {
            Ok(n) if n.is_finite() => number(n),
            _ => JsonValue::String(text),
        };
        props.insert(key, value);
    }
    props
}

fn clean(text: &str) -> String {
    let mut text = text.replace(['\r', '\n'], "");
    for marker in NULL_MARKERS {
        text = text.replace(marker, "");
    }
    text.trim().to_string()
}

/// Rows of this table only, looking through `thead`/`tbody`/`tfoot` but not
/// into nested tables.
fn direct_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

fn direct_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

/// A placemark with a `Point` as a Point feature.
pub fn point(node: &XmlNode) -> Option<Feature> {
    let location = location(node)?;
    Some(feature(Value::Point(location.position()), properties(node, &[])))
}

/// A placemark with `LineString`s as a LineString or MultiLineString feature.
pub fn line_feature(node: &XmlNode) -> Option<Feature> {
    let mut lines = line(node)?;
    let geometry = if lines.len() == 1 {
        Value::LineString(lines.remove(0).iter().map(Point::position).collect())
    } else {
        Value::MultiLineString(
            lines
                .iter()
                .map(|l| l.iter().map(Point::position).collect())
                .collect(),
        )
    };
    Some(feature(geometry, properties(node, &[])))
}
