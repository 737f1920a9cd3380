//! GPX 1.1 tracks, routes and waypoints as GeoJSON features.

use chrono::{DateTime, NaiveDateTime};
use geojson::{Feature, JsonObject, Value};
use serde_json::Value as JsonValue;

use crate::converter::{feature, number};
use crate::measure::{FEET_PER_METER, Measure, duration, round_to};
use crate::options::{ConvertOptions, DistanceUnit};
use crate::point::Point;
use crate::simplify::simplify;
use crate::xml::{XmlNode, descendants, first_node, first_value, has_attribute, number_attribute, value};

/// Metadata elements copied into every feature's properties, first found wins.
const STANDARD_PROPERTIES: [&str; 7] = [
    "name",
    "desc",
    "author",
    "copyright",
    "link",
    "time",
    "keywords",
];

/// Statistics derived from a track's points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSummary {
    /// Highest counted speed, 1 decimal.
    pub top_speed: f64,
    /// Mean counted speed, 1 decimal. NaN when no point was counted.
    pub avg_speed: f64,
    /// Hours, summed over segments.
    pub duration: f64,
    /// Summed over segments, 2 decimals.
    pub distance: f64,
}

impl TrackSummary {
    fn insert_into(&self, props: &mut JsonObject) {
        props.insert("topSpeed".to_string(), number(self.top_speed));
        props.insert("avgSpeed".to_string(), number(self.avg_speed));
        props.insert("duration".to_string(), number(self.duration));
        props.insert("distance".to_string(), number(self.distance));
    }
}

pub struct GpxParser<'a> {
    opts: &'a ConvertOptions,
    measure: Measure,
}

impl<'a> GpxParser<'a> {
    pub fn new(opts: &'a ConvertOptions) -> Self {
        Self {
            opts,
            measure: Measure::new(opts.distance_unit),
        }
    }

    /// A point from a `wpt`, `rtept` or `trkpt` element.
    ///
    /// `None` when either coordinate attribute is missing or the point falls
    /// inside the privacy radius. A coordinate that is present but not a
    /// number is kept as NaN.
    pub fn location(&self, node: &XmlNode) -> Option<Point> {
        if !has_attribute(node, "lat") || !has_attribute(node, "lon") {
            log::debug!("skipping <{}> without lat/lon", node.name);
            return None;
        }
        let mut point = Point::new(number_attribute(node, "lon"), number_attribute(node, "lat"));

        if let Some(ele) = first_node(node, "ele") {
            point.elevation = value(Some(ele))
                .parse::<f64>()
                .ok()
                .map(|meters| (meters * FEET_PER_METER).round());
        }
        if let Some(time) = first_node(node, "time") {
            point.time = parse_time(&value(Some(time)));
        }

        if let Some([lon, lat]) = self.opts.privacy_center() {
            let center = Point::new(lon, lat);
            // privacy radius is always in miles
            let miles = Measure::new(DistanceUnit::Miles).point_distance(&point, &center);
            if miles < self.opts.privacy_miles {
                return None;
            }
        }
        Some(point)
    }

    /// Points of every `child_tag` element under `node`, each carrying its
    /// speed from the previous point.
    pub fn line(&self, node: &XmlNode, child_tag: &str) -> Vec<Point> {
        let mut points: Vec<Point> = descendants(node, child_tag)
            .into_iter()
            .filter_map(|child| self.location(child))
            .collect();

        for i in 1..points.len() {
            points[i].speed = self.measure.speed(&points[i - 1], &points[i]);
        }
        points
    }

    /// Simplified segments and summary statistics of a `<trk>`, or `None`
    /// when it has no segment or any segment has no usable point.
    pub fn track_segments(&self, node: &XmlNode) -> Option<(Vec<Vec<Point>>, TrackSummary)> {
        let max_speed = self.opts.max_possible_speed;
        let mut segments = Vec::new();
        let mut total_time = 0.0;
        let mut total_distance = 0.0;
        let mut total_speed = 0.0;
        let mut top_speed: f64 = 0.0;
        let mut count = 0usize;

        for segment in descendants(node, "trkseg") {
            let line = self.line(segment, "trkpt");
            if line.is_empty() {
                log::debug!("dropping track with a segment of no usable points");
                return None;
            }
            total_time += duration(&line);
            total_distance += self.measure.length(&line);

            let simplified = simplify(&line, self.opts.max_point_deviation_feet);
            for point in &simplified {
                if max_speed > 0.0 && point.speed > max_speed {
                    log::debug!("speed {:.1} above {max_speed} left out of statistics", point.speed);
                    continue;
                }
                count += 1;
                total_speed += point.speed;
                top_speed = top_speed.max(point.speed);
            }
            segments.push(simplified);
        }

        if segments.is_empty() {
            return None;
        }

        let summary = TrackSummary {
            top_speed: round_to(top_speed, 1),
            avg_speed: round_to(total_speed / count as f64, 1),
            duration: total_time,
            distance: round_to(total_distance, 2),
        };
        Some((segments, summary))
    }

    pub fn track(&self, node: &XmlNode) -> Option<Feature> {
        let (mut segments, summary) = self.track_segments(node)?;

        let geometry = if segments.len() == 1 {
            Value::LineString(positions(&segments.remove(0)))
        } else {
            Value::MultiLineString(segments.iter().map(|s| positions(s)).collect())
        };

        let mut props = self.properties(node, &[]);
        summary.insert_into(&mut props);
        Some(feature(geometry, props))
    }

    pub fn route(&self, node: &XmlNode) -> Option<Feature> {
        let points = self.line(node, "rtept");
        if points.is_empty() {
            return None;
        }
        Some(feature(
            Value::LineString(positions(&points)),
            self.properties(node, &[]),
        ))
    }

    /// A waypoint as a Point feature.
    pub fn point(&self, node: &XmlNode) -> Option<Feature> {
        let location = self.location(node)?;
        Some(feature(
            Value::Point(location.position()),
            self.properties(node, &["sym"]),
        ))
    }

    fn properties(&self, node: &XmlNode, extras: &[&str]) -> JsonObject {
        let mut props = JsonObject::new();
        for key in STANDARD_PROPERTIES.iter().chain(extras) {
            let text = if *key == "link" {
                link_value(node)
            } else {
                first_value(node, key)
            };
            if !text.is_empty() {
                props.insert(key.to_string(), JsonValue::String(text));
            }
        }
        props
    }
}

/// `<link>` text, falling back to its `href`.
fn link_value(node: &XmlNode) -> String {
    let Some(link) = first_node(node, "link") else {
        return String::new();
    };
    let text = value(Some(link));
    if text.is_empty() {
        link.attribute("href").unwrap_or_default().trim().to_string()
    } else {
        text
    }
}

fn positions(points: &[Point]) -> Vec<Vec<f64>> {
    points.iter().map(Point::position).collect()
}

/// ISO-8601 timestamp to epoch milliseconds. Timestamps without an offset are
/// read as UTC.
pub fn parse_time(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}
