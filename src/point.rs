use geojson::{FeatureCollection, Value};
use serde::Serialize;

/// Slot positions of the flat `[lon, lat, ele, time, speed]` wire form.
pub const LON: usize = 0;
pub const LAT: usize = 1;
pub const ELEVATION: usize = 2;
pub const TIME: usize = 3;
pub const SPEED: usize = 4;

/// A single located sample from a track, route, waypoint or placemark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
    /// Feet for GPX input, source units for KML.
    pub elevation: Option<f64>,
    /// Milliseconds since the Unix epoch.
    pub time: Option<i64>,
    /// Speed arriving at this point from the previous one.
    pub speed: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            elevation: None,
            time: None,
            speed: 0.0,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    /// Build from flat slots. Fewer than two slots is not a location.
    pub fn from_slots(slots: &[f64]) -> Option<Self> {
        if slots.len() <= LAT {
            return None;
        }
        Some(Self {
            lon: slots[LON],
            lat: slots[LAT],
            elevation: slots.get(ELEVATION).copied(),
            time: slots.get(TIME).map(|t| *t as i64),
            speed: slots.get(SPEED).copied().unwrap_or(0.0),
        })
    }

    /// Flat form with unset slots as 0.
    pub fn to_slots(&self) -> [f64; 5] {
        let mut slots = [0.0; 5];
        slots[LON] = self.lon;
        slots[LAT] = self.lat;
        slots[ELEVATION] = self.elevation.unwrap_or(0.0);
        slots[TIME] = self.time.map(|t| t as f64).unwrap_or(0.0);
        slots[SPEED] = self.speed;
        slots
    }

    /// GeoJSON position: `[lon, lat]` or `[lon, lat, ele]`.
    pub fn position(&self) -> Vec<f64> {
        match self.elevation {
            Some(ele) => vec![self.lon, self.lat, ele],
            None => vec![self.lon, self.lat],
        }
    }

    pub fn same_location(&self, other: &Point) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }
}

/// Southwest and northeast corners of a point set, each `[lon, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapBounds {
    pub southwest: [f64; 2],
    pub northeast: [f64; 2],
}

impl MapBounds {
    pub fn from_point(lon: f64, lat: f64) -> Self {
        Self {
            southwest: [lon, lat],
            northeast: [lon, lat],
        }
    }

    pub fn extend(&mut self, lon: f64, lat: f64) {
        self.southwest[0] = self.southwest[0].min(lon);
        self.southwest[1] = self.southwest[1].min(lat);
        self.northeast[0] = self.northeast[0].max(lon);
        self.northeast[1] = self.northeast[1].max(lat);
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for p in points {
            match bounds.as_mut() {
                Some(b) => b.extend(p.lon, p.lat),
                None => bounds = Some(Self::from_point(p.lon, p.lat)),
            }
        }
        bounds
    }

    /// Bounds over every position of every feature geometry.
    pub fn from_features(fc: &FeatureCollection) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        let mut add = |pos: &[f64]| {
            if pos.len() < 2 {
                return;
            }
            match bounds.as_mut() {
                Some(b) => b.extend(pos[0], pos[1]),
                None => bounds = Some(Self::from_point(pos[0], pos[1])),
            }
        };

        for geometry in fc.features.iter().filter_map(|f| f.geometry.as_ref()) {
            match &geometry.value {
                Value::Point(pos) => add(pos),
                Value::LineString(line) => line.iter().for_each(|pos| add(pos)),
                Value::MultiLineString(lines) => {
                    lines.iter().flatten().for_each(|pos| add(pos))
                }
                _ => {}
            }
        }
        bounds
    }

    /// GeoJSON `bbox` order: `[west, south, east, north]`.
    pub fn to_bbox(&self) -> Vec<f64> {
        vec![
            self.southwest[0],
            self.southwest[1],
            self.northeast[0],
            self.northeast[1],
        ]
    }
}
