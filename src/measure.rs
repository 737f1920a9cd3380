//! Spherical-earth measurements over [`Point`]s.
//!
//! Distances depend on a unit, so they hang off a [`Measure`] value built
//! once per conversion. Unit-free helpers are plain functions.

use crate::options::DistanceUnit;
use crate::point::Point;

pub const MS_PER_HOUR: f64 = 1000.0 * 60.0 * 60.0;
pub const FEET_PER_METER: f64 = 3.28084;
pub const FEET_PER_MILE: f64 = 5280.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measure {
    unit: DistanceUnit,
}

impl Measure {
    pub fn new(unit: DistanceUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> DistanceUnit {
        self.unit
    }

    /// Haversine distance in this measure's unit. Elevation is ignored.
    pub fn point_distance(&self, p1: &Point, p2: &Point) -> f64 {
        if p1.same_location(p2) {
            return 0.0;
        }
        let lat1 = p1.lat.to_radians();
        let lat2 = p2.lat.to_radians();
        let d_lat = (p2.lat - p1.lat).to_radians();
        let d_lon = (p2.lon - p1.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        self.unit.earth_radius() * c
    }

    /// Distance per hour between two timed points, 0 without elapsed time.
    pub fn speed(&self, p1: &Point, p2: &Point) -> f64 {
        let (Some(t1), Some(t2)) = (p1.time, p2.time) else {
            return 0.0;
        };
        let elapsed = (t2 - t1).abs() as f64;
        if elapsed == 0.0 {
            return 0.0;
        }
        self.point_distance(p1, p2) / (elapsed / MS_PER_HOUR)
    }

    /// Sum of distances between consecutive points.
    pub fn length(&self, points: &[Point]) -> f64 {
        points
            .windows(2)
            .map(|w| self.point_distance(&w[0], &w[1]))
            .sum()
    }
}

/// Hours from the first to the last point of a segment.
///
/// Not absolute-valued: timestamps running backwards give a negative result.
/// Missing end timestamps count as no elapsed time.
pub fn duration(segment: &[Point]) -> f64 {
    match (segment.first(), segment.last()) {
        (Some(first), Some(last)) => match (first.time, last.time) {
            (Some(t1), Some(t2)) => (t2 - t1) as f64 / MS_PER_HOUR,
            _ => 0.0,
        },
        _ => 0.0,
    }
}

/// Spherical mean of the points as `[lon, lat]`.
pub fn centroid(points: &[Point]) -> Option<[f64; 2]> {
    match points {
        [] => None,
        [p] => Some([p.lon, p.lat]),
        _ => {
            let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
            for p in points {
                let lat = p.lat.to_radians();
                let lon = p.lon.to_radians();
                x += lat.cos() * lon.cos();
                y += lat.cos() * lon.sin();
                z += lat.sin();
            }
            let n = points.len() as f64;
            let (x, y, z) = (x / n, y / n, z / n);

            let lon = y.atan2(x);
            let lat = z.atan2((x * x + y * y).sqrt());
            Some([lon.to_degrees(), lat.to_degrees()])
        }
    }
}

/// Squared planar distance, in degrees², from `p` to the segment `p1..p2`.
///
/// Only meaningful for ranking points against each other; it is neither a
/// geodesic nor a Euclidean distance in any length unit.
pub fn point_line_distance(p: &Point, p1: &Point, p2: &Point) -> f64 {
    let mut x = p1.lon;
    let mut y = p1.lat;
    let dx = p2.lon - x;
    let dy = p2.lat - y;

    if dx != 0.0 || dy != 0.0 {
        let t = ((p.lon - x) * dx + (p.lat - y) * dy) / (dx * dx + dy * dy);
        if t > 1.0 {
            x = p2.lon;
            y = p2.lat;
        } else if t > 0.0 {
            x += dx * t;
            y += dy * t;
        }
    }

    let dx = p.lon - x;
    let dy = p.lat - y;
    dx * dx + dy * dy
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
