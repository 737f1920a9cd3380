//! Douglas-Peucker polyline reduction.

use crate::measure::{FEET_PER_MILE, point_line_distance};
use crate::options::DistanceUnit;
use crate::point::Point;

/// Feet per radian of earth radius, used to turn a foot tolerance into an
/// angle. The resulting tolerance is compared with the squared planar metric
/// of [`point_line_distance`], so it is only an approximation.
pub fn equator_feet() -> f64 {
    FEET_PER_MILE * DistanceUnit::Miles.earth_radius()
}

/// Keep the endpoints and every point deviating from its local chord by more
/// than `tolerance_feet`. A non-positive tolerance returns the input as is.
pub fn simplify(points: &[Point], tolerance_feet: f64) -> Vec<Point> {
    let len = points.len();
    if tolerance_feet <= 0.0 || len < 3 {
        return points.to_vec();
    }

    let tolerance = tolerance_feet / equator_feet();
    let mut keep = vec![false; len];
    keep[0] = true;
    keep[len - 1] = true;

    let mut stack: Vec<(usize, usize)> = vec![(0, len - 1)];

    while let Some((first, last)) = stack.pop() {
        let mut max_distance = 0.0;
        let mut index = first;

        for i in first + 1..last {
            let distance = point_line_distance(&points[i], &points[first], &points[last]);
            if distance > max_distance {
                index = i;
                max_distance = distance;
            }
        }

        if max_distance > tolerance {
            keep[index] = true;
            stack.push((first, index));
            stack.push((index, last));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, kept)| kept.then_some(*p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(lon, lat)| Point::new(lon, lat)).collect()
    }

    #[test]
    fn test_zero_tolerance_is_identity() {
        let points = line(&[(0.0, 0.0), (0.1, 0.0001), (0.2, 0.0), (0.3, 0.5)]);
        assert_eq!(simplify(&points, 0.0), points);
        assert_eq!(simplify(&points, -5.0), points);
    }

    #[test]
    fn test_collinear_points_collapse() {
        let points = line(&[(0.0, 0.0), (0.1, 0.0), (0.2, 0.0), (0.3, 0.0)]);
        let simplified = simplify(&points, 10.0);
        assert_eq!(simplified, line(&[(0.0, 0.0), (0.3, 0.0)]));
    }

    #[test]
    fn test_sharp_corner_is_kept() {
        let points = line(&[(0.0, 0.0), (0.5, 0.0), (1.0, 0.0), (1.0, 0.5), (1.0, 1.0)]);
        let simplified = simplify(&points, 10.0);
        assert_eq!(simplified, line(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]));
    }

    #[test]
    fn test_endpoints_always_kept() {
        let points = line(&[(-116.0, 43.0), (-116.0, 43.0), (-116.0, 43.0)]);
        let simplified = simplify(&points, 1000.0);
        assert_eq!(simplified.len(), 2);
        assert_eq!(simplified.first(), points.first());
        assert_eq!(simplified.last(), points.last());

        let single = line(&[(-116.0, 43.0)]);
        assert_eq!(simplify(&single, 5.0), single);
        assert!(simplify(&[], 5.0).is_empty());
    }

    #[test]
    fn test_kept_points_stay_in_order() {
        let points = line(&[
            (0.0, 0.0),
            (1.0, 1.0),
            (2.0, -1.0),
            (3.0, 1.0),
            (4.0, -1.0),
            (5.0, 0.0),
        ]);
        let simplified = simplify(&points, 1.0);
        assert_eq!(simplified, points);
    }
}
