use crate::domain::model::{AreaRecord, LayerPolygon, Point2D};
use crate::utils::error::{DamError, Result};

/// Geometric slack for intersection tests, in metres.
const GEOM_EPS: f64 = 1.0e-9;

/// Signed shoelace area of a closed ring (first vertex not repeated).
pub fn signed_area(ring: &[Point2D]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        sum += a.station * b.elevation - b.station * a.elevation;
    }
    sum / 2.0
}

pub fn polygon_area(ring: &[Point2D]) -> f64 {
    signed_area(ring).abs()
}

/// Finds a proper self-intersection of the ring, if any. Touching contacts
/// (pinched zero-thickness spans, collinear bridge edges along a clip
/// boundary) are not crossings and are accepted.
pub fn find_self_intersection(ring: &[Point2D]) -> Option<Point2D> {
    let n = ring.len();
    if n < 4 {
        return None;
    }
    for i in 0..n {
        for j in (i + 2)..n {
            // Skip adjacent edges, including the wrap-around pair.
            if i == 0 && j == n - 1 {
                continue;
            }
            let (a1, a2) = (ring[i], ring[(i + 1) % n]);
            let (b1, b2) = (ring[j], ring[(j + 1) % n]);
            if let Some(p) = proper_intersection(a1, a2, b1, b2) {
                return Some(p);
            }
        }
    }
    None
}

/// Intersection of segment interiors only. Shared endpoints and collinear
/// overlaps do not count.
fn proper_intersection(p1: Point2D, p2: Point2D, p3: Point2D, p4: Point2D) -> Option<Point2D> {
    let d1x = p2.station - p1.station;
    let d1y = p2.elevation - p1.elevation;
    let d2x = p4.station - p3.station;
    let d2y = p4.elevation - p3.elevation;

    let denominator = d1x * d2y - d1y * d2x;
    if denominator.abs() < GEOM_EPS {
        // Parallel or collinear
        return None;
    }

    let t = ((p3.station - p1.station) * d2y - (p3.elevation - p1.elevation) * d2x) / denominator;
    let u = ((p3.station - p1.station) * d1y - (p3.elevation - p1.elevation) * d1x) / denominator;

    let strictly_inside =
        |v: f64| v > GEOM_EPS.max(1.0e-7) && v < 1.0 - GEOM_EPS.max(1.0e-7);
    if strictly_inside(t) && strictly_inside(u) {
        Some(Point2D::new(
            p1.station + t * d1x,
            p1.elevation + t * d1y,
        ))
    } else {
        None
    }
}

/// Sums polygon areas per soil code. Pure over its inputs; output is
/// stable-ordered by (combination_id, soil_code) so re-runs are
/// byte-identical.
pub struct AreaAggregator;

impl AreaAggregator {
    /// `clipped` marks which report the records belong to. Self-intersecting
    /// rings are rejected rather than silently mis-measured.
    pub fn aggregate(polygons: &[LayerPolygon], clipped: bool) -> Result<Vec<AreaRecord>> {
        let mut totals: Vec<(String, String, f64)> = Vec::new();

        for polygon in polygons {
            if let Some(crossing) = find_self_intersection(&polygon.ring) {
                return Err(DamError::DegenerateGeometry {
                    soil_code: polygon.soil_code.clone(),
                    station: crossing.station,
                });
            }
            let area = polygon_area(&polygon.ring);
            match totals
                .iter_mut()
                .find(|(c, s, _)| c == &polygon.combination_id && s == &polygon.soil_code)
            {
                Some((_, _, total)) => *total += area,
                None => totals.push((
                    polygon.combination_id.clone(),
                    polygon.soil_code.clone(),
                    area,
                )),
            }
        }

        totals.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        Ok(totals
            .into_iter()
            .map(|(combination_id, soil_code, area)| AreaRecord {
                combination_id,
                soil_code,
                area,
                clipped,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ring(points: &[(f64, f64)]) -> Vec<Point2D> {
        points.iter().map(|&(s, e)| Point2D::new(s, e)).collect()
    }

    fn polygon(id: &str, code: &str, points: &[(f64, f64)]) -> LayerPolygon {
        LayerPolygon {
            combination_id: id.to_string(),
            soil_code: code.to_string(),
            ring: ring(points),
        }
    }

    #[test]
    fn test_shoelace_rectangle() {
        let r = ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, -5.0), (0.0, -5.0)]);
        assert_relative_eq!(polygon_area(&r), 50.0);
    }

    #[test]
    fn test_shoelace_winding_independent() {
        let cw = ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, -5.0), (0.0, -5.0)]);
        let ccw: Vec<_> = cw.iter().rev().copied().collect();
        assert_relative_eq!(polygon_area(&cw), polygon_area(&ccw));
    }

    #[test]
    fn test_triangle_area() {
        let r = ring(&[(0.0, 0.0), (4.0, 0.0), (0.0, 3.0)]);
        assert_relative_eq!(polygon_area(&r), 6.0);
    }

    #[test]
    fn test_bowtie_is_detected() {
        // Top chain then bottom chain crossing it mid-span
        let r = ring(&[(0.0, 0.0), (10.0, 0.0), (0.0, -2.0), (10.0, -2.0)]);
        assert!(find_self_intersection(&r).is_some());
    }

    #[test]
    fn test_pinched_ring_is_not_a_crossing() {
        // Thickness collapses to zero at station 5, then reopens
        let r = ring(&[
            (0.0, 0.0),
            (5.0, 0.0),
            (10.0, 0.0),
            (10.0, -2.0),
            (5.0, 0.0),
            (0.0, -2.0),
        ]);
        assert!(find_self_intersection(&r).is_none());
    }

    #[test]
    fn test_aggregate_sums_per_soil_code() {
        let polygons = vec![
            polygon("C1", "Zand", &[(0.0, 0.0), (2.0, 0.0), (2.0, -1.0), (0.0, -1.0)]),
            polygon("C1", "Klei", &[(0.0, -1.0), (2.0, -1.0), (2.0, -2.0), (0.0, -2.0)]),
            polygon("C1", "Zand", &[(2.0, 0.0), (4.0, 0.0), (4.0, -1.0), (2.0, -1.0)]),
        ];
        let records = AreaAggregator::aggregate(&polygons, false).unwrap();
        assert_eq!(records.len(), 2);
        // Sorted by soil code within the combination
        assert_eq!(records[0].soil_code, "Klei");
        assert_relative_eq!(records[0].area, 2.0);
        assert_eq!(records[1].soil_code, "Zand");
        assert_relative_eq!(records[1].area, 4.0);
        assert!(!records[0].clipped);
    }

    #[test]
    fn test_aggregate_rejects_self_intersection() {
        let polygons = vec![polygon(
            "C1",
            "Zand",
            &[(0.0, 0.0), (10.0, 0.0), (0.0, -2.0), (10.0, -2.0)],
        )];
        let err = AreaAggregator::aggregate(&polygons, false).unwrap_err();
        assert!(matches!(err, DamError::DegenerateGeometry { .. }));
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let polygons = vec![
            polygon("C2", "Veen", &[(0.0, 0.0), (1.0, 0.0), (1.0, -1.0), (0.0, -1.0)]),
            polygon("C1", "Zand", &[(0.0, 0.0), (1.0, 0.0), (1.0, -1.0), (0.0, -1.0)]),
        ];
        let a = AreaAggregator::aggregate(&polygons, true).unwrap();
        let b = AreaAggregator::aggregate(&polygons, true).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].combination_id, "C1");
        assert_eq!(a[1].combination_id, "C2");
    }
}
