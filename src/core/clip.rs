use crate::domain::model::{CharacteristicPoints, LayerPolygon, Point2D, PointRole, WaterLevels};
use crate::utils::error::{DamError, Result};

/// Vertices closer than this are considered coincident when splitting.
const VERTEX_EPS: f64 = 1.0e-9;

/// The clipping window for the area report: bounded left by the outer toe,
/// right by the inner toe, below by the minimum polder level. Unbounded
/// above, the surface line already caps every polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ClipWindow {
    pub fn derive(
        points: &CharacteristicPoints,
        water: Option<&WaterLevels>,
    ) -> Result<Self> {
        let left = points
            .get(PointRole::OuterToe)
            .ok_or(DamError::MissingClipBound { bound: "outer_toe" })?;
        let right = points
            .get(PointRole::InnerToe)
            .ok_or(DamError::MissingClipBound { bound: "inner_toe" })?;
        let bottom = water
            .and_then(|w| w.min_polder_level)
            .ok_or(DamError::MissingClipBound {
                bound: "min_polder_level",
            })?;

        // Mirrored survey data produces a negative-width window; refuse it.
        if left > right {
            return Err(DamError::InvertedClipBounds {
                outer_toe: left,
                inner_toe: right,
            });
        }

        Ok(Self {
            left,
            right,
            bottom,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum HalfPlane {
    MinStation(f64),
    MaxStation(f64),
    MinElevation(f64),
}

impl HalfPlane {
    fn contains(&self, p: Point2D) -> bool {
        match *self {
            HalfPlane::MinStation(x) => p.station >= x - VERTEX_EPS,
            HalfPlane::MaxStation(x) => p.station <= x + VERTEX_EPS,
            HalfPlane::MinElevation(y) => p.elevation >= y - VERTEX_EPS,
        }
    }

    /// Intersection of the segment (a, b) with the plane boundary. Only
    /// called when a and b straddle the boundary, so the denominator is
    /// nonzero.
    fn cross(&self, a: Point2D, b: Point2D) -> Point2D {
        match *self {
            HalfPlane::MinStation(x) | HalfPlane::MaxStation(x) => {
                let t = (x - a.station) / (b.station - a.station);
                Point2D::new(x, a.elevation + t * (b.elevation - a.elevation))
            }
            HalfPlane::MinElevation(y) => {
                let t = (y - a.elevation) / (b.elevation - a.elevation);
                Point2D::new(a.station + t * (b.station - a.station), y)
            }
        }
    }
}

/// Clips layer polygons against a `ClipWindow` with Sutherland-Hodgman,
/// one half-plane at a time. Disjoint remainders connected by boundary
/// bridges are recovered by splitting at repeated vertices; bridge edges
/// that survive are collinear overlaps and contribute no area.
pub struct AreaClipper {
    window: ClipWindow,
}

impl AreaClipper {
    pub fn new(window: ClipWindow) -> Self {
        Self { window }
    }

    pub fn clip_section(&self, polygons: &[LayerPolygon]) -> Vec<LayerPolygon> {
        polygons
            .iter()
            .flat_map(|p| self.clip_polygon(p))
            .collect()
    }

    pub fn clip_polygon(&self, polygon: &LayerPolygon) -> Vec<LayerPolygon> {
        let planes = [
            HalfPlane::MinStation(self.window.left),
            HalfPlane::MaxStation(self.window.right),
            HalfPlane::MinElevation(self.window.bottom),
        ];

        let mut ring = polygon.ring.clone();
        for plane in planes {
            ring = clip_half_plane(&ring, plane);
            if ring.len() < 3 {
                return Vec::new();
            }
        }

        split_at_repeated_vertices(&ring)
            .into_iter()
            .filter(|piece| piece.len() >= 3)
            .map(|piece| LayerPolygon {
                combination_id: polygon.combination_id.clone(),
                soil_code: polygon.soil_code.clone(),
                ring: piece,
            })
            .collect()
    }
}

fn clip_half_plane(ring: &[Point2D], plane: HalfPlane) -> Vec<Point2D> {
    let mut output = Vec::with_capacity(ring.len() + 2);
    if ring.is_empty() {
        return output;
    }

    let mut s = ring[ring.len() - 1];
    for &e in ring {
        let s_inside = plane.contains(s);
        let e_inside = plane.contains(e);

        if e_inside {
            if !s_inside {
                output.push(plane.cross(s, e));
            }
            output.push(e);
        } else if s_inside {
            output.push(plane.cross(s, e));
        }
        s = e;
    }

    dedup_ring(output)
}

fn dedup_ring(mut ring: Vec<Point2D>) -> Vec<Point2D> {
    ring.dedup_by(|a, b| coincident(*a, *b));
    if ring.len() > 1 && coincident(ring[0], ring[ring.len() - 1]) {
        ring.pop();
    }
    ring
}

fn coincident(a: Point2D, b: Point2D) -> bool {
    (a.station - b.station).abs() <= VERTEX_EPS && (a.elevation - b.elevation).abs() <= VERTEX_EPS
}

/// Splits a ring visiting the same vertex twice into separate rings. A
/// repeated vertex is where Sutherland-Hodgman pinched two disjoint
/// remainders together.
fn split_at_repeated_vertices(ring: &[Point2D]) -> Vec<Vec<Point2D>> {
    for i in 0..ring.len() {
        for j in (i + 1)..ring.len() {
            if coincident(ring[i], ring[j]) {
                let inner: Vec<Point2D> = ring[i..j].to_vec();
                let outer: Vec<Point2D> = ring[..i].iter().chain(ring[j..].iter()).copied().collect();
                let mut pieces = split_at_repeated_vertices(&inner);
                pieces.extend(split_at_repeated_vertices(&outer));
                return pieces;
            }
        }
    }
    vec![ring.to_vec()]
}
