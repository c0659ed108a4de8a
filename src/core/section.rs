use crate::core::area::find_self_intersection;
use crate::domain::model::{
    Combination, CrossSection, GeometrySettings, LayerPolygon, Point2D, Polyline,
    SoilParameterCatalog, SoilProfile, StackedLayer,
};
use crate::utils::error::{DamError, Result};

/// Stations closer than this are merged into one breakpoint.
const STATION_MERGE_EPS: f64 = 1.0e-9;

/// Builds the ordered stack of soil-layer polygons for one combination.
///
/// The stack is boundary driven: the top of the stack is the surface line,
/// every other effective top is the effective bottom of the layer above, and
/// every effective bottom is the layer's own bottom boundary capped at the
/// surface. Gapped or protruding boundary data from measurement noise
/// therefore resolves into a contiguous, non-overlapping stack; boundaries
/// that genuinely cross survive into the ring and are rejected as degenerate.
pub struct CrossSectionBuilder<'a> {
    catalog: &'a SoilParameterCatalog,
    settings: GeometrySettings,
}

impl<'a> CrossSectionBuilder<'a> {
    pub fn new(catalog: &'a SoilParameterCatalog, settings: GeometrySettings) -> Self {
        Self { catalog, settings }
    }

    pub fn build(
        &self,
        combination: &Combination,
        surface: &Polyline,
        profile: &SoilProfile,
    ) -> Result<CrossSection> {
        let (left, right) = self.resolve_domain(surface, profile)?;
        let stations = merge_stations(surface, profile, left, right);

        let mut layers = order_layers(profile, &stations);

        // Effective ceiling per station, starting at the surface line.
        let surface_heights: Vec<f64> = stations.iter().map(|&s| surface.elevation_at(s)).collect();
        let mut ceiling = surface_heights.clone();

        let mut stacked = Vec::new();
        for layer in layers.drain(..) {
            let mut bottom = Vec::with_capacity(stations.len());
            let top = ceiling.clone();
            for (j, &station) in stations.iter().enumerate() {
                let mut b = layer.bottom.elevation_at(station).min(surface_heights[j]);
                let thickness = top[j] - b;
                if thickness.abs() <= self.settings.thickness_tolerance {
                    // Sub-tolerance layers are absent here, not an error
                    b = top[j];
                }
                bottom.push(b);
            }
            ceiling = bottom.clone();

            if bottom
                .iter()
                .zip(top.iter())
                .all(|(b, t)| (t - b).abs() <= self.settings.thickness_tolerance)
            {
                // Zero area everywhere (e.g. a layer entirely above the
                // surface line): dropped, the stack continues below.
                continue;
            }

            let ring = close_ring(&stations, &top, &bottom);
            if ring.len() < 3 {
                continue;
            }
            if let Some(crossing) = find_self_intersection(&ring) {
                return Err(DamError::DegenerateGeometry {
                    soil_code: layer.soil_code.clone(),
                    station: crossing.station,
                });
            }

            let parameter = self.catalog.lookup(&layer.soil_code)?.clone();
            stacked.push(StackedLayer {
                polygon: LayerPolygon {
                    combination_id: combination.id.clone(),
                    soil_code: layer.soil_code.clone(),
                    ring,
                },
                parameter,
            });
        }

        Ok(CrossSection {
            combination_id: combination.id.clone(),
            location_id: combination.location_id.clone(),
            layers: stacked,
            water_levels: None,
        })
    }

    fn resolve_domain(&self, surface: &Polyline, profile: &SoilProfile) -> Result<(f64, f64)> {
        let mut profile_min = f64::NEG_INFINITY;
        let mut profile_max = f64::INFINITY;
        for layer in &profile.layers {
            profile_min = profile_min
                .max(layer.top.min_station())
                .max(layer.bottom.min_station());
            profile_max = profile_max
                .min(layer.top.max_station())
                .min(layer.bottom.max_station());
        }
        if profile.layers.is_empty() {
            profile_min = f64::INFINITY;
            profile_max = f64::NEG_INFINITY;
        }

        let left = surface.min_station().max(profile_min);
        let right = surface.max_station().min(profile_max);
        if !(right - left >= self.settings.min_section_width) {
            return Err(DamError::DomainMismatch {
                surface_min: surface.min_station(),
                surface_max: surface.max_station(),
                profile_min,
                profile_max,
            });
        }
        Ok((left, right))
    }
}

/// All breakpoints of the surface and the layer boundaries inside the
/// domain, plus both domain endpoints.
fn merge_stations(surface: &Polyline, profile: &SoilProfile, left: f64, right: f64) -> Vec<f64> {
    let mut stations = vec![left, right];
    let mut push_inside = |s: f64| {
        if s > left + STATION_MERGE_EPS && s < right - STATION_MERGE_EPS {
            stations.push(s);
        }
    };
    for s in surface.stations() {
        push_inside(s);
    }
    for layer in &profile.layers {
        for s in layer.top.stations().chain(layer.bottom.stations()) {
            push_inside(s);
        }
    }
    stations.sort_by(|a, b| a.total_cmp(b));
    stations.dedup_by(|a, b| (*a - *b).abs() <= STATION_MERGE_EPS);
    stations
}

/// Stacking order: by bottom-boundary elevation over the domain, descending
/// (topmost layer first). Ties keep input order, so resolution is stable.
fn order_layers(profile: &SoilProfile, stations: &[f64]) -> Vec<crate::domain::model::SoilLayer> {
    let mut layers = profile.layers.clone();
    layers.sort_by(|a, b| {
        let ma = mean_elevation(&a.bottom, stations);
        let mb = mean_elevation(&b.bottom, stations);
        mb.partial_cmp(&ma).unwrap_or(std::cmp::Ordering::Equal)
    });
    layers
}

fn mean_elevation(boundary: &Polyline, stations: &[f64]) -> f64 {
    if stations.is_empty() {
        return 0.0;
    }
    stations.iter().map(|&s| boundary.elevation_at(s)).sum::<f64>() / stations.len() as f64
}

/// Walks the effective top left to right, then the effective bottom right to
/// left, dropping consecutive duplicates so pinched spans collapse cleanly.
fn close_ring(stations: &[f64], top: &[f64], bottom: &[f64]) -> Vec<Point2D> {
    let mut ring: Vec<Point2D> = Vec::with_capacity(stations.len() * 2);
    let mut push = |p: Point2D, ring: &mut Vec<Point2D>| {
        if let Some(last) = ring.last() {
            if (last.station - p.station).abs() <= STATION_MERGE_EPS
                && (last.elevation - p.elevation).abs() <= STATION_MERGE_EPS
            {
                return;
            }
        }
        ring.push(p);
    };
    for (j, &s) in stations.iter().enumerate() {
        push(Point2D::new(s, top[j]), &mut ring);
    }
    for (j, &s) in stations.iter().enumerate().rev() {
        push(Point2D::new(s, bottom[j]), &mut ring);
    }
    // The walk may close back onto the first vertex
    if ring.len() > 1 {
        let first = ring[0];
        let last = ring[ring.len() - 1];
        if (first.station - last.station).abs() <= STATION_MERGE_EPS
            && (first.elevation - last.elevation).abs() <= STATION_MERGE_EPS
        {
            ring.pop();
        }
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::area::{polygon_area, AreaAggregator};
    use crate::domain::model::{SoilLayer, SoilParameter};
    use approx::assert_relative_eq;

    fn line(points: &[(f64, f64)]) -> Polyline {
        Polyline::new(points.iter().map(|&(s, e)| Point2D::new(s, e)).collect()).unwrap()
    }

    fn layer(code: &str, top: &[(f64, f64)], bottom: &[(f64, f64)]) -> SoilLayer {
        SoilLayer {
            soil_code: code.to_string(),
            top: line(top),
            bottom: line(bottom),
        }
    }

    fn catalog(codes: &[&str]) -> SoilParameterCatalog {
        SoilParameterCatalog::new(
            codes
                .iter()
                .map(|c| SoilParameter {
                    code: c.to_string(),
                    dry_unit_weight: 17.0,
                    saturated_unit_weight: 19.0,
                    friction_angle: 27.5,
                    cohesion: 2.0,
                })
                .collect(),
            SoilParameterCatalog::default_aliases(),
        )
    }

    fn combination() -> Combination {
        Combination {
            id: "C1".to_string(),
            location_id: "L1".to_string(),
            profile_id: "P1".to_string(),
            surface_line_id: "L1".to_string(),
        }
    }

    #[test]
    fn test_single_flat_layer() {
        let cat = catalog(&["Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 0.0), (10.0, 0.0)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![layer("Zand", &[(0.0, 0.0), (10.0, 0.0)], &[(0.0, -5.0), (10.0, -5.0)])],
        };

        let section = builder.build(&combination(), &surface, &profile).unwrap();
        assert_eq!(section.layers.len(), 1);
        assert_relative_eq!(polygon_area(&section.layers[0].polygon.ring), 50.0);
    }

    #[test]
    fn test_two_layer_stack_is_contiguous() {
        let cat = catalog(&["Klei", "Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 1.0), (10.0, 1.0)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![
                layer("Klei", &[(0.0, 1.0), (10.0, 1.0)], &[(0.0, -2.0), (10.0, -2.0)]),
                layer("Zand", &[(0.0, -2.0), (10.0, -2.0)], &[(0.0, -6.0), (10.0, -6.0)]),
            ],
        };

        let section = builder.build(&combination(), &surface, &profile).unwrap();
        assert_eq!(section.layers.len(), 2);
        // Supplied order is preserved by the stacking rule here
        assert_eq!(section.layers[0].polygon.soil_code, "Klei");
        assert_relative_eq!(polygon_area(&section.layers[0].polygon.ring), 30.0);
        assert_relative_eq!(polygon_area(&section.layers[1].polygon.ring), 40.0);
    }

    #[test]
    fn test_layers_supplied_out_of_order_are_restacked() {
        let cat = catalog(&["Klei", "Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 1.0), (10.0, 1.0)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![
                layer("Zand", &[(0.0, -2.0), (10.0, -2.0)], &[(0.0, -6.0), (10.0, -6.0)]),
                layer("Klei", &[(0.0, 1.0), (10.0, 1.0)], &[(0.0, -2.0), (10.0, -2.0)]),
            ],
        };

        let section = builder.build(&combination(), &surface, &profile).unwrap();
        assert_eq!(section.layers[0].polygon.soil_code, "Klei");
        assert_eq!(section.layers[1].polygon.soil_code, "Zand");
    }

    #[test]
    fn test_coverage_invariant_under_surface_cut() {
        // Surface dips below the first layer's top; the stack must still
        // cover exactly [lowest bottom, surface] at every station.
        let cat = catalog(&["Klei", "Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 2.0), (5.0, -3.0), (10.0, 2.0)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![
                layer("Klei", &[(0.0, 2.0), (10.0, 2.0)], &[(0.0, -1.0), (10.0, -1.0)]),
                layer("Zand", &[(0.0, -1.0), (10.0, -1.0)], &[(0.0, -6.0), (10.0, -6.0)]),
            ],
        };

        let section = builder.build(&combination(), &surface, &profile).unwrap();
        let total: f64 = section
            .layers
            .iter()
            .map(|l| polygon_area(&l.polygon.ring))
            .sum();

        // Expected coverage: integral of surface(x) - (-6) over [0, 10].
        // Surface is a V dipping to -3, average (2 + -3)/2 = -0.5.
        let expected = 10.0 * (-0.5 - (-6.0));
        assert_relative_eq!(total, expected, epsilon = 1.0e-9);
    }

    #[test]
    fn test_area_conservation_matches_aggregate() {
        let cat = catalog(&["Klei", "Zand", "Veen"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 1.5), (4.0, 2.0), (10.0, 0.5)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![
                layer("Klei", &[(0.0, 1.5), (10.0, 1.5)], &[(0.0, 0.0), (10.0, -0.5)]),
                layer("Veen", &[(0.0, 0.0), (10.0, -0.5)], &[(0.0, -2.0), (10.0, -2.5)]),
                layer("Zand", &[(0.0, -2.0), (10.0, -2.5)], &[(0.0, -8.0), (10.0, -8.0)]),
            ],
        };

        let section = builder.build(&combination(), &surface, &profile).unwrap();
        let polygons: Vec<_> = section.layers.iter().map(|l| l.polygon.clone()).collect();
        let records = AreaAggregator::aggregate(&polygons, false).unwrap();

        let total_from_records: f64 = records.iter().map(|r| r.area).sum();
        let total_from_rings: f64 = polygons.iter().map(|p| polygon_area(&p.ring)).sum();
        assert_relative_eq!(total_from_records, total_from_rings, epsilon = 1.0e-9);
    }

    #[test]
    fn test_layer_above_surface_is_dropped() {
        let cat = catalog(&["Klei", "Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, -1.0), (10.0, -1.0)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![
                // Entirely above the cut surface
                layer("Klei", &[(0.0, 2.0), (10.0, 2.0)], &[(0.0, 0.5), (10.0, 0.5)]),
                layer("Zand", &[(0.0, 0.5), (10.0, 0.5)], &[(0.0, -5.0), (10.0, -5.0)]),
            ],
        };

        let section = builder.build(&combination(), &surface, &profile).unwrap();
        assert_eq!(section.layers.len(), 1);
        assert_eq!(section.layers[0].polygon.soil_code, "Zand");
        assert_relative_eq!(polygon_area(&section.layers[0].polygon.ring), 40.0);
    }

    #[test]
    fn test_crossing_boundaries_are_degenerate() {
        let cat = catalog(&["Klei", "Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 0.0), (10.0, 0.0)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![
                // Bottom starts below the second layer's bottom and ends above
                layer("Klei", &[(0.0, 0.0), (10.0, 0.0)], &[(0.0, -4.0), (10.0, -1.0)]),
                layer("Zand", &[(0.0, -4.0), (10.0, -1.0)], &[(0.0, -2.0), (10.0, -3.0)]),
            ],
        };

        let err = builder.build(&combination(), &surface, &profile).unwrap_err();
        assert!(matches!(err, DamError::DegenerateGeometry { .. }));
    }

    #[test]
    fn test_disjoint_domains_mismatch() {
        let cat = catalog(&["Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 0.0), (10.0, 0.0)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![layer(
                "Zand",
                &[(20.0, 0.0), (30.0, 0.0)],
                &[(20.0, -5.0), (30.0, -5.0)],
            )],
        };

        let err = builder.build(&combination(), &surface, &profile).unwrap_err();
        assert!(matches!(err, DamError::DomainMismatch { .. }));
    }

    #[test]
    fn test_sliver_overlap_is_too_narrow() {
        let cat = catalog(&["Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 0.0), (10.05, 0.0)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![layer(
                "Zand",
                &[(10.0, 0.0), (30.0, 0.0)],
                &[(10.0, -5.0), (30.0, -5.0)],
            )],
        };

        let err = builder.build(&combination(), &surface, &profile).unwrap_err();
        assert!(matches!(err, DamError::DomainMismatch { .. }));
    }

    #[test]
    fn test_sub_tolerance_overlap_is_clamped() {
        let cat = catalog(&["Klei", "Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 0.0), (10.0, 0.0)]);
        // Measurement noise: second bottom pokes 0.5 mm above the first
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![
                layer("Klei", &[(0.0, 0.0), (10.0, 0.0)], &[(0.0, -2.0), (10.0, -2.0)]),
                layer("Zand", &[(0.0, -2.0), (10.0, -2.0)], &[(0.0, -2.0005), (10.0, -5.0)]),
            ],
        };

        let section = builder.build(&combination(), &surface, &profile).unwrap();
        assert_eq!(section.layers.len(), 2);
        let total: f64 = section
            .layers
            .iter()
            .map(|l| polygon_area(&l.polygon.ring))
            .sum();
        // Coverage down to the lowest bottom, a triangle-ish wedge under -2
        assert!(total > 20.0 && total < 50.0);
    }

    #[test]
    fn test_unknown_soil_code_fails_combination() {
        let cat = catalog(&["Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 0.0), (10.0, 0.0)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![layer(
                "Basalt",
                &[(0.0, 0.0), (10.0, 0.0)],
                &[(0.0, -5.0), (10.0, -5.0)],
            )],
        };

        let err = builder.build(&combination(), &surface, &profile).unwrap_err();
        assert!(matches!(err, DamError::UnknownSoilCode { .. }));
    }

    #[test]
    fn test_scalar_profile_from_constant_boundaries() {
        // The original DAM format supplies layers as plain top/bottom levels
        let cat = catalog(&["Klei", "Zand"]);
        let builder = CrossSectionBuilder::new(&cat, GeometrySettings::default());
        let surface = line(&[(0.0, 0.5), (12.0, 0.5)]);
        let profile = SoilProfile {
            id: "P1".to_string(),
            layers: vec![
                SoilLayer {
                    soil_code: "Klei".to_string(),
                    top: Polyline::constant(0.5),
                    bottom: Polyline::constant(-1.5),
                },
                SoilLayer {
                    soil_code: "Zand".to_string(),
                    top: Polyline::constant(-1.5),
                    bottom: Polyline::constant(-4.0),
                },
            ],
        };

        let section = builder.build(&combination(), &surface, &profile).unwrap();
        assert_eq!(section.layers.len(), 2);
        assert_relative_eq!(polygon_area(&section.layers[0].polygon.ring), 24.0);
        assert_relative_eq!(polygon_area(&section.layers[1].polygon.ring), 30.0);
    }
}
