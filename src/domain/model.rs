use crate::utils::error::{DamError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// DAM exports mark unsurveyed characteristic points with this sentinel.
pub const X_UNDEFINED: f64 = -9999.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub station: f64,
    pub elevation: f64,
}

impl Point2D {
    pub fn new(station: f64, elevation: f64) -> Self {
        Self { station, elevation }
    }
}

/// Ordered vertex chain with strictly increasing stations. Represents a
/// surface line or a soil layer boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point2D>,
}

impl Polyline {
    pub fn new(points: Vec<Point2D>) -> Result<Self> {
        if points.len() < 2 {
            return Err(DamError::MalformedInput {
                message: format!("polyline needs at least 2 vertices, got {}", points.len()),
            });
        }
        for pair in points.windows(2) {
            if pair[1].station <= pair[0].station {
                return Err(DamError::MalformedInput {
                    message: format!(
                        "polyline stations must be strictly increasing, got {} after {}",
                        pair[1].station, pair[0].station
                    ),
                });
            }
        }
        Ok(Self { points })
    }

    /// Horizontal boundary at a fixed elevation, spanning every realistic
    /// station. Used for the DAM scalar-layer profile format.
    pub fn constant(elevation: f64) -> Self {
        Self {
            points: vec![
                Point2D::new(-STATION_UNBOUNDED, elevation),
                Point2D::new(STATION_UNBOUNDED, elevation),
            ],
        }
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn min_station(&self) -> f64 {
        self.points[0].station
    }

    pub fn max_station(&self) -> f64 {
        self.points[self.points.len() - 1].station
    }

    pub fn stations(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.station)
    }

    /// Linear interpolation at `station`. Outside the station domain the end
    /// elevations are extended, callers are expected to stay inside.
    pub fn elevation_at(&self, station: f64) -> f64 {
        if station <= self.min_station() {
            return self.points[0].elevation;
        }
        if station >= self.max_station() {
            return self.points[self.points.len() - 1].elevation;
        }
        let idx = self
            .points
            .partition_point(|p| p.station < station)
            .max(1);
        let a = self.points[idx - 1];
        let b = self.points[idx];
        let t = (station - a.station) / (b.station - a.station);
        a.elevation + t * (b.elevation - a.elevation)
    }
}

/// Sentinel half-width for boundaries supplied without stations.
pub const STATION_UNBOUNDED: f64 = 1.0e9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    pub soil_code: String,
    pub top: Polyline,
    pub bottom: Polyline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilProfile {
    pub id: String,
    pub layers: Vec<SoilLayer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointRole {
    OuterCrest,
    InnerCrest,
    OuterToe,
    InnerToe,
    DitchDikeSide,
    DitchPolderSide,
}

impl PointRole {
    /// Accepts both snake-case names and the Dutch DAM column headers.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "outer_crest" | "X_Kruin_buitentalud" => Some(PointRole::OuterCrest),
            "inner_crest" | "X_Kruin_binnentalud" => Some(PointRole::InnerCrest),
            "outer_toe" | "X_Teen_dijk_buitenwaarts" => Some(PointRole::OuterToe),
            "inner_toe" | "X_Teen_dijk_binnenwaarts" => Some(PointRole::InnerToe),
            "ditch_dike_side" | "X_Insteek_sloot_dijkzijde" => Some(PointRole::DitchDikeSide),
            "ditch_polder_side" | "X_Insteek_sloot_polderzijde" => Some(PointRole::DitchPolderSide),
            _ => None,
        }
    }
}

/// Named stations along one location's cross-section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicPoints {
    stations: HashMap<PointRole, f64>,
}

impl CharacteristicPoints {
    pub fn insert(&mut self, role: PointRole, station: f64) {
        if station != X_UNDEFINED {
            self.stations.insert(role, station);
        }
    }

    pub fn get(&self, role: PointRole) -> Option<f64> {
        self.stations.get(&role).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterLevels {
    pub min_polder_level: Option<f64>,
    pub max_polder_level: Option<f64>,
    /// Phreatic head observations as (station, head) pairs.
    pub phreatic: Vec<Point2D>,
}

/// One calculation unit, as enumerated by the combination file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combination {
    pub id: String,
    pub location_id: String,
    pub profile_id: String,
    pub surface_line_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilParameter {
    pub code: String,
    pub dry_unit_weight: f64,
    pub saturated_unit_weight: f64,
    pub friction_angle: f64,
    pub cohesion: f64,
}

/// Static lookup from soil code to parameters. Matching is case-sensitive;
/// the alias table models fallbacks like `Zand_WL -> Zand` explicitly.
#[derive(Debug, Clone, Default)]
pub struct SoilParameterCatalog {
    soils: HashMap<String, SoilParameter>,
    aliases: HashMap<String, String>,
}

impl SoilParameterCatalog {
    pub fn new(parameters: Vec<SoilParameter>, aliases: HashMap<String, String>) -> Self {
        let soils = parameters
            .into_iter()
            .map(|p| (p.code.clone(), p))
            .collect();
        Self { soils, aliases }
    }

    /// The fallback the DAM exports have always needed: water-line sand rows
    /// reuse the plain sand parameters.
    pub fn default_aliases() -> HashMap<String, String> {
        HashMap::from([("Zand_WL".to_string(), "Zand".to_string())])
    }

    pub fn lookup(&self, code: &str) -> Result<&SoilParameter> {
        if let Some(param) = self.soils.get(code) {
            return Ok(param);
        }
        if let Some(target) = self.aliases.get(code) {
            if let Some(param) = self.soils.get(target) {
                return Ok(param);
            }
        }
        Err(DamError::UnknownSoilCode {
            code: code.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.soils.len()
    }

    pub fn is_empty(&self) -> bool {
        self.soils.is_empty()
    }
}

/// Closed ring (first vertex not repeated) tagged with its soil code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerPolygon {
    pub combination_id: String,
    pub soil_code: String,
    pub ring: Vec<Point2D>,
}

/// One layer polygon together with its looked-up soil parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedLayer {
    pub polygon: LayerPolygon,
    pub parameter: SoilParameter,
}

/// The full ordered stack for one combination, top to bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSection {
    pub combination_id: String,
    pub location_id: String,
    pub layers: Vec<StackedLayer>,
    /// Water-level data for the location, exported into the waternet
    /// document when present.
    pub water_levels: Option<WaterLevels>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    pub combination_id: String,
    pub soil_code: String,
    pub area: f64,
    pub clipped: bool,
}

/// Tolerances steering the geometry construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometrySettings {
    /// Layers thinner than this (in metres) are treated as absent.
    pub thickness_tolerance: f64,
    /// Minimum usable section width; narrower domains are a mismatch.
    pub min_section_width: f64,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            thickness_tolerance: 0.001,
            min_section_width: 0.1,
        }
    }
}

/// All reference data for one batch, loaded up front and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct DamInput {
    pub soils: SoilParameterCatalog,
    pub surface_lines: HashMap<String, Polyline>,
    pub characteristic_points: HashMap<String, CharacteristicPoints>,
    pub profiles: HashMap<String, SoilProfile>,
    pub water_levels: HashMap<String, WaterLevels>,
    pub combinations: Vec<Combination>,
}

/// Everything produced for one combination. `section` is present only when
/// geometry construction succeeded; `clipped` only when clipping did too.
#[derive(Debug)]
pub struct CombinationOutcome {
    pub combination_id: String,
    pub location_id: String,
    pub section: Option<CrossSection>,
    pub unclipped: Vec<AreaRecord>,
    pub clipped: Vec<AreaRecord>,
    pub build_error: Option<crate::utils::error::DamError>,
    pub clip_error: Option<crate::utils::error::DamError>,
}

impl CombinationOutcome {
    pub fn failed(&self) -> bool {
        self.build_error.is_some() || self.clip_error.is_some()
    }
}

#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<CombinationOutcome>,
}

impl BatchResult {
    pub fn unclipped_records(&self) -> impl Iterator<Item = &AreaRecord> {
        self.outcomes.iter().flat_map(|o| o.unclipped.iter())
    }

    pub fn clipped_records(&self) -> impl Iterator<Item = &AreaRecord> {
        self.outcomes.iter().flat_map(|o| o.clipped.iter())
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }
}
