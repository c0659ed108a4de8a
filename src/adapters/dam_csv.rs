//! Readers for the semicolon-separated DAM export files. Rows are validated
//! structurally here; geometric validation happens in the core.

use crate::domain::model::{
    CharacteristicPoints, Combination, Point2D, PointRole, Polyline, SoilLayer, SoilParameter,
    SoilProfile, WaterLevels,
};
use crate::utils::error::{DamError, Result};
use serde::Deserialize;
use std::collections::HashMap;

fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data)
}

#[derive(Debug, Deserialize)]
struct SoilParameterRow {
    soil_name: String,
    yd: f64,
    ys: f64,
    c: f64,
    phi: f64,
}

pub fn parse_soil_parameters(data: &[u8]) -> Result<Vec<SoilParameter>> {
    let mut parameters = Vec::new();
    for row in reader(data).deserialize() {
        let row: SoilParameterRow = row?;
        parameters.push(SoilParameter {
            code: row.soil_name,
            dry_unit_weight: row.yd,
            saturated_unit_weight: row.ys,
            friction_angle: row.phi,
            cohesion: row.c,
        });
    }
    Ok(parameters)
}

#[derive(Debug, Deserialize)]
struct CharacteristicPointRow {
    location_id: String,
    role: String,
    x: f64,
}

pub fn parse_characteristic_points(data: &[u8]) -> Result<HashMap<String, CharacteristicPoints>> {
    let mut index: HashMap<String, CharacteristicPoints> = HashMap::new();
    for row in reader(data).deserialize() {
        let row: CharacteristicPointRow = row?;
        match PointRole::parse(&row.role) {
            Some(role) => index.entry(row.location_id).or_default().insert(role, row.x),
            // DAM exports carry many more named points than we consume
            None => tracing::debug!("Ignoring characteristic point role '{}'", row.role),
        }
    }
    Ok(index)
}

/// The wide DAM surface-line format: `location_id;x1;y1;z1;x2;y2;z2;...`.
/// Flattened to (station, elevation) by taking x and z; the y ordinate is
/// discarded, matching the upstream projection.
pub fn parse_surface_lines(data: &[u8]) -> Result<HashMap<String, Polyline>> {
    let mut index = HashMap::new();
    for record in reader(data).records() {
        let record = record?;
        let mut fields = record.iter();
        let location_id = match fields.next() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => continue,
        };

        let coords: Vec<f64> = fields
            .filter(|f| !f.is_empty())
            .map(|f| {
                f.parse::<f64>().map_err(|_| DamError::MalformedInput {
                    message: format!("surface line '{}': bad coordinate '{}'", location_id, f),
                })
            })
            .collect::<Result<_>>()?;
        if coords.len() % 3 != 0 {
            return Err(DamError::MalformedInput {
                message: format!(
                    "surface line '{}': expected x;y;z triplets, got {} values",
                    location_id,
                    coords.len()
                ),
            });
        }

        let points: Vec<Point2D> = coords
            .chunks_exact(3)
            .map(|xyz| Point2D::new(xyz[0], xyz[2]))
            .collect();
        let line = Polyline::new(points).map_err(|err| DamError::MalformedInput {
            message: format!("surface line '{}': {}", location_id, err),
        })?;
        index.insert(location_id, line);
    }
    Ok(index)
}

#[derive(Debug, Deserialize)]
struct SoilProfileRow {
    soilprofile_id: String,
    soil_name: String,
    station: Option<f64>,
    top_level: f64,
    bottom_level: f64,
}

/// Profile rows are grouped into layers per consecutive
/// (profile, soil name) run. A single row without a station is the original
/// scalar format: boundaries constant across the whole section.
pub fn parse_soil_profiles(data: &[u8]) -> Result<HashMap<String, SoilProfile>> {
    let mut index: HashMap<String, SoilProfile> = HashMap::new();
    let mut pending: Vec<SoilProfileRow> = Vec::new();

    let mut flush = |pending: &mut Vec<SoilProfileRow>,
                     index: &mut HashMap<String, SoilProfile>|
     -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let layer = build_layer(pending)?;
        let profile_id = pending[0].soilprofile_id.clone();
        index
            .entry(profile_id.clone())
            .or_insert_with(|| SoilProfile {
                id: profile_id,
                layers: Vec::new(),
            })
            .layers
            .push(layer);
        pending.clear();
        Ok(())
    };

    for row in reader(data).deserialize() {
        let row: SoilProfileRow = row?;
        let same_layer = pending.last().map_or(false, |last: &SoilProfileRow| {
            last.soilprofile_id == row.soilprofile_id && last.soil_name == row.soil_name
        });
        if !same_layer {
            flush(&mut pending, &mut index)?;
        }
        pending.push(row);
    }
    flush(&mut pending, &mut index)?;

    Ok(index)
}

fn build_layer(rows: &[SoilProfileRow]) -> Result<SoilLayer> {
    let soil_code = rows[0].soil_name.clone();
    let with_station = rows.iter().filter(|r| r.station.is_some()).count();

    if with_station == 0 {
        if rows.len() != 1 {
            return Err(DamError::MalformedInput {
                message: format!(
                    "soil profile '{}': layer '{}' has {} stationless rows, expected 1",
                    rows[0].soilprofile_id,
                    soil_code,
                    rows.len()
                ),
            });
        }
        return Ok(SoilLayer {
            soil_code,
            top: Polyline::constant(rows[0].top_level),
            bottom: Polyline::constant(rows[0].bottom_level),
        });
    }
    if with_station != rows.len() {
        return Err(DamError::MalformedInput {
            message: format!(
                "soil profile '{}': layer '{}' mixes stationless and stationed rows",
                rows[0].soilprofile_id, soil_code
            ),
        });
    }

    let boundary = |pick: fn(&SoilProfileRow) -> f64| -> Result<Polyline> {
        let points = rows
            .iter()
            .map(|r| Point2D::new(r.station.unwrap_or_default(), pick(r)))
            .collect();
        Polyline::new(points).map_err(|err| DamError::MalformedInput {
            message: format!(
                "soil profile '{}': layer '{}': {}",
                rows[0].soilprofile_id, soil_code, err
            ),
        })
    };

    let top = boundary(|r| r.top_level)?;
    let bottom = boundary(|r| r.bottom_level)?;
    Ok(SoilLayer {
        soil_code,
        top,
        bottom,
    })
}

#[derive(Debug, Deserialize)]
struct CombinationRow {
    combination_id: String,
    location_id: String,
    soilprofile_id: String,
    surfaceline_id: String,
}

pub fn parse_combinations(data: &[u8]) -> Result<Vec<Combination>> {
    let mut combinations = Vec::new();
    for row in reader(data).deserialize() {
        let row: CombinationRow = row?;
        combinations.push(Combination {
            id: row.combination_id,
            location_id: row.location_id,
            profile_id: row.soilprofile_id,
            surface_line_id: row.surfaceline_id,
        });
    }
    Ok(combinations)
}

#[derive(Debug, Deserialize)]
struct WaterLevelRow {
    location_id: String,
    min_polder_level: f64,
    max_polder_level: Option<f64>,
}

pub fn parse_water_levels(data: &[u8]) -> Result<HashMap<String, WaterLevels>> {
    let mut index = HashMap::new();
    for row in reader(data).deserialize() {
        let row: WaterLevelRow = row?;
        index.insert(
            row.location_id,
            WaterLevels {
                min_polder_level: Some(row.min_polder_level),
                max_polder_level: row.max_polder_level,
                phreatic: Vec::new(),
            },
        );
    }
    Ok(index)
}

#[derive(Debug, Deserialize)]
struct HeadLineRow {
    location_id: String,
    station: f64,
    head: f64,
}

pub fn parse_head_lines(data: &[u8]) -> Result<HashMap<String, Vec<Point2D>>> {
    let mut index: HashMap<String, Vec<Point2D>> = HashMap::new();
    for row in reader(data).deserialize() {
        let row: HeadLineRow = row?;
        index
            .entry(row.location_id)
            .or_default()
            .push(Point2D::new(row.station, row.head));
    }
    for observations in index.values_mut() {
        observations.sort_by(|a, b| a.station.total_cmp(&b.station));
    }
    Ok(index)
}
