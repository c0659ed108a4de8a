//! Serializes a cross-section into the `.stix` calculation file: a zip
//! container holding JSON documents for geometry, soil parameters and the
//! waternet.

use crate::domain::model::{CrossSection, Point2D, SoilParameter};
use crate::utils::error::Result;
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

#[derive(Debug, Serialize)]
struct GeometryDocument<'a> {
    combination_id: &'a str,
    location_id: &'a str,
    layers: Vec<GeometryLayer<'a>>,
}

#[derive(Debug, Serialize)]
struct GeometryLayer<'a> {
    soil_code: &'a str,
    points: &'a [Point2D],
}

#[derive(Debug, Serialize)]
struct WaternetDocument<'a> {
    min_polder_level: Option<f64>,
    max_polder_level: Option<f64>,
    phreatic_line: &'a [Point2D],
}

#[derive(Debug, Serialize)]
struct MetadataDocument {
    tool: &'static str,
    version: &'static str,
    created: String,
}

pub struct StixExporter;

impl StixExporter {
    pub fn export(section: &CrossSection) -> Result<Vec<u8>> {
        let geometry = GeometryDocument {
            combination_id: &section.combination_id,
            location_id: &section.location_id,
            layers: section
                .layers
                .iter()
                .map(|l| GeometryLayer {
                    soil_code: &l.polygon.soil_code,
                    points: &l.polygon.ring,
                })
                .collect(),
        };

        // Each soil type once, in stack order
        let mut soils: Vec<&SoilParameter> = Vec::new();
        for layer in &section.layers {
            if !soils.iter().any(|s| s.code == layer.parameter.code) {
                soils.push(&layer.parameter);
            }
        }

        let metadata = MetadataDocument {
            tool: "dam2stix",
            version: env!("CARGO_PKG_VERSION"),
            created: chrono::Utc::now().to_rfc3339(),
        };

        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        zip.start_file::<_, ()>("geometry.json", FileOptions::default())?;
        zip.write_all(serde_json::to_string_pretty(&geometry)?.as_bytes())?;

        zip.start_file::<_, ()>("soils.json", FileOptions::default())?;
        zip.write_all(serde_json::to_string_pretty(&soils)?.as_bytes())?;

        if let Some(water) = &section.water_levels {
            let waternet = WaternetDocument {
                min_polder_level: water.min_polder_level,
                max_polder_level: water.max_polder_level,
                phreatic_line: &water.phreatic,
            };
            zip.start_file::<_, ()>("waternet.json", FileOptions::default())?;
            zip.write_all(serde_json::to_string_pretty(&waternet)?.as_bytes())?;
        }

        zip.start_file::<_, ()>("metadata.json", FileOptions::default())?;
        zip.write_all(serde_json::to_string_pretty(&metadata)?.as_bytes())?;

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}
