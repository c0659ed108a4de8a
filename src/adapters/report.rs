//! The per-soil-type area reports: semicolon-separated CSV with plain
//! period-decimal floats, one row per (combination, soil code).

use crate::domain::model::AreaRecord;
use crate::utils::error::Result;

pub struct ReportWriter;

impl ReportWriter {
    pub fn render<'a>(records: impl Iterator<Item = &'a AreaRecord>) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_writer(Vec::new());

        writer.write_record(["combination_id", "soil_code", "area"])?;
        for record in records {
            writer.write_record([
                record.combination_id.as_str(),
                record.soil_code.as_str(),
                &format!("{}", record.area),
            ])?;
        }

        writer.into_inner().map_err(|err| {
            crate::utils::error::DamError::MalformedInput {
                message: format!("report buffer flush failed: {}", err),
            }
        })
    }
}
