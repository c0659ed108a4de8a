pub mod cli;
pub mod toml_config;

pub use toml_config::TomlConfig;

use crate::core::ConfigProvider;
use crate::domain::model::SoilParameterCatalog;
use crate::domain::ports::InputFile;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_positive_tolerance, Validate,
};
use clap::Parser;
use std::collections::HashMap;

#[derive(Debug, Clone, Parser)]
#[command(name = "dam2stix")]
#[command(about = "Converts DAM levee survey exports into 2D stability-calculation geometries")]
pub struct CliConfig {
    #[arg(long, default_value = "data/input")]
    pub input_path: String,

    #[arg(long, default_value = "data/output")]
    pub output_path: String,

    #[arg(long, help = "Optional TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, default_value = "4", help = "Combinations processed concurrently")]
    pub jobs: usize,

    #[arg(long, default_value = "0.001", help = "Layer thickness tolerance in metres")]
    pub thickness_tolerance: f64,

    #[arg(long, default_value = "0.1", help = "Minimum usable section width in metres")]
    pub min_section_width: f64,

    #[arg(
        long,
        value_delimiter = ',',
        help = "Extra soil code aliases as FROM=TO pairs"
    )]
    pub soil_alias: Vec<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &str {
        &self.input_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn concurrent_jobs(&self) -> usize {
        self.jobs
    }

    fn thickness_tolerance(&self) -> f64 {
        self.thickness_tolerance
    }

    fn min_section_width(&self) -> f64 {
        self.min_section_width
    }

    fn soil_aliases(&self) -> HashMap<String, String> {
        let mut aliases = SoilParameterCatalog::default_aliases();
        for pair in &self.soil_alias {
            if let Some((from, to)) = pair.split_once('=') {
                aliases.insert(from.trim().to_string(), to.trim().to_string());
            }
        }
        aliases
    }

    fn input_filename(&self, kind: InputFile) -> String {
        kind.default_filename().to_string()
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_path("input_path", &self.input_path)?;
        validate_path("output_path", &self.output_path)?;
        validate_positive_number("jobs", self.jobs, 1)?;
        validate_positive_tolerance("thickness_tolerance", self.thickness_tolerance)?;
        validate_positive_tolerance("min_section_width", self.min_section_width)?;
        for pair in &self.soil_alias {
            if pair.split_once('=').is_none() {
                return Err(crate::utils::error::DamError::ConfigError {
                    field: "soil_alias".to_string(),
                    message: format!("expected FROM=TO pair, got '{}'", pair),
                });
            }
        }
        Ok(())
    }
}
