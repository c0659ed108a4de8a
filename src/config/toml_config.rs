use crate::core::ConfigProvider;
use crate::domain::model::SoilParameterCatalog;
use crate::domain::ports::InputFile;
use crate::utils::error::{DamError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub geometry: Option<GeometryConfig>,
    pub processing: Option<ProcessingConfig>,
    pub soil: Option<SoilConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub folder: String,
    pub filenames: Option<FilenameConfig>,
}

/// Overrides for the default DAM export filenames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilenameConfig {
    pub soil_parameters: Option<String>,
    pub characteristic_points: Option<String>,
    pub surface_lines: Option<String>,
    pub soil_profiles: Option<String>,
    pub combinations: Option<String>,
    pub water_levels: Option<String>,
    pub head_lines: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub folder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub thickness_tolerance: Option<f64>,
    pub min_section_width: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilConfig {
    pub aliases: Option<HashMap<String, String>>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DamError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DamError::ConfigError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR_NAME}` placeholders with environment variable values.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        crate::utils::validation::validate_path("input.folder", &self.input.folder)?;
        crate::utils::validation::validate_path("output.folder", &self.output.folder)?;

        if let Some(processing) = &self.processing {
            if let Some(jobs) = processing.jobs {
                crate::utils::validation::validate_positive_number("processing.jobs", jobs, 1)?;
            }
        }

        if let Some(geometry) = &self.geometry {
            if let Some(tolerance) = geometry.thickness_tolerance {
                crate::utils::validation::validate_positive_tolerance(
                    "geometry.thickness_tolerance",
                    tolerance,
                )?;
            }
            if let Some(width) = geometry.min_section_width {
                crate::utils::validation::validate_positive_tolerance(
                    "geometry.min_section_width",
                    width,
                )?;
            }
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn input_path(&self) -> &str {
        &self.input.folder
    }

    fn output_path(&self) -> &str {
        &self.output.folder
    }

    fn concurrent_jobs(&self) -> usize {
        self.processing
            .as_ref()
            .and_then(|p| p.jobs)
            .unwrap_or(4)
    }

    fn thickness_tolerance(&self) -> f64 {
        self.geometry
            .as_ref()
            .and_then(|g| g.thickness_tolerance)
            .unwrap_or(0.001)
    }

    fn min_section_width(&self) -> f64 {
        self.geometry
            .as_ref()
            .and_then(|g| g.min_section_width)
            .unwrap_or(0.1)
    }

    fn soil_aliases(&self) -> HashMap<String, String> {
        let mut aliases = SoilParameterCatalog::default_aliases();
        if let Some(soil) = &self.soil {
            if let Some(extra) = &soil.aliases {
                for (from, to) in extra {
                    aliases.insert(from.clone(), to.clone());
                }
            }
        }
        aliases
    }

    fn input_filename(&self, kind: InputFile) -> String {
        let overrides = self.input.filenames.as_ref();
        let chosen = overrides.and_then(|f| match kind {
            InputFile::SoilParameters => f.soil_parameters.clone(),
            InputFile::CharacteristicPoints => f.characteristic_points.clone(),
            InputFile::SurfaceLines => f.surface_lines.clone(),
            InputFile::SoilProfiles => f.soil_profiles.clone(),
            InputFile::Combinations => f.combinations.clone(),
            InputFile::WaterLevels => f.water_levels.clone(),
            InputFile::HeadLines => f.head_lines.clone(),
        });
        chosen.unwrap_or_else(|| kind.default_filename().to_string())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
