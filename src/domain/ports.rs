use crate::domain::model::{BatchResult, DamInput};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn file_exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn concurrent_jobs(&self) -> usize;
    fn thickness_tolerance(&self) -> f64;
    fn min_section_width(&self) -> f64;
    fn soil_aliases(&self) -> HashMap<String, String>;
    fn input_filename(&self, kind: InputFile) -> String;
}

/// The DAM export files a batch run reads from the input folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFile {
    SoilParameters,
    CharacteristicPoints,
    SurfaceLines,
    SoilProfiles,
    Combinations,
    WaterLevels,
    HeadLines,
}

impl InputFile {
    pub fn default_filename(self) -> &'static str {
        match self {
            InputFile::SoilParameters => "soilparameters.csv",
            InputFile::CharacteristicPoints => "characteristicpoints.csv",
            InputFile::SurfaceLines => "surfacelines.csv",
            InputFile::SoilProfiles => "soilprofiles.csv",
            InputFile::Combinations => "combinationfile.csv",
            InputFile::WaterLevels => "waterlevels.csv",
            InputFile::HeadLines => "headlines.csv",
        }
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<DamInput>;
    async fn transform(&self, input: DamInput) -> Result<BatchResult>;
    async fn load(&self, result: BatchResult) -> Result<String>;
}
