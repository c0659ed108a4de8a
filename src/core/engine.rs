use crate::core::Pipeline;
use crate::utils::error::Result;

/// What a finished batch run looks like to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub output_path: String,
    pub combinations: usize,
    pub failed: usize,
}

pub struct BatchEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> BatchEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("Starting dam2stix batch run");

        tracing::info!("Loading DAM input data...");
        let input = self.pipeline.extract().await?;
        tracing::info!(
            "Loaded {} combinations, {} surface lines, {} soil profiles, {} soil types",
            input.combinations.len(),
            input.surface_lines.len(),
            input.profiles.len(),
            input.soils.len()
        );

        tracing::info!("Building cross-section geometries...");
        let result = self.pipeline.transform(input).await?;
        let combinations = result.outcomes.len();
        let failed = result.failed_count();
        tracing::info!(
            "Processed {} combinations ({} with failures)",
            combinations,
            failed
        );

        tracing::info!("Writing calculation files and area reports...");
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Output saved to: {}", output_path);

        Ok(RunSummary {
            output_path,
            combinations,
            failed,
        })
    }
}
