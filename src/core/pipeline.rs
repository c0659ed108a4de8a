use crate::adapters::{dam_csv, report::ReportWriter, stix::StixExporter};
use crate::core::area::AreaAggregator;
use crate::core::clip::{AreaClipper, ClipWindow};
use crate::core::section::CrossSectionBuilder;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{
    BatchResult, CharacteristicPoints, Combination, CombinationOutcome, DamInput,
    GeometrySettings, LayerPolygon,
};
use crate::domain::ports::InputFile;
use crate::utils::error::{DamError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct DamPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> DamPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    fn input_file_path(&self, kind: InputFile) -> String {
        format!(
            "{}/{}",
            self.config.input_path(),
            self.config.input_filename(kind)
        )
    }

    async fn read_input(&self, kind: InputFile) -> Result<Vec<u8>> {
        let path = self.input_file_path(kind);
        tracing::debug!("Reading {}", path);
        self.storage.read_file(&path).await
    }

    /// Reads one of the optional input files, `None` when absent.
    async fn read_optional_input(&self, kind: InputFile) -> Result<Option<Vec<u8>>> {
        let path = self.input_file_path(kind);
        if !self.storage.file_exists(&path).await {
            tracing::debug!("Optional input {} not present", path);
            return Ok(None);
        }
        Ok(Some(self.storage.read_file(&path).await?))
    }

    fn geometry_settings(&self) -> GeometrySettings {
        GeometrySettings {
            thickness_tolerance: self.config.thickness_tolerance(),
            min_section_width: self.config.min_section_width(),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for DamPipeline<S, C> {
    /// Loads every reference table up front; no I/O happens after this.
    async fn extract(&self) -> Result<DamInput> {
        let soils = dam_csv::parse_soil_parameters(&self.read_input(InputFile::SoilParameters).await?)?;
        let characteristic_points = dam_csv::parse_characteristic_points(
            &self.read_input(InputFile::CharacteristicPoints).await?,
        )?;
        let surface_lines =
            dam_csv::parse_surface_lines(&self.read_input(InputFile::SurfaceLines).await?)?;
        let profiles =
            dam_csv::parse_soil_profiles(&self.read_input(InputFile::SoilProfiles).await?)?;
        let combinations =
            dam_csv::parse_combinations(&self.read_input(InputFile::Combinations).await?)?;

        let mut water_levels = match self.read_optional_input(InputFile::WaterLevels).await? {
            Some(data) => dam_csv::parse_water_levels(&data)?,
            None => Default::default(),
        };
        if let Some(data) = self.read_optional_input(InputFile::HeadLines).await? {
            for (location_id, observations) in dam_csv::parse_head_lines(&data)? {
                water_levels.entry(location_id).or_default().phreatic = observations;
            }
        }

        Ok(DamInput {
            soils: crate::domain::model::SoilParameterCatalog::new(
                soils,
                self.config.soil_aliases(),
            ),
            surface_lines,
            characteristic_points,
            profiles,
            water_levels,
            combinations,
        })
    }

    /// One worker task per combination; reference data is shared read-only.
    /// Outcomes are re-sorted by combination id so the reports are
    /// deterministic regardless of completion order.
    async fn transform(&self, input: DamInput) -> Result<BatchResult> {
        let settings = self.geometry_settings();
        let input = Arc::new(input);
        let semaphore = Arc::new(Semaphore::new(self.config.concurrent_jobs().max(1)));

        let mut tasks = JoinSet::new();
        for combination in input.combinations.clone() {
            let input = Arc::clone(&input);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // The semaphore is never closed while tasks run
                let _permit = semaphore.acquire_owned().await.ok();
                process_combination(&input, &combination, settings)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined?);
        }
        outcomes.sort_by(|a, b| a.combination_id.cmp(&b.combination_id));

        Ok(BatchResult { outcomes })
    }

    async fn load(&self, result: BatchResult) -> Result<String> {
        let output_path = self.config.output_path().to_string();

        for outcome in &result.outcomes {
            if let Some(section) = &outcome.section {
                let stix_data = StixExporter::export(section)?;
                let path = format!("{}/{}.stix", output_path, section.combination_id);
                tracing::debug!("Writing {} ({} bytes)", path, stix_data.len());
                self.storage.write_file(&path, &stix_data).await?;
            }
        }

        let unclipped = ReportWriter::render(result.unclipped_records())?;
        self.storage
            .write_file(&format!("{}/areas_unclipped.csv", output_path), &unclipped)
            .await?;

        let clipped = ReportWriter::render(result.clipped_records())?;
        self.storage
            .write_file(&format!("{}/areas_clipped.csv", output_path), &clipped)
            .await?;

        Ok(output_path)
    }
}

/// Runs the full per-combination computation. Errors never escape: they are
/// recorded on the outcome so one bad combination cannot poison the batch.
fn process_combination(
    input: &DamInput,
    combination: &Combination,
    settings: GeometrySettings,
) -> CombinationOutcome {
    let mut outcome = CombinationOutcome {
        combination_id: combination.id.clone(),
        location_id: combination.location_id.clone(),
        section: None,
        unclipped: Vec::new(),
        clipped: Vec::new(),
        build_error: None,
        clip_error: None,
    };

    let surface = match input.surface_lines.get(&combination.surface_line_id) {
        Some(surface) => surface,
        None => {
            outcome.build_error = Some(DamError::MissingReference {
                combination_id: combination.id.clone(),
                kind: "surface line",
                id: combination.surface_line_id.clone(),
            });
            warn_build_failure(&outcome);
            return outcome;
        }
    };
    let profile = match input.profiles.get(&combination.profile_id) {
        Some(profile) => profile,
        None => {
            outcome.build_error = Some(DamError::MissingReference {
                combination_id: combination.id.clone(),
                kind: "soil profile",
                id: combination.profile_id.clone(),
            });
            warn_build_failure(&outcome);
            return outcome;
        }
    };

    let builder = CrossSectionBuilder::new(&input.soils, settings);
    let mut section = match builder.build(combination, surface, profile) {
        Ok(section) => section,
        Err(err) => {
            outcome.build_error = Some(err);
            warn_build_failure(&outcome);
            return outcome;
        }
    };

    let water = input.water_levels.get(&combination.location_id);
    section.water_levels = water.cloned();

    let polygons: Vec<LayerPolygon> = section.layers.iter().map(|l| l.polygon.clone()).collect();
    match AreaAggregator::aggregate(&polygons, false) {
        Ok(records) => outcome.unclipped = records,
        Err(err) => {
            outcome.build_error = Some(err);
            warn_build_failure(&outcome);
            return outcome;
        }
    }
    outcome.section = Some(section);

    let empty_points = CharacteristicPoints::default();
    let points = input
        .characteristic_points
        .get(&combination.location_id)
        .unwrap_or(&empty_points);

    match ClipWindow::derive(points, water) {
        Ok(window) => {
            let pieces = AreaClipper::new(window).clip_section(&polygons);
            match AreaAggregator::aggregate(&pieces, true) {
                Ok(records) => outcome.clipped = records,
                Err(err) => record_clip_failure(&mut outcome, err),
            }
        }
        Err(err) => record_clip_failure(&mut outcome, err),
    }

    outcome
}

fn warn_build_failure(outcome: &CombinationOutcome) {
    if let Some(err) = &outcome.build_error {
        tracing::warn!(
            "Combination '{}' (location '{}') failed: {}",
            outcome.combination_id,
            outcome.location_id,
            err
        );
    }
}

fn record_clip_failure(outcome: &mut CombinationOutcome, err: DamError) {
    tracing::warn!(
        "Combination '{}' (location '{}'): clipped report omitted: {}",
        outcome.combination_id,
        outcome.location_id,
        err
    );
    outcome.clip_error = Some(err);
}
