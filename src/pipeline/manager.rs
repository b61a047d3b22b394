// Pipeline - ordered chain of preprocessing stages
//
// Features:
// - Stage registration, singly or in batches
// - Composition check between neighbouring stages, cached until the chain changes
// - Parameter preflight against each input before any numeric work
// - Stage errors annotated with the failing stage's position

use super::config::PipelineConfig;
use super::types::{PipelineState, Stage, StageData};
use crate::error::{PrepError, Result};
use crate::profiling::ProfileScope;
use crate::types::{DataKind, MultichannelSignal};

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an unvalidated pipeline from a configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut pipeline = Self::new();
        pipeline.add_stages(config.build_stages()?);
        Ok(pipeline)
    }

    pub fn add_stage(&mut self, stage: impl Into<Stage>) -> &mut Self {
        let stage = stage.into();
        log::debug!("Stage {} registered: {}", self.stages.len(), stage.name());
        self.stages.push(stage);
        self.state = PipelineState::Unvalidated;
        self
    }

    pub fn add_stages<I>(&mut self, stages: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Stage>,
    {
        for stage in stages {
            self.add_stage(stage);
        }
        self
    }

    pub fn remove_stage(&mut self, position: usize) -> Option<Stage> {
        if position >= self.stages.len() {
            return None;
        }
        self.state = PipelineState::Unvalidated;
        Some(self.stages.remove(position))
    }

    pub fn clear(&mut self) {
        self.stages.clear();
        self.state = PipelineState::Unvalidated;
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Kind of value `run` returns
    pub fn output_kind(&self) -> DataKind {
        self.stages
            .last()
            .map(|stage| stage.output_kind())
            .unwrap_or(DataKind::Signal)
    }

    /// Check that each stage accepts what the previous one produces
    ///
    /// The result is cached; adding or removing stages resets it.
    pub fn validate(&mut self) -> Result<()> {
        if self.state == PipelineState::Validated {
            return Ok(());
        }

        let mut upstream = "input".to_string();
        let mut produced = DataKind::Signal;

        for (position, stage) in self.stages.iter().enumerate() {
            if !stage.accepts(produced) {
                let err = PrepError::PipelineComposition {
                    upstream,
                    downstream: format!("stage {} ({})", position, stage.name()),
                    produced,
                    expected: stage.input_kind(),
                };
                log::warn!("Pipeline validation failed: {}", err);
                return Err(err);
            }
            upstream = format!("stage {} ({})", position, stage.name());
            produced = stage.output_kind();
        }

        self.state = PipelineState::Validated;
        log::info!(
            "Pipeline validated: {} stages, output {}",
            self.stages.len(),
            self.output_kind()
        );
        Ok(())
    }

    /// Run every stage in registration order on `signal`
    ///
    /// Composition, signal shape and stage parameters are all checked before
    /// the first stage runs. A failing stage stops the run; its error carries
    /// the stage position.
    pub fn run(&mut self, signal: &MultichannelSignal) -> Result<StageData> {
        self.validate()?;
        signal.validate()?;

        if self.stages.is_empty() {
            log::warn!("Pipeline has no stages, returning input unchanged");
            return Ok(StageData::Signal(signal.clone()));
        }

        for (position, stage) in self.stages.iter().enumerate() {
            stage
                .preflight(signal)
                .map_err(|e| e.at_stage(position, stage.name()))?;
        }

        let _run_scope = ProfileScope::new(format!("pipeline run ({} stages)", self.stages.len()));
        let mut data = StageData::Signal(signal.clone());

        for (position, stage) in self.stages.iter_mut().enumerate() {
            let name = stage.name();
            let _scope = ProfileScope::new(format!("stage {} ({})", position, name));
            data = stage.apply(data).map_err(|e| {
                log::warn!("Stage {} ({}) failed: {}", position, name, e);
                e.at_stage(position, name.clone())
            })?;
        }

        log::info!(
            "Pipeline run complete: {} channels × {} samples -> {}",
            signal.num_channels(),
            signal.num_samples(),
            data.kind()
        );
        Ok(data)
    }
}
