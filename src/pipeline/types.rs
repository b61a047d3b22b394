// Stage types for the preprocessing pipeline

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{PrepError, Result};
use crate::features::{FeatureExtractor, FeatureRegistry, FeatureSet};
use crate::filters::{FilterBank, FilterHandle, FilterSpec};
use crate::types::{DataKind, MultichannelSignal};
use crate::windowing::{FrameSet, Windower};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Unvalidated,
    Validated,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Unvalidated => write!(f, "unvalidated"),
            PipelineState::Validated => write!(f, "validated"),
        }
    }
}

/// Data passed between stages; the last stage's value is the pipeline output
#[derive(Debug, Clone)]
pub enum StageData {
    Signal(MultichannelSignal),
    Frames(FrameSet),
    Features(FeatureSet),
}

impl StageData {
    pub fn kind(&self) -> DataKind {
        match self {
            StageData::Signal(_) => DataKind::Signal,
            StageData::Frames(_) => DataKind::Frames,
            StageData::Features(_) => DataKind::Features,
        }
    }

    pub fn into_signal(self) -> Option<MultichannelSignal> {
        match self {
            StageData::Signal(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn into_frames(self) -> Option<FrameSet> {
        match self {
            StageData::Frames(frames) => Some(frames),
            _ => None,
        }
    }

    pub fn into_features(self) -> Option<FeatureSet> {
        match self {
            StageData::Features(features) => Some(features),
            _ => None,
        }
    }
}

/// Sample rates a filter stage keeps designs for
const STAGE_CACHED_RATES: usize = 4;

#[derive(Debug, Clone)]
enum FilterSource {
    Spec(FilterSpec),
    Handle(FilterHandle),
}

/// Zero-phase filter stage: signal → signal
///
/// A spec is designed against each input's sample rate; designs for the last
/// few rates are cached.
#[derive(Debug, Clone)]
pub struct FilterStage {
    source: FilterSource,
    bank: FilterBank,
}

impl FilterStage {
    pub fn new(spec: FilterSpec) -> Self {
        Self {
            source: FilterSource::Spec(spec),
            bank: FilterBank::with_capacity(STAGE_CACHED_RATES),
        }
    }

    /// Stage applying an already designed filter; inputs must match its rate
    pub fn from_handle(handle: FilterHandle) -> Self {
        Self {
            source: FilterSource::Handle(handle),
            bank: FilterBank::with_capacity(1),
        }
    }

    pub fn spec(&self) -> Option<&FilterSpec> {
        match &self.source {
            FilterSource::Spec(spec) => Some(spec),
            FilterSource::Handle(handle) => handle.spec(),
        }
    }

    /// Number of designs currently cached
    pub fn cached_designs(&self) -> usize {
        self.bank.cached_handles()
    }

    fn name(&self) -> String {
        match self.spec() {
            Some(spec) => format!("{} filter", spec.kind),
            None => "custom filter".to_string(),
        }
    }

    fn preflight(&self, signal: &MultichannelSignal) -> Result<()> {
        match &self.source {
            FilterSource::Spec(spec) => spec.validate(signal.sample_rate()),
            FilterSource::Handle(handle) => {
                if handle.sample_rate().to_bits() != signal.sample_rate().to_bits() {
                    return Err(PrepError::InvalidFilterSpec(format!(
                        "Filter designed for {} Hz cannot run on a {} Hz signal",
                        handle.sample_rate(),
                        signal.sample_rate()
                    )));
                }
                Ok(())
            }
        }
    }

    fn apply(&mut self, signal: &MultichannelSignal) -> Result<MultichannelSignal> {
        match &self.source {
            FilterSource::Spec(spec) => self.bank.design_and_apply(spec, signal),
            FilterSource::Handle(handle) => self.bank.apply(handle, signal),
        }
    }
}

/// Segmentation stage: signal → frames
#[derive(Debug, Clone)]
pub struct WindowStage {
    windower: Windower,
}

impl WindowStage {
    pub fn new(windower: Windower) -> Self {
        Self { windower }
    }

    pub fn windower(&self) -> &Windower {
        &self.windower
    }
}

/// Feature extraction stage: frames → features
#[derive(Debug, Clone)]
pub struct FeatureStage {
    extractor: FeatureExtractor,
    features: Vec<String>,
}

impl FeatureStage {
    /// Extract the named built-in features
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_registry(FeatureRegistry::with_builtins(), features)
    }

    /// Extract the named features from a custom registry
    pub fn with_registry<I, S>(registry: FeatureRegistry, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extractor: FeatureExtractor::new(registry),
            features: features.into_iter().map(Into::into).collect(),
        }
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }
}

/// One pipeline step
#[derive(Debug, Clone)]
pub enum Stage {
    Filter(FilterStage),
    Window(WindowStage),
    Features(FeatureStage),
}

impl Stage {
    pub fn filter(spec: FilterSpec) -> Self {
        Stage::Filter(FilterStage::new(spec))
    }

    pub fn window(windower: Windower) -> Self {
        Stage::Window(WindowStage::new(windower))
    }

    pub fn features<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Stage::Features(FeatureStage::new(features))
    }

    pub fn name(&self) -> String {
        match self {
            Stage::Filter(stage) => stage.name(),
            Stage::Window(_) => "window".to_string(),
            Stage::Features(_) => "features".to_string(),
        }
    }

    pub fn input_kind(&self) -> DataKind {
        match self {
            Stage::Filter(_) | Stage::Window(_) => DataKind::Signal,
            Stage::Features(_) => DataKind::Frames,
        }
    }

    pub fn output_kind(&self) -> DataKind {
        match self {
            Stage::Filter(_) => DataKind::Signal,
            Stage::Window(_) => DataKind::Frames,
            Stage::Features(_) => DataKind::Features,
        }
    }

    pub fn accepts(&self, kind: DataKind) -> bool {
        self.input_kind() == kind
    }

    /// Parameter checks against the pipeline input, before any numeric work
    ///
    /// Filters keep the shape and rate of their input, so every stage can be
    /// checked against the original signal.
    pub fn preflight(&self, signal: &MultichannelSignal) -> Result<()> {
        match self {
            Stage::Filter(stage) => stage.preflight(signal),
            Stage::Window(stage) => stage.windower.check_length(signal.num_samples()),
            Stage::Features(stage) => stage.extractor.check_features(&stage.features),
        }
    }

    pub fn apply(&mut self, input: StageData) -> Result<StageData> {
        match (self, input) {
            (Stage::Filter(stage), StageData::Signal(signal)) => {
                stage.apply(&signal).map(StageData::Signal)
            }
            (Stage::Window(stage), StageData::Signal(signal)) => stage
                .windower
                .segment_shared(Arc::new(signal))
                .map(StageData::Frames),
            (Stage::Features(stage), StageData::Frames(frames)) => stage
                .extractor
                .extract(&frames, &stage.features)
                .map(StageData::Features),
            // Only reachable through a direct call: `Pipeline::run` validates
            // composition first, so the mismatched data came from the caller.
            (stage, input) => Err(PrepError::PipelineComposition {
                upstream: "input".to_string(),
                downstream: stage.name(),
                produced: input.kind(),
                expected: stage.input_kind(),
            }),
        }
    }
}

impl From<FilterStage> for Stage {
    fn from(stage: FilterStage) -> Self {
        Stage::Filter(stage)
    }
}

impl From<WindowStage> for Stage {
    fn from(stage: WindowStage) -> Self {
        Stage::Window(stage)
    }
}

impl From<FeatureStage> for Stage {
    fn from(stage: FeatureStage) -> Self {
        Stage::Features(stage)
    }
}

impl From<FilterSpec> for Stage {
    fn from(spec: FilterSpec) -> Self {
        Stage::filter(spec)
    }
}

impl From<FilterHandle> for Stage {
    fn from(handle: FilterHandle) -> Self {
        Stage::Filter(FilterStage::from_handle(handle))
    }
}

impl From<Windower> for Stage {
    fn from(windower: Windower) -> Self {
        Stage::window(windower)
    }
}
