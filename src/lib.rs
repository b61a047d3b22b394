pub mod error;
pub mod features;
pub mod filters;
pub mod pipeline;
pub mod profiling;
pub mod types;
pub mod windowing;

pub use error::{PrepError, Result};
pub use features::{
    FeatureError, FeatureExtractor, FeatureFailure, FeatureFn, FeatureKey, FeatureRegistry,
    FeatureSet, FeatureValues, TimeDomain,
};
pub use filters::{FilterBank, FilterHandle, FilterKind, FilterSpec};
pub use pipeline::{Pipeline, PipelineConfig, PipelineState, Stage, StageData};
pub use types::{DataKind, MultichannelSignal};
pub use windowing::{segment, Frame, FrameSet, WindowFunction, Windower};
