// Preprocessing pipeline: ordered filter, window and feature stages
//
// Provides:
// - Stage types with declared input/output kinds
// - Composition validation cached per stage list
// - Serializable configurations and presets

mod config;
mod manager;
mod types;

pub use config::{FeatureConfig, PipelineConfig, StageConfig, WindowConfig};
pub use manager::Pipeline;
pub use types::{FeatureStage, FilterStage, PipelineState, Stage, StageData, WindowStage};
