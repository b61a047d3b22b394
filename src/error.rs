use thiserror::Error;

use crate::types::DataKind;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Invalid filter spec: {0}")]
    InvalidFilterSpec(String),

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    #[error("Degenerate window: {0}")]
    DegenerateWindow(String),

    #[error(
        "Pipeline composition error: {upstream} produces {produced} but {downstream} expects {expected}"
    )]
    PipelineComposition {
        upstream: String,
        downstream: String,
        produced: DataKind,
        expected: DataKind,
    },

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Stage {position} ({stage}) failed: {source}")]
    Stage {
        position: usize,
        stage: String,
        #[source]
        source: Box<PrepError>,
    },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl PrepError {
    /// Wrap an error with the position and name of the pipeline stage that raised it
    pub fn at_stage(self, position: usize, stage: impl Into<String>) -> Self {
        PrepError::Stage {
            position,
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// The underlying domain error, looking through any stage annotation
    pub fn root(&self) -> &PrepError {
        match self {
            PrepError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
