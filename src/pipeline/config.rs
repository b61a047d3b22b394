// Serializable pipeline descriptions and presets

use serde::{Deserialize, Serialize};

use super::types::{FeatureStage, Stage};
use crate::error::Result;
use crate::features::{FeatureRegistry, BUILTIN_FEATURES};
use crate::filters::FilterSpec;
use crate::windowing::{WindowFunction, Windower};

/// Ordered list of stage descriptions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageConfig {
    Filter(FilterSpec),
    Window(WindowConfig),
    Features(FeatureConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub window_length: usize,

    /// Fraction of a frame shared with the previous one
    #[serde(default = "default_overlap")]
    pub overlap: f64,

    /// Overlap in samples; takes precedence over `overlap` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_samples: Option<usize>,

    #[serde(default)]
    pub window_function: WindowFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_features")]
    pub features: Vec<String>,

    /// Willison amplitude thresholds; each adds a `wamp_<threshold>` feature
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub willison_thresholds: Vec<f64>,
}

fn default_overlap() -> f64 {
    0.5
}
fn default_features() -> Vec<String> {
    BUILTIN_FEATURES.iter().map(|s| s.to_string()).collect()
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            features: default_features(),
            willison_thresholds: Vec::new(),
        }
    }
}

impl WindowConfig {
    pub fn build(&self) -> Result<Windower> {
        match self.overlap_samples {
            Some(samples) => {
                Windower::with_overlap_samples(self.window_length, samples, self.window_function)
            }
            None => Windower::new(self.window_length, self.overlap, self.window_function),
        }
    }
}

impl FeatureConfig {
    pub fn build(&self) -> FeatureStage {
        let mut registry = FeatureRegistry::with_builtins();
        let mut features = self.features.clone();
        for &threshold in &self.willison_thresholds {
            let name = registry.register_willison_amplitude(threshold);
            if !features.contains(&name) {
                features.push(name);
            }
        }
        FeatureStage::with_registry(registry, features)
    }
}

impl StageConfig {
    pub fn build(&self) -> Result<Stage> {
        Ok(match self {
            StageConfig::Filter(spec) => Stage::filter(spec.clone()),
            StageConfig::Window(window) => Stage::window(window.build()?),
            StageConfig::Features(features) => Stage::Features(features.build()),
        })
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build every stage; window parameters are checked here
    pub fn build_stages(&self) -> Result<Vec<Stage>> {
        self.stages.iter().map(StageConfig::build).collect()
    }

    /// Surface EMG: powerline notch, 20-450 Hz bandpass, 200-sample Hann
    /// frames at 50% overlap, amplitude and EMG features
    ///
    /// The bandpass needs a sample rate above 900 Hz.
    pub fn standard_emg(powerline_hz: f64) -> Self {
        Self {
            stages: vec![
                StageConfig::Filter(FilterSpec::notch(powerline_hz, 30.0)),
                StageConfig::Filter(FilterSpec::bandpass(20.0, 450.0, 4)),
                StageConfig::Window(WindowConfig {
                    window_length: 200,
                    overlap: 0.5,
                    overlap_samples: None,
                    window_function: WindowFunction::Hann,
                }),
                StageConfig::Features(FeatureConfig {
                    features: ["mav", "rms", "waveform_length", "zero_crossings", "slope_sign_changes"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                    willison_thresholds: Vec::new(),
                }),
            ],
        }
    }

    /// EEG: powerline notch, 0.5-70 Hz bandpass, 256-sample Hann frames at
    /// 50% overlap, basic amplitude statistics
    pub fn standard_eeg(powerline_hz: f64) -> Self {
        Self {
            stages: vec![
                StageConfig::Filter(FilterSpec::notch(powerline_hz, 30.0)),
                StageConfig::Filter(FilterSpec::bandpass(0.5, 70.0, 4)),
                StageConfig::Window(WindowConfig {
                    window_length: 256,
                    overlap: 0.5,
                    overlap_samples: None,
                    window_function: WindowFunction::Hann,
                }),
                StageConfig::Features(FeatureConfig {
                    features: ["mean", "variance", "rms", "peak_to_peak"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                    willison_thresholds: Vec::new(),
                }),
            ],
        }
    }
}
