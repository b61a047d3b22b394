//! Feature Extraction
//!
//! Maps frames to named scalar features. Feature functions are pluggable:
//! anything implementing [`FeatureFn`] can be registered under a name in a
//! [`FeatureRegistry`]. A failing function only loses its own
//! (frame, channel, feature) entry; the failure is reported alongside the
//! values that did succeed.

mod td;

pub use td::TimeDomain;

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

use crate::error::{PrepError, Result};
use crate::windowing::{Frame, FrameSet};

/// Named values produced by one feature function for one (frame, channel)
pub type FeatureValues = BTreeMap<String, f64>;

/// Failure of a single feature function on a single (frame, channel)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Channel index {0} out of range")]
    ChannelOutOfRange(usize),

    #[error("Feature computation failed: {0}")]
    Computation(String),

    #[error("Feature returned no values")]
    MissingOutput,
}

/// Capability implemented by every feature function
///
/// A value keyed by the registered name is stored under that name; any other
/// key is stored as `<registered name>.<key>`. Returning no values, returning
/// `Err` or panicking all count as a failure of that one (frame, channel,
/// feature) entry.
pub trait FeatureFn: Send + Sync {
    fn compute(&self, frame: &Frame, channel: usize) -> std::result::Result<FeatureValues, FeatureError>;
}

impl<F> FeatureFn for F
where
    F: Fn(&Frame, usize) -> std::result::Result<FeatureValues, FeatureError> + Send + Sync,
{
    fn compute(&self, frame: &Frame, channel: usize) -> std::result::Result<FeatureValues, FeatureError> {
        self(frame, channel)
    }
}

/// Adapts a function over one channel's samples into a single-valued feature
pub struct ScalarFeature<F> {
    name: String,
    func: F,
}

impl<F> ScalarFeature<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> FeatureFn for ScalarFeature<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn compute(&self, frame: &Frame, channel: usize) -> std::result::Result<FeatureValues, FeatureError> {
        let samples = frame
            .channel(channel)
            .ok_or(FeatureError::ChannelOutOfRange(channel))?;
        let mut values = FeatureValues::new();
        values.insert(self.name.clone(), (self.func)(samples));
        Ok(values)
    }
}

/// Names of the built-in features, in registration order
pub const BUILTIN_FEATURES: &[&str] = &[
    "mean",
    "variance",
    "rms",
    "peak_to_peak",
    "zero_crossing_rate",
    "energy",
    "mav",
    "waveform_length",
    "slope_sign_changes",
    "zero_crossings",
];

/// Named collection of feature functions
#[derive(Clone, Default)]
pub struct FeatureRegistry {
    features: BTreeMap<String, Arc<dyn FeatureFn>>,
}

impl std::fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("features", &self.features.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FeatureRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in time-domain feature
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_scalar("mean", TimeDomain::mean);
        registry.register_scalar("variance", TimeDomain::variance);
        registry.register_scalar("rms", TimeDomain::rms);
        registry.register_scalar("peak_to_peak", TimeDomain::peak_to_peak);
        registry.register_scalar("zero_crossing_rate", TimeDomain::zero_crossing_rate);
        registry.register_scalar("energy", TimeDomain::energy);
        registry.register_scalar("mav", TimeDomain::mean_absolute_value);
        registry.register_scalar("waveform_length", TimeDomain::waveform_length);
        registry.register_scalar("slope_sign_changes", |x: &[f64]| {
            TimeDomain::slope_sign_changes(x) as f64
        });
        registry.register_scalar("zero_crossings", |x: &[f64]| {
            TimeDomain::zero_crossings(x) as f64
        });
        registry
    }

    /// Register (or replace) a feature function under `name`
    pub fn register(&mut self, name: impl Into<String>, feature: impl FeatureFn + 'static) {
        let name = name.into();
        if self.features.insert(name.clone(), Arc::new(feature)).is_some() {
            log::debug!("Replaced feature '{}'", name);
        }
    }

    /// Register a single-valued feature computed from one channel's samples
    pub fn register_scalar<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        let name = name.into();
        self.register(name.clone(), ScalarFeature::new(name, func));
    }

    /// Register Willison amplitude as `wamp_<threshold>`
    pub fn register_willison_amplitude(&mut self, threshold: f64) -> String {
        let name = format!("wamp_{}", threshold);
        self.register_scalar(name.clone(), move |x: &[f64]| {
            TimeDomain::willison_amplitude(x, threshold) as f64
        });
        name
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FeatureFn>> {
        self.features.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.features.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Look up every name, failing on the first one not registered
    pub fn resolve(&self, names: &[String]) -> Result<Vec<(String, Arc<dyn FeatureFn>)>> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .map(|f| (name.clone(), f))
                    .ok_or_else(|| PrepError::UnknownFeature(name.clone()))
            })
            .collect()
    }
}

/// Key of one feature value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureKey {
    pub frame: usize,
    pub channel: usize,
    pub feature: String,
}

/// One failed (frame, channel, feature) computation
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFailure {
    pub frame: usize,
    pub channel: usize,
    pub feature: String,
    pub error: FeatureError,
}

/// Per-frame, per-channel named feature values plus any failures
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    channels: Vec<String>,
    frame_starts: Vec<usize>,
    sample_rate: f64,
    values: BTreeMap<FeatureKey, f64>,
    failures: Vec<FeatureFailure>,
}

impl FeatureSet {
    pub fn get(&self, frame: usize, channel: usize, feature: &str) -> Option<f64> {
        self.values
            .get(&FeatureKey {
                frame,
                channel,
                feature: feature.to_string(),
            })
            .copied()
    }

    /// Look a value up by channel name
    pub fn get_by_name(&self, frame: usize, channel: &str, feature: &str) -> Option<f64> {
        let idx = self.channels.iter().position(|c| c == channel)?;
        self.get(frame, idx, feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FeatureKey, f64)> {
        self.values.iter().map(|(k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn failures(&self) -> &[FeatureFailure] {
        &self.failures
    }

    /// True when no feature computation failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn num_frames(&self) -> usize {
        self.frame_starts.len()
    }

    /// Start offset in the source signal of each frame
    pub fn frame_starts(&self) -> &[usize] {
        &self.frame_starts
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Distinct feature names present in the set
    pub fn feature_names(&self) -> Vec<String> {
        self.values
            .keys()
            .map(|k| k.feature.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Values of one feature as [channel][frame]; NaN where no value exists
    pub fn feature_matrix(&self, feature: &str) -> Vec<Vec<f64>> {
        (0..self.channels.len())
            .map(|ch| {
                (0..self.num_frames())
                    .map(|frame| self.get(frame, ch, feature).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect()
    }
}

/// Applies registered feature functions to frame sets
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    registry: FeatureRegistry,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureRegistry::with_builtins())
    }
}

impl FeatureExtractor {
    pub fn new(registry: FeatureRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FeatureRegistry {
        &mut self.registry
    }

    /// Check every requested name is registered
    pub fn check_features(&self, names: &[String]) -> Result<()> {
        self.registry.resolve(names).map(|_| ())
    }

    /// Extract the named features from every channel of every frame
    ///
    /// Unknown names fail before any computation.
    pub fn extract(&self, frames: &FrameSet, names: &[String]) -> Result<FeatureSet> {
        let features = self.registry.resolve(names)?;
        Ok(extract_features(frames, &features))
    }
}

/// Apply `features` to every channel of every frame
///
/// Frames are processed in parallel; results are assembled in frame order.
pub fn extract_features(frames: &FrameSet, features: &[(String, Arc<dyn FeatureFn>)]) -> FeatureSet {
    if features.is_empty() {
        log::warn!("No features requested, feature set will be empty");
    }

    crate::profile_scope!(format!("feature extraction ({} frames)", frames.len()));
    let num_channels = frames.num_channels();

    let per_frame: Vec<(Vec<(FeatureKey, f64)>, Vec<FeatureFailure>)> = (0..frames.len())
        .into_par_iter()
        .map(|idx| {
            let mut values = Vec::new();
            let mut failures = Vec::new();

            let Some(frame) = frames.get(idx) else {
                return (values, failures);
            };

            for channel in 0..num_channels {
                for (name, feature) in features {
                    match compute_entry(name, feature.as_ref(), &frame, channel) {
                        Ok(computed) => {
                            values.extend(computed.into_iter().map(|(feature, value)| {
                                (
                                    FeatureKey {
                                        frame: idx,
                                        channel,
                                        feature,
                                    },
                                    value,
                                )
                            }));
                        }
                        Err(error) => failures.push(FeatureFailure {
                            frame: idx,
                            channel,
                            feature: name.clone(),
                            error,
                        }),
                    }
                }
            }

            (values, failures)
        })
        .collect();

    let mut values = BTreeMap::new();
    let mut failures = Vec::new();
    for (frame_values, frame_failures) in per_frame {
        values.extend(frame_values);
        failures.extend(frame_failures);
    }

    if !failures.is_empty() {
        log::warn!(
            "Feature extraction finished with {} failures out of {} computations",
            failures.len(),
            frames.len() * num_channels * features.len()
        );
    }

    log::debug!(
        "Extracted {} feature values from {} frames × {} channels",
        values.len(),
        frames.len(),
        num_channels
    );

    FeatureSet {
        channels: frames.channels().to_vec(),
        frame_starts: frames.start_indices(),
        sample_rate: frames.sample_rate(),
        values,
        failures,
    }
}

/// Run one feature on one (frame, channel), keyed under its registered name
fn compute_entry(
    name: &str,
    feature: &dyn FeatureFn,
    frame: &Frame,
    channel: usize,
) -> std::result::Result<Vec<(String, f64)>, FeatureError> {
    let computed = panic::catch_unwind(AssertUnwindSafe(|| feature.compute(frame, channel)))
        .map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            FeatureError::Computation(format!("panicked: {}", message))
        })??;

    if computed.is_empty() {
        return Err(FeatureError::MissingOutput);
    }

    Ok(computed
        .into_iter()
        .map(|(key, value)| {
            if key == name {
                (key, value)
            } else {
                (format!("{}.{}", name, key), value)
            }
        })
        .collect())
}
