use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// Kind of data flowing between pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Signal,
    Frames,
    Features,
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataKind::Signal => write!(f, "signal"),
            DataKind::Frames => write!(f, "frames"),
            DataKind::Features => write!(f, "features"),
        }
    }
}

/// Multichannel time-series data [channels × samples]
///
/// Transformations never mutate a signal in place; they build a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultichannelSignal {
    channels: Vec<String>,
    samples: Vec<Vec<f64>>,
    sample_rate: f64,
}

impl MultichannelSignal {
    /// Build a signal, checking the shape invariant
    ///
    /// # Arguments
    /// * `channels` - Channel names, one per sample row
    /// * `samples` - Sample rows, all of identical length
    /// * `sample_rate` - Sampling frequency in Hz, must be positive
    pub fn new(channels: Vec<String>, samples: Vec<Vec<f64>>, sample_rate: f64) -> Result<Self> {
        let signal = Self {
            channels,
            samples,
            sample_rate,
        };
        signal.validate()?;
        Ok(signal)
    }

    /// Build a signal with generated channel names (`Ch1`, `Ch2`, ...)
    pub fn from_samples(samples: Vec<Vec<f64>>, sample_rate: f64) -> Result<Self> {
        let channels = (0..samples.len()).map(|i| format!("Ch{}", i + 1)).collect();
        Self::new(channels, samples, sample_rate)
    }

    /// Check the shape invariant: C ≥ 1, names match rows, equal row lengths, positive rate
    ///
    /// Deserialized signals bypass `new`, so consumers call this before use.
    pub fn validate(&self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(PrepError::InvalidSignal(
                "Signal must have at least one channel".to_string(),
            ));
        }

        if self.channels.len() != self.samples.len() {
            return Err(PrepError::InvalidSignal(format!(
                "{} channel names for {} sample rows",
                self.channels.len(),
                self.samples.len()
            )));
        }

        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(PrepError::InvalidSignal(format!(
                "Sample rate must be positive, got {}",
                self.sample_rate
            )));
        }

        let expected = self.samples[0].len();
        if let Some((idx, row)) = self
            .samples
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != expected)
        {
            return Err(PrepError::InvalidSignal(format!(
                "Channel {} ({}) has {} samples, expected {}",
                idx,
                self.channels[idx],
                row.len(),
                expected
            )));
        }

        Ok(())
    }

    /// Derive a signal with the same channels and rate but new sample rows
    pub(crate) fn with_samples(&self, samples: Vec<Vec<f64>>) -> Self {
        Self {
            channels: self.channels.clone(),
            samples,
            sample_rate: self.sample_rate,
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn samples(&self) -> &[Vec<f64>] {
        &self.samples
    }

    pub fn channel(&self, idx: usize) -> Option<&[f64]> {
        self.samples.get(idx).map(Vec::as_slice)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// (channels, samples)
    pub fn shape(&self) -> (usize, usize) {
        (self.num_channels(), self.num_samples())
    }

    pub fn duration_secs(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate
    }

    pub fn into_samples(self) -> Vec<Vec<f64>> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_shape() {
        let signal = MultichannelSignal::from_samples(vec![vec![0.0; 10], vec![1.0; 10]], 100.0)
            .unwrap();
        assert_eq!(signal.shape(), (2, 10));
        assert_eq!(signal.channels(), &["Ch1".to_string(), "Ch2".to_string()]);
        assert_eq!(signal.nyquist(), 50.0);
        assert!((signal.duration_secs() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_ragged_channels_rejected() {
        let result = MultichannelSignal::from_samples(vec![vec![0.0; 10], vec![0.0; 9]], 100.0);
        assert!(matches!(result, Err(PrepError::InvalidSignal(_))));
    }

    #[test]
    fn test_empty_and_bad_rate_rejected() {
        assert!(MultichannelSignal::from_samples(vec![], 100.0).is_err());
        assert!(MultichannelSignal::from_samples(vec![vec![0.0; 4]], 0.0).is_err());
        assert!(MultichannelSignal::from_samples(vec![vec![0.0; 4]], f64::NAN).is_err());
    }

    #[test]
    fn test_name_count_mismatch_rejected() {
        let result = MultichannelSignal::new(vec!["A".to_string()], vec![vec![0.0], vec![0.0]], 1.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialized_signal_is_validated() {
        let json = r#"{"channels":["A","B"],"samples":[[1.0,2.0],[3.0]],"sample_rate":10.0}"#;
        let signal: MultichannelSignal = serde_json::from_str(json).unwrap();
        assert!(signal.validate().is_err());
    }
}
