//! Signal Windowing
//!
//! Segments a multichannel signal into fixed-length, possibly overlapping
//! frames. Trailing samples that cannot fill a complete frame are dropped.
//! Frames are produced lazily from a shared, immutable copy of the source
//! signal; every yielded `Frame` owns its samples.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::error::{PrepError, Result};
use crate::types::MultichannelSignal;

/// Taper applied to each frame
///
/// All tapers use the symmetric definition over `L` points; `L = 1` yields `[1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    #[default]
    Rectangular,
    /// 0.5 - 0.5*cos(2πn/(L-1))
    Hann,
    /// 0.54 - 0.46*cos(2πn/(L-1))
    Hamming,
    /// 0.42 - 0.5*cos(2πn/(L-1)) + 0.08*cos(4πn/(L-1))
    Blackman,
}

impl WindowFunction {
    /// Taper coefficients for a frame of `len` samples
    pub fn coefficients(&self, len: usize) -> Vec<f64> {
        if len <= 1 {
            return vec![1.0; len];
        }

        let denom = (len - 1) as f64;
        (0..len)
            .map(|n| {
                let x = 2.0 * PI * n as f64 / denom;
                match self {
                    WindowFunction::Rectangular => 1.0,
                    WindowFunction::Hann => 0.5 - 0.5 * x.cos(),
                    WindowFunction::Hamming => 0.54 - 0.46 * x.cos(),
                    WindowFunction::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }
}

impl std::fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowFunction::Rectangular => write!(f, "rectangular"),
            WindowFunction::Hann => write!(f, "hann"),
            WindowFunction::Hamming => write!(f, "hamming"),
            WindowFunction::Blackman => write!(f, "blackman"),
        }
    }
}

/// One windowed segment of a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Position of this frame within its frame set
    pub index: usize,
    /// Per-channel samples, each of the window length
    pub channel_data: Vec<Vec<f64>>,
    /// Offset into the source signal where the frame begins
    pub start_index: usize,
    pub sample_rate: f64,
}

impl Frame {
    pub fn channel(&self, idx: usize) -> Option<&[f64]> {
        self.channel_data.get(idx).map(Vec::as_slice)
    }

    pub fn num_channels(&self) -> usize {
        self.channel_data.len()
    }

    pub fn len(&self) -> usize {
        self.channel_data.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start time of this frame in seconds
    pub fn start_time(&self) -> f64 {
        self.start_index as f64 / self.sample_rate
    }
}

/// Segmentation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Windower {
    window_length: usize,
    overlap: f64,
    step: usize,
    window_function: WindowFunction,
}

impl Windower {
    /// Create a windower from an overlap fraction
    ///
    /// # Arguments
    /// * `window_length` - Samples per frame (≥ 1)
    /// * `overlap` - Fraction of a frame shared with the previous one, in [0, 1)
    /// * `window_function` - Taper applied to every frame
    ///
    /// # Returns
    /// `DegenerateWindow` if the parameters cannot produce a step of at least one sample
    pub fn new(window_length: usize, overlap: f64, window_function: WindowFunction) -> Result<Self> {
        if window_length == 0 {
            return Err(PrepError::DegenerateWindow(
                "Window length must be at least 1 sample".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&overlap) {
            return Err(PrepError::DegenerateWindow(format!(
                "Overlap must be in [0, 1), got {}",
                overlap
            )));
        }

        let step = (window_length as f64 * (1.0 - overlap)).round();
        if step < 1.0 {
            return Err(PrepError::DegenerateWindow(format!(
                "Window length {} with overlap {} gives a step below one sample",
                window_length, overlap
            )));
        }

        Ok(Self {
            window_length,
            overlap,
            step: step as usize,
            window_function,
        })
    }

    /// Create a windower from an overlap expressed in samples
    pub fn with_overlap_samples(
        window_length: usize,
        overlap_samples: usize,
        window_function: WindowFunction,
    ) -> Result<Self> {
        if overlap_samples >= window_length {
            return Err(PrepError::DegenerateWindow(format!(
                "Overlap ({} samples) must be smaller than the window ({} samples)",
                overlap_samples, window_length
            )));
        }
        Self::new(
            window_length,
            overlap_samples as f64 / window_length as f64,
            window_function,
        )
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn overlap(&self) -> f64 {
        self.overlap
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn window_function(&self) -> WindowFunction {
        self.window_function
    }

    /// Number of complete frames that fit in `num_samples`
    pub fn frame_count(&self, num_samples: usize) -> usize {
        if num_samples < self.window_length {
            return 0;
        }
        (num_samples - self.window_length) / self.step + 1
    }

    /// Check that a signal of `num_samples` can hold at least one frame
    pub fn check_length(&self, num_samples: usize) -> Result<()> {
        if self.window_length > num_samples {
            return Err(PrepError::DegenerateWindow(format!(
                "Window length ({}) exceeds signal length ({})",
                self.window_length, num_samples
            )));
        }
        Ok(())
    }

    /// Segment a signal into frames
    ///
    /// The frame set keeps its own copy of the signal, so later changes to the
    /// caller's data cannot reach it.
    pub fn segment(&self, signal: &MultichannelSignal) -> Result<FrameSet> {
        self.segment_shared(Arc::new(signal.clone()))
    }

    /// Segment a signal that is already shared
    pub fn segment_shared(&self, signal: Arc<MultichannelSignal>) -> Result<FrameSet> {
        signal.validate()?;
        self.check_length(signal.num_samples())?;

        let count = self.frame_count(signal.num_samples());
        log::debug!(
            "Segmenting {} samples × {} channels: window {} ({}), step {} -> {} frames, {} trailing samples dropped",
            signal.num_samples(),
            signal.num_channels(),
            self.window_length,
            self.window_function,
            self.step,
            count,
            signal.num_samples() - ((count - 1) * self.step + self.window_length)
        );

        Ok(FrameSet {
            taper: self.window_function.coefficients(self.window_length).into(),
            source: signal,
            windower: self.clone(),
            count,
        })
    }
}

/// Segment `signal` with the given window parameters
pub fn segment(
    signal: &MultichannelSignal,
    window_length: usize,
    overlap: f64,
    window_function: WindowFunction,
) -> Result<FrameSet> {
    Windower::new(window_length, overlap, window_function)?.segment(signal)
}

/// Ordered, finite, restartable sequence of frames
///
/// Frames are materialized on demand; iterating twice yields identical frames.
#[derive(Debug, Clone)]
pub struct FrameSet {
    source: Arc<MultichannelSignal>,
    windower: Windower,
    taper: Arc<[f64]>,
    count: usize,
}

impl FrameSet {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn channels(&self) -> &[String] {
        self.source.channels()
    }

    pub fn num_channels(&self) -> usize {
        self.source.num_channels()
    }

    pub fn sample_rate(&self) -> f64 {
        self.source.sample_rate()
    }

    pub fn windower(&self) -> &Windower {
        &self.windower
    }

    /// The signal these frames were cut from
    pub fn source(&self) -> &MultichannelSignal {
        &self.source
    }

    pub fn window_length(&self) -> usize {
        self.windower.window_length
    }

    /// Start offsets of every frame, in order
    pub fn start_indices(&self) -> Vec<usize> {
        (0..self.count).map(|i| i * self.windower.step).collect()
    }

    /// Materialize frame `index`
    pub fn get(&self, index: usize) -> Option<Frame> {
        if index >= self.count {
            return None;
        }

        let start = index * self.windower.step;
        let end = start + self.windower.window_length;

        let channel_data = self
            .source
            .samples()
            .iter()
            .map(|channel| {
                channel[start..end]
                    .iter()
                    .zip(self.taper.iter())
                    .map(|(&x, &w)| x * w)
                    .collect()
            })
            .collect();

        Some(Frame {
            index,
            channel_data,
            start_index: start,
            sample_rate: self.source.sample_rate(),
        })
    }

    pub fn iter(&self) -> FrameIter<'_> {
        FrameIter {
            frames: self,
            next: 0,
        }
    }

    /// Materialize every frame
    pub fn to_vec(&self) -> Vec<Frame> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a FrameSet {
    type Item = Frame;
    type IntoIter = FrameIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a `FrameSet`
pub struct FrameIter<'a> {
    frames: &'a FrameSet,
    next: usize,
}

impl Iterator for FrameIter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let frame = self.frames.get(self.next)?;
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.frames.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_signal(channels: usize, len: usize) -> MultichannelSignal {
        let samples = (0..channels)
            .map(|c| (0..len).map(|i| (c * 10_000 + i) as f64).collect())
            .collect();
        MultichannelSignal::from_samples(samples, 100.0).unwrap()
    }

    #[test]
    fn test_frame_count_law() {
        let windower = Windower::new(200, 0.5, WindowFunction::Rectangular).unwrap();
        assert_eq!(windower.step(), 100);

        let frames = windower.segment(&ramp_signal(2, 1000)).unwrap();
        assert_eq!(frames.len(), 9);
        assert_eq!(frames.start_indices(), (0..9usize).map(|i| i * 100).collect::<Vec<_>>());
    }

    #[test]
    fn test_trailing_samples_dropped() {
        let frames = segment(&ramp_signal(1, 1050), 200, 0.5, WindowFunction::Rectangular).unwrap();
        assert_eq!(frames.len(), 9);
        let last = frames.get(8).unwrap();
        assert_eq!(last.start_index, 800);
        assert_eq!(last.channel(0).unwrap().last(), Some(&999.0));
        assert!(frames.get(9).is_none());
    }

    #[test]
    fn test_frame_contents_match_source() {
        let signal = ramp_signal(3, 100);
        let frames = segment(&signal, 10, 0.3, WindowFunction::Rectangular).unwrap();
        assert_eq!(frames.windower().step(), 7);

        for frame in &frames {
            assert_eq!(frame.num_channels(), 3);
            for ch in 0..3 {
                let start = frame.start_index;
                assert_eq!(frame.channel(ch).unwrap(), &signal.samples()[ch][start..start + 10]);
            }
        }
    }

    #[test]
    fn test_rejects_degenerate_parameters() {
        let signal = ramp_signal(1, 100);
        for (len, overlap) in [(101, 0.0), (500, 0.5), (10, 1.0), (10, 1.5), (10, -0.1), (0, 0.0), (1, 0.9)] {
            let result = segment(&signal, len, overlap, WindowFunction::Hann);
            assert!(
                matches!(result, Err(PrepError::DegenerateWindow(_))),
                "window {} overlap {} should be rejected",
                len,
                overlap
            );
        }
        assert!(segment(&signal, 10, f64::NAN, WindowFunction::Hann).is_err());
    }

    #[test]
    fn test_overlap_in_samples() {
        let windower = Windower::with_overlap_samples(50, 40, WindowFunction::Rectangular).unwrap();
        assert_eq!(windower.step(), 10);
        assert_eq!(windower.frame_count(5000), 496);
        assert!(Windower::with_overlap_samples(50, 50, WindowFunction::Rectangular).is_err());
    }

    #[test]
    fn test_window_equal_to_signal() {
        let frames = segment(&ramp_signal(1, 64), 64, 0.0, WindowFunction::Rectangular).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_taper_shapes() {
        let hann = WindowFunction::Hann.coefficients(5);
        let expected = [0.0, 0.5, 1.0, 0.5, 0.0];
        for (a, b) in hann.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }

        let hamming = WindowFunction::Hamming.coefficients(5);
        assert!((hamming[0] - 0.08).abs() < 1e-12);
        assert!((hamming[2] - 1.0).abs() < 1e-12);

        let blackman = WindowFunction::Blackman.coefficients(5);
        assert!(blackman[0].abs() < 1e-12);
        assert!((blackman[2] - 1.0).abs() < 1e-12);

        assert_eq!(WindowFunction::Hann.coefficients(1), vec![1.0]);
        assert!(WindowFunction::Rectangular.coefficients(8).iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_taper_applied_to_frames() {
        let signal = MultichannelSignal::from_samples(vec![vec![2.0; 20]], 10.0).unwrap();
        let frames = segment(&signal, 5, 0.0, WindowFunction::Hann).unwrap();
        let frame = frames.get(1).unwrap();
        assert_eq!(frame.channel(0).unwrap().len(), 5);
        assert!((frame.channel(0).unwrap()[2] - 2.0).abs() < 1e-12);
        assert!(frame.channel(0).unwrap()[0].abs() < 1e-12);
        assert!((frame.start_time() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let frames = segment(&ramp_signal(2, 300), 64, 0.25, WindowFunction::Hamming).unwrap();
        let first: Vec<Frame> = frames.iter().collect();
        let second = frames.to_vec();
        assert_eq!(first, second);
        assert_eq!(frames.iter().len(), frames.len());
    }

    #[test]
    fn test_frames_do_not_alias_source() {
        let mut data = vec![vec![1.0; 10]];
        let signal = MultichannelSignal::from_samples(data.clone(), 10.0).unwrap();
        let frames = segment(&signal, 5, 0.0, WindowFunction::Rectangular).unwrap();
        let mut frame = frames.get(0).unwrap();
        frame.channel_data[0][0] = 99.0;
        data[0][0] = -1.0;
        assert_eq!(frames.get(0).unwrap().channel(0).unwrap()[0], 1.0);
        assert_eq!(frames.source().samples()[0][0], 1.0);
    }
}
