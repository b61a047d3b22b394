//! Digital Filtering
//!
//! Provides zero-phase IIR filtering for multichannel signals:
//! - Butterworth bandpass/highpass/lowpass filters
//! - Notch filters for power line noise removal (50/60 Hz)
//! - User-supplied second-order sections
//!
//! All filters use second-order sections (biquads) for numerical stability and
//! are applied forward-backward, so the output is not shifted in time.

mod design;
mod zero_phase;

pub use design::{BiquadCoeffs, ButterworthFilter, NotchFilter};
pub use zero_phase::{edge_padding, filtfilt, BiquadFilter, SosFilter};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PrepError, Result};
use crate::types::MultichannelSignal;

/// Orders above this are rejected before design
pub const MAX_FILTER_ORDER: usize = 32;

/// Designs a `FilterBank` keeps before its cache is cleared
pub const DEFAULT_CACHED_HANDLES: usize = 64;

/// Poles closer than this to the unit circle are treated as unstable
pub const STABILITY_MARGIN: f64 = 1e-9;

/// Filter type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterKind::Lowpass => write!(f, "lowpass"),
            FilterKind::Highpass => write!(f, "highpass"),
            FilterKind::Bandpass => write!(f, "bandpass"),
            FilterKind::Notch => write!(f, "notch"),
        }
    }
}

/// Design family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDesign {
    #[default]
    Butterworth,
}

/// Cutoff frequencies in Hz: a single edge/center, or a (low, high) band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cutoffs {
    Single(f64),
    Band(f64, f64),
}

impl Cutoffs {
    fn values(&self) -> Vec<f64> {
        match *self {
            Cutoffs::Single(f) => vec![f],
            Cutoffs::Band(low, high) => vec![low, high],
        }
    }
}

fn default_filter_order() -> usize {
    4
}
fn default_notch_q() -> f64 {
    30.0
}

/// A filter design request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub cutoffs: Cutoffs,

    /// Filter order (typically 2-8 for Butterworth); ignored by notch
    #[serde(default = "default_filter_order")]
    pub order: usize,

    #[serde(default)]
    pub design: FilterDesign,

    /// Quality factor for a single-frequency notch (higher = narrower)
    #[serde(default = "default_notch_q")]
    pub q_factor: f64,
}

impl FilterSpec {
    pub fn lowpass(cutoff: f64, order: usize) -> Self {
        Self::with_cutoffs(FilterKind::Lowpass, Cutoffs::Single(cutoff), order)
    }

    pub fn highpass(cutoff: f64, order: usize) -> Self {
        Self::with_cutoffs(FilterKind::Highpass, Cutoffs::Single(cutoff), order)
    }

    pub fn bandpass(low: f64, high: f64, order: usize) -> Self {
        Self::with_cutoffs(FilterKind::Bandpass, Cutoffs::Band(low, high), order)
    }

    /// Notch at `center` Hz with the given quality factor
    pub fn notch(center: f64, q_factor: f64) -> Self {
        Self {
            q_factor,
            ..Self::with_cutoffs(FilterKind::Notch, Cutoffs::Single(center), 2)
        }
    }

    /// Notch covering the stop band (low, high)
    pub fn notch_band(low: f64, high: f64) -> Self {
        Self::with_cutoffs(FilterKind::Notch, Cutoffs::Band(low, high), 2)
    }

    fn with_cutoffs(kind: FilterKind, cutoffs: Cutoffs, order: usize) -> Self {
        Self {
            kind,
            cutoffs,
            order,
            design: FilterDesign::default(),
            q_factor: default_notch_q(),
        }
    }

    /// Check this spec against the Nyquist limit of `sample_rate`
    ///
    /// Runs before any coefficient computation.
    pub fn validate(&self, sample_rate: f64) -> Result<()> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PrepError::InvalidFilterSpec(format!(
                "Sample rate must be positive, got {}",
                sample_rate
            )));
        }

        if self.order == 0 || self.order > MAX_FILTER_ORDER {
            return Err(PrepError::InvalidFilterSpec(format!(
                "Filter order must be between 1 and {}, got {}",
                MAX_FILTER_ORDER, self.order
            )));
        }

        match (self.kind, self.cutoffs) {
            (FilterKind::Lowpass | FilterKind::Highpass, Cutoffs::Band(..)) => {
                return Err(PrepError::InvalidFilterSpec(format!(
                    "{} filter takes a single cutoff",
                    self.kind
                )));
            }
            (FilterKind::Bandpass, Cutoffs::Single(_)) => {
                return Err(PrepError::InvalidFilterSpec(
                    "Bandpass filter requires a (low, high) cutoff pair".to_string(),
                ));
            }
            _ => {}
        }

        let nyquist = sample_rate / 2.0;
        for freq in self.cutoffs.values() {
            if !freq.is_finite() || freq <= 0.0 {
                return Err(PrepError::InvalidFilterSpec(format!(
                    "Cutoff frequency must be positive, got {} Hz",
                    freq
                )));
            }
            if freq >= nyquist {
                return Err(PrepError::InvalidFilterSpec(format!(
                    "Cutoff frequency ({} Hz) must be less than Nyquist ({} Hz)",
                    freq, nyquist
                )));
            }
        }

        if let Cutoffs::Band(low, high) = self.cutoffs {
            if low >= high {
                return Err(PrepError::InvalidFilterSpec(format!(
                    "Low cutoff ({} Hz) must be less than high cutoff ({} Hz)",
                    low, high
                )));
            }
        }

        if self.kind == FilterKind::Notch
            && matches!(self.cutoffs, Cutoffs::Single(_))
            && !(self.q_factor.is_finite() && self.q_factor > 0.0)
        {
            return Err(PrepError::InvalidFilterSpec(format!(
                "Notch quality factor must be positive, got {}",
                self.q_factor
            )));
        }

        Ok(())
    }
}

/// A designed filter bound to one sample rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterHandle {
    spec: Option<FilterSpec>,
    sample_rate: f64,
    sections: Vec<BiquadCoeffs>,
}

impl FilterHandle {
    /// Validate `spec` and compute its coefficients for `sample_rate`
    pub fn design(spec: &FilterSpec, sample_rate: f64) -> Result<Self> {
        spec.validate(sample_rate)?;

        let sections = match (spec.design, spec.kind, spec.cutoffs) {
            (FilterDesign::Butterworth, FilterKind::Lowpass, Cutoffs::Single(fc)) => {
                ButterworthFilter::lowpass(fc, sample_rate, spec.order)
            }
            (FilterDesign::Butterworth, FilterKind::Highpass, Cutoffs::Single(fc)) => {
                ButterworthFilter::highpass(fc, sample_rate, spec.order)
            }
            (FilterDesign::Butterworth, FilterKind::Bandpass, Cutoffs::Band(low, high)) => {
                ButterworthFilter::bandpass(low, high, sample_rate, spec.order)
            }
            (_, FilterKind::Notch, Cutoffs::Single(center)) => {
                vec![NotchFilter::design(center, sample_rate, spec.q_factor)]
            }
            (_, FilterKind::Notch, Cutoffs::Band(low, high)) => {
                let center = (low + high) / 2.0;
                vec![NotchFilter::design(center, sample_rate, center / (high - low))]
            }
            (_, kind, cutoffs) => {
                return Err(PrepError::InvalidFilterSpec(format!(
                    "Unsupported cutoffs {:?} for {} filter",
                    cutoffs, kind
                )));
            }
        };

        log::debug!(
            "Designed {} filter (order {}, cutoffs {:?}) at {} Hz: {} sections",
            spec.kind,
            spec.order,
            spec.cutoffs,
            sample_rate,
            sections.len()
        );

        Self::checked(Some(spec.clone()), sample_rate, sections)
    }

    /// Wrap user-supplied second-order sections
    ///
    /// Sections must already be normalized so that a0 = 1.
    pub fn from_sections(sections: Vec<BiquadCoeffs>, sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PrepError::InvalidFilterSpec(format!(
                "Sample rate must be positive, got {}",
                sample_rate
            )));
        }
        if sections.is_empty() {
            return Err(PrepError::InvalidFilterSpec(
                "Custom filter needs at least one section".to_string(),
            ));
        }
        Self::checked(None, sample_rate, sections)
    }

    fn checked(spec: Option<FilterSpec>, sample_rate: f64, sections: Vec<BiquadCoeffs>) -> Result<Self> {
        for (idx, section) in sections.iter().enumerate() {
            if !section.is_finite() {
                return Err(PrepError::NumericalInstability(format!(
                    "Section {} has non-finite coefficients: {:?}",
                    idx, section
                )));
            }
            let radius = section.pole_radius();
            if !radius.is_finite() || radius >= 1.0 - STABILITY_MARGIN {
                return Err(PrepError::NumericalInstability(format!(
                    "Section {} has pole radius {:.12} (must be < 1)",
                    idx, radius
                )));
            }
        }

        Ok(Self {
            spec,
            sample_rate,
            sections,
        })
    }

    /// The request this handle was designed from (`None` for custom sections)
    pub fn spec(&self) -> Option<&FilterSpec> {
        self.spec.as_ref()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn sections(&self) -> &[BiquadCoeffs] {
        &self.sections
    }

    /// Zero-phase filter a single channel
    pub fn filter_channel(&self, samples: &[f64]) -> Vec<f64> {
        filtfilt(&self.sections, samples)
    }
}

/// Cache key: spec fields plus sample rate, floats compared bitwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct HandleKey {
    kind: FilterKind,
    design: FilterDesign,
    cutoffs: [u64; 2],
    band: bool,
    order: usize,
    q_factor: u64,
    sample_rate: u64,
}

impl HandleKey {
    fn new(spec: &FilterSpec, sample_rate: f64) -> Self {
        let (cutoffs, band) = match spec.cutoffs {
            Cutoffs::Single(f) => ([f.to_bits(), 0], false),
            Cutoffs::Band(low, high) => ([low.to_bits(), high.to_bits()], true),
        };
        Self {
            kind: spec.kind,
            design: spec.design,
            cutoffs,
            band,
            order: spec.order,
            q_factor: spec.q_factor.to_bits(),
            sample_rate: sample_rate.to_bits(),
        }
    }
}

/// Designs filters and applies them to signals
///
/// Stateless across calls apart from a cache of designed handles.
#[derive(Debug, Clone)]
pub struct FilterBank {
    handles: HashMap<HandleKey, FilterHandle>,
    max_handles: usize,
}

impl Default for FilterBank {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHED_HANDLES)
    }
}

impl FilterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bank caching at most `max_handles` designs (at least one)
    ///
    /// A full cache is emptied before the next design is stored.
    pub fn with_capacity(max_handles: usize) -> Self {
        Self {
            handles: HashMap::new(),
            max_handles: max_handles.max(1),
        }
    }

    /// Design (or fetch from cache) a filter for `spec` at `sample_rate`
    ///
    /// # Returns
    /// The designed handle, or `InvalidFilterSpec` / `NumericalInstability`
    pub fn design(&mut self, spec: &FilterSpec, sample_rate: f64) -> Result<FilterHandle> {
        let key = HandleKey::new(spec, sample_rate);
        if let Some(handle) = self.handles.get(&key) {
            return Ok(handle.clone());
        }

        let handle = FilterHandle::design(spec, sample_rate)?;
        if self.handles.len() >= self.max_handles {
            log::debug!("Filter cache full ({} handles), clearing", self.handles.len());
            self.handles.clear();
        }
        self.handles.insert(key, handle.clone());
        Ok(handle)
    }

    /// Zero-phase filter every channel of `signal`, returning a new signal
    ///
    /// Channels are filtered in parallel and reassembled in their original order.
    pub fn apply(&self, handle: &FilterHandle, signal: &MultichannelSignal) -> Result<MultichannelSignal> {
        signal.validate()?;

        if handle.sample_rate().to_bits() != signal.sample_rate().to_bits() {
            return Err(PrepError::InvalidFilterSpec(format!(
                "Filter designed for {} Hz applied to a {} Hz signal",
                handle.sample_rate(),
                signal.sample_rate()
            )));
        }

        crate::profile_scope!(format!("filter {} channels", signal.num_channels()));
        let filtered: Vec<Vec<f64>> = signal
            .samples()
            .par_iter()
            .map(|channel| handle.filter_channel(channel))
            .collect();

        Ok(signal.with_samples(filtered))
    }

    /// Design for the signal's own rate and apply in one step
    pub fn design_and_apply(
        &mut self,
        spec: &FilterSpec,
        signal: &MultichannelSignal,
    ) -> Result<MultichannelSignal> {
        signal.validate()?;
        let handle = self.design(spec, signal.sample_rate())?;
        self.apply(&handle, signal)
    }

    pub fn cached_handles(&self) -> usize {
        self.handles.len()
    }

    pub fn clear_cache(&mut self) {
        self.handles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_rejects_bad_cutoffs() {
        let fs = 200.0;
        for spec in [
            FilterSpec::lowpass(0.0, 4),
            FilterSpec::lowpass(-5.0, 4),
            FilterSpec::lowpass(100.0, 4),
            FilterSpec::highpass(150.0, 4),
            FilterSpec::bandpass(30.0, 10.0, 4),
            FilterSpec::bandpass(10.0, 10.0, 4),
            FilterSpec::bandpass(10.0, 100.0, 4),
            FilterSpec::notch(f64::NAN, 30.0),
            FilterSpec::notch(50.0, 0.0),
            FilterSpec::notch_band(60.0, 40.0),
        ] {
            let err = FilterHandle::design(&spec, fs).unwrap_err();
            assert!(
                matches!(err, PrepError::InvalidFilterSpec(_)),
                "{:?} should be rejected",
                spec
            );
        }
    }

    #[test]
    fn test_spec_rejects_bad_order_and_arity() {
        assert!(FilterSpec::lowpass(10.0, 0).validate(100.0).is_err());
        assert!(FilterSpec::lowpass(10.0, MAX_FILTER_ORDER + 1)
            .validate(100.0)
            .is_err());

        let mut spec = FilterSpec::lowpass(10.0, 4);
        spec.cutoffs = Cutoffs::Band(1.0, 10.0);
        assert!(spec.validate(100.0).is_err());

        let mut spec = FilterSpec::bandpass(1.0, 10.0, 4);
        spec.cutoffs = Cutoffs::Single(5.0);
        assert!(spec.validate(100.0).is_err());
    }

    #[test]
    fn test_extreme_cutoff_is_unstable() {
        let err = FilterHandle::design(&FilterSpec::lowpass(1e-7, 2), 1000.0).unwrap_err();
        assert!(matches!(err, PrepError::NumericalInstability(_)));
    }

    #[test]
    fn test_custom_sections() {
        let unstable = BiquadCoeffs {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 1.5,
        };
        let err = FilterHandle::from_sections(vec![unstable], 100.0).unwrap_err();
        assert!(matches!(err, PrepError::NumericalInstability(_)));

        let moving_average = BiquadCoeffs {
            b0: 1.0 / 3.0,
            b1: 1.0 / 3.0,
            b2: 1.0 / 3.0,
            a1: 0.0,
            a2: 0.0,
        };
        let handle = FilterHandle::from_sections(vec![moving_average], 100.0).unwrap();
        assert!(handle.spec().is_none());
        assert!(FilterHandle::from_sections(vec![], 100.0).is_err());
    }

    #[test]
    fn test_band_notch_uses_center() {
        let handle = FilterHandle::design(&FilterSpec::notch_band(45.0, 55.0), 500.0).unwrap();
        let expected = NotchFilter::design(50.0, 500.0, 5.0);
        assert_eq!(handle.sections(), &[expected]);
    }

    #[test]
    fn test_bank_caches_handles() {
        let mut bank = FilterBank::new();
        let spec = FilterSpec::bandpass(5.0, 40.0, 4);
        bank.design(&spec, 250.0).unwrap();
        bank.design(&spec, 250.0).unwrap();
        assert_eq!(bank.cached_handles(), 1);
        bank.design(&spec, 500.0).unwrap();
        assert_eq!(bank.cached_handles(), 2);

        // Rejected specs are not cached
        assert!(bank.design(&FilterSpec::lowpass(300.0, 4), 500.0).is_err());
        assert_eq!(bank.cached_handles(), 2);
    }

    #[test]
    fn test_bank_cache_is_bounded() {
        let mut bank = FilterBank::with_capacity(2);
        let spec = FilterSpec::lowpass(10.0, 2);
        for rate in [100.0, 200.0, 300.0, 400.0, 500.0] {
            bank.design(&spec, rate).unwrap();
            assert!(bank.cached_handles() <= 2);
        }
        assert_eq!(bank.cached_handles(), 1);
    }

    #[test]
    fn test_apply_rejects_rate_mismatch() {
        let mut bank = FilterBank::new();
        let handle = bank.design(&FilterSpec::lowpass(10.0, 2), 100.0).unwrap();
        let signal = MultichannelSignal::from_samples(vec![vec![0.0; 64]], 200.0).unwrap();
        assert!(matches!(
            bank.apply(&handle, &signal),
            Err(PrepError::InvalidFilterSpec(_))
        ));
    }

    #[test]
    fn test_spec_from_json() {
        let spec: FilterSpec =
            serde_json::from_str(r#"{"kind":"bandpass","cutoffs":[5.0,95.0]}"#).unwrap();
        assert_eq!(spec, FilterSpec::bandpass(5.0, 95.0, 4));

        let spec: FilterSpec =
            serde_json::from_str(r#"{"kind":"notch","cutoffs":50.0,"q_factor":35.0}"#).unwrap();
        assert_eq!(spec.cutoffs, Cutoffs::Single(50.0));
        assert_eq!(spec.q_factor, 35.0);
    }
}
