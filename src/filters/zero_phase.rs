//! Zero-phase application of second-order section cascades
//!
//! Forward-backward filtering over an odd (point-reflected) extension of the
//! signal, with each section's state primed to its steady-state response to
//! the first extended sample. The net response has zero phase and squared
//! magnitude.

use super::design::BiquadCoeffs;

/// State for a single biquad section (Direct Form II Transposed)
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    z1: f64,
    z2: f64,
}

/// Single biquad filter section
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    /// Process a single sample using Direct Form II Transposed
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }

    /// Prime the state as if a constant `level` had been fed forever
    fn prime(&mut self, level: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.dc_gain() * level;
        self.state = BiquadState {
            z1: output - c.b0 * level,
            z2: c.b2 * level - c.a2 * output,
        };
        output
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.state = BiquadState::default();
    }
}

/// Cascaded second-order sections filter
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadFilter>,
}

impl SosFilter {
    pub fn new(sections: &[BiquadCoeffs]) -> Self {
        Self {
            sections: sections.iter().copied().map(BiquadFilter::new).collect(),
        }
    }

    /// Process a single sample through all sections
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut output = input;
        for section in &mut self.sections {
            output = section.process(output);
        }
        output
    }

    /// Process a signal and return a new array (original unchanged)
    pub fn filter(&mut self, signal: &[f64]) -> Vec<f64> {
        signal.iter().map(|&s| self.process(s)).collect()
    }

    /// Set every section to its steady state for a constant input `level`
    pub fn prime(&mut self, level: f64) {
        let mut stage_input = level;
        for section in &mut self.sections {
            stage_input = section.prime(stage_input);
        }
    }

    /// Reset all section states
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

/// Number of samples reflected onto each end before filtering
///
/// Three times the cascade's tap count, clamped so the reflection stays
/// inside the signal.
pub fn edge_padding(num_sections: usize, len: usize) -> usize {
    let taps = 2 * num_sections + 1;
    (3 * taps).min(len.saturating_sub(1))
}

/// Odd extension: `2*x[0] - x[pad..=1]` before, `2*x[n-1] - x[n-2..=n-1-pad]` after
fn odd_extend(signal: &[f64], pad: usize) -> Vec<f64> {
    let n = signal.len();
    let first = signal[0];
    let last = signal[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
    extended.extend_from_slice(signal);
    extended.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));
    extended
}

/// Filter `signal` forward then backward; output has the input's length
pub fn filtfilt(sections: &[BiquadCoeffs], signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() || sections.is_empty() {
        return signal.to_vec();
    }

    let pad = edge_padding(sections.len(), signal.len());
    let extended = odd_extend(signal, pad);
    let mut filter = SosFilter::new(sections);

    filter.prime(extended[0]);
    let mut forward = filter.filter(&extended);

    forward.reverse();
    filter.reset();
    filter.prime(forward[0]);
    let mut backward = filter.filter(&forward);
    backward.reverse();

    backward.drain(..pad);
    backward.truncate(signal.len());
    backward
}
