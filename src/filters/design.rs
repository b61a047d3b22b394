//! IIR Filter Design
//!
//! Butterworth lowpass/highpass/bandpass and notch designs expressed as
//! second-order sections (biquads) via the bilinear transform.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Second-order section (biquad) coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Largest pole magnitude of this section
    ///
    /// Poles are the roots of z^2 + a1*z + a2; a first-order section has a2 = 0.
    pub fn pole_radius(&self) -> f64 {
        let disc = self.a1 * self.a1 - 4.0 * self.a2;
        if disc < 0.0 {
            // Complex conjugate pair: |p|^2 = a2
            self.a2.sqrt()
        } else {
            let root = disc.sqrt();
            let p1 = (-self.a1 + root) / 2.0;
            let p2 = (-self.a1 - root) / 2.0;
            p1.abs().max(p2.abs())
        }
    }

    /// Gain at DC (z = 1)
    pub fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::MIN_POSITIVE {
            return 0.0;
        }
        (self.b0 + self.b1 + self.b2) / den
    }

    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }
}

/// Butterworth filter designer
pub struct ButterworthFilter;

impl ButterworthFilter {
    /// Design Butterworth lowpass sections
    pub fn lowpass(cutoff: f64, sample_rate: f64, order: usize) -> Vec<BiquadCoeffs> {
        let wn = Self::prewarp(cutoff, sample_rate);
        Self::design_lowpass(wn, order)
    }

    /// Design Butterworth highpass sections
    pub fn highpass(cutoff: f64, sample_rate: f64, order: usize) -> Vec<BiquadCoeffs> {
        let wn = Self::prewarp(cutoff, sample_rate);
        Self::design_highpass(wn, order)
    }

    /// Design Butterworth bandpass sections
    ///
    /// Highpass at `low` cascaded with lowpass at `high`, each of `order`.
    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> Vec<BiquadCoeffs> {
        let mut sections = Self::highpass(low, sample_rate, order);
        sections.extend(Self::lowpass(high, sample_rate, order));
        sections
    }

    /// Prewarp frequency for bilinear transform
    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }

    /// Damping term of the k-th conjugate pole pair of the analog prototype:
    /// s^2 + 2*sin(theta_k)*s + 1
    fn pair_damping(k: usize, order: usize) -> f64 {
        let theta = PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64);
        2.0 * theta.sin()
    }

    fn design_lowpass(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let mut sections = Vec::with_capacity((order + 1) / 2);
        let wn2 = wn * wn;

        for k in 0..order / 2 {
            let damping = Self::pair_damping(k, order);
            let denom = 1.0 + damping * wn + wn2;

            sections.push(BiquadCoeffs {
                b0: wn2 / denom,
                b1: 2.0 * wn2 / denom,
                b2: wn2 / denom,
                a1: 2.0 * (wn2 - 1.0) / denom,
                a2: (1.0 - damping * wn + wn2) / denom,
            });
        }

        // Odd order: real pole, H(s) = wn / (s + wn)
        if order % 2 == 1 {
            let k_coeff = wn / (1.0 + wn);
            sections.push(BiquadCoeffs {
                b0: k_coeff,
                b1: k_coeff,
                b2: 0.0,
                a1: (wn - 1.0) / (wn + 1.0),
                a2: 0.0,
            });
        }

        sections
    }

    fn design_highpass(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let mut sections = Vec::with_capacity((order + 1) / 2);
        let wn2 = wn * wn;

        for k in 0..order / 2 {
            let damping = Self::pair_damping(k, order);
            let denom = 1.0 + damping * wn + wn2;

            sections.push(BiquadCoeffs {
                b0: 1.0 / denom,
                b1: -2.0 / denom,
                b2: 1.0 / denom,
                a1: 2.0 * (wn2 - 1.0) / denom,
                a2: (1.0 - damping * wn + wn2) / denom,
            });
        }

        if order % 2 == 1 {
            let k_coeff = 1.0 / (1.0 + wn);
            sections.push(BiquadCoeffs {
                b0: k_coeff,
                b1: -k_coeff,
                b2: 0.0,
                a1: (wn - 1.0) / (wn + 1.0),
                a2: 0.0,
            });
        }

        sections
    }
}

/// Notch (band-reject) filter for removing a single frequency
pub struct NotchFilter;

impl NotchFilter {
    /// Design a second-order notch
    ///
    /// # Arguments
    /// * `center_freq` - Frequency to remove (Hz)
    /// * `sample_rate` - Sampling rate (Hz)
    /// * `q_factor` - Quality factor, center / -3 dB bandwidth (typical: 30)
    pub fn design(center_freq: f64, sample_rate: f64, q_factor: f64) -> BiquadCoeffs {
        let w0 = 2.0 * PI * center_freq / sample_rate;
        let bandwidth = w0 / q_factor;

        let beta = (bandwidth / 2.0).tan();
        let gain = 1.0 / (1.0 + beta);
        let cos_w0 = w0.cos();

        BiquadCoeffs {
            b0: gain,
            b1: -2.0 * gain * cos_w0,
            b2: gain,
            a1: -2.0 * gain * cos_w0,
            a2: 2.0 * gain - 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Magnitude response of a cascade at `freq`
    fn magnitude(sections: &[BiquadCoeffs], freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        sections
            .iter()
            .map(|s| {
                let (c1, s1) = (w.cos(), -w.sin());
                let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());
                let num_re = s.b0 + s.b1 * c1 + s.b2 * c2;
                let num_im = s.b1 * s1 + s.b2 * s2;
                let den_re = 1.0 + s.a1 * c1 + s.a2 * c2;
                let den_im = s.a1 * s1 + s.a2 * s2;
                (num_re.hypot(num_im)) / (den_re.hypot(den_im))
            })
            .product()
    }

    #[test]
    fn test_lowpass_response() {
        let sections = ButterworthFilter::lowpass(10.0, 100.0, 4);
        assert_eq!(sections.len(), 2);

        assert!((magnitude(&sections, 0.0, 100.0) - 1.0).abs() < 1e-9);
        // -3 dB at cutoff
        let at_cutoff = magnitude(&sections, 10.0, 100.0);
        assert!((at_cutoff - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(magnitude(&sections, 40.0, 100.0) < 0.01);
    }

    #[test]
    fn test_highpass_response() {
        let sections = ButterworthFilter::highpass(5.0, 200.0, 3);
        assert_eq!(sections.len(), 2);

        assert!(magnitude(&sections, 0.0, 200.0) < 1e-12);
        let at_cutoff = magnitude(&sections, 5.0, 200.0);
        assert!((at_cutoff - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((magnitude(&sections, 80.0, 200.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_bandpass_passes_center() {
        let sections = ButterworthFilter::bandpass(8.0, 30.0, 250.0, 4);
        assert_eq!(sections.len(), 4);
        assert!(magnitude(&sections, 15.0, 250.0) > 0.9);
        assert!(magnitude(&sections, 1.0, 250.0) < 0.05);
        assert!(magnitude(&sections, 100.0, 250.0) < 0.05);
    }

    #[test]
    fn test_designs_are_stable() {
        for order in 1..=10 {
            for section in ButterworthFilter::bandpass(1.0, 40.0, 500.0, order) {
                assert!(section.pole_radius() < 1.0, "order {} unstable", order);
            }
        }
    }

    #[test]
    fn test_notch_response() {
        let notch = NotchFilter::design(50.0, 1000.0, 30.0);
        assert!(magnitude(&[notch], 50.0, 1000.0) < 1e-9);
        assert!((magnitude(&[notch], 10.0, 1000.0) - 1.0).abs() < 0.01);
        assert!((notch.dc_gain() - 1.0).abs() < 1e-12);
        assert!(notch.pole_radius() < 1.0);
    }

    #[test]
    fn test_pole_radius() {
        let first_order = BiquadCoeffs {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: -0.5,
            a2: 0.0,
        };
        assert!((first_order.pole_radius() - 0.5).abs() < 1e-12);

        let complex_pair = BiquadCoeffs {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.81,
        };
        assert!((complex_pair.pole_radius() - 0.9).abs() < 1e-12);
    }
}
