/// Time-domain statistics over one channel of one frame
///
/// Every function is pure and returns 0.0 for an empty slice.
pub struct TimeDomain;

impl TimeDomain {
    pub fn mean(data: &[f64]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        data.iter().sum::<f64>() / data.len() as f64
    }

    /// Population variance (divides by N)
    pub fn variance(data: &[f64]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        let mean = Self::mean(data);
        data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64
    }

    /// Compute root mean square (RMS)
    pub fn rms(data: &[f64]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        (Self::energy(data) / data.len() as f64).sqrt()
    }

    /// Compute peak-to-peak amplitude
    pub fn peak_to_peak(data: &[f64]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }

        let min_val = data.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_val = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        max_val - min_val
    }

    /// Sum of squared samples
    pub fn energy(data: &[f64]) -> f64 {
        data.iter().map(|&x| x * x).sum()
    }

    /// Number of sign changes between consecutive samples
    ///
    /// Zero is its own sign class, so 1 → 0 → -1 counts as two changes.
    pub fn zero_crossings(data: &[f64]) -> usize {
        data.windows(2)
            .filter(|w| sign(w[0]) != sign(w[1]))
            .count()
    }

    /// Sign changes divided by the frame length
    pub fn zero_crossing_rate(data: &[f64]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        Self::zero_crossings(data) as f64 / data.len() as f64
    }

    /// Mean absolute value (MAV)
    pub fn mean_absolute_value(data: &[f64]) -> f64 {
        if data.is_empty() {
            return 0.0;
        }
        data.iter().map(|x| x.abs()).sum::<f64>() / data.len() as f64
    }

    /// Cumulative length of the waveform: Σ|x[i+1] - x[i]|
    pub fn waveform_length(data: &[f64]) -> f64 {
        data.windows(2).map(|w| (w[1] - w[0]).abs()).sum()
    }

    /// Number of consecutive differences whose magnitude exceeds `threshold`
    pub fn willison_amplitude(data: &[f64], threshold: f64) -> usize {
        data.windows(2)
            .filter(|w| (w[1] - w[0]).abs() > threshold)
            .count()
    }

    /// Number of local extrema: points where the slope changes sign
    pub fn slope_sign_changes(data: &[f64]) -> usize {
        data.windows(3)
            .filter(|w| (w[1] - w[0]) * (w[2] - w[1]) < 0.0)
            .count()
    }
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_basic_statistics() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(TimeDomain::mean(&data), 2.5);
        assert!((TimeDomain::variance(&data) - 1.25).abs() < 1e-12);
        assert!((TimeDomain::rms(&data) - 7.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(TimeDomain::peak_to_peak(&data), 3.0);
        assert_eq!(TimeDomain::energy(&data), 30.0);
    }

    #[test]
    fn test_sine_rms() {
        let data: Vec<f64> = (0..1000)
            .map(|i| (2.0 * PI * 5.0 * i as f64 / 1000.0).sin())
            .collect();
        assert!((TimeDomain::rms(&data) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!(TimeDomain::mean(&data).abs() < 1e-9);
    }

    #[test]
    fn test_zero_crossings() {
        let data = [1.0, -1.0, 1.0, -1.0];
        assert_eq!(TimeDomain::zero_crossings(&data), 3);
        assert_eq!(TimeDomain::zero_crossing_rate(&data), 0.75);

        // Zero counts as its own sign
        assert_eq!(TimeDomain::zero_crossings(&[1.0, 0.0, -1.0]), 2);
        assert_eq!(TimeDomain::zero_crossings(&[2.0, 3.0, 4.0]), 0);
    }

    #[test]
    fn test_emg_features() {
        let data = [0.0, 3.0, -4.0, 6.0, 6.0];
        assert_eq!(TimeDomain::mean_absolute_value(&data), 19.0 / 5.0);
        assert_eq!(TimeDomain::waveform_length(&data), 3.0 + 7.0 + 10.0 + 0.0);
        assert_eq!(TimeDomain::willison_amplitude(&data, 5.0), 2);
        assert_eq!(TimeDomain::slope_sign_changes(&data), 2);
    }

    #[test]
    fn test_empty_and_single_sample() {
        for f in [
            TimeDomain::mean,
            TimeDomain::variance,
            TimeDomain::rms,
            TimeDomain::peak_to_peak,
            TimeDomain::energy,
            TimeDomain::zero_crossing_rate,
            TimeDomain::mean_absolute_value,
            TimeDomain::waveform_length,
        ] {
            assert_eq!(f(&[]), 0.0);
        }
        assert_eq!(TimeDomain::variance(&[4.0]), 0.0);
        assert_eq!(TimeDomain::slope_sign_changes(&[1.0, 2.0]), 0);
    }
}
