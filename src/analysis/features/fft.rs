// FFT module - power spectral density estimation
//
// Welch's method with a single segment spanning the whole window: constant
// detrend, periodic Hann taper, density scaling and a one-sided spectrum.
// With one segment there is nothing to average, so the estimate is a
// tapered periodogram with Welch's normalization.

use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::{Arc, Mutex};

/// One-sided power spectral density of a window
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    /// Bin frequencies in Hz, `k * fs / n` for `k = 0..=n/2`
    pub frequencies: Vec<f64>,
    /// PSD per bin in signal units² / Hz
    pub power: Vec<f64>,
}

/// Welch PSD estimator for windows of a fixed sampling rate
pub struct WelchEstimator {
    fft_planner: Arc<Mutex<FftPlanner<f64>>>,
    sample_rate_hz: f64,
    /// Periodic Hann window for the configured segment length (pre-computed)
    window: Vec<f64>,
}

impl WelchEstimator {
    /// Create a new estimator
    ///
    /// # Arguments
    /// * `sample_rate_hz` - Sampling rate of the windows
    /// * `segment_len` - Expected window length; other lengths still work but
    ///   recompute the taper
    pub fn new(sample_rate_hz: f64, segment_len: usize) -> Self {
        Self {
            fft_planner: Arc::new(Mutex::new(FftPlanner::new())),
            sample_rate_hz,
            window: hann_periodic(segment_len),
        }
    }

    /// Compute the one-sided PSD of `signal` as a single Welch segment
    pub fn compute(&self, signal: &[f64]) -> PowerSpectrum {
        let n = signal.len();
        if n == 0 {
            return PowerSpectrum {
                frequencies: Vec::new(),
                power: Vec::new(),
            };
        }

        let recomputed;
        let window: &[f64] = if self.window.len() == n {
            &self.window
        } else {
            recomputed = hann_periodic(n);
            &recomputed
        };

        let mean = signal.iter().sum::<f64>() / n as f64;
        let mut buffer: Vec<Complex<f64>> = signal
            .iter()
            .zip(window)
            .map(|(&sample, &w)| Complex::new((sample - mean) * w, 0.0))
            .collect();

        let fft = {
            let mut planner = self
                .fft_planner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            planner.plan_fft_forward(n)
        };
        fft.process(&mut buffer);

        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let scale = 1.0 / (self.sample_rate_hz * window_power);

        let bins = n / 2 + 1;
        let nyquist_bin = if n % 2 == 0 { Some(n / 2) } else { None };
        let power = buffer[..bins]
            .iter()
            .enumerate()
            .map(|(k, c)| {
                let p = c.norm_sqr() * scale;
                if k == 0 || Some(k) == nyquist_bin {
                    p
                } else {
                    2.0 * p
                }
            })
            .collect();

        let resolution = self.sample_rate_hz / n as f64;
        let frequencies = (0..bins).map(|k| k as f64 * resolution).collect();

        PowerSpectrum { frequencies, power }
    }
}

/// Periodic (DFT-even) Hann window
fn hann_periodic(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / len as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_is_periodic() {
        let w = hann_periodic(8);
        assert_eq!(w[0], 0.0);
        assert!((w[4] - 1.0).abs() < 1e-12);
        assert!((w[1] - w[7]).abs() < 1e-12);
    }

    #[test]
    fn bins_cover_zero_to_nyquist() {
        let estimator = WelchEstimator::new(512.0, 512);
        let psd = estimator.compute(&vec![0.0; 512]);
        assert_eq!(psd.frequencies.len(), 257);
        assert_eq!(psd.frequencies[0], 0.0);
        assert_eq!(psd.frequencies[10], 10.0);
        assert_eq!(psd.frequencies[256], 256.0);
        assert!(psd.power.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn constant_signal_is_detrended() {
        let estimator = WelchEstimator::new(512.0, 512);
        let psd = estimator.compute(&vec![3.0; 512]);
        assert!(psd.power.iter().all(|&p| p.abs() < 1e-20));
    }

    #[test]
    fn sine_power_integrates_to_variance() {
        let fs = 512.0;
        let signal: Vec<f64> = (0..512)
            .map(|i| (2.0 * std::f64::consts::PI * 10.0 * i as f64 / fs).sin())
            .collect();
        let psd = WelchEstimator::new(fs, 512).compute(&signal);

        let resolution = fs / 512.0;
        let total: f64 = psd.power.iter().sum::<f64>() * resolution;
        assert!((total - 0.5).abs() < 0.01, "integrated power {total}");

        let peak_bin = psd
            .power
            .iter()
            .enumerate()
            .fold(0, |best, (i, &p)| if p > psd.power[best] { i } else { best });
        assert_eq!(peak_bin, 10);
    }

    #[test]
    fn odd_length_has_no_nyquist_bin() {
        let estimator = WelchEstimator::new(100.0, 64);
        let psd = estimator.compute(&vec![0.5; 101]);
        assert_eq!(psd.power.len(), 51);
        assert!((psd.frequencies[50] - 50.0 * 100.0 / 101.0).abs() < 1e-12);
    }

    #[test]
    fn empty_signal_yields_empty_spectrum() {
        let psd = WelchEstimator::new(512.0, 512).compute(&[]);
        assert!(psd.power.is_empty());
        assert!(psd.frequencies.is_empty());
    }
}
