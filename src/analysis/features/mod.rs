// FeatureExtractor - spectral feature extraction for window classification
//
// This module turns one conditioned window into the fixed 8-feature vector
// the trained artifacts consume. Everything is derived from a single Welch
// PSD estimate of the window.
//
// Module organization:
// - types: Data structures (FeatureVector, FEATURE_NAMES)
// - fft: Welch PSD estimation
// - spectral: Band energies and spectral shape features
// - mod.rs: Coordinator (FeatureExtractor)
//
// Features extracted, in artifact column order:
// 1-4. Band energies: alpha (8-13 Hz), beta (14-30 Hz), theta (4-7 Hz),
//      delta (0.5-3 Hz)
// 5. Alpha/beta ratio (relaxation vs. attention)
// 6. Peak frequency
// 7. Spectral centroid
// 8. Spectral slope (log-log)

pub mod fft;
pub mod spectral;
mod types;

pub use fft::{PowerSpectrum, WelchEstimator};
pub use types::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

use spectral::{ALPHA, BETA, DELTA, THETA};

/// FeatureExtractor coordinates PSD estimation and spectral features
pub struct FeatureExtractor {
    estimator: WelchEstimator,
    sample_rate_hz: f64,
}

impl FeatureExtractor {
    /// Create a new FeatureExtractor
    ///
    /// # Arguments
    /// * `sample_rate_hz` - Sampling rate of the windows
    /// * `window_size` - Expected window length in samples
    pub fn new(sample_rate_hz: f64, window_size: usize) -> Self {
        Self {
            estimator: WelchEstimator::new(sample_rate_hz, window_size),
            sample_rate_hz,
        }
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// PSD of a window, exposed for diagnostics
    pub fn spectrum(&self, window: &[f64]) -> PowerSpectrum {
        self.estimator.compute(window)
    }

    /// Extract all features from a conditioned window
    ///
    /// Deterministic: the same window always yields the same vector.
    /// Non-finite values are passed through; the classifier adapter rejects
    /// them.
    pub fn extract(&self, window: &[f64]) -> FeatureVector {
        let psd = self.estimator.compute(window);

        let e_alpha = spectral::band_energy(&psd, ALPHA);
        let e_beta = spectral::band_energy(&psd, BETA);
        let e_theta = spectral::band_energy(&psd, THETA);
        let e_delta = spectral::band_energy(&psd, DELTA);

        FeatureVector {
            e_alpha,
            e_beta,
            e_theta,
            e_delta,
            alpha_beta_ratio: spectral::alpha_beta_ratio(e_alpha, e_beta),
            peak_frequency: spectral::peak_frequency(&psd),
            spectral_centroid: spectral::spectral_centroid(&psd),
            spectral_slope: spectral::spectral_slope(&psd),
        }
    }
}
