// Types module - Data structures for spectral features
//
// This module defines the feature vector handed from the extractor to the
// classifier adapter. The field order is the column order the trained
// scaler and classifier artifacts expect.

use serde::{Deserialize, Serialize};

/// Number of features per window
pub const FEATURE_COUNT: usize = 8;

/// Feature names in artifact column order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "E_alpha",
    "E_beta",
    "E_theta",
    "E_delta",
    "alpha_beta_ratio",
    "peak_frequency",
    "spectral_centroid",
    "spectral_slope",
];

/// Features extracted from one conditioned window
///
/// Band energies are sums of one-sided PSD bins (signal units² / Hz) inside
/// each band, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Alpha band energy, 8-13 Hz
    #[serde(rename = "E_alpha")]
    pub e_alpha: f64,

    /// Beta band energy, 14-30 Hz
    #[serde(rename = "E_beta")]
    pub e_beta: f64,

    /// Theta band energy, 4-7 Hz
    #[serde(rename = "E_theta")]
    pub e_theta: f64,

    /// Delta band energy, 0.5-3 Hz
    #[serde(rename = "E_delta")]
    pub e_delta: f64,

    /// E_alpha / E_beta, or 0 when the beta band is empty
    pub alpha_beta_ratio: f64,

    /// Frequency of the strongest PSD bin in Hz
    pub peak_frequency: f64,

    /// Power-weighted mean frequency in Hz
    pub spectral_centroid: f64,

    /// Slope of log-power against log-frequency
    ///
    /// Roughly the exponent of a 1/f^k background; more negative values mean
    /// power concentrated at low frequencies.
    pub spectral_slope: f64,
}

impl FeatureVector {
    /// Values in artifact column order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.e_alpha,
            self.e_beta,
            self.e_theta,
            self.e_delta,
            self.alpha_beta_ratio,
            self.peak_frequency,
            self.spectral_centroid,
            self.spectral_slope,
        ]
    }

    /// (name, value) pairs in artifact column order
    pub fn named(&self) -> [(&'static str, f64); FEATURE_COUNT] {
        let values = self.to_array();
        std::array::from_fn(|i| (FEATURE_NAMES[i], values[i]))
    }

    /// First feature that is NaN or infinite, if any
    pub fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        self.named()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
    }
}
