// Spectral module - Frequency-domain feature extraction
//
// This module computes band energies and spectral shape features from a
// one-sided PSD. Degenerate spectra (silence, an empty beta band) produce
// exact zeros instead of NaN so the classifier always sees finite input for
// a flat-lined electrode.

use super::fft::PowerSpectrum;

/// Frequency band with inclusive bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBand {
    pub name: &'static str,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz <= self.high_hz
    }
}

pub const DELTA: FrequencyBand = FrequencyBand {
    name: "delta",
    low_hz: 0.5,
    high_hz: 3.0,
};

pub const THETA: FrequencyBand = FrequencyBand {
    name: "theta",
    low_hz: 4.0,
    high_hz: 7.0,
};

pub const ALPHA: FrequencyBand = FrequencyBand {
    name: "alpha",
    low_hz: 8.0,
    high_hz: 13.0,
};

pub const BETA: FrequencyBand = FrequencyBand {
    name: "beta",
    low_hz: 14.0,
    high_hz: 30.0,
};

/// Sum of PSD bins whose frequency falls inside `band`
pub fn band_energy(spectrum: &PowerSpectrum, band: FrequencyBand) -> f64 {
    spectrum
        .frequencies
        .iter()
        .zip(&spectrum.power)
        .filter(|&(&freq, _)| band.contains(freq))
        .map(|(_, &power)| power)
        .sum()
}

/// `alpha / beta`, or 0 when `beta` is not positive
pub fn alpha_beta_ratio(alpha: f64, beta: f64) -> f64 {
    if beta > 0.0 {
        alpha / beta
    } else {
        0.0
    }
}

/// Frequency of the first bin holding the maximum PSD
pub fn peak_frequency(spectrum: &PowerSpectrum) -> f64 {
    let mut best: Option<(usize, f64)> = None;
    for (i, &power) in spectrum.power.iter().enumerate() {
        match best {
            Some((_, max)) if power <= max => {}
            _ => best = Some((i, power)),
        }
    }
    best.map(|(i, _)| spectrum.frequencies[i]).unwrap_or(0.0)
}

/// Compute spectral centroid (power-weighted mean frequency)
///
/// Formula: centroid = Σ(f_i × P[i]) / ΣP[i], 0 when ΣP is not positive
pub fn spectral_centroid(spectrum: &PowerSpectrum) -> f64 {
    let total: f64 = spectrum.power.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let weighted: f64 = spectrum
        .frequencies
        .iter()
        .zip(&spectrum.power)
        .map(|(f, p)| f * p)
        .sum();
    weighted / total
}

/// Least-squares slope of ln(P) against ln(f), skipping the DC bin
///
/// Returns 0 when any bin in the fitted range has non-positive power (the
/// logarithm is undefined) or when fewer than two bins are available.
pub fn spectral_slope(spectrum: &PowerSpectrum) -> f64 {
    let count = spectrum.power.len().saturating_sub(1);
    if count < 2 {
        return 0.0;
    }

    let power = &spectrum.power[1..];
    if power.iter().any(|&p| p <= 0.0) {
        return 0.0;
    }

    let xs: Vec<f64> = spectrum.frequencies[1..].iter().map(|f| f.ln()).collect();
    let ys: Vec<f64> = power.iter().map(|p| p.ln()).collect();

    let n = count as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        covariance += (x - mean_x) * (y - mean_y);
        variance += (x - mean_x) * (x - mean_x);
    }

    if variance > 0.0 {
        covariance / variance
    } else {
        0.0
    }
}
