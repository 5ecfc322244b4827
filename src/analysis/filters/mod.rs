// Filter bank - signal conditioning ahead of feature extraction
//
// Every window passes through a powerline notch and a Butterworth bandpass,
// each applied forward and backward so band energies are not smeared in
// time. Coefficients are designed once from the signal configuration and
// never change while the pipeline runs.
//
// Module organization:
// - design: notch and bandpass coefficient design
// - zero_phase: forward-backward filtering with odd-extension padding
// - mod.rs: FilterBank (validation + conditioning)

pub mod design;
pub mod zero_phase;

pub use design::TransferFunction;

use crate::config::SignalConfig;
use crate::error::{PipelineError, StartupError};

/// Immutable notch + bandpass pair derived from the sampling rate
#[derive(Debug, Clone)]
pub struct FilterBank {
    notch: TransferFunction,
    bandpass: TransferFunction,
    sample_rate_hz: f64,
}

impl FilterBank {
    /// Validate the signal parameters and design both filters
    ///
    /// # Errors
    /// * `InvalidFilterOrder` - bandpass order is 0
    /// * `InvalidNotchQuality` - quality factor not positive
    /// * `InvalidPassband` - bounds not satisfying 0 < low < high
    /// * `InvalidSampleRate` - Nyquist not above the notch or the passband
    pub fn build(signal: &SignalConfig) -> Result<Self, StartupError> {
        if signal.bandpass_order == 0 {
            return Err(StartupError::InvalidFilterOrder {
                order: signal.bandpass_order,
            });
        }

        if !(signal.notch_quality.is_finite() && signal.notch_quality > 0.0) {
            return Err(StartupError::InvalidNotchQuality {
                quality: signal.notch_quality,
            });
        }

        let low = signal.passband_low_hz;
        let high = signal.passband_high_hz;
        if !(low.is_finite() && high.is_finite() && low > 0.0 && low < high) {
            return Err(StartupError::InvalidPassband {
                low_hz: low,
                high_hz: high,
            });
        }

        if !(signal.powerline_hz.is_finite() && signal.powerline_hz > 0.0) {
            return Err(StartupError::InvalidConfig {
                reason: format!(
                    "powerline frequency must be positive (got {} Hz)",
                    signal.powerline_hz
                ),
            });
        }

        let minimum_hz = 2.0 * signal.powerline_hz.max(high);
        let rate = signal.sample_rate_hz;
        if !(rate.is_finite() && rate > minimum_hz) {
            return Err(StartupError::InvalidSampleRate {
                sample_rate_hz: rate,
                minimum_hz,
            });
        }

        let notch = design::iir_notch(signal.powerline_hz, signal.notch_quality, rate);
        let bandpass = design::butter_bandpass(signal.bandpass_order, low, high, rate);

        tracing::debug!(
            "[FilterBank] Designed notch at {} Hz (Q {}) and order-{} bandpass {}-{} Hz for {} Hz",
            signal.powerline_hz,
            signal.notch_quality,
            signal.bandpass_order,
            low,
            high,
            rate
        );

        Ok(Self {
            notch,
            bandpass,
            sample_rate_hz: rate,
        })
    }

    /// Notch then bandpass, both zero-phase; output has the input's length
    pub fn condition(&self, window: &[f64]) -> Result<Vec<f64>, PipelineError> {
        if window.len() <= self.pad_len() {
            return Err(PipelineError::DegenerateWindow {
                len: window.len(),
                required: self.pad_len(),
            });
        }
        let notched = zero_phase::filtfilt(&self.notch, window)?;
        zero_phase::filtfilt(&self.bandpass, &notched)
    }

    /// Padding of the longer filter; windows must be strictly longer
    pub fn pad_len(&self) -> usize {
        zero_phase::pad_len(&self.notch).max(zero_phase::pad_len(&self.bandpass))
    }

    pub fn notch(&self) -> &TransferFunction {
        &self.notch
    }

    pub fn bandpass(&self) -> &TransferFunction {
        &self.bandpass
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }
}
