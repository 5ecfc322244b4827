// Startup error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::PathBuf;

/// Startup error code constants
///
/// Error code range: 1001-1010
pub struct StartupErrorCodes {}

impl StartupErrorCodes {
    /// Sampling rate too low for the notch or passband
    pub const INVALID_SAMPLE_RATE: i32 = 1001;

    /// Passband bounds are not a valid interval
    pub const INVALID_PASSBAND: i32 = 1002;

    /// Bandpass order must be at least 1
    pub const INVALID_FILTER_ORDER: i32 = 1003;

    /// Notch quality factor must be positive
    pub const INVALID_NOTCH_QUALITY: i32 = 1004;

    /// Window shorter than the zero-phase padding requires
    pub const WINDOW_TOO_SHORT: i32 = 1005;

    /// Artifact file does not exist
    pub const ARTIFACT_MISSING: i32 = 1006;

    /// Artifact file could not be read or parsed
    pub const ARTIFACT_CORRUPT: i32 = 1007;

    /// Configuration file could not be read or parsed
    pub const INVALID_CONFIG: i32 = 1008;

    /// Action binding is malformed
    pub const INVALID_BINDING: i32 = 1009;

    /// Binding refers to a label the classifier never produces
    pub const UNKNOWN_LABEL: i32 = 1010;
}

/// Log a startup error with structured context
///
/// Startup errors are fatal; this is the last line written before the
/// process exits.
pub fn log_startup_error(err: &StartupError, context: &str) {
    error!(
        "Startup error in {}: code={}, component=Startup, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Fatal errors raised before the pipeline loop is entered
///
/// Invalid filter parameters, missing or corrupt artifacts and invalid
/// configuration all land here. None of them are recoverable.
#[derive(Debug, Clone, PartialEq)]
pub enum StartupError {
    /// Sampling rate does not leave the notch and passband below Nyquist
    InvalidSampleRate { sample_rate_hz: f64, minimum_hz: f64 },

    /// Passband bounds are not a valid, positive interval
    InvalidPassband { low_hz: f64, high_hz: f64 },

    /// Bandpass order is zero
    InvalidFilterOrder { order: usize },

    /// Notch quality factor is not positive
    InvalidNotchQuality { quality: f64 },

    /// Window cannot be zero-phase filtered with the configured filters
    WindowTooShort { window_size: usize, required: usize },

    /// Artifact file does not exist
    ArtifactMissing { path: PathBuf },

    /// Artifact file exists but is unusable
    ArtifactCorrupt { path: PathBuf, reason: String },

    /// Configuration could not be loaded or failed validation
    InvalidConfig { reason: String },

    /// Action binding is malformed
    InvalidBinding { reason: String },

    /// Binding refers to a label the classifier never produces
    UnknownLabel { label: i64, known: Vec<i64> },
}

impl ErrorCode for StartupError {
    fn code(&self) -> i32 {
        match self {
            StartupError::InvalidSampleRate { .. } => StartupErrorCodes::INVALID_SAMPLE_RATE,
            StartupError::InvalidPassband { .. } => StartupErrorCodes::INVALID_PASSBAND,
            StartupError::InvalidFilterOrder { .. } => StartupErrorCodes::INVALID_FILTER_ORDER,
            StartupError::InvalidNotchQuality { .. } => StartupErrorCodes::INVALID_NOTCH_QUALITY,
            StartupError::WindowTooShort { .. } => StartupErrorCodes::WINDOW_TOO_SHORT,
            StartupError::ArtifactMissing { .. } => StartupErrorCodes::ARTIFACT_MISSING,
            StartupError::ArtifactCorrupt { .. } => StartupErrorCodes::ARTIFACT_CORRUPT,
            StartupError::InvalidConfig { .. } => StartupErrorCodes::INVALID_CONFIG,
            StartupError::InvalidBinding { .. } => StartupErrorCodes::INVALID_BINDING,
            StartupError::UnknownLabel { .. } => StartupErrorCodes::UNKNOWN_LABEL,
        }
    }

    fn message(&self) -> String {
        match self {
            StartupError::InvalidSampleRate {
                sample_rate_hz,
                minimum_hz,
            } => format!(
                "Sampling rate must be greater than {} Hz (got {} Hz)",
                minimum_hz, sample_rate_hz
            ),
            StartupError::InvalidPassband { low_hz, high_hz } => format!(
                "Passband must satisfy 0 < low < high (got {}-{} Hz)",
                low_hz, high_hz
            ),
            StartupError::InvalidFilterOrder { order } => {
                format!("Bandpass order must be at least 1 (got {})", order)
            }
            StartupError::InvalidNotchQuality { quality } => {
                format!("Notch quality factor must be positive (got {})", quality)
            }
            StartupError::WindowTooShort {
                window_size,
                required,
            } => format!(
                "Window of {} samples is too short for zero-phase filtering (need more than {})",
                window_size, required
            ),
            StartupError::ArtifactMissing { path } => {
                format!("Artifact not found: {}", path.display())
            }
            StartupError::ArtifactCorrupt { path, reason } => {
                format!("Artifact {} is unusable: {}", path.display(), reason)
            }
            StartupError::InvalidConfig { reason } => format!("Invalid configuration: {}", reason),
            StartupError::InvalidBinding { reason } => {
                format!("Invalid action binding: {}", reason)
            }
            StartupError::UnknownLabel { label, known } => format!(
                "Binding label {} is not produced by the classifier (labels: {:?})",
                label, known
            ),
        }
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StartupError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_codes() {
        assert_eq!(
            StartupError::InvalidSampleRate {
                sample_rate_hz: 50.0,
                minimum_hz: 100.0
            }
            .code(),
            1001
        );
        assert_eq!(
            StartupError::ArtifactMissing {
                path: PathBuf::from("model.json")
            }
            .code(),
            1006
        );
        assert_eq!(
            StartupError::UnknownLabel {
                label: 7,
                known: vec![0, 1, 2]
            }
            .code(),
            1010
        );
    }

    #[test]
    fn test_startup_error_messages() {
        let err = StartupError::InvalidSampleRate {
            sample_rate_hz: 60.0,
            minimum_hz: 100.0,
        };
        assert!(err.message().contains("greater than 100 Hz"));

        let err = StartupError::WindowTooShort {
            window_size: 20,
            required: 27,
        };
        assert!(err.message().contains("20 samples"));

        let err = StartupError::ArtifactCorrupt {
            path: PathBuf::from("scaler.json"),
            reason: "expected 8 features".to_string(),
        };
        assert!(err.message().contains("scaler.json"));
        assert!(err.message().contains("expected 8 features"));
    }

    #[test]
    fn test_startup_error_display() {
        let err = StartupError::InvalidFilterOrder { order: 0 };
        let display = format!("{}", err);
        assert!(display.contains("StartupError"));
        assert!(display.contains("1003"));
    }
}
