// Per-iteration error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Pipeline error code constants
///
/// Error code range: 2001-2007
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Sample token was empty or not a finite number
    pub const MALFORMED_SAMPLE: i32 = 2001;

    /// Sample source read failed
    pub const SOURCE_READ: i32 = 2002;

    /// Window too short to be conditioned
    pub const DEGENERATE_WINDOW: i32 = 2003;

    /// Feature vector contained NaN or infinity
    pub const NON_FINITE_FEATURE: i32 = 2004;

    /// Scaler or classifier rejected the input
    pub const PREDICTION_FAILED: i32 = 2005;

    /// Actuator could not perform the action
    pub const ACTUATOR_FAILED: i32 = 2006;

    /// Sample pushed into a full window
    pub const WINDOW_FULL: i32 = 2007;
}

/// Log a recoverable pipeline error with structured context
///
/// Logged at warn level: the loop continues after every one of these.
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    warn!(
        "Pipeline error in {}: code={}, component=Pipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Recoverable errors raised inside one loop iteration
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Sample token was empty or not a finite number
    MalformedSample { token: String },

    /// Sample source read failed
    SourceRead { details: String },

    /// Window too short to be conditioned
    DegenerateWindow { len: usize, required: usize },

    /// Feature vector contained NaN or infinity
    NonFiniteFeature { name: String, value: f64 },

    /// Scaler or classifier rejected the input
    PredictionFailed { reason: String },

    /// Actuator could not perform the action
    ActuatorFailed { action: String, details: String },

    /// Sample pushed into a full window
    WindowFull { capacity: usize },
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::MalformedSample { .. } => PipelineErrorCodes::MALFORMED_SAMPLE,
            PipelineError::SourceRead { .. } => PipelineErrorCodes::SOURCE_READ,
            PipelineError::DegenerateWindow { .. } => PipelineErrorCodes::DEGENERATE_WINDOW,
            PipelineError::NonFiniteFeature { .. } => PipelineErrorCodes::NON_FINITE_FEATURE,
            PipelineError::PredictionFailed { .. } => PipelineErrorCodes::PREDICTION_FAILED,
            PipelineError::ActuatorFailed { .. } => PipelineErrorCodes::ACTUATOR_FAILED,
            PipelineError::WindowFull { .. } => PipelineErrorCodes::WINDOW_FULL,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::MalformedSample { token } => {
                format!("Malformed sample token {:?}", token)
            }
            PipelineError::SourceRead { details } => format!("Sample source read failed: {}", details),
            PipelineError::DegenerateWindow { len, required } => format!(
                "Window of {} samples cannot be filtered (need more than {})",
                len, required
            ),
            PipelineError::NonFiniteFeature { name, value } => {
                format!("Feature {} is not finite ({})", name, value)
            }
            PipelineError::PredictionFailed { reason } => format!("Prediction failed: {}", reason),
            PipelineError::ActuatorFailed { action, details } => {
                format!("Action {} failed: {}", action, details)
            }
            PipelineError::WindowFull { capacity } => {
                format!("Window already holds {} samples; drain before pushing", capacity)
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PipelineError {}

/// Convert from std::io::Error to PipelineError
impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::SourceRead {
            details: err.to_string(),
        }
    }
}
