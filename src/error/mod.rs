// Error types for the neurokey pipeline
//
// Errors are split along the one boundary that matters at runtime: startup
// errors abort before the loop is entered, pipeline errors are logged and the
// loop moves on to the next sample or window.

mod pipeline;
mod startup;

pub use pipeline::{log_pipeline_error, PipelineError, PipelineErrorCodes};
pub use startup::{log_startup_error, StartupError, StartupErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so telemetry and the CLI can report them
/// uniformly.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
