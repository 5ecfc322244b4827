// neurokey - biosignal window classification core
// Real-time windowing, zero-phase filtering, spectral features, classification
// and debounced actuation over a single-channel EEG/EOG stream

// Module declarations
pub mod analysis;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod source;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::classifier::{ClassLabel, ClassifierAdapter};
pub use analysis::features::{FeatureVector, FEATURE_NAMES};
pub use analysis::{
    ActionReport, Pipeline, RunSummary, StopCondition, StopReason, WindowAnalyzer, WindowReport,
};
pub use config::AppConfig;
pub use dispatch::{ActionCommand, ActionDispatcher, Actuator, DispatchOutcome};
pub use error::{ErrorCode, PipelineError, StartupError};
pub use source::{SampleSource, SourceRead};
