// Analysis module - window → filter → features → classify → dispatch
//
// This module orchestrates the per-window processing pipeline: raw samples
// are accumulated into fixed, non-overlapping windows, each full window is
// conditioned (notch + bandpass, zero-phase), reduced to the 8-feature
// vector, classified, and the label handed to the debounced dispatcher.
//
// Architecture:
// - WindowAnalyzer: FilterBank → FeatureExtractor (no artifacts needed)
// - Pipeline: WindowAccumulator → WindowAnalyzer → ClassifierAdapter →
//   ActionDispatcher, driven by a single-threaded loop over a SampleSource
// - Output: WindowReport per processed window, RunSummary at exit
//
// Every failure inside one iteration is a recoverable PipelineError: it is
// logged, counted, and the loop moves on. Errors before a window is full keep
// the partial window; errors while processing a window lose that window only.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::clock::{SystemTimeSource, TimeSource};
use crate::config::{AppConfig, SignalConfig};
use crate::dispatch::{ActionDispatcher, Actuator, DispatchOutcome};
use crate::error::{log_pipeline_error, log_startup_error, PipelineError, StartupError};
use crate::source::{parse_sample, SampleSource, SourceRead};
use crate::telemetry::TelemetryHub;

pub mod artifacts;
pub mod classifier;
pub mod features;
pub mod filters;
pub mod window;

use classifier::{ClassLabel, ClassifierAdapter};
use features::{FeatureExtractor, FeatureVector};
use filters::FilterBank;
use window::WindowAccumulator;

/// Signal conditioning plus feature extraction for one full window
pub struct WindowAnalyzer {
    filters: FilterBank,
    extractor: FeatureExtractor,
    window_size: usize,
}

impl WindowAnalyzer {
    /// Design the filters and check the window is long enough to condition
    pub fn new(signal: &SignalConfig) -> Result<Self, StartupError> {
        let filters = FilterBank::build(signal)?;
        let required = filters.pad_len();
        if signal.window_size <= required {
            return Err(StartupError::WindowTooShort {
                window_size: signal.window_size,
                required,
            });
        }

        Ok(Self {
            extractor: FeatureExtractor::new(signal.sample_rate_hz, signal.window_size),
            filters,
            window_size: signal.window_size,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn filters(&self) -> &FilterBank {
        &self.filters
    }

    /// Condition `window` and extract its feature vector
    pub fn analyze(&self, window: &[f64]) -> Result<FeatureVector, PipelineError> {
        let conditioned = self.filters.condition(window)?;
        Ok(self.extractor.extract(&conditioned))
    }
}

/// What happened to the label of a processed window
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionReport {
    Triggered { action: String, hold_ms: u64 },
    Suppressed { remaining_ms: f64 },
    Unmapped,
}

impl From<&DispatchOutcome> for ActionReport {
    fn from(outcome: &DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Triggered(command) => ActionReport::Triggered {
                action: command.action.clone(),
                hold_ms: command.hold_ms,
            },
            DispatchOutcome::Suppressed { remaining } => ActionReport::Suppressed {
                remaining_ms: remaining.as_secs_f64() * 1000.0,
            },
            DispatchOutcome::Unmapped => ActionReport::Unmapped,
        }
    }
}

/// Result of one successfully processed window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    pub window_index: u64,
    pub features: FeatureVector,
    pub label: ClassLabel,
    pub action: ActionReport,
    pub processing_ms: f64,
    pub overrun: bool,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    SourceClosed,
    TimeBudget,
    MaxWindows,
    Stopped,
}

/// Conditions checked between samples; the first one met ends the loop
#[derive(Debug, Clone, Default)]
pub struct StopCondition {
    time_budget: Option<Duration>,
    max_windows: Option<u64>,
    running: Option<Arc<AtomicBool>>,
}

impl StopCondition {
    /// Run until the source closes
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_max_windows(mut self, windows: u64) -> Self {
        self.max_windows = Some(windows);
        self
    }

    /// Stop once `running` is cleared by another thread
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn should_stop(&self, started: Instant, now: Instant, windows: u64) -> Option<StopReason> {
        if let Some(flag) = &self.running {
            if !flag.load(Ordering::SeqCst) {
                return Some(StopReason::Stopped);
            }
        }
        if let Some(max) = self.max_windows {
            if windows >= max {
                return Some(StopReason::MaxWindows);
            }
        }
        if let Some(budget) = self.time_budget {
            if now.saturating_duration_since(started) >= budget {
                return Some(StopReason::TimeBudget);
            }
        }
        None
    }
}

/// Counters accumulated over the lifetime of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub samples_accepted: u64,
    pub malformed_samples: u64,
    pub idle_reads: u64,
    pub source_errors: u64,
    pub windows_processed: u64,
    pub window_errors: u64,
    pub actions_triggered: u64,
    pub actions_suppressed: u64,
    pub actuator_failures: u64,
    pub overruns: u64,
    pub max_processing_ms: f64,
    pub label_counts: BTreeMap<ClassLabel, u64>,
    pub stop_reason: Option<StopReason>,
}

/// The real-time classification loop and all of its state
pub struct Pipeline {
    analyzer: WindowAnalyzer,
    classifier: ClassifierAdapter,
    dispatcher: ActionDispatcher,
    window: WindowAccumulator,
    time_source: Arc<dyn TimeSource>,
    telemetry: Arc<TelemetryHub>,
    window_budget: Duration,
    log_every_n_windows: u64,
    summary: RunSummary,
}

impl Pipeline {
    /// Assemble a pipeline around an already loaded classifier
    ///
    /// # Errors
    /// Any `StartupError` from signal, window, or binding validation,
    /// including bindings for labels the classifier cannot produce.
    pub fn new(config: &AppConfig, classifier: ClassifierAdapter) -> Result<Self, StartupError> {
        // The analyzer designs the filter bank; that doubles as signal validation
        let analyzer = WindowAnalyzer::new(&config.signal)
            .and_then(|analyzer| {
                config.dispatch.validate()?;
                config.validate_labels(&classifier.labels())?;
                Ok(analyzer)
            })
            .inspect_err(|err| log_startup_error(err, "Pipeline::new"))?;

        let telemetry = Arc::new(TelemetryHub::default());
        let dispatcher =
            ActionDispatcher::from_config(&config.dispatch).with_telemetry(telemetry.clone());
        let window_budget = config.signal.window_duration();

        tracing::info!(
            "[Pipeline] Ready: {} samples @ {} Hz per window (budget {:.1} ms), {} bindings, debounce {:?}",
            config.signal.window_size,
            config.signal.sample_rate_hz,
            window_budget.as_secs_f64() * 1000.0,
            config.dispatch.bindings.len(),
            dispatcher.gap()
        );

        Ok(Self {
            window: WindowAccumulator::new(config.signal.window_size),
            analyzer,
            classifier,
            dispatcher,
            time_source: Arc::new(SystemTimeSource::default()),
            telemetry,
            window_budget,
            log_every_n_windows: config.telemetry.log_every_n_windows,
            summary: RunSummary::default(),
        })
    }

    /// Load the configured artifacts and assemble a pipeline
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let classifier = ClassifierAdapter::load(
            &config.artifacts.scaler_path,
            &config.artifacts.classifier_path,
        )?;
        Self::new(config, classifier)
    }

    /// Replace the clock used for debounce decisions and time budgets
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Publish window, action and error events to `telemetry`
    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryHub>) -> Self {
        self.dispatcher = self.dispatcher.with_telemetry(telemetry.clone());
        self.telemetry = telemetry;
        self
    }

    pub fn telemetry(&self) -> &Arc<TelemetryHub> {
        &self.telemetry
    }

    pub fn analyzer(&self) -> &WindowAnalyzer {
        &self.analyzer
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Samples waiting in the current partial window
    pub fn pending_samples(&self) -> usize {
        self.window.len()
    }

    /// Parse a textual token and feed it to the window
    pub fn handle_token(
        &mut self,
        token: &str,
        actuator: &mut dyn Actuator,
    ) -> Result<Option<WindowReport>, PipelineError> {
        let sample = parse_sample(token)?;
        self.handle_sample(sample, actuator)
    }

    /// Feed one sample; processes the window once it is full
    pub fn handle_sample(
        &mut self,
        sample: f64,
        actuator: &mut dyn Actuator,
    ) -> Result<Option<WindowReport>, PipelineError> {
        if !sample.is_finite() {
            return Err(PipelineError::MalformedSample {
                token: sample.to_string(),
            });
        }

        self.window.push(sample)?;
        self.summary.samples_accepted += 1;

        match self.window.drain_and_reset() {
            Some(samples) => self.process_window(&samples, actuator).map(Some),
            None => Ok(None),
        }
    }

    /// Run one full window through conditioning, features, classifier and
    /// dispatcher
    pub fn process_window(
        &mut self,
        samples: &[f64],
        actuator: &mut dyn Actuator,
    ) -> Result<WindowReport, PipelineError> {
        let window_index = self.summary.windows_processed;
        self.summary.windows_processed += 1;
        let started = Instant::now();

        let features = self.analyzer.analyze(samples)?;
        let label = self.classifier.classify(&features)?;
        *self.summary.label_counts.entry(label).or_insert(0) += 1;

        let outcome = self
            .dispatcher
            .dispatch(label, self.time_source.now(), actuator)?;
        match outcome {
            DispatchOutcome::Triggered(_) => self.summary.actions_triggered += 1,
            DispatchOutcome::Suppressed { .. } => self.summary.actions_suppressed += 1,
            DispatchOutcome::Unmapped => {}
        }

        let elapsed = started.elapsed();
        let processing_ms = elapsed.as_secs_f64() * 1000.0;
        self.summary.max_processing_ms = self.summary.max_processing_ms.max(processing_ms);

        let overrun = elapsed > self.window_budget;
        if overrun {
            self.summary.overruns += 1;
            let budget_ms = self.window_budget.as_secs_f64() * 1000.0;
            tracing::warn!(
                "[Pipeline] Window {} took {:.2} ms, over the {:.1} ms acquisition budget",
                window_index,
                processing_ms,
                budget_ms
            );
            self.telemetry.record_budget_overrun(window_index, processing_ms, budget_ms);
        }

        self.telemetry.record_window(
            window_index,
            Some(label),
            processing_ms,
            self.log_every_n_windows,
        );
        if self.log_every_n_windows > 0 && (window_index + 1) % self.log_every_n_windows == 0 {
            tracing::info!(
                "[Pipeline] {} windows processed, last label {} ({:.2} ms)",
                window_index + 1,
                label,
                processing_ms
            );
        }

        Ok(WindowReport {
            window_index,
            features,
            label,
            action: ActionReport::from(&outcome),
            processing_ms,
            overrun,
        })
    }

    /// Run until the source closes or a stop condition is met
    pub fn run(
        &mut self,
        source: &mut dyn SampleSource,
        actuator: &mut dyn Actuator,
        stop: &StopCondition,
    ) -> RunSummary {
        self.run_with_reports(source, actuator, stop, |_| {})
    }

    /// Like [`Pipeline::run`], handing every processed window to `on_report`
    pub fn run_with_reports<F>(
        &mut self,
        source: &mut dyn SampleSource,
        actuator: &mut dyn Actuator,
        stop: &StopCondition,
        mut on_report: F,
    ) -> RunSummary
    where
        F: FnMut(&WindowReport),
    {
        tracing::info!("[Pipeline] Starting loop");
        let started = self.time_source.now();

        let reason = loop {
            if let Some(reason) =
                stop.should_stop(started, self.time_source.now(), self.summary.windows_processed)
            {
                break reason;
            }

            let result = match source.read_sample() {
                Ok(SourceRead::Token(token)) => self.handle_token(&token, actuator),
                Ok(SourceRead::Sample(sample)) => self.handle_sample(sample, actuator),
                Ok(SourceRead::Idle) => {
                    self.summary.idle_reads += 1;
                    continue;
                }
                Ok(SourceRead::Closed) => break StopReason::SourceClosed,
                Err(err) => Err(err),
            };

            match result {
                Ok(Some(report)) => on_report(&report),
                Ok(None) => {}
                Err(err) => self.record_error(&err),
            }
        };

        // The next run starts a fresh segment
        let discarded = self.window.clear();
        if discarded > 0 {
            tracing::debug!("[Pipeline] Discarded partial window of {} samples", discarded);
        }
        tracing::info!(
            "[Pipeline] Loop finished ({:?}): {} windows, {} actions, {} suppressed, {} overruns",
            reason,
            self.summary.windows_processed,
            self.summary.actions_triggered,
            self.summary.actions_suppressed,
            self.summary.overruns
        );

        self.summary.stop_reason = Some(reason);
        self.summary.clone()
    }

    fn record_error(&mut self, err: &PipelineError) {
        let context = match err {
            PipelineError::MalformedSample { .. } => {
                self.summary.malformed_samples += 1;
                "parse"
            }
            PipelineError::SourceRead { .. } => {
                self.summary.source_errors += 1;
                "read"
            }
            PipelineError::ActuatorFailed { .. } => {
                self.summary.actuator_failures += 1;
                "dispatch"
            }
            PipelineError::WindowFull { .. } => "accumulate",
            PipelineError::DegenerateWindow { .. }
            | PipelineError::NonFiniteFeature { .. }
            | PipelineError::PredictionFailed { .. } => {
                self.summary.window_errors += 1;
                "window"
            }
        };
        log_pipeline_error(err, context);
        self.telemetry.record_error(err, context);
    }
}
