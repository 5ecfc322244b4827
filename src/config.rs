//! Configuration management for the classification pipeline
//!
//! This module provides runtime configuration loading from JSON files so
//! signal parameters, artifact locations and action bindings can be changed
//! without recompilation. Every section falls back to defaults that match
//! the 512 Hz single-channel headset the artifacts were trained on.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::classifier::ClassLabel;
use crate::analysis::WindowAnalyzer;
use crate::dispatch::ActionBinding;
use crate::error::StartupError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub signal: SignalConfig,
    pub artifacts: ArtifactsConfig,
    pub dispatch: DispatchConfig,
    pub telemetry: TelemetryConfig,
}

/// Acquisition and filter design parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Sampling rate of the incoming stream in Hz
    pub sample_rate_hz: f64,
    /// Samples per non-overlapping analysis window
    pub window_size: usize,
    /// Mains frequency removed by the notch filter
    pub powerline_hz: f64,
    /// Quality factor of the notch (center / -3 dB bandwidth)
    pub notch_quality: f64,
    /// Lower passband edge in Hz
    pub passband_low_hz: f64,
    /// Upper passband edge in Hz
    pub passband_high_hz: f64,
    /// Butterworth prototype order of the bandpass
    pub bandpass_order: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 512.0,
            window_size: 512,
            powerline_hz: 50.0,
            notch_quality: 30.0,
            passband_low_hz: 0.5,
            passband_high_hz: 30.0,
            bandpass_order: 4,
        }
    }
}

impl SignalConfig {
    /// Acquisition time covered by one window
    pub fn window_duration(&self) -> Duration {
        if self.sample_rate_hz > 0.0 {
            Duration::from_secs_f64(self.window_size as f64 / self.sample_rate_hz)
        } else {
            Duration::ZERO
        }
    }
}

/// Locations of the pre-trained scaler and classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub scaler_path: PathBuf,
    pub classifier_path: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            scaler_path: PathBuf::from("assets/scaler.json"),
            classifier_path: PathBuf::from("assets/classifier.json"),
        }
    }
}

/// One label → action entry as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConfig {
    pub label: ClassLabel,
    pub action: String,
    /// Overrides `default_hold_ms` for this binding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_ms: Option<u64>,
}

/// Action dispatch policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum gap between two triggered actions; `None` triggers every window
    pub debounce_gap_secs: Option<f64>,
    /// Hold duration handed to the actuator when a binding has none
    pub default_hold_ms: u64,
    pub bindings: Vec<BindingConfig>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::multi_class()
    }
}

impl DispatchConfig {
    /// Relaxation → space, attention → w, blink → right; no debounce
    pub fn multi_class() -> Self {
        Self {
            debounce_gap_secs: None,
            default_hold_ms: 1000,
            bindings: vec![
                BindingConfig {
                    label: 0,
                    action: "space".to_string(),
                    hold_ms: None,
                },
                BindingConfig {
                    label: 1,
                    action: "w".to_string(),
                    hold_ms: None,
                },
                BindingConfig {
                    label: 2,
                    action: "right".to_string(),
                    hold_ms: None,
                },
            ],
        }
    }

    /// Blink → right with a 5 second gap between presses
    pub fn blink_detector() -> Self {
        Self {
            debounce_gap_secs: Some(5.0),
            default_hold_ms: 0,
            bindings: vec![BindingConfig {
                label: 2,
                action: "right".to_string(),
                hold_ms: None,
            }],
        }
    }

    pub fn debounce_gap(&self) -> Option<Duration> {
        self.debounce_gap_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Bindings with their effective hold duration
    pub fn resolved_bindings(&self) -> Vec<ActionBinding> {
        self.bindings
            .iter()
            .map(|binding| ActionBinding {
                label: binding.label,
                action: binding.action.clone(),
                hold_ms: binding.hold_ms.unwrap_or(self.default_hold_ms),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if let Some(gap) = self.debounce_gap_secs {
            if !gap.is_finite() || gap < 0.0 {
                return Err(StartupError::InvalidBinding {
                    reason: format!("debounce gap must be a finite, non-negative number (got {gap})"),
                });
            }
        }

        let mut seen = HashSet::new();
        for binding in &self.bindings {
            if binding.action.trim().is_empty() {
                return Err(StartupError::InvalidBinding {
                    reason: format!("label {} has an empty action name", binding.label),
                });
            }
            if !seen.insert(binding.label) {
                return Err(StartupError::InvalidBinding {
                    reason: format!("label {} is bound more than once", binding.label),
                });
            }
        }
        Ok(())
    }
}

/// Logging cadence for the pipeline loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Emit a progress line every N windows (0 disables)
    pub log_every_n_windows: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_every_n_windows: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// * `Ok(AppConfig)` - Loaded configuration (missing sections use defaults)
    /// * `Err(StartupError::InvalidConfig)` - File unreadable or not valid JSON
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StartupError> {
        let contents = fs::read_to_string(&path).map_err(|err| {
            log::warn!(
                "[Config] Failed to read config file {:?}: {}",
                path.as_ref(),
                err
            );
            StartupError::InvalidConfig {
                reason: format!("cannot read {}: {}", path.as_ref().display(), err),
            }
        })?;

        let config: AppConfig = serde_json::from_str(&contents).map_err(|err| {
            log::warn!(
                "[Config] Failed to parse JSON from {:?}: {}",
                path.as_ref(),
                err
            );
            StartupError::InvalidConfig {
                reason: format!("cannot parse {}: {}", path.as_ref().display(), err),
            }
        })?;

        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Check everything that can be checked before artifacts are loaded
    ///
    /// Filter design runs here so invalid signal parameters fail at startup,
    /// and the window must be longer than the zero-phase padding.
    pub fn validate(&self) -> Result<(), StartupError> {
        WindowAnalyzer::new(&self.signal)?;
        self.dispatch.validate()
    }

    /// Reject bindings for labels the classifier never produces
    pub fn validate_labels(&self, labels: &[ClassLabel]) -> Result<(), StartupError> {
        for binding in &self.dispatch.bindings {
            if !labels.contains(&binding.label) {
                return Err(StartupError::UnknownLabel {
                    label: binding.label,
                    known: labels.to_vec(),
                });
            }
        }
        Ok(())
    }
}
