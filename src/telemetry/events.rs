//! Core telemetry event types describing pipeline activity exposed to the
//! CLI and any in-process subscriber.

use serde::{Deserialize, Serialize};

use crate::analysis::classifier::ClassLabel;

/// Metric events covering window processing, actuation, and latency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    WindowProcessed {
        window_index: u64,
        label: Option<ClassLabel>,
        processing_ms: f64,
    },
    ActionTriggered {
        label: ClassLabel,
        action: String,
        hold_ms: u64,
    },
    ActionSuppressed {
        label: ClassLabel,
        remaining_ms: f64,
    },
    Latency {
        avg_ms: f64,
        max_ms: f64,
        sample_count: usize,
    },
    BudgetOverrun {
        window_index: u64,
        processing_ms: f64,
        budget_ms: f64,
    },
    Error {
        code: i32,
        context: String,
    },
}
