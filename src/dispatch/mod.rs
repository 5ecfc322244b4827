// ActionDispatcher - maps class labels to debounced actions
//
// Two policies share one state machine:
// - immediate (no gap): every mapped label triggers its action
// - debounced (gap configured): Armed → trigger → Cooling(since); while
//   cooling, triggers are suppressed until `gap` has elapsed
//
// The debounce timer is shared across all mapped labels. Suppression is a
// normal outcome, not an error.

pub mod actuator;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use actuator::{
    ActionCommand, Actuator, JsonLinesActuator, LogActuator, RecordingActuator,
};

use crate::analysis::classifier::ClassLabel;
use crate::config::DispatchConfig;
use crate::error::PipelineError;
use crate::telemetry::TelemetryHub;

/// Label → action mapping with its effective hold duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBinding {
    pub label: ClassLabel,
    pub action: String,
    pub hold_ms: u64,
}

/// Debounce state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Armed,
    Cooling { since: Instant },
}

/// Result of handing one label to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Action was performed
    Triggered(ActionCommand),
    /// Mapped label arrived inside the debounce gap
    Suppressed { remaining: Duration },
    /// No binding for the label
    Unmapped,
}

pub struct ActionDispatcher {
    bindings: HashMap<ClassLabel, ActionBinding>,
    gap: Option<Duration>,
    state: DebounceState,
    telemetry: Arc<TelemetryHub>,
}

impl ActionDispatcher {
    /// Create a dispatcher
    ///
    /// # Arguments
    /// * `bindings` - Label → action mapping (later duplicates win)
    /// * `gap` - Minimum time between triggered actions; `None` disables debounce
    pub fn new(bindings: Vec<ActionBinding>, gap: Option<Duration>) -> Self {
        let bindings = bindings
            .into_iter()
            .map(|binding| (binding.label, binding))
            .collect();
        Self {
            bindings,
            gap,
            state: DebounceState::Armed,
            telemetry: Arc::new(TelemetryHub::default()),
        }
    }

    /// Publish triggered and suppressed actions to `telemetry`
    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryHub>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.resolved_bindings(), config.debounce_gap())
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn gap(&self) -> Option<Duration> {
        self.gap
    }

    pub fn binding(&self, label: ClassLabel) -> Option<&ActionBinding> {
        self.bindings.get(&label)
    }

    /// Dispatch one classification
    ///
    /// A failed actuation leaves the dispatcher armed, so the gap is only
    /// consumed by actions that actually happened.
    pub fn dispatch(
        &mut self,
        label: ClassLabel,
        now: Instant,
        actuator: &mut dyn Actuator,
    ) -> Result<DispatchOutcome, PipelineError> {
        let Some(binding) = self.bindings.get(&label) else {
            return Ok(DispatchOutcome::Unmapped);
        };

        if let (Some(gap), DebounceState::Cooling { since }) = (self.gap, self.state) {
            let elapsed = now.saturating_duration_since(since);
            if elapsed < gap {
                let remaining = gap - elapsed;
                tracing::info!(
                    "[Dispatcher] '{}' for label {} ignored (waiting for gap, {:.0} ms left)",
                    binding.action,
                    label,
                    remaining.as_secs_f64() * 1000.0
                );
                self.telemetry.record_suppressed(label, remaining.as_secs_f64() * 1000.0);
                return Ok(DispatchOutcome::Suppressed { remaining });
            }
            self.state = DebounceState::Armed;
        }

        let command = ActionCommand {
            label,
            action: binding.action.clone(),
            hold_ms: binding.hold_ms,
        };
        actuator.perform(&command)?;

        if self.gap.is_some() {
            self.state = DebounceState::Cooling { since: now };
        }

        tracing::debug!(
            "[Dispatcher] Triggered '{}' for label {}",
            command.action,
            label
        );
        self.telemetry.record_action(label, &command.action, command.hold_ms);
        Ok(DispatchOutcome::Triggered(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MetricEvent;

    fn blink_dispatcher(gap_secs: u64) -> ActionDispatcher {
        ActionDispatcher::new(
            vec![ActionBinding {
                label: 2,
                action: "right".to_string(),
                hold_ms: 0,
            }],
            Some(Duration::from_secs(gap_secs)),
        )
    }

    #[test]
    fn debounce_accepts_suppresses_then_accepts() {
        let mut dispatcher = blink_dispatcher(2);
        let mut actuator = RecordingActuator::new();
        let t0 = Instant::now();

        let first = dispatcher.dispatch(2, t0, &mut actuator).unwrap();
        assert!(matches!(first, DispatchOutcome::Triggered(_)));

        let second = dispatcher
            .dispatch(2, t0 + Duration::from_secs(1), &mut actuator)
            .unwrap();
        assert_eq!(
            second,
            DispatchOutcome::Suppressed {
                remaining: Duration::from_secs(1)
            }
        );

        let third = dispatcher
            .dispatch(2, t0 + Duration::from_millis(2500), &mut actuator)
            .unwrap();
        assert!(matches!(third, DispatchOutcome::Triggered(_)));

        assert_eq!(actuator.commands().len(), 2);
        assert_eq!(
            dispatcher.state(),
            DebounceState::Cooling {
                since: t0 + Duration::from_millis(2500)
            }
        );
    }

    #[test]
    fn gap_boundary_is_inclusive() {
        let mut dispatcher = blink_dispatcher(2);
        let mut actuator = RecordingActuator::new();
        let t0 = Instant::now();

        dispatcher.dispatch(2, t0, &mut actuator).unwrap();
        let outcome = dispatcher
            .dispatch(2, t0 + Duration::from_secs(2), &mut actuator)
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Triggered(_)));
    }

    #[test]
    fn immediate_policy_triggers_every_mapped_label() {
        let mut dispatcher = ActionDispatcher::from_config(&DispatchConfig::multi_class());
        let mut actuator = RecordingActuator::new();
        let now = Instant::now();

        for label in [0, 1, 2, 1] {
            dispatcher.dispatch(label, now, &mut actuator).unwrap();
        }

        let actions: Vec<String> = actuator
            .commands()
            .into_iter()
            .map(|command| command.action)
            .collect();
        assert_eq!(actions, vec!["space", "w", "right", "w"]);
        assert!(actuator.commands().iter().all(|c| c.hold_ms == 1000));
        assert_eq!(dispatcher.state(), DebounceState::Armed);
    }

    #[test]
    fn unmapped_labels_have_no_side_effect() {
        let mut dispatcher = blink_dispatcher(5);
        let mut actuator = RecordingActuator::new();
        let t0 = Instant::now();

        assert_eq!(
            dispatcher.dispatch(0, t0, &mut actuator).unwrap(),
            DispatchOutcome::Unmapped
        );
        assert_eq!(dispatcher.state(), DebounceState::Armed);
        assert!(actuator.commands().is_empty());
    }

    #[test]
    fn failed_actuation_does_not_consume_gap() {
        let mut dispatcher = blink_dispatcher(5);
        let recorder = RecordingActuator::new();
        let mut actuator = recorder.clone();
        let t0 = Instant::now();

        recorder.fail_next(1);
        assert!(matches!(
            dispatcher.dispatch(2, t0, &mut actuator),
            Err(PipelineError::ActuatorFailed { .. })
        ));
        assert_eq!(dispatcher.state(), DebounceState::Armed);

        let retry = dispatcher
            .dispatch(2, t0 + Duration::from_millis(100), &mut actuator)
            .unwrap();
        assert!(matches!(retry, DispatchOutcome::Triggered(_)));
        assert_eq!(recorder.commands().len(), 1);
    }

    #[test]
    fn blink_preset_uses_five_second_gap() {
        let dispatcher = ActionDispatcher::from_config(&DispatchConfig::blink_detector());
        assert_eq!(dispatcher.gap(), Some(Duration::from_secs(5)));
        assert_eq!(dispatcher.binding(2).map(|b| b.action.as_str()), Some("right"));
        assert!(dispatcher.binding(0).is_none());
    }

    #[test]
    fn outcomes_are_published_to_injected_telemetry() {
        let telemetry = Arc::new(TelemetryHub::new(8, 8, 4));
        let mut dispatcher = blink_dispatcher(5).with_telemetry(telemetry.clone());
        let mut actuator = RecordingActuator::new();
        let t0 = Instant::now();

        dispatcher.dispatch(2, t0, &mut actuator).unwrap();
        dispatcher
            .dispatch(2, t0 + Duration::from_secs(1), &mut actuator)
            .unwrap();
        dispatcher.dispatch(0, t0, &mut actuator).unwrap();

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.total_events, 2);
        assert!(matches!(
            &snapshot.recent[0],
            MetricEvent::ActionTriggered { label: 2, action, .. } if action == "right"
        ));
        assert!(matches!(
            snapshot.recent[1],
            MetricEvent::ActionSuppressed { label: 2, remaining_ms } if (remaining_ms - 4000.0).abs() < 1e-6
        ));
    }
}
