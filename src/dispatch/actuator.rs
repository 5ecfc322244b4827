// Actuators - side-effecting sinks for triggered actions
//
// The dispatcher hands every accepted action to an `Actuator`. Actuation is
// fire-and-forget: the hold duration travels with the command and it is up to
// the receiving side (a key-press helper, a log reader) to honor it.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::analysis::classifier::ClassLabel;
use crate::error::PipelineError;

/// One action to perform on behalf of a classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionCommand {
    pub label: ClassLabel,
    pub action: String,
    pub hold_ms: u64,
}

/// External action executor (keyboard helper, logger, test recorder)
pub trait Actuator: Send {
    fn perform(&mut self, command: &ActionCommand) -> Result<(), PipelineError>;
}

/// Writes every command to the tracing log
#[derive(Debug, Default)]
pub struct LogActuator;

impl Actuator for LogActuator {
    fn perform(&mut self, command: &ActionCommand) -> Result<(), PipelineError> {
        tracing::info!(
            "[Actuator] press '{}' for {} ms (label {})",
            command.action,
            command.hold_ms,
            command.label
        );
        Ok(())
    }
}

/// Emits one JSON object per line, e.g. for a key-press helper on a pipe
///
/// Lines carry `"type": "command"` so a reader sharing the stream with other
/// JSON lines (window reports) can pick them out.
pub struct JsonLinesActuator<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesActuator<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CommandLine<'a> {
    Command(&'a ActionCommand),
}

impl<W: Write + Send> Actuator for JsonLinesActuator<W> {
    fn perform(&mut self, command: &ActionCommand) -> Result<(), PipelineError> {
        let failed = |details: String| PipelineError::ActuatorFailed {
            action: command.action.clone(),
            details,
        };

        let line = serde_json::to_string(&CommandLine::Command(command))
            .map_err(|e| failed(e.to_string()))?;
        writeln!(self.writer, "{line}").map_err(|e| failed(e.to_string()))?;
        self.writer.flush().map_err(|e| failed(e.to_string()))
    }
}

/// Records commands in a shared list; clones observe the same list
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    commands: Arc<Mutex<Vec<ActionCommand>>>,
    fail_next: Arc<Mutex<usize>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every command performed so far
    pub fn commands(&self) -> Vec<ActionCommand> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Make the next `count` calls to `perform` fail without recording
    pub fn fail_next(&self, count: usize) {
        let mut pending = self
            .fail_next
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *pending = count;
    }
}

impl Actuator for RecordingActuator {
    fn perform(&mut self, command: &ActionCommand) -> Result<(), PipelineError> {
        {
            let mut pending = self
                .fail_next
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *pending > 0 {
                *pending -= 1;
                return Err(PipelineError::ActuatorFailed {
                    action: command.action.clone(),
                    details: "injected failure".to_string(),
                });
            }
        }

        self.commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command.clone());
        Ok(())
    }
}
