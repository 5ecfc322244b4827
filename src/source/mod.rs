// Sample sources - everything the pipeline can read samples from
//
// A source yields one reading at a time. Textual sources (serial lines, CSV
// replays) hand back raw tokens and leave parsing to the pipeline so that a
// malformed token is a recoverable per-sample error. Sources that decode
// numbers themselves (WAV, ring buffer, generator) yield samples directly.

mod line;
mod queue;
mod synthetic;
mod wav;

use std::collections::VecDeque;

pub use line::LineSource;
pub use queue::{QueueItem, QueueSource, ReadingQueue};
pub use synthetic::SyntheticSource;
pub use wav::{read_wav, WavSource};

use crate::error::PipelineError;

/// One reading from a sample source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRead {
    /// Raw textual token, parsed with [`parse_sample`]
    Token(String),
    /// Already-decoded sample
    Sample(f64),
    /// No data arrived within the source's bounded wait
    Idle,
    /// Source is exhausted; no further readings will arrive
    Closed,
}

/// Producer of raw samples for the pipeline loop
pub trait SampleSource {
    fn read_sample(&mut self) -> Result<SourceRead, PipelineError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read_sample(&mut self) -> Result<SourceRead, PipelineError> {
        (**self).read_sample()
    }
}

/// Parse one textual token into a finite sample
///
/// Surrounding whitespace is ignored. Empty, non-numeric and non-finite
/// tokens (`nan`, `inf`) are rejected.
pub fn parse_sample(token: &str) -> Result<f64, PipelineError> {
    let trimmed = token.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(PipelineError::MalformedSample {
            token: trimmed.to_string(),
        }),
    }
}

/// In-memory scripted source for tests and harnesses
///
/// Replays queued readings (or errors) in order, then reports `Closed`.
#[derive(Debug, Default)]
pub struct ManualSource {
    queue: VecDeque<Result<SourceRead, PipelineError>>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut source = Self::new();
        for token in tokens {
            source.push_token(token);
        }
        source
    }

    pub fn from_samples<I: IntoIterator<Item = f64>>(samples: I) -> Self {
        let mut source = Self::new();
        for sample in samples {
            source.push_sample(sample);
        }
        source
    }

    pub fn push_token(&mut self, token: impl Into<String>) {
        self.queue.push_back(Ok(SourceRead::Token(token.into())));
    }

    pub fn push_sample(&mut self, sample: f64) {
        self.queue.push_back(Ok(SourceRead::Sample(sample)));
    }

    pub fn push_idle(&mut self) {
        self.queue.push_back(Ok(SourceRead::Idle));
    }

    pub fn push_error(&mut self, err: PipelineError) {
        self.queue.push_back(Err(err));
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl SampleSource for ManualSource {
    fn read_sample(&mut self) -> Result<SourceRead, PipelineError> {
        self.queue.pop_front().unwrap_or(Ok(SourceRead::Closed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_trimmed_numbers() {
        assert_eq!(parse_sample(" 512.25\r\n").unwrap(), 512.25);
        assert_eq!(parse_sample("-3").unwrap(), -3.0);
        assert_eq!(parse_sample("1e3").unwrap(), 1000.0);
    }

    #[test]
    fn parse_rejects_garbage() {
        for token in ["", "   ", "abc", "12,5", "nan", "inf", "-inf"] {
            assert!(
                matches!(
                    parse_sample(token),
                    Err(PipelineError::MalformedSample { .. })
                ),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn manual_source_replays_then_closes() {
        let mut source = ManualSource::from_tokens(["1", "x"]);
        source.push_idle();
        source.push_error(PipelineError::SourceRead {
            details: "unplugged".to_string(),
        });

        assert_eq!(
            source.read_sample().unwrap(),
            SourceRead::Token("1".to_string())
        );
        assert_eq!(
            source.read_sample().unwrap(),
            SourceRead::Token("x".to_string())
        );
        assert_eq!(source.read_sample().unwrap(), SourceRead::Idle);
        assert!(source.read_sample().is_err());
        assert_eq!(source.read_sample().unwrap(), SourceRead::Closed);
        assert_eq!(source.read_sample().unwrap(), SourceRead::Closed);
    }

    #[test]
    fn boxed_sources_delegate() {
        let mut source: Box<dyn SampleSource> = Box::new(ManualSource::from_samples([0.5]));
        assert_eq!(source.read_sample().unwrap(), SourceRead::Sample(0.5));
    }
}
