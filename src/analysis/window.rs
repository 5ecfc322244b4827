// Window accumulator - fixed-capacity, non-overlapping sample windows
//
// Samples are appended in arrival order until the window holds exactly
// `capacity` samples. The window is then drained as a whole and starts over
// empty; there is no overlap between consecutive windows.

use crate::error::PipelineError;

/// Fixed-capacity buffer that yields one full window at a time
#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    samples: Vec<f64>,
    capacity: usize,
}

impl WindowAccumulator {
    /// Create an empty accumulator holding `capacity` samples per window
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one sample
    ///
    /// A full window rejects the sample and is left untouched; callers drain
    /// as soon as `is_full()` turns true.
    pub fn push(&mut self, sample: f64) -> Result<(), PipelineError> {
        if self.is_full() {
            return Err(PipelineError::WindowFull {
                capacity: self.capacity,
            });
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take the full window and start a new empty one
    ///
    /// Returns `None` while the window is only partially filled.
    pub fn drain_and_reset(&mut self) -> Option<Vec<f64>> {
        if !self.is_full() {
            return None;
        }
        Some(std::mem::replace(
            &mut self.samples,
            Vec::with_capacity(self.capacity),
        ))
    }

    /// Drop a partial window; returns how many samples were discarded
    pub fn clear(&mut self) -> usize {
        let discarded = self.samples.len();
        self.samples.clear();
        discarded
    }
}
