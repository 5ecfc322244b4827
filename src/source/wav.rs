// WavSource - replay a recorded signal from a PCM WAV file

use std::path::Path;

use super::{SampleSource, SourceRead};
use crate::error::PipelineError;

/// Decoded WAV recording played back one sample at a time
pub struct WavSource {
    samples: Vec<f64>,
    position: usize,
    sample_rate: u32,
}

impl WavSource {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let (samples, sample_rate) = read_wav(path)?;
        tracing::info!(
            "[WavSource] Loaded {} samples at {} Hz from {}",
            samples.len(),
            sample_rate,
            path.display()
        );
        Ok(Self::from_samples(samples, sample_rate))
    }

    pub fn from_samples(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSource for WavSource {
    fn read_sample(&mut self) -> Result<SourceRead, PipelineError> {
        match self.samples.get(self.position) {
            Some(&sample) => {
                self.position += 1;
                Ok(SourceRead::Sample(sample))
            }
            None => Ok(SourceRead::Closed),
        }
    }
}

fn read_error(path: &Path, details: impl std::fmt::Display) -> PipelineError {
    PipelineError::SourceRead {
        details: format!("{}: {details}", path.display()),
    }
}

/// Read a WAV file as mono `f64` samples plus its sample rate
///
/// Integer PCM is normalized to [-1, 1]; multi-channel files are averaged
/// down to one channel.
pub fn read_wav(path: &Path) -> Result<(Vec<f64>, u32), PipelineError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| read_error(path, err))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(read_error(path, "zero channels"));
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map(f64::from).map_err(|err| read_error(path, err)))
            .collect::<Result<Vec<f64>, _>>()?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 | 16 => {
                let full_scale = f64::from(1_i32 << (spec.bits_per_sample - 1));
                reader
                    .samples::<i16>()
                    .map(|sample| {
                        sample
                            .map(|v| f64::from(v) / full_scale)
                            .map_err(|err| read_error(path, err))
                    })
                    .collect::<Result<Vec<f64>, _>>()?
            }
            24 | 32 => {
                let full_scale = f64::from(1_u32 << (spec.bits_per_sample - 1));
                reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|v| f64::from(v) / full_scale)
                            .map_err(|err| read_error(path, err))
                    })
                    .collect::<Result<Vec<f64>, _>>()?
            }
            bits => {
                return Err(read_error(
                    path,
                    format!("unsupported bits_per_sample={bits}"),
                ))
            }
        },
    };

    if spec.channels == 1 {
        return Ok((samples, spec.sample_rate));
    }

    let channels = spec.channels as usize;
    let mono = samples
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f64>() / channels as f64)
        .collect();

    Ok((mono, spec.sample_rate))
}
