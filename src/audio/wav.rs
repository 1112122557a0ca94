//! WAV file loading for the scorer.

use crate::error::{Result, ResegmentError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Mono samples in `[-1.0, 1.0]` at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Loads a WAV file, downmixing to mono and resampling to `target_rate`.
pub fn load_wav(path: &Path, target_rate: u32) -> Result<AudioBuffer> {
    let file = File::open(path).map_err(|e| ResegmentError::AudioRead {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    read_wav(BufReader::new(file), target_rate).map_err(|e| match e {
        ResegmentError::AudioRead { message, .. } => ResegmentError::AudioRead {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

/// Reads WAV data from any reader (integer or float PCM, any channel count).
pub fn read_wav<R: Read>(reader: R, target_rate: u32) -> Result<AudioBuffer> {
    let audio_error = |message: String| ResegmentError::AudioRead {
        path: "<reader>".to_string(),
        message,
    };

    let mut wav_reader = hound::WavReader::new(reader)
        .map_err(|e| audio_error(format!("Failed to parse WAV file: {}", e)))?;

    let spec = wav_reader.spec();
    let channels = spec.channels.max(1) as usize;

    // Read all samples as f32 in [-1, 1]
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            wav_reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| audio_error(format!("Failed to read WAV samples: {}", e)))?;

    // Convert to mono by averaging channels
    let mono: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    let samples = resample(&mono, spec.sample_rate, target_rate);

    Ok(AudioBuffer {
        samples,
        sample_rate: target_rate,
    })
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}
