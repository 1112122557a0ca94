//! Task assembly: transcript + audio + scorer output for one file.

use crate::audio::{AudioBuffer, load_wav};
use crate::config::AlignSettings;
use crate::discovery::InputPair;
use crate::error::{Result, ResegmentError};
use crate::normalize::{BasicNormalizer, TextNormalizer};
use crate::partition::{expected_frame_count, plan_partitions, remove_duplicate_frames};
use crate::scorer::FrameScorer;
use crate::task::{AlignmentTask, FrameMatrix, Utterance};
use crate::transcript::read_transcript;
use std::sync::Arc;
use tracing::{debug, warn};

/// How the stitched frame count compares to the audio length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCountCheck {
    /// `audio_len / samples_per_frame - 1` frames.
    Exact,
    /// One frame more than exact, from a trailing full frame.
    WithinTolerance,
    Mismatch { got: usize, expected: usize },
}

/// Builds [`AlignmentTask`]s, one file at a time.
pub struct TaskAssembler {
    scorer: Arc<dyn FrameScorer>,
    normalizer: Arc<dyn TextNormalizer>,
    settings: Arc<AlignSettings>,
}

impl TaskAssembler {
    pub fn new(scorer: Arc<dyn FrameScorer>, settings: Arc<AlignSettings>) -> Self {
        Self {
            scorer,
            normalizer: Arc::new(BasicNormalizer),
            settings,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn TextNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn settings(&self) -> &AlignSettings {
        &self.settings
    }

    /// Reads both files of `pair` and assembles its task.
    pub fn assemble_pair(&self, pair: &InputPair) -> Result<AlignmentTask> {
        let utterances = read_transcript(&pair.transcript, &pair.name, self.normalizer.as_ref())?;
        if utterances.is_empty() {
            return Err(ResegmentError::EmptyTranscript {
                name: pair.name.clone(),
            });
        }
        let audio = load_wav(&pair.audio, self.settings.sample_rate)?;
        let (task, _) = self.assemble(&pair.name, &audio, utterances)?;
        Ok(task)
    }

    /// Scores `audio` window by window and packages the stitched frames.
    ///
    /// A frame count outside tolerance is logged and reported, never fatal.
    pub fn assemble(
        &self,
        name: &str,
        audio: &AudioBuffer,
        utterances: Vec<Utterance>,
    ) -> Result<(AlignmentTask, FrameCountCheck)> {
        if utterances.is_empty() {
            return Err(ResegmentError::EmptyTranscript {
                name: name.to_string(),
            });
        }
        if audio.sample_rate != self.settings.sample_rate {
            return Err(ResegmentError::AudioRead {
                path: name.to_string(),
                message: format!(
                    "sample rate {} Hz, expected {} Hz",
                    audio.sample_rate, self.settings.sample_rate
                ),
            });
        }

        let spf = self.settings.samples_per_frame();
        let frames = self.score_stream(name, &audio.samples)?;

        let expected = expected_frame_count(audio.len(), spf);
        let check = match frames.len() {
            n if n == expected => FrameCountCheck::Exact,
            n if n == expected + 1 => FrameCountCheck::WithinTolerance,
            got => {
                warn!(
                    name,
                    got,
                    expected,
                    "Size mismatch between scorer output and audio length"
                );
                FrameCountCheck::Mismatch { got, expected }
            }
        };

        let task = AlignmentTask {
            name: name.to_string(),
            utterances,
            frames,
            audio_len_samples: audio.len(),
            sample_rate: audio.sample_rate,
            samples_per_frame: spf,
        };
        Ok((task, check))
    }

    /// Partitions, scores and deduplicates one stream.
    pub fn score_stream(&self, name: &str, samples: &[f32]) -> Result<FrameMatrix> {
        let plan = plan_partitions(samples.len(), &self.settings.partition)?;
        debug!(
            name,
            windows = plan.windows.len(),
            duplicates = plan.duplicate_frames.len(),
            scorer = self.scorer.name(),
            "scoring"
        );

        let mut frames = Vec::new();
        for window in &plan.windows {
            frames.extend(self.scorer.score(window.slice(samples))?);
        }
        Ok(remove_duplicate_frames(frames, &plan.duplicate_frames))
    }
}
