//! Partition planning for audio longer than the scorer can take in one call.
//!
//! A long stream is cut into windows of `cut_length` samples. Each window is
//! widened by `overlap` frames on both sides so the scorer sees context across
//! the seam, and the frames produced for that extra context are deleted again
//! after the per-window outputs are concatenated.
//!
//! Windows are aligned to frame boundaries: the scorer frontend discards
//! trailing partial frames, so an unaligned window would silently lose audio.

use crate::defaults::CUT_RATIO;
use crate::error::{Result, ResegmentError};
use serde::Serialize;

/// Inputs to [`plan_partitions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionParams {
    /// Longest window handed to the scorer, in seconds.
    pub max_segment_secs: f64,
    /// Sample rate of the stream.
    pub sample_rate: u32,
    /// Audio samples per scorer frame.
    pub samples_per_frame: usize,
    /// Duplicated frames on each side of a seam. Values <= 0 disable overlap.
    pub overlap_frames: i64,
}

/// Window lengths derived from [`PartitionParams`], in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLengths {
    pub max_length: usize,
    pub cut_length: usize,
}

impl PartitionParams {
    /// Overlap clamped to a non-negative frame count.
    pub fn overlap(&self) -> usize {
        self.overlap_frames.max(0) as usize
    }

    /// Checks that windows planned with these parameters are never degenerate.
    ///
    /// Fails unless the slack between the rounded max and cut lengths is larger
    /// than the overlap plus two frames.
    pub fn validate(&self) -> Result<WindowLengths> {
        let spf = self.samples_per_frame;
        if spf == 0 {
            return Err(ResegmentError::ConfigInvalidValue {
                key: "scorer.samples_per_frame".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !self.max_segment_secs.is_finite() || self.max_segment_secs <= 0.0 {
            return Err(ResegmentError::ConfigInvalidValue {
                key: "partition.max_segment_secs".to_string(),
                message: format!("must be a positive number, got {}", self.max_segment_secs),
            });
        }

        let rate = self.sample_rate as f64;
        let mut max_length = (self.max_segment_secs * rate) as usize;
        let mut cut_length = (self.cut_secs() * rate) as usize;
        max_length -= max_length % spf;
        cut_length -= cut_length % spf;

        if max_length.saturating_sub(cut_length) <= spf * (2 + self.overlap()) {
            return Err(ResegmentError::PartitionTooSmall {
                max_segment_secs: self.max_segment_secs,
                overlap_frames: self.overlap_frames,
                samples_per_frame: spf,
            });
        }

        Ok(WindowLengths {
            max_length,
            cut_length,
        })
    }

    /// Cut duration in seconds.
    pub fn cut_secs(&self) -> f64 {
        self.max_segment_secs / CUT_RATIO
    }
}

/// Half-open sample range `[start, end)`; `end == None` runs to end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: usize,
    pub end: Option<usize>,
}

impl Window {
    /// The samples this window covers, clamped to the stream.
    pub fn slice<'a, T>(&self, samples: &'a [T]) -> &'a [T] {
        let start = self.start.min(samples.len());
        let end = self.end.map_or(samples.len(), |e| e.min(samples.len()));
        &samples[start..end.max(start)]
    }

    /// Window length for a stream of `total` samples.
    pub fn len(&self, total: usize) -> usize {
        self.end.unwrap_or(total).min(total).saturating_sub(self.start)
    }

    pub fn is_empty(&self, total: usize) -> bool {
        self.len(total) == 0
    }
}

/// How one audio stream is sliced for scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionPlan {
    pub windows: Vec<Window>,
    pub overlap_frames: usize,
    /// Ascending frame indices into the raw concatenation of all window outputs.
    pub duplicate_frames: Vec<usize>,
    pub samples_per_frame: usize,
    pub max_length: usize,
    pub cut_length: usize,
    pub cut_secs: f64,
}

impl PartitionPlan {
    /// Number of seams between windows.
    pub fn seams(&self) -> usize {
        self.windows.len().saturating_sub(1)
    }
}

/// Plans the scoring windows for a stream of `total_samples` samples.
///
/// A scorer emitting `floor(len / samples_per_frame)` frames per window
/// produces `overlap` trailing frames of window *j* and `overlap` leading
/// frames of window *j+1* at each seam. Both blocks repeat audio the
/// neighbouring window already covers with full context, so all `2 * overlap`
/// of them are listed in `duplicate_frames`.
pub fn plan_partitions(total_samples: usize, params: &PartitionParams) -> Result<PartitionPlan> {
    let WindowLengths {
        max_length,
        cut_length,
    } = params.validate()?;

    let spf = params.samples_per_frame;
    let overlap = params.overlap();
    let lead = overlap * spf;
    let cut_frames = cut_length / spf;

    let mut windows = Vec::new();
    let mut duplicate_frames = Vec::new();
    let mut emitted_frames = 0usize;
    let mut remaining = total_samples;
    let mut start = 0usize;

    while remaining > max_length {
        let window_start = start.saturating_sub(lead);
        let end = start + cut_length + (1 + overlap) * spf - 1;
        windows.push(Window {
            start: window_start,
            end: Some(end),
        });

        let leading_frames = (start - window_start) / spf;
        let seam = emitted_frames + leading_frames + cut_frames;
        duplicate_frames.extend(seam..seam + 2 * overlap);
        emitted_frames = seam + overlap;

        remaining -= cut_length;
        start += cut_length;
    }

    windows.push(Window {
        start: start.saturating_sub(lead),
        end: None,
    });

    Ok(PartitionPlan {
        windows,
        overlap_frames: overlap,
        duplicate_frames,
        samples_per_frame: spf,
        max_length,
        cut_length,
        cut_secs: params.cut_secs(),
    })
}

/// Deletes the rows listed in `indices` from `frames`.
///
/// Indices past the end are ignored; order and repeats in `indices` don't matter.
pub fn remove_duplicate_frames<T>(frames: Vec<T>, indices: &[usize]) -> Vec<T> {
    if indices.is_empty() {
        return frames;
    }
    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut drop = sorted.into_iter().peekable();
    frames
        .into_iter()
        .enumerate()
        .filter_map(|(i, frame)| {
            while drop.next_if(|&d| d < i).is_some() {}
            if drop.next_if_eq(&i).is_some() {
                None
            } else {
                Some(frame)
            }
        })
        .collect()
}

/// Frame count a stream of `audio_len` samples should stitch back to.
///
/// The frontend discards trailing partial frames, so one less than the
/// integer ratio; one frame more is also normal depending on the frontend.
pub fn expected_frame_count(audio_len: usize, samples_per_frame: usize) -> usize {
    (audio_len / samples_per_frame.max(1)).saturating_sub(1)
}
