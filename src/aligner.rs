//! CTC segmentation of a whole file against its utterances.
//!
//! The utterances are laid out as one CTC state sequence (blank, token,
//! blank, token, ..., blank) and a Viterbi pass over the deduplicated frames
//! picks the best monotonic path. Each utterance spans the frames its token
//! states occupy on that path.
//!
//! The pass is banded around the diagonal so memory stays proportional to
//! `frames * band` rather than `frames * states`. When the band misses the
//! end state it is doubled and the pass repeated, until it spans every state.

use crate::defaults::{MIN_WINDOW_STATES, SCORE_WINDOW_FRAMES};
use crate::task::{AlignmentResult, AlignmentTask, FrameMatrix, UtteranceSegment};
use crate::vocab::Vocabulary;
use serde::Serialize;
use tracing::debug;

/// Why a task could not be aligned. Both kinds drop the task without output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignFailure {
    /// Fewer frames than the transcript needs tokens (plus separating blanks).
    #[error("audio is shorter than the transcript ({frames} frames, {required} required)")]
    AudioShorterThanTranscript { frames: usize, required: usize },
    /// No finite-probability path reaches the final state.
    #[error("backtracking found no path through {states} states over {frames} frames")]
    BacktrackFailed { frames: usize, states: usize },
}

/// Aligns the utterances of a task to its frames.
pub trait SegmentAligner: Send + Sync {
    fn align(&self, task: &AlignmentTask) -> Result<AlignmentResult, AlignFailure>;
}

impl<T: SegmentAligner + ?Sized> SegmentAligner for std::sync::Arc<T> {
    fn align(&self, task: &AlignmentTask) -> Result<AlignmentResult, AlignFailure> {
        (**self).align(task)
    }
}

/// Tuning of the CTC segmentation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CtcConfig {
    /// Score blanks before, between and after utterances as free, so
    /// untranscribed audio costs nothing.
    pub blank_transition_cost_zero: bool,
    /// Initial band width in states; doubled on failure.
    pub min_window_states: usize,
    /// Frames per window when scoring confidence.
    pub score_window_frames: usize,
}

impl Default for CtcConfig {
    fn default() -> Self {
        Self {
            blank_transition_cost_zero: true,
            min_window_states: MIN_WINDOW_STATES,
            score_window_frames: SCORE_WINDOW_FRAMES,
        }
    }
}

/// CTC segmentation over a character vocabulary.
#[derive(Debug, Clone)]
pub struct CtcSegmenter {
    vocab: Vocabulary,
    config: CtcConfig,
}

impl CtcSegmenter {
    pub fn new(vocab: Vocabulary, config: CtcConfig) -> Self {
        Self { vocab, config }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }
}

impl SegmentAligner for CtcSegmenter {
    fn align(&self, task: &AlignmentTask) -> Result<AlignmentResult, AlignFailure> {
        let utterance_tokens: Vec<Vec<usize>> = task
            .utterances
            .iter()
            .map(|u| self.vocab.tokenize(&u.text))
            .collect();
        let lattice = Lattice::build(
            &utterance_tokens,
            self.vocab.blank_id(),
            self.config.blank_transition_cost_zero,
        );

        let frames = task.frames.len();
        let required = lattice.required_frames();
        if frames < required {
            return Err(AlignFailure::AudioShorterThanTranscript { frames, required });
        }

        let path = if lattice.token_count() == 0 {
            Vec::new()
        } else {
            let states = lattice.len();
            let mut half_width = (self.config.min_window_states / 2).max(1);
            loop {
                if let Some(path) = viterbi(&task.frames, &lattice, half_width) {
                    break path;
                }
                if 2 * half_width + 1 >= states {
                    return Err(AlignFailure::BacktrackFailed { frames, states });
                }
                half_width *= 2;
                debug!(name = %task.name, half_width, "widening alignment band");
            }
        };

        let frame_secs = task.frame_duration_secs();
        let mut segments = Vec::with_capacity(task.utterances.len());
        let mut last_end = 0usize;

        for (index, utterance) in task.utterances.iter().enumerate() {
            let span = first_and_last(&path, |s| lattice.owner(s) == Some(index));
            let (start_frame, end_frame, confidence) = match span {
                Some((first, last)) => {
                    let scores: Vec<f32> = (first..=last)
                        .map(|t| emission(&task.frames, t, lattice.labels[path[t]]))
                        .collect();
                    (
                        first,
                        last + 1,
                        windowed_min_mean(&scores, self.config.score_window_frames),
                    )
                }
                // Nothing to align: pin it where the previous utterance ended.
                None => (last_end, last_end, 0.0),
            };
            last_end = end_frame;

            segments.push(UtteranceSegment {
                utterance_id: utterance.id.clone(),
                start_secs: start_frame as f64 * frame_secs,
                end_secs: end_frame as f64 * frame_secs,
                confidence,
                text: utterance.text.clone(),
            });
        }

        Ok(AlignmentResult {
            name: task.name.clone(),
            segments,
        })
    }
}

/// Blank-interleaved CTC states for all utterances of a file.
struct Lattice {
    labels: Vec<usize>,
    /// Utterance index for token states, `None` for blanks.
    owners: Vec<Option<usize>>,
    /// Blank states whose emission is scored as zero.
    free: Vec<bool>,
    repeats: usize,
}

impl Lattice {
    fn build(utterance_tokens: &[Vec<usize>], blank: usize, free_outer_blanks: bool) -> Self {
        let mut lattice = Self {
            labels: Vec::new(),
            owners: Vec::new(),
            free: Vec::new(),
            repeats: 0,
        };
        let mut previous: Option<usize> = None;

        for (index, tokens) in utterance_tokens.iter().enumerate() {
            for (i, &token) in tokens.iter().enumerate() {
                lattice.labels.push(blank);
                lattice.owners.push(None);
                lattice.free.push(free_outer_blanks && i == 0);
                lattice.labels.push(token);
                lattice.owners.push(Some(index));
                lattice.free.push(false);
                if previous == Some(token) {
                    lattice.repeats += 1;
                }
                previous = Some(token);
            }
        }
        lattice.labels.push(blank);
        lattice.owners.push(None);
        lattice.free.push(free_outer_blanks);
        lattice
    }

    fn len(&self) -> usize {
        self.labels.len()
    }

    fn token_count(&self) -> usize {
        self.labels.len() / 2
    }

    /// Each token needs a frame, and repeated tokens a blank between them.
    fn required_frames(&self) -> usize {
        self.token_count() + self.repeats
    }

    fn owner(&self, state: usize) -> Option<usize> {
        self.owners.get(state).copied().flatten()
    }
}

fn emission(frames: &FrameMatrix, t: usize, label: usize) -> f32 {
    frames[t].get(label).copied().unwrap_or(f32::NEG_INFINITY)
}

/// Banded Viterbi; returns the state of every frame, or `None` when the band
/// never reaches a final state with finite score.
fn viterbi(frames: &FrameMatrix, lattice: &Lattice, half_width: usize) -> Option<Vec<usize>> {
    let t_len = frames.len();
    let s_len = lattice.len();
    let last_state = s_len - 1;
    let final_floor = s_len.saturating_sub(2);

    let score = |t: usize, s: usize| {
        if lattice.free[s] {
            0.0
        } else {
            emission(frames, t, lattice.labels[s])
        }
    };
    let bounds = |t: usize| -> Option<(usize, usize)> {
        let remaining = t_len - 1 - t;
        let reach_lo = final_floor.saturating_sub(2 * remaining);
        let reach_hi = (2 * t + 1).min(last_state);
        let center = if t_len > 1 {
            t * last_state / (t_len - 1)
        } else {
            last_state
        };
        let lo = reach_lo.max(center.saturating_sub(half_width));
        let hi = reach_hi.min(center + half_width);
        (lo <= hi).then_some((lo, hi))
    };

    let mut prev = vec![f32::NEG_INFINITY; s_len];
    let mut curr = vec![f32::NEG_INFINITY; s_len];
    // Backpointer steps (0 stay, 1 from s-1, 2 from s-2), one row per frame.
    let mut backpointers: Vec<(usize, Vec<u8>)> = Vec::with_capacity(t_len);

    let (mut prev_lo, mut prev_hi) = bounds(0)?;
    for s in prev_lo..=prev_hi.min(1) {
        prev[s] = score(0, s);
    }
    backpointers.push((prev_lo, vec![0; prev_hi - prev_lo + 1]));

    for t in 1..t_len {
        let (lo, hi) = bounds(t)?;
        let mut row = vec![0u8; hi - lo + 1];
        for s in lo..=hi {
            let (best, step) = best_transition(&prev, s, prev_lo, prev_hi, &lattice.labels);
            curr[s] = best + score(t, s);
            row[s - lo] = step;
        }
        // Clear the previous band so stale scores never leak into the next one.
        for value in &mut prev[prev_lo..=prev_hi] {
            *value = f32::NEG_INFINITY;
        }
        std::mem::swap(&mut prev, &mut curr);
        backpointers.push((lo, row));
        prev_lo = lo;
        prev_hi = hi;
    }

    let candidates = [last_state, final_floor];
    let mut state = candidates
        .into_iter()
        .filter(|&s| s >= prev_lo && s <= prev_hi && prev[s].is_finite())
        .max_by(|&a, &b| prev[a].total_cmp(&prev[b]))?;

    let mut path = vec![0usize; t_len];
    path[t_len - 1] = state;
    for t in (1..t_len).rev() {
        let (lo, row) = &backpointers[t];
        state -= row[state - lo] as usize;
        path[t - 1] = state;
    }
    Some(path)
}

#[inline(always)]
fn best_transition(
    prev: &[f32],
    s: usize,
    prev_lo: usize,
    prev_hi: usize,
    labels: &[usize],
) -> (f32, u8) {
    let mut best = f32::NEG_INFINITY;
    let mut step = 0u8;

    if s >= prev_lo && s <= prev_hi {
        best = prev[s];
    }
    if s >= 1 {
        let p = s - 1;
        if p >= prev_lo && p <= prev_hi && prev[p] > best {
            best = prev[p];
            step = 1;
        }
    }
    if s >= 2 && labels[s] != labels[s - 2] {
        let p = s - 2;
        if p >= prev_lo && p <= prev_hi && prev[p] > best {
            best = prev[p];
            step = 2;
        }
    }
    (best, step)
}

fn first_and_last(path: &[usize], pred: impl Fn(usize) -> bool) -> Option<(usize, usize)> {
    let first = path.iter().position(|&s| pred(s))?;
    let last = path.iter().rposition(|&s| pred(s))?;
    Some((first, last))
}

/// Minimum over all `window`-frame windows of the mean score; the plain mean
/// when the span is shorter than one window.
fn windowed_min_mean(scores: &[f32], window: usize) -> f32 {
    if scores.is_empty() {
        return 0.0;
    }
    let window = window.max(1);
    if scores.len() <= window {
        return scores.iter().sum::<f32>() / scores.len() as f32;
    }

    let mut sum: f32 = scores[..window].iter().sum();
    let mut min = sum;
    for i in window..scores.len() {
        sum += scores[i] - scores[i - window];
        min = min.min(sum);
    }
    min / window as f32
}
