//! Default configuration constants for resegment.
//!
//! Shared between the TOML configuration, the CLI and the resolved
//! [`AlignSettings`](crate::config::AlignSettings).

/// Default audio sample rate in Hz.
///
/// The scorer expects 16kHz mono; other inputs are downmixed and resampled.
pub const SAMPLE_RATE: u32 = 16000;

/// Longest audio window handed to the scorer in one call, in seconds.
///
/// Transformer scorers run out of memory somewhere past 400-500s of audio on a
/// 64GB machine. Longer files are split into windows of `1 / CUT_RATIO` of this.
pub const MAX_SEGMENT_SECS: f64 = 320.0;

/// Ratio between the maximum window and the cut length.
///
/// The remaining audio after the last cut is always longer than
/// `MAX - MAX / CUT_RATIO`, so no window is emitted near-empty.
pub const CUT_RATIO: f64 = 1.25;

/// Extra frames scored on each side of a partition seam.
///
/// Seam time is `samples_per_frame / sample_rate * 2 * overlap`; keep it above ~600ms.
pub const OVERLAP_FRAMES: i64 = 30;

/// Number of alignment worker threads.
pub const WORKERS: usize = 4;

/// Samples per scorer frame for the two common frontend strides.
pub const SAMPLES_PER_FRAME_512: usize = 512;
pub const SAMPLES_PER_FRAME_768: usize = 768;

/// Samples scored when estimating the samples-per-frame ratio.
pub const ESTIMATE_PROBE_SAMPLES: usize = 100_000;

/// Initial state band width for the banded Viterbi search.
///
/// Doubled on every failed attempt until it covers the whole token sequence.
pub const MIN_WINDOW_STATES: usize = 8000;

/// Frames averaged when computing an utterance confidence score.
pub const SCORE_WINDOW_FRAMES: usize = 30;

/// Name of the blank token in wav2vec2-style vocabularies.
pub const BLANK_TOKEN: &str = "<pad>";

/// Default result and log file names inside the output directory.
pub const SEGMENTS_FILE: &str = "segments.txt";
pub const LOG_FILE: &str = "segments.log";

/// Default input extensions.
pub const AUDIO_EXTENSION: &str = "wav";
pub const TRANSCRIPT_EXTENSION: &str = "txt";
