//! Acoustic scorer seam.
//!
//! The scorer turns audio samples into per-frame token log-probabilities. It
//! is an external collaborator: this crate only fixes the interface, and
//! ships a process-backed implementation and a uniform one for dry runs.

use crate::defaults::{SAMPLES_PER_FRAME_512, SAMPLES_PER_FRAME_768};
use crate::error::{Result, ResegmentError};
use crate::task::FrameMatrix;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

/// Trait for frame-level acoustic scoring.
///
/// This trait allows swapping implementations (external model vs uniform).
pub trait FrameScorer: Send + Sync {
    /// Score mono samples at the configured sample rate.
    ///
    /// # Returns
    /// One row of log-probabilities per frame, one column per vocabulary token.
    /// Trailing partial frames are discarded.
    fn score(&self, samples: &[f32]) -> Result<FrameMatrix>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Implement FrameScorer for Arc<T> to allow sharing across threads.
impl<T: FrameScorer + ?Sized> FrameScorer for Arc<T> {
    fn score(&self, samples: &[f32]) -> Result<FrameMatrix> {
        (**self).score(samples)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Scorer that spawns an external program per window.
///
/// The program reads the window as little-endian `f32` samples on stdin and
/// writes a JSON array of frames (`[[f32, ...], ...]`) on stdout. The sample
/// rate is passed in `RESEGMENT_SAMPLE_RATE`.
#[derive(Debug, Clone)]
pub struct CommandScorer {
    program: String,
    args: Vec<String>,
    sample_rate: u32,
}

impl CommandScorer {
    pub fn new(program: impl Into<String>, args: Vec<String>, sample_rate: u32) -> Self {
        Self {
            program: program.into(),
            args,
            sample_rate,
        }
    }
}

impl FrameScorer for CommandScorer {
    fn score(&self, samples: &[f32]) -> Result<FrameMatrix> {
        let scoring_error = |message: String| ResegmentError::Scoring { message };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("RESEGMENT_SAMPLE_RATE", self.sample_rate.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| scoring_error(format!("failed to start '{}': {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| scoring_error("scorer stdin unavailable".to_string()))?;
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        // Feed stdin from a separate thread so a chatty scorer can't deadlock on a full stdout pipe.
        let feeder = thread::spawn(move || stdin.write_all(&bytes));

        // Drains stdout and stderr together; a scorer flooding either pipe can't stall.
        let output = child.wait_with_output()?;

        match feeder.join() {
            Ok(Ok(())) => {}
            // The scorer may legitimately stop reading early; its exit status decides.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(scoring_error("stdin feeder thread panicked".to_string())),
        }

        if !output.status.success() {
            return Err(scoring_error(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let frames: FrameMatrix = serde_json::from_slice(&output.stdout)
            .map_err(|e| scoring_error(format!("invalid scorer output: {}", e)))?;
        if let Some(width) = frames.first().map(Vec::len)
            && frames.iter().any(|row| row.len() != width)
        {
            return Err(scoring_error("scorer output rows differ in width".to_string()));
        }
        Ok(frames)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Scorer that assigns every token the same probability.
///
/// Emits `floor(len / samples_per_frame)` frames. Alignments against it are
/// meaningless, but it exercises partitioning and the pipeline end to end.
#[derive(Debug, Clone)]
pub struct UniformScorer {
    samples_per_frame: usize,
    vocab_size: usize,
}

impl UniformScorer {
    pub fn new(samples_per_frame: usize, vocab_size: usize) -> Self {
        Self {
            samples_per_frame: samples_per_frame.max(1),
            vocab_size: vocab_size.max(1),
        }
    }
}

impl FrameScorer for UniformScorer {
    fn score(&self, samples: &[f32]) -> Result<FrameMatrix> {
        let logp = -(self.vocab_size as f32).ln();
        let frames = samples.len() / self.samples_per_frame;
        Ok(vec![vec![logp; self.vocab_size]; frames])
    }

    fn name(&self) -> &str {
        "uniform"
    }
}

/// Estimates samples per frame by scoring `probe_samples` of silence.
pub fn estimate_samples_per_frame(scorer: &dyn FrameScorer, probe_samples: usize) -> Result<f64> {
    let frames = scorer.score(&vec![0.0; probe_samples])?.len();
    if frames == 0 {
        return Err(ResegmentError::Scoring {
            message: format!("scorer produced no frames for {probe_samples} probe samples"),
        });
    }
    Ok(probe_samples as f64 / frames as f64)
}

/// Snaps an estimated ratio to the frontend strides known to be exact.
///
/// The estimate drifts from the true stride because of edge frames; within a
/// few percent of 512 or 768 it is that stride.
pub fn snap_samples_per_frame(estimate: f64) -> usize {
    if (500.0..=520.0).contains(&estimate) {
        SAMPLES_PER_FRAME_512
    } else if (750.0..=785.0).contains(&estimate) {
        SAMPLES_PER_FRAME_768
    } else {
        estimate.round().max(1.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_scorer_frame_count() {
        let scorer = UniformScorer::new(512, 29);
        let frames = scorer.score(&vec![0.0; 512 * 10 + 511]).unwrap();
        assert_eq!(frames.len(), 10);
        assert_eq!(frames[0].len(), 29);
        let total: f32 = frames[0].iter().map(|l| l.exp()).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_uniform_scorer_short_input() {
        let scorer = UniformScorer::new(512, 5);
        assert!(scorer.score(&[0.0; 100]).unwrap().is_empty());
    }

    #[test]
    fn test_estimate_from_uniform_scorer() {
        let scorer = UniformScorer::new(768, 5);
        let estimate = estimate_samples_per_frame(&scorer, 100_000).unwrap();
        assert_eq!(snap_samples_per_frame(estimate), 768);
    }

    #[test]
    fn test_estimate_fails_without_frames() {
        let scorer = UniformScorer::new(512, 5);
        assert!(estimate_samples_per_frame(&scorer, 10).is_err());
    }

    #[test]
    fn test_snap_samples_per_frame() {
        assert_eq!(snap_samples_per_frame(500.0), 512);
        assert_eq!(snap_samples_per_frame(515.3), 512);
        assert_eq!(snap_samples_per_frame(751.0), 768);
        assert_eq!(snap_samples_per_frame(785.0), 768);
        assert_eq!(snap_samples_per_frame(640.4), 640);
        assert_eq!(snap_samples_per_frame(0.2), 1);
    }

    #[test]
    fn test_scorer_trait_is_object_safe() {
        let scorer: Arc<dyn FrameScorer> = Arc::new(UniformScorer::new(512, 3));
        assert_eq!(scorer.name(), "uniform");
        assert_eq!(scorer.score(&[0.0; 1024]).unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_scorer_parses_stdout() {
        let scorer = CommandScorer::new(
            "sh",
            vec![
                "-c".to_string(),
                "cat > /dev/null; echo '[[0.0, -1.0], [-1.0, 0.0]]'".to_string(),
            ],
            16000,
        );
        let frames = scorer.score(&[0.5; 2048]).unwrap();
        assert_eq!(frames, vec![vec![0.0, -1.0], vec![-1.0, 0.0]]);
        assert_eq!(scorer.name(), "sh");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_scorer_reports_failure() {
        let scorer = CommandScorer::new(
            "sh",
            vec!["-c".to_string(), "echo 'out of memory' >&2; exit 3".to_string()],
            16000,
        );
        let err = scorer.score(&[0.0; 16]).unwrap_err();
        assert!(matches!(err, ResegmentError::Scoring { .. }));
        assert!(err.to_string().contains("out of memory"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_scorer_survives_chatty_stderr() {
        // Far more than a pipe buffer of warnings before any frames.
        let scorer = CommandScorer::new(
            "sh",
            vec![
                "-c".to_string(),
                "cat > /dev/null; head -c 300000 /dev/zero | tr '\\0' x >&2; echo '[[0.0]]'"
                    .to_string(),
            ],
            16000,
        );
        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(scorer.score(&[0.0; 16]));
        });

        let frames = rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .expect("scorer did not finish")
            .unwrap();
        assert_eq!(frames, vec![vec![0.0]]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_scorer_rejects_ragged_output() {
        let scorer = CommandScorer::new(
            "sh",
            vec!["-c".to_string(), "cat > /dev/null; echo '[[0.0], [0.0, 1.0]]'".to_string()],
            16000,
        );
        assert!(scorer.score(&[0.0; 16]).is_err());
    }

    #[test]
    fn test_command_scorer_missing_program() {
        let scorer = CommandScorer::new("/nonexistent/scorer", vec![], 16000);
        let err = scorer.score(&[0.0; 16]).unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
