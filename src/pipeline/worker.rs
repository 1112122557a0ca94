//! Alignment worker station.

use crate::aligner::SegmentAligner;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::task::{AlignmentTask, OutputFormat, ResultRecord};
use std::sync::Arc;
use tracing::info;

/// Aligns tasks and serializes the results for the writer.
///
/// Alignment failures are reported as recoverable errors and produce no
/// output. A panic inside the aligner is not caught; it takes down this
/// worker only.
pub struct AlignmentWorker {
    aligner: Arc<dyn SegmentAligner>,
    format: OutputFormat,
}

impl AlignmentWorker {
    pub fn new(aligner: Arc<dyn SegmentAligner>, format: OutputFormat) -> Self {
        Self { aligner, format }
    }
}

impl Station for AlignmentWorker {
    type Input = AlignmentTask;
    type Output = ResultRecord;

    fn process(&mut self, task: AlignmentTask) -> Result<Option<ResultRecord>, StationError> {
        match self.aligner.align(&task) {
            Ok(result) => {
                info!(
                    name = %task.name,
                    segments = result.segments.len(),
                    "Mean confidence: {:.5}",
                    result.mean_confidence()
                );
                Ok(Some(ResultRecord {
                    name: result.name.clone(),
                    text: result.to_record(self.format),
                }))
            }
            Err(failure) => Err(StationError::Recoverable(format!(
                "Failed to align {} (first utterance {}): {}",
                task.name,
                task.first_utterance_id(),
                failure
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "aligner"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::AlignFailure;
    use crate::task::{AlignmentResult, Utterance, UtteranceSegment};

    /// Emits one full-length segment per utterance, or fails if told to.
    struct StubAligner {
        failure: Option<AlignFailure>,
    }

    impl SegmentAligner for StubAligner {
        fn align(&self, task: &AlignmentTask) -> Result<AlignmentResult, AlignFailure> {
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            Ok(AlignmentResult {
                name: task.name.clone(),
                segments: task
                    .utterances
                    .iter()
                    .map(|u| UtteranceSegment {
                        utterance_id: u.id.clone(),
                        start_secs: 0.0,
                        end_secs: task.audio_duration_secs(),
                        confidence: -0.25,
                        text: u.text.clone(),
                    })
                    .collect(),
            })
        }
    }

    fn task() -> AlignmentTask {
        AlignmentTask {
            name: "talk".to_string(),
            utterances: vec![Utterance {
                id: "talk_0000".to_string(),
                start: 0.0,
                end: 2.0,
                text: "hi".to_string(),
            }],
            frames: vec![vec![0.0; 3]; 10],
            audio_len_samples: 32000,
            sample_rate: 16000,
            samples_per_frame: 512,
        }
    }

    #[test]
    fn test_success_produces_record() {
        let mut worker =
            AlignmentWorker::new(Arc::new(StubAligner { failure: None }), OutputFormat::Kaldi);

        let record = worker.process(task()).unwrap().unwrap();
        assert_eq!(record.name, "talk");
        assert_eq!(record.text, "talk_0000 talk 0.00 2.00 -0.250000000 hi\n");
    }

    #[test]
    fn test_failures_are_recoverable_and_name_the_task() {
        for failure in [
            AlignFailure::AudioShorterThanTranscript {
                frames: 1,
                required: 2,
            },
            AlignFailure::BacktrackFailed {
                frames: 10,
                states: 5,
            },
        ] {
            let mut worker = AlignmentWorker::new(
                Arc::new(StubAligner {
                    failure: Some(failure),
                }),
                OutputFormat::Jsonl,
            );

            match worker.process(task()) {
                Err(StationError::Recoverable(msg)) => {
                    assert!(msg.contains("talk"));
                    assert!(msg.contains("talk_0000"));
                }
                other => panic!("expected recoverable error, got {other:?}"),
            }
        }
    }
}
