//! Batch driver: assembler → bounded task queue → worker pool → writer.

use crate::aligner::SegmentAligner;
use crate::assembler::TaskAssembler;
use crate::discovery::InputPair;
use crate::error::{Result, ResegmentError};
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::station::StationRunner;
use crate::pipeline::worker::AlignmentWorker;
use crate::pipeline::writer::{ResultWriter, WrittenRecord};
use crate::task::{AlignmentTask, OutputFormat};
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded, unbounded};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

/// How often a dispatch blocked on a full queue looks at the interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Counts of one run, printed at the end and used by tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Pairs handed to the pipeline.
    pub discovered: usize,
    /// Tasks queued for alignment.
    pub dispatched: usize,
    pub assembly_failures: usize,
    /// Records acknowledged by the writer.
    pub written: usize,
    pub alignment_failures: usize,
    /// Workers that died with a panic.
    pub worker_panics: usize,
    /// Dispatch stopped early on Ctrl+C.
    pub interrupted: bool,
}

/// What the worker pool and writer did once drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub written: Vec<WrittenRecord>,
    pub alignment_failures: usize,
    pub worker_panics: usize,
}

/// Forwards reports and counts alignment failures on the way.
struct CountingReporter {
    inner: Arc<dyn ErrorReporter>,
    alignment_failures: AtomicUsize,
}

impl ErrorReporter for CountingReporter {
    fn report(&self, station: &str, error: &StationError) {
        if station == "aligner" {
            self.alignment_failures.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.report(station, error);
    }
}

/// Handle to a running worker pool and writer.
pub struct PipelineHandle {
    task_tx: Sender<AlignmentTask>,
    workers: Vec<StationRunner<AlignmentWorker>>,
    writer: StationRunner<ResultWriter>,
    ack_rx: Receiver<WrittenRecord>,
    reporter: Arc<CountingReporter>,
}

impl PipelineHandle {
    /// Queues a task, blocking while the queue is full.
    pub fn dispatch(&self, task: AlignmentTask) -> Result<()> {
        self.task_tx
            .send(task)
            .map_err(|_| ResegmentError::Other("all alignment workers have stopped".to_string()))
    }

    /// Queues a task, blocking while the queue is full, unless `interrupted`
    /// is set first. Returns `false` when the task was dropped.
    pub fn dispatch_unless(
        &self,
        mut task: AlignmentTask,
        interrupted: &AtomicBool,
    ) -> Result<bool> {
        loop {
            if interrupted.load(Ordering::SeqCst) {
                return Ok(false);
            }
            match self.task_tx.send_timeout(task, INTERRUPT_POLL) {
                Ok(()) => return Ok(true),
                Err(SendTimeoutError::Timeout(returned)) => task = returned,
                Err(SendTimeoutError::Disconnected(_)) => {
                    return Err(ResegmentError::Other(
                        "all alignment workers have stopped".to_string(),
                    ));
                }
            }
        }
    }

    /// Queues a task without blocking; gives it back if the queue is full.
    pub fn try_dispatch(&self, task: AlignmentTask) -> std::result::Result<(), AlignmentTask> {
        self.task_tx.try_send(task).map_err(|e| match e {
            TrySendError::Full(task) | TrySendError::Disconnected(task) => task,
        })
    }

    /// Tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.task_tx.len()
    }

    /// Completion barrier: closes the task queue and waits until every queued
    /// task has been aligned and every result written.
    ///
    /// Dropping the only task sender stops the workers once the queue is
    /// drained; the last worker to exit drops the last result sender, which
    /// stops the writer.
    pub fn finish(self) -> DrainReport {
        let PipelineHandle {
            task_tx,
            workers,
            writer,
            ack_rx,
            reporter,
        } = self;
        drop(task_tx);

        let mut worker_panics = 0;
        for worker in workers {
            if let Err(msg) = worker.join() {
                error!("{}", msg);
                worker_panics += 1;
            }
        }
        if let Err(msg) = writer.join() {
            error!("{}", msg);
        }

        DrainReport {
            written: ack_rx.try_iter().collect(),
            alignment_failures: reporter.alignment_failures.load(Ordering::SeqCst),
            worker_panics,
        }
    }
}

/// Batch alignment pipeline.
///
/// The assembler runs on the caller's thread; `workers` threads align; one
/// thread writes. The task queue holds at most `workers` tasks, so assembly
/// blocks while every worker is busy and the queue is full.
pub struct Pipeline {
    workers: usize,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    /// Creates a new pipeline with default error reporter.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Opens the output file and spawns the writer and the worker pool.
    pub fn start(
        &self,
        aligner: Arc<dyn SegmentAligner>,
        format: OutputFormat,
        output: &Path,
    ) -> Result<PipelineHandle> {
        let reporter = Arc::new(CountingReporter {
            inner: self.error_reporter.clone(),
            alignment_failures: AtomicUsize::new(0),
        });

        let (task_tx, task_rx) = bounded(self.workers);
        let (result_tx, result_rx) = unbounded();
        let (ack_tx, ack_rx) = unbounded();

        let writer = StationRunner::spawn(
            ResultWriter::create(output)?,
            result_rx,
            ack_tx,
            reporter.clone(),
        );

        let workers = (0..self.workers)
            .map(|_| {
                StationRunner::spawn(
                    AlignmentWorker::new(aligner.clone(), format),
                    task_rx.clone(),
                    result_tx.clone(),
                    reporter.clone(),
                )
            })
            .collect();

        Ok(PipelineHandle {
            task_tx,
            workers,
            writer,
            ack_rx,
            reporter,
        })
    }

    /// Assembles and aligns every pair, writing results to `output`.
    ///
    /// Per-file failures are logged and counted, never returned. Setting
    /// `interrupted` stops dispatch, including a task assembled or waiting on
    /// a full queue when the flag was set; tasks already queued still complete.
    pub fn run(
        &self,
        pairs: &[InputPair],
        assembler: &TaskAssembler,
        aligner: Arc<dyn SegmentAligner>,
        format: OutputFormat,
        output: &Path,
        interrupted: &AtomicBool,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            discovered: pairs.len(),
            ..RunSummary::default()
        };
        let handle = self.start(aligner, format, output)?;

        for pair in pairs {
            if interrupted.load(Ordering::SeqCst) {
                warn!("Interrupted, not dispatching the remaining files");
                summary.interrupted = true;
                break;
            }

            let task = match assembler.assemble_pair(pair) {
                Ok(task) => task,
                Err(e) => {
                    error!(name = %pair.name, "Failed to prepare {}: {}", pair.name, e);
                    summary.assembly_failures += 1;
                    continue;
                }
            };

            info!(
                name = %task.name,
                utterances = task.utterances.len(),
                frames = task.frames.len(),
                "dispatching"
            );
            match handle.dispatch_unless(task, interrupted) {
                Ok(true) => summary.dispatched += 1,
                Ok(false) => {
                    warn!(
                        name = %pair.name,
                        "Interrupted, dropping {} and the remaining files",
                        pair.name
                    );
                    summary.interrupted = true;
                    break;
                }
                Err(e) => {
                    error!("{}", e);
                    break;
                }
            }
        }

        let report = handle.finish();
        summary.written = report.written.len();
        summary.alignment_failures = report.alignment_failures;
        summary.worker_panics = report.worker_panics;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::AlignFailure;
    use crate::config::{AlignSettings, Config};
    use crate::scorer::{FrameScorer, UniformScorer};
    use crate::task::{AlignmentResult, FrameMatrix, Utterance, UtteranceSegment};

    /// Fails on tasks named "bad", panics on "boom".
    struct StubAligner;

    impl SegmentAligner for StubAligner {
        fn align(
            &self,
            task: &AlignmentTask,
        ) -> std::result::Result<AlignmentResult, AlignFailure> {
            match task.name.as_str() {
                "bad" => Err(AlignFailure::BacktrackFailed {
                    frames: task.frames.len(),
                    states: 3,
                }),
                "boom" => panic!("aligner crashed"),
                _ => Ok(AlignmentResult {
                    name: task.name.clone(),
                    segments: vec![UtteranceSegment {
                        utterance_id: format!("{}_0000", task.name),
                        start_secs: 0.0,
                        end_secs: 1.0,
                        confidence: -0.1,
                        text: "x".to_string(),
                    }],
                }),
            }
        }
    }

    fn task(name: &str) -> AlignmentTask {
        AlignmentTask {
            name: name.to_string(),
            utterances: vec![Utterance {
                id: format!("{name}_0000"),
                start: 0.0,
                end: 1.0,
                text: "x".to_string(),
            }],
            frames: vec![vec![0.0; 2]; 4],
            audio_len_samples: 2560,
            sample_rate: 16000,
            samples_per_frame: 512,
        }
    }

    fn read_names(path: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["name"].as_str().unwrap().to_string()
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_all_dispatched_tasks_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("segments.txt");

        let handle = Pipeline::new(2)
            .start(Arc::new(StubAligner), OutputFormat::Jsonl, &output)
            .unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            handle.dispatch(task(name)).unwrap();
        }
        let report = handle.finish();

        assert_eq!(report.written.len(), 5);
        assert_eq!(report.alignment_failures, 0);
        assert_eq!(read_names(&output), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_alignment_failures_are_counted_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("segments.txt");

        let handle = Pipeline::new(3)
            .start(Arc::new(StubAligner), OutputFormat::Jsonl, &output)
            .unwrap();
        for name in ["a", "bad", "b", "bad"] {
            handle.dispatch(task(name)).unwrap();
        }
        let report = handle.finish();

        assert_eq!(report.written.len(), 2);
        assert_eq!(report.alignment_failures, 2);
        assert_eq!(read_names(&output), vec!["a", "b"]);
    }

    #[test]
    fn test_worker_panic_leaves_pool_running() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("segments.txt");

        let handle = Pipeline::new(2)
            .start(Arc::new(StubAligner), OutputFormat::Jsonl, &output)
            .unwrap();
        for name in ["boom", "a", "b", "c"] {
            handle.dispatch(task(name)).unwrap();
        }
        let report = handle.finish();

        assert_eq!(report.worker_panics, 1);
        assert_eq!(read_names(&output), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_interrupt_stops_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("segments.txt");
        let settings = Arc::new(AlignSettings::from_config(&Config::default(), 512).unwrap());
        let assembler = TaskAssembler::new(Arc::new(UniformScorer::new(512, 29)), settings);
        let pairs = vec![InputPair {
            name: "never".to_string(),
            audio: dir.path().join("never.wav"),
            transcript: dir.path().join("never.txt"),
        }];

        let summary = Pipeline::new(1)
            .run(
                &pairs,
                &assembler,
                Arc::new(StubAligner),
                OutputFormat::Jsonl,
                &output,
                &AtomicBool::new(true),
            )
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.discovered, 1);
        assert_eq!(summary.dispatched, 0);
        assert_eq!(summary.assembly_failures, 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "");
    }

    /// Uniform frames, but raises the interrupt flag while scoring.
    struct InterruptingScorer {
        flag: Arc<AtomicBool>,
    }

    impl FrameScorer for InterruptingScorer {
        fn score(&self, samples: &[f32]) -> Result<FrameMatrix> {
            self.flag.store(true, Ordering::SeqCst);
            UniformScorer::new(512, 29).score(samples)
        }

        fn name(&self) -> &str {
            "interrupting"
        }
    }

    #[test]
    fn test_interrupt_during_assembly_drops_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("segments.txt");
        let audio = dir.path().join("talk.wav");
        let transcript = dir.path().join("talk.txt");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&audio, spec).unwrap();
        for _ in 0..32000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        std::fs::write(&transcript, "0.0 2.0 hello\n").unwrap();

        let flag = Arc::new(AtomicBool::new(false));
        let settings = Arc::new(AlignSettings::from_config(&Config::default(), 512).unwrap());
        let assembler = TaskAssembler::new(
            Arc::new(InterruptingScorer { flag: flag.clone() }),
            settings,
        );
        let pairs = vec![InputPair {
            name: "talk".to_string(),
            audio,
            transcript,
        }];

        let summary = Pipeline::new(1)
            .run(
                &pairs,
                &assembler,
                Arc::new(StubAligner),
                OutputFormat::Jsonl,
                &output,
                &flag,
            )
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.dispatched, 0);
        assert_eq!(summary.written, 0);
        assert_eq!(summary.assembly_failures, 0);
    }

    #[test]
    fn test_assembly_failure_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("segments.txt");
        let settings = Arc::new(AlignSettings::from_config(&Config::default(), 512).unwrap());
        let assembler = TaskAssembler::new(Arc::new(UniformScorer::new(512, 29)), settings);
        let pairs = vec![InputPair {
            name: "missing".to_string(),
            audio: dir.path().join("missing.wav"),
            transcript: dir.path().join("missing.txt"),
        }];

        let summary = Pipeline::new(1)
            .run(
                &pairs,
                &assembler,
                Arc::new(StubAligner),
                OutputFormat::Jsonl,
                &output,
                &AtomicBool::new(false),
            )
            .unwrap();

        assert_eq!(summary.assembly_failures, 1);
        assert_eq!(summary.written, 0);
        assert!(!summary.interrupted);
    }
}
