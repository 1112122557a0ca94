//! The task queue holds at most one task per worker.

use crossbeam_channel::{Receiver, Sender, unbounded};
use resegment::aligner::{AlignFailure, SegmentAligner};
use resegment::pipeline::Pipeline;
use resegment::task::{AlignmentResult, AlignmentTask, OutputFormat, Utterance};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Signals each task it starts, then holds it until the gate is dropped.
struct GatedAligner {
    started: Sender<String>,
    gate: Receiver<()>,
}

impl SegmentAligner for GatedAligner {
    fn align(&self, task: &AlignmentTask) -> Result<AlignmentResult, AlignFailure> {
        let _ = self.started.send(task.name.clone());
        let _ = self.gate.recv();
        Ok(AlignmentResult {
            name: task.name.clone(),
            segments: Vec::new(),
        })
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

#[test]
fn test_second_queued_task_blocks_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("segments.txt");
    let (started_tx, started_rx) = unbounded();
    let (gate_tx, gate_rx) = unbounded::<()>();
    let aligner = Arc::new(GatedAligner {
        started: started_tx,
        gate: gate_rx,
    });

    let handle = Pipeline::new(1)
        .start(aligner, OutputFormat::Jsonl, &output)
        .unwrap();

    handle.dispatch(task("first")).unwrap();
    assert_eq!(
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        "first"
    );

    // The worker is busy: one more task fits in the queue, the next does not.
    handle.dispatch(task("second")).unwrap();
    assert_eq!(handle.queued(), 1);
    let rejected = handle.try_dispatch(task("third")).unwrap_err();
    assert_eq!(rejected.name, "third");

    let delivered = AtomicBool::new(false);
    std::thread::scope(|scope| {
        scope.spawn(|| {
            handle.dispatch(rejected).unwrap();
            delivered.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(200));
        assert!(
            !delivered.load(Ordering::SeqCst),
            "dispatch returned while the queue was full"
        );

        // Releasing the gate lets every held and future task through.
        drop(gate_tx);
    });
    assert!(delivered.load(Ordering::SeqCst));

    let report = handle.finish();
    assert_eq!(report.written.len(), 3);
    let mut started: Vec<String> = started_rx.try_iter().collect();
    started.sort();
    assert_eq!(started, vec!["second", "third"]);
}

#[test]
fn test_interrupt_releases_a_blocked_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("segments.txt");
    let (started_tx, started_rx) = unbounded();
    let (gate_tx, gate_rx) = unbounded::<()>();
    let aligner = Arc::new(GatedAligner {
        started: started_tx,
        gate: gate_rx,
    });

    let handle = Pipeline::new(1)
        .start(aligner, OutputFormat::Jsonl, &output)
        .unwrap();
    handle.dispatch(task("first")).unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    handle.dispatch(task("second")).unwrap();

    let interrupted = AtomicBool::new(false);
    let queued = std::thread::scope(|scope| {
        scope.spawn(|| {
            std::thread::sleep(Duration::from_millis(200));
            interrupted.store(true, Ordering::SeqCst);
        });
        // Blocks on the full queue until the flag is raised.
        handle.dispatch_unless(task("third"), &interrupted).unwrap()
    });
    assert!(!queued);

    drop(gate_tx);
    let report = handle.finish();
    assert_eq!(report.written.len(), 2);
}
