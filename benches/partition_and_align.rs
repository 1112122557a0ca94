use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use resegment::aligner::{CtcConfig, CtcSegmenter, SegmentAligner};
use resegment::partition::{PartitionParams, plan_partitions};
use resegment::task::{AlignmentTask, Utterance};
use resegment::vocab::Vocabulary;
use std::hint::black_box;

const SAMPLE_RATE: u32 = 16000;
const SAMPLES_PER_FRAME: usize = 512;

fn params() -> PartitionParams {
    PartitionParams {
        max_segment_secs: 320.0,
        sample_rate: SAMPLE_RATE,
        samples_per_frame: SAMPLES_PER_FRAME,
        overlap_frames: 30,
    }
}

/// Synthetic task: `utterances` sentences over enough frames to hold them,
/// with a mildly peaked emission for each token in turn.
fn synthetic_task(utterances: usize) -> AlignmentTask {
    let vocab = Vocabulary::latin();
    let sentence = "the quick brown fox jumps over the lazy dog";
    let tokens_per_utterance = vocab.tokenize(sentence).len();
    let frames_per_token = 3;
    let total_frames = utterances * tokens_per_utterance * frames_per_token;

    let tokens: Vec<usize> = (0..utterances)
        .flat_map(|_| vocab.tokenize(sentence))
        .collect();
    let size = vocab.size();
    let frames = (0..total_frames)
        .map(|f| {
            let mut row = vec![-6.0f32; size];
            row[vocab.blank_id()] = -0.7;
            row[tokens[f / frames_per_token]] = -0.8;
            row
        })
        .collect();

    AlignmentTask {
        name: "bench".to_string(),
        utterances: (0..utterances)
            .map(|i| Utterance {
                id: format!("bench_{i:04}"),
                start: i as f64,
                end: i as f64 + 1.0,
                text: sentence.to_string(),
            })
            .collect(),
        frames,
        audio_len_samples: total_frames * SAMPLES_PER_FRAME,
        sample_rate: SAMPLE_RATE,
        samples_per_frame: SAMPLES_PER_FRAME,
    }
}

fn bench_plan_partitions(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_partitions");
    for hours in [1usize, 10] {
        let total = hours * 3600 * SAMPLE_RATE as usize;
        group.bench_with_input(BenchmarkId::from_parameter(hours), &total, |b, &total| {
            b.iter(|| plan_partitions(black_box(total), &params()))
        });
    }
    group.finish();
}

fn bench_align(c: &mut Criterion) {
    let mut group = c.benchmark_group("ctc_align");
    group.sample_size(10);
    for utterances in [10usize, 100] {
        let task = synthetic_task(utterances);
        let segmenter = CtcSegmenter::new(Vocabulary::latin(), CtcConfig::default());
        group.bench_with_input(
            BenchmarkId::from_parameter(utterances),
            &task,
            |b, task| b.iter(|| segmenter.align(black_box(task))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_plan_partitions, bench_align);
criterion_main!(benches);
