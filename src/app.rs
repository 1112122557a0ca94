//! Batch alignment entry point.
//!
//! Wires the resolved configuration into the run:
//! discover → assemble → align → write

use crate::aligner::CtcSegmenter;
use crate::assembler::TaskAssembler;
use crate::cli::{AlignArgs, PlanArgs};
use crate::config::{AlignSettings, Config, ScorerConfig, ScorerKind};
use crate::defaults::{ESTIMATE_PROBE_SAMPLES, SAMPLES_PER_FRAME_512};
use crate::discovery::find_pairs;
use crate::normalize::{BasicNormalizer, SpelledNumberNormalizer, TextNormalizer};
use crate::error::{Result, ResegmentError};
use crate::partition::{PartitionParams, plan_partitions};
use crate::pipeline::{Pipeline, RunSummary};
use crate::scorer::{
    CommandScorer, FrameScorer, UniformScorer, estimate_samples_per_frame, snap_samples_per_frame,
};
use crate::vocab::Vocabulary;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Run the align command over every audio/transcript pair.
///
/// `config` already carries environment and CLI overrides. Only
/// configuration errors are returned; per-file failures end up in the
/// summary.
pub fn run_align_command(
    config: &Config,
    args: &AlignArgs,
    interrupted: &AtomicBool,
    quiet: bool,
) -> Result<RunSummary> {
    std::fs::create_dir_all(&args.output)?;

    let vocab = load_vocabulary(&config.scorer)?;
    let scorer = build_scorer(config, &vocab)?;
    let samples_per_frame = resolve_samples_per_frame(&config.scorer, scorer.as_ref())?;
    let settings = Arc::new(AlignSettings::from_config(config, samples_per_frame)?);
    info!(
        scorer = scorer.name(),
        samples_per_frame,
        workers = settings.workers,
        "settings resolved"
    );

    let discovery = find_pairs(&args.audio_dir, &args.transcript_dir, &config.discovery)?;
    if discovery.pairs.is_empty() {
        warn!(
            audio_dir = %args.audio_dir.display(),
            "No audio files with a matching transcript"
        );
    }

    let assembler = TaskAssembler::new(scorer, settings.clone())
        .with_normalizer(build_normalizer(&config.scorer));
    let aligner = Arc::new(CtcSegmenter::new(vocab, settings.ctc.clone()));
    let output = segments_path(&args.output, config);

    let summary = Pipeline::new(settings.workers).run(
        &discovery.pairs,
        &assembler,
        aligner,
        settings.output_format,
        &output,
        interrupted,
    )?;

    if !quiet {
        print_summary(&summary, discovery.duplicates.len(), &output);
    }
    Ok(summary)
}

/// What a Ctrl+C should do given how many came before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Stop dispatching; queued files still finish.
    FinishQueued,
    /// Already interrupted once: exit without waiting.
    Abort,
}

/// Records a Ctrl+C in `interrupted`.
pub fn on_interrupt(interrupted: &AtomicBool) -> InterruptAction {
    if interrupted.swap(true, Ordering::SeqCst) {
        InterruptAction::Abort
    } else {
        InterruptAction::FinishQueued
    }
}

/// Location of the results file inside the output directory.
pub fn segments_path(output_dir: &Path, config: &Config) -> PathBuf {
    output_dir.join(&config.output.segments_file)
}

/// Location of the log file inside the output directory.
pub fn log_path(output_dir: &Path, config: &Config) -> PathBuf {
    output_dir.join(&config.output.log_file)
}

/// Configured vocabulary, or the built-in latin one when no path is set.
pub fn load_vocabulary(config: &ScorerConfig) -> Result<Vocabulary> {
    if config.vocab_path.is_empty() {
        return Ok(Vocabulary::latin());
    }
    Vocabulary::load(Path::new(&config.vocab_path), &config.blank_token)
}

/// Text normalizer matching the configured vocabulary.
pub fn build_normalizer(config: &ScorerConfig) -> Arc<dyn TextNormalizer> {
    if config.spell_numbers {
        Arc::new(SpelledNumberNormalizer)
    } else {
        Arc::new(BasicNormalizer)
    }
}

/// Create the configured scorer.
pub fn build_scorer(config: &Config, vocab: &Vocabulary) -> Result<Arc<dyn FrameScorer>> {
    match config.scorer.kind {
        ScorerKind::Command => {
            if config.scorer.command.trim().is_empty() {
                return Err(ResegmentError::ConfigInvalidValue {
                    key: "scorer.command".to_string(),
                    message: "no scorer program configured (use --scorer-command or --uniform-scorer)"
                        .to_string(),
                });
            }
            Ok(Arc::new(CommandScorer::new(
                config.scorer.command.clone(),
                config.scorer.args.clone(),
                config.audio.sample_rate,
            )))
        }
        ScorerKind::Uniform => Ok(Arc::new(UniformScorer::new(
            config
                .scorer
                .samples_per_frame
                .unwrap_or(SAMPLES_PER_FRAME_512),
            vocab.size(),
        ))),
    }
}

/// Configured samples per frame, or an estimate from a probe of silence.
pub fn resolve_samples_per_frame(config: &ScorerConfig, scorer: &dyn FrameScorer) -> Result<usize> {
    if let Some(spf) = config.samples_per_frame {
        return Ok(spf);
    }
    let estimate = estimate_samples_per_frame(scorer, ESTIMATE_PROBE_SAMPLES)?;
    let snapped = snap_samples_per_frame(estimate);
    info!(estimate, snapped, "estimated samples per frame");
    Ok(snapped)
}

/// Render the partition plan for `args` as pretty JSON.
pub fn plan_json(config: &Config, args: &PlanArgs) -> Result<String> {
    let sample_rate = config.audio.sample_rate;
    let total_samples = match (args.samples, args.secs) {
        (Some(samples), _) => samples,
        (None, Some(secs)) if secs.is_finite() && secs >= 0.0 => {
            (secs * sample_rate as f64) as usize
        }
        (None, Some(secs)) => {
            return Err(ResegmentError::ConfigInvalidValue {
                key: "--secs".to_string(),
                message: format!("must be a non-negative number, got {secs}"),
            });
        }
        (None, None) => {
            return Err(ResegmentError::Other(
                "either --samples or --secs is required".to_string(),
            ));
        }
    };

    let params = PartitionParams {
        max_segment_secs: args
            .max_segment_secs
            .unwrap_or(config.partition.max_segment_secs),
        sample_rate,
        samples_per_frame: args.samples_per_frame,
        overlap_frames: args
            .overlap_frames
            .unwrap_or(config.partition.overlap_frames),
    };
    let plan = plan_partitions(total_samples, &params)?;
    Ok(serde_json::to_string_pretty(&plan)?)
}

fn print_summary(summary: &RunSummary, duplicates: usize, output: &Path) {
    println!(
        "{} {} of {} files aligned",
        "Done:".green(),
        summary.written,
        summary.discovered
    );
    println!("  {}  {}", "Output:".dimmed(), output.display());
    if duplicates > 0 {
        println!(
            "  {}  {} (skipped)",
            "Duplicate stems:".dimmed(),
            duplicates.to_string().yellow()
        );
    }
    if summary.assembly_failures > 0 {
        println!(
            "  {}  {}",
            "Unreadable inputs:".dimmed(),
            summary.assembly_failures.to_string().yellow()
        );
    }
    if summary.alignment_failures > 0 {
        println!(
            "  {}  {}",
            "Alignment failures:".dimmed(),
            summary.alignment_failures.to_string().yellow()
        );
    }
    if summary.worker_panics > 0 {
        println!(
            "  {}  {}",
            "Crashed workers:".dimmed(),
            summary.worker_panics.to_string().red()
        );
    }
    if summary.interrupted {
        println!(
            "  {}",
            format!("Interrupted after dispatching {} files", summary.dispatched).yellow()
        );
    }
}
