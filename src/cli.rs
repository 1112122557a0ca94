//! Command-line interface for resegment
//!
//! Provides argument parsing using clap derive macros.

use crate::config::{Config, ScorerKind};
use crate::task::OutputFormat;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Align long audio to loosely time-stamped transcripts
#[derive(Parser, Debug)]
#[command(
    name = "resegment",
    version,
    about = "Align long audio to loosely time-stamped transcripts"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress the run summary (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Align every audio file in a directory against its transcript
    Align(AlignArgs),

    /// Print the partition plan for a stream length as JSON
    Plan(PlanArgs),

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Arguments of `resegment align`
#[derive(Args, Debug, Clone, Default)]
pub struct AlignArgs {
    /// Directory searched recursively for audio files
    #[arg(long, value_name = "DIR")]
    pub audio_dir: PathBuf,

    /// Directory searched recursively for transcripts
    #[arg(long, value_name = "DIR")]
    pub transcript_dir: PathBuf,

    /// Output directory for the segments and log files
    #[arg(long, short = 'o', value_name = "DIR")]
    pub output: PathBuf,

    /// Number of alignment workers
    #[arg(long, short = 'j', value_name = "N")]
    pub workers: Option<usize>,

    /// Longest audio window scored in one call, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub max_segment_secs: Option<f64>,

    /// Duplicated frames on each side of a partition seam
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub overlap_frames: Option<i64>,

    /// Audio samples per scorer frame (default: estimated from the scorer)
    #[arg(long, value_name = "N")]
    pub samples_per_frame: Option<usize>,

    /// Scorer program run once per window
    #[arg(long, value_name = "CMD")]
    pub scorer_command: Option<String>,

    /// Argument passed to the scorer program (repeatable)
    #[arg(long = "scorer-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub scorer_args: Vec<String>,

    /// Scorer vocabulary (wav2vec2 vocab.json)
    #[arg(long, value_name = "PATH")]
    pub vocab: Option<PathBuf>,

    /// Output format: jsonl or kaldi
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Use the uniform scorer (dry run without a model)
    #[arg(long)]
    pub uniform_scorer: bool,

    /// Abort when a stem matches more than one transcript
    #[arg(long)]
    pub strict_duplicates: bool,
}

impl AlignArgs {
    /// Applies the flags that were given on top of `config`.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if let Some(secs) = self.max_segment_secs {
            config.partition.max_segment_secs = secs;
        }
        if let Some(overlap) = self.overlap_frames {
            config.partition.overlap_frames = overlap;
        }
        if let Some(spf) = self.samples_per_frame {
            config.scorer.samples_per_frame = Some(spf);
        }
        if let Some(command) = &self.scorer_command {
            config.scorer.command = command.clone();
            config.scorer.kind = ScorerKind::Command;
        }
        if !self.scorer_args.is_empty() {
            config.scorer.args = self.scorer_args.clone();
        }
        if let Some(vocab) = &self.vocab {
            config.scorer.vocab_path = vocab.display().to_string();
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.uniform_scorer {
            config.scorer.kind = ScorerKind::Uniform;
        }
        if self.strict_duplicates {
            config.discovery.strict_duplicates = true;
        }
    }
}

/// Arguments of `resegment plan`
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Stream length in samples
    #[arg(
        long,
        value_name = "N",
        required_unless_present = "secs",
        conflicts_with = "secs"
    )]
    pub samples: Option<usize>,

    /// Stream length in seconds
    #[arg(long, value_name = "SECONDS")]
    pub secs: Option<f64>,

    /// Longest audio window scored in one call, in seconds
    #[arg(long, value_name = "SECONDS")]
    pub max_segment_secs: Option<f64>,

    /// Duplicated frames on each side of a partition seam
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub overlap_frames: Option<i64>,

    /// Audio samples per scorer frame
    #[arg(long, value_name = "N", default_value = "512")]
    pub samples_per_frame: usize,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Dump,
    /// Print the default configuration file path
    Path,
}
