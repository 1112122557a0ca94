use crate::aligner::CtcConfig;
use crate::defaults;
use crate::error::{Result, ResegmentError};
use crate::partition::PartitionParams;
use crate::task::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub partition: PartitionConfig,
    pub scorer: ScorerConfig,
    pub aligner: AlignerConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub discovery: DiscoveryConfig,
}

/// Audio input configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate every file is resampled to before scoring.
    pub sample_rate: u32,
}

/// Partition planner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PartitionConfig {
    pub max_segment_secs: f64,
    pub overlap_frames: i64,
}

/// Acoustic scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScorerConfig {
    pub kind: ScorerKind,
    /// Program run once per window.
    pub command: String,
    pub args: Vec<String>,
    /// wav2vec2-style `vocab.json`; empty uses the built-in latin vocabulary.
    pub vocab_path: String,
    pub blank_token: String,
    /// Write digits out as English words before tokenizing.
    pub spell_numbers: bool,
    /// Estimated from the scorer when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples_per_frame: Option<usize>,
}

/// Scorer implementation selector
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    #[default]
    Command,
    Uniform,
}

/// CTC segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignerConfig {
    pub blank_transition_cost_zero: bool,
    pub min_window_states: usize,
    pub score_window_frames: usize,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub workers: usize,
}

/// Output file configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub segments_file: String,
    pub log_file: String,
}

/// Input discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub audio_extension: String,
    pub transcript_extension: String,
    /// Abort the run instead of skipping a stem with several transcripts.
    pub strict_duplicates: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_segment_secs: defaults::MAX_SEGMENT_SECS,
            overlap_frames: defaults::OVERLAP_FRAMES,
        }
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            kind: ScorerKind::Command,
            command: String::new(),
            args: Vec::new(),
            vocab_path: String::new(),
            blank_token: defaults::BLANK_TOKEN.to_string(),
            spell_numbers: true,
            samples_per_frame: None,
        }
    }
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            blank_transition_cost_zero: true,
            min_window_states: defaults::MIN_WINDOW_STATES,
            score_window_frames: defaults::SCORE_WINDOW_FRAMES,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKERS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jsonl,
            segments_file: defaults::SEGMENTS_FILE.to_string(),
            log_file: defaults::LOG_FILE.to_string(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            audio_extension: defaults::AUDIO_EXTENSION.to_string(),
            transcript_extension: defaults::TRANSCRIPT_EXTENSION.to_string(),
            strict_duplicates: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ResegmentError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ResegmentError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(ResegmentError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - RESEGMENT_WORKERS → pipeline.workers
    /// - RESEGMENT_SCORER_COMMAND → scorer.command
    /// - RESEGMENT_SAMPLES_PER_FRAME → scorer.samples_per_frame
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(workers) = std::env::var("RESEGMENT_WORKERS")
            && !workers.is_empty()
        {
            match workers.parse() {
                Ok(n) => self.pipeline.workers = n,
                Err(_) => tracing::warn!(value = %workers, "ignoring invalid RESEGMENT_WORKERS"),
            }
        }

        if let Ok(command) = std::env::var("RESEGMENT_SCORER_COMMAND")
            && !command.is_empty()
        {
            self.scorer.command = command;
        }

        if let Ok(spf) = std::env::var("RESEGMENT_SAMPLES_PER_FRAME")
            && !spf.is_empty()
        {
            match spf.parse() {
                Ok(n) => self.scorer.samples_per_frame = Some(n),
                Err(_) => {
                    tracing::warn!(value = %spf, "ignoring invalid RESEGMENT_SAMPLES_PER_FRAME")
                }
            }
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/resegment/config.toml on Linux, `None` when the
    /// platform has no configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("resegment").join("config.toml"))
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ResegmentError::ConfigParse {
            message: e.to_string(),
        })
    }
}

/// Settings resolved once per run and shared read-only by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignSettings {
    pub sample_rate: u32,
    pub partition: PartitionParams,
    pub workers: usize,
    pub output_format: OutputFormat,
    pub ctc: CtcConfig,
}

impl AlignSettings {
    /// Resolves and validates `config` for a scorer with the given stride.
    pub fn from_config(config: &Config, samples_per_frame: usize) -> Result<Self> {
        if config.audio.sample_rate == 0 {
            return Err(ResegmentError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if config.pipeline.workers == 0 {
            return Err(ResegmentError::ConfigInvalidValue {
                key: "pipeline.workers".to_string(),
                message: "at least one worker is required".to_string(),
            });
        }
        if config.aligner.score_window_frames == 0 {
            return Err(ResegmentError::ConfigInvalidValue {
                key: "aligner.score_window_frames".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let partition = PartitionParams {
            max_segment_secs: config.partition.max_segment_secs,
            sample_rate: config.audio.sample_rate,
            samples_per_frame,
            overlap_frames: config.partition.overlap_frames,
        };
        partition.validate()?;

        Ok(Self {
            sample_rate: config.audio.sample_rate,
            partition,
            workers: config.pipeline.workers,
            output_format: config.output.format,
            ctc: CtcConfig {
                blank_transition_cost_zero: config.aligner.blank_transition_cost_zero,
                min_window_states: config.aligner.min_window_states,
                score_window_frames: config.aligner.score_window_frames,
            },
        })
    }

    pub fn samples_per_frame(&self) -> usize {
        self.partition.samples_per_frame
    }
}
