//! Error types for resegment.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResegmentError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error(
        "Pick a larger time value for partitions: max segment {max_segment_secs}s, \
         overlap {overlap_frames} frames, {samples_per_frame} samples per frame"
    )]
    PartitionTooSmall {
        max_segment_secs: f64,
        overlap_frames: i64,
        samples_per_frame: usize,
    },

    #[error("Duplicate transcript found for stem {stem}")]
    DuplicateStem { stem: String },

    // Per-file input errors
    #[error("Failed to read audio {path}: {message}")]
    AudioRead { path: String, message: String },

    #[error("Malformed transcript {path} line {line}: {message}")]
    TranscriptParse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Transcript for {name} contains no utterances")]
    EmptyTranscript { name: String },

    #[error("Invalid vocabulary: {message}")]
    Vocabulary { message: String },

    // Scorer errors
    #[error("Frame scoring failed: {message}")]
    Scoring { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ResegmentError {
    /// Whether the error invalidates the whole run rather than a single file.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigFileNotFound { .. }
                | Self::ConfigParse { .. }
                | Self::ConfigInvalidValue { .. }
                | Self::Config(_)
                | Self::PartitionTooSmall { .. }
                | Self::DuplicateStem { .. }
                | Self::Vocabulary { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ResegmentError>;
