//! resegment - Re-segmentation of long recordings
//!
//! Aligns loosely time-stamped transcripts to long audio with CTC
//! segmentation, scoring long files in overlapping windows.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod aligner;
pub mod assembler;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod scorer;
pub mod task;
pub mod transcript;
pub mod vocab;

// Composition root
#[cfg(feature = "cli")]
pub mod app;

// Core seams (scorer → aligner)
pub use aligner::{AlignFailure, CtcConfig, CtcSegmenter, SegmentAligner};
pub use scorer::{CommandScorer, FrameScorer, UniformScorer};

// Batch flow
pub use assembler::TaskAssembler;
pub use discovery::{Discovery, InputPair, find_pairs};
pub use partition::{PartitionParams, PartitionPlan, plan_partitions};
pub use pipeline::orchestrator::{Pipeline, PipelineHandle, RunSummary};
pub use task::{AlignmentResult, AlignmentTask, OutputFormat, Utterance, UtteranceSegment};

// Error handling
pub use error::{ResegmentError, Result};

// Config
pub use config::{AlignSettings, Config};

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(
                hash_part.len(),
                7,
                "Git hash should be 7 chars, got: {}",
                hash_part
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
