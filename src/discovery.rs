//! Matching audio files to transcripts by file stem.

use crate::config::DiscoveryConfig;
use crate::error::{Result, ResegmentError};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// One audio file and its transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPair {
    /// Shared file stem, used as the task name.
    pub name: String,
    pub audio: PathBuf,
    pub transcript: PathBuf,
}

/// Outcome of scanning the input directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Pairs ready for assembly, sorted by name.
    pub pairs: Vec<InputPair>,
    /// Audio files with no transcript.
    pub missing_transcripts: Vec<PathBuf>,
    /// Stems skipped because they matched more than one file.
    pub duplicates: Vec<String>,
}

/// Walks both directories recursively and pairs files by stem.
///
/// A stem matching several transcripts (or several audio files) is a
/// configuration error. It is logged once and skipped, or returned as
/// [`ResegmentError::DuplicateStem`] when `strict_duplicates` is set.
pub fn find_pairs(
    audio_dir: &Path,
    transcript_dir: &Path,
    config: &DiscoveryConfig,
) -> Result<Discovery> {
    let audio = collect_by_stem(audio_dir, &config.audio_extension)?;
    let transcripts = collect_by_stem(transcript_dir, &config.transcript_extension)?;
    debug!(
        audio = audio.len(),
        transcripts = transcripts.len(),
        "scanned input directories"
    );

    let mut discovery = Discovery::default();
    let mut seen_duplicates = BTreeSet::new();

    for (stem, audio_paths) in audio {
        let transcript_paths = transcripts.get(&stem).map(Vec::as_slice).unwrap_or_default();

        if transcript_paths.is_empty() {
            for path in audio_paths {
                warn!(audio = %path.display(), "No transcript found for {}", stem);
                discovery.missing_transcripts.push(path);
            }
            continue;
        }

        if audio_paths.len() > 1 || transcript_paths.len() > 1 {
            if config.strict_duplicates {
                return Err(ResegmentError::DuplicateStem { stem });
            }
            if seen_duplicates.insert(stem.clone()) {
                error!(
                    audio_files = audio_paths.len(),
                    transcripts = transcript_paths.len(),
                    "{}; skipping",
                    ResegmentError::DuplicateStem { stem: stem.clone() }
                );
                discovery.duplicates.push(stem);
            }
            continue;
        }

        if let (Some(audio), Some(transcript)) =
            (audio_paths.into_iter().next(), transcript_paths.first())
        {
            discovery.pairs.push(InputPair {
                name: stem,
                audio,
                transcript: transcript.clone(),
            });
        }
    }

    Ok(discovery)
}

/// Files under `dir` with `extension`, grouped by stem in sorted order.
fn collect_by_stem(dir: &Path, extension: &str) -> Result<BTreeMap<String, Vec<PathBuf>>> {
    let mut files = Vec::new();
    walk(dir, extension, &mut files)?;
    files.sort();

    let mut by_stem: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            by_stem.entry(stem.to_string()).or_default().push(path);
        }
    }
    Ok(by_stem)
}

fn walk(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, extension, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        {
            out.push(path);
        }
    }
    Ok(())
}
