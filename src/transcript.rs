//! Transcript files: one `<start> <end> <text>` utterance per line.

use crate::error::{Result, ResegmentError};
use crate::normalize::TextNormalizer;
use crate::task::Utterance;
use std::path::Path;

/// Reads and parses the transcript of the audio file `stem`.
pub fn read_transcript(
    path: &Path,
    stem: &str,
    normalizer: &dyn TextNormalizer,
) -> Result<Vec<Utterance>> {
    let contents = std::fs::read_to_string(path)?;
    parse_transcript(&contents, &path.display().to_string(), stem, normalizer)
}

/// Parses transcript text. `origin` names the source in error messages.
///
/// Tabs count as spaces and blank lines are skipped. Utterance ids are
/// `<stem>_<index:04>` over the non-blank lines.
pub fn parse_transcript(
    contents: &str,
    origin: &str,
    stem: &str,
    normalizer: &dyn TextNormalizer,
) -> Result<Vec<Utterance>> {
    let mut utterances = Vec::new();

    for (line_no, raw) in contents.lines().enumerate() {
        let line = raw.replace('\t', " ");
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parse_error = |message: String| ResegmentError::TranscriptParse {
            path: origin.to_string(),
            line: line_no + 1,
            message,
        };

        let fields = line
            .split_once(' ')
            .and_then(|(start, rest)| {
                let (end, text) = rest.trim_start().split_once(' ')?;
                Some((start, end, text))
            });
        let Some((start, end, text)) = fields else {
            return Err(parse_error("expected <start> <end> <text>".to_string()));
        };
        let start: f64 = start
            .parse()
            .map_err(|_| parse_error(format!("invalid start time '{start}'")))?;
        let end: f64 = end
            .parse()
            .map_err(|_| parse_error(format!("invalid end time '{end}'")))?;

        utterances.push(Utterance {
            id: format!("{}_{:04}", stem, utterances.len()),
            start,
            end,
            text: normalizer.normalize(text),
        });
    }

    Ok(utterances)
}
