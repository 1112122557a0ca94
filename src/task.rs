//! Units of work and their results flowing through the alignment pipeline.

use serde::{Deserialize, Serialize};

/// Frame-major log-probability matrix: `frames[t][token]`.
pub type FrameMatrix = Vec<Vec<f32>>;

/// One transcript line.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// `<stem>_<index:04>`.
    pub id: String,
    /// Loose start time from the transcript, in seconds.
    pub start: f64,
    /// Loose end time from the transcript, in seconds.
    pub end: f64,
    /// Normalized text.
    pub text: String,
}

/// Everything a worker needs to align one audio file.
///
/// Owned by exactly one stage at a time: moved from the assembler into the
/// task channel, then into a worker, and dropped after alignment.
#[derive(Debug, Clone)]
pub struct AlignmentTask {
    /// Stable identifier, the source file stem.
    pub name: String,
    pub utterances: Vec<Utterance>,
    /// Deduplicated scorer output for the whole stream.
    pub frames: FrameMatrix,
    /// Length of the original stream before partitioning.
    pub audio_len_samples: usize,
    pub sample_rate: u32,
    pub samples_per_frame: usize,
}

impl AlignmentTask {
    /// Id of the first utterance, used to locate failures in the source files.
    pub fn first_utterance_id(&self) -> &str {
        self.utterances.first().map_or("<none>", |u| u.id.as_str())
    }

    /// Seconds of audio covered by one frame.
    pub fn frame_duration_secs(&self) -> f64 {
        self.samples_per_frame as f64 / self.sample_rate as f64
    }

    pub fn audio_duration_secs(&self) -> f64 {
        self.audio_len_samples as f64 / self.sample_rate as f64
    }
}

/// Aligned time span of one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceSegment {
    pub utterance_id: String,
    pub start_secs: f64,
    pub end_secs: f64,
    /// Minimum windowed mean log-probability along the path; 0.0 is a perfect match.
    pub confidence: f32,
    pub text: String,
}

/// How results are laid out in the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per aligned file, one line each.
    #[default]
    Jsonl,
    /// Kaldi `segments` layout, one line per utterance.
    Kaldi,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jsonl" | "json" => Ok(Self::Jsonl),
            "kaldi" | "segments" => Ok(Self::Kaldi),
            other => Err(format!("unknown output format '{other}' (expected jsonl or kaldi)")),
        }
    }
}

/// Per-utterance alignment of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub name: String,
    pub segments: Vec<UtteranceSegment>,
}

impl AlignmentResult {
    /// Arithmetic mean of the utterance confidences.
    pub fn mean_confidence(&self) -> f32 {
        if self.segments.is_empty() {
            return 0.0;
        }
        self.segments.iter().map(|s| s.confidence).sum::<f32>() / self.segments.len() as f32
    }

    /// Serializes the result as it is appended to the output file.
    ///
    /// Always newline-terminated so records can be concatenated.
    pub fn to_record(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Jsonl => {
                #[derive(Serialize)]
                struct Line<'a> {
                    name: &'a str,
                    mean_confidence: f32,
                    segments: &'a [UtteranceSegment],
                }
                let line = Line {
                    name: &self.name,
                    mean_confidence: self.mean_confidence(),
                    segments: &self.segments,
                };
                // Plain structs of strings and floats; NaN/inf become null.
                let mut out = serde_json::to_string(&line).unwrap_or_default();
                out.push('\n');
                out
            }
            OutputFormat::Kaldi => {
                let mut out = String::new();
                for s in &self.segments {
                    out.push_str(&format!(
                        "{} {} {:.2} {:.2} {:.9} {}\n",
                        s.utterance_id, self.name, s.start_secs, s.end_secs, s.confidence, s.text
                    ));
                }
                out
            }
        }
    }
}

/// Serialized result on its way to the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub name: String,
    pub text: String,
}
