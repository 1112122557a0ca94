//! Character vocabulary of the scorer and tokenization of utterance text.

use crate::error::{Result, ResegmentError};
use std::collections::HashMap;
use std::path::Path;

/// Characters accepted as the word delimiter token.
const WORD_SEPARATORS: [char; 2] = ['|', ' '];

/// Maps transcript characters to the token ids of the scorer's output columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    chars: HashMap<char, usize>,
    blank_id: usize,
    word_sep_id: Option<usize>,
    size: usize,
    uppercase: bool,
}

impl Vocabulary {
    /// Loads a wav2vec2-style `vocab.json` (`{"<pad>": 0, "a": 5, ...}`).
    ///
    /// Multi-character keys other than the blank token (`<s>`, `<unk>`, ...)
    /// are special tokens the transcript never produces and are skipped.
    pub fn load(path: &Path, blank_token: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| ResegmentError::Vocabulary {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let raw: HashMap<String, usize> =
            serde_json::from_str(&data).map_err(|e| ResegmentError::Vocabulary {
                message: format!("failed to parse {}: {}", path.display(), e),
            })?;
        Self::from_tokens(raw, blank_token)
    }

    /// Builds a vocabulary from a token -> id map.
    pub fn from_tokens(raw: HashMap<String, usize>, blank_token: &str) -> Result<Self> {
        let size = raw.values().max().map_or(0, |m| m + 1);
        let blank_id = raw.get(blank_token).copied().unwrap_or(0);

        let chars: HashMap<char, usize> = raw
            .into_iter()
            .filter(|(k, _)| k != blank_token)
            .filter_map(|(k, v)| {
                let mut it = k.chars();
                let c = it.next()?;
                if it.next().is_some() {
                    return None;
                }
                Some((c, v))
            })
            .collect();

        if chars.is_empty() {
            return Err(ResegmentError::Vocabulary {
                message: "no single-character tokens".to_string(),
            });
        }
        if let Some((c, _)) = chars.iter().find(|&(_, &id)| id == blank_id) {
            return Err(ResegmentError::Vocabulary {
                message: format!("character {c:?} shares id {blank_id} with the blank token"),
            });
        }

        Ok(Self::from_chars(chars, blank_id, size))
    }

    fn from_chars(chars: HashMap<char, usize>, blank_id: usize, size: usize) -> Self {
        let word_sep_id = WORD_SEPARATORS
            .iter()
            .find_map(|c| chars.get(c).copied());
        let has_upper = chars.keys().any(|c| c.is_uppercase());
        let has_lower = chars.keys().any(|c| c.is_lowercase());
        Self {
            size: size.max(blank_id + 1),
            chars,
            blank_id,
            word_sep_id,
            uppercase: has_upper && !has_lower,
        }
    }

    /// Blank, `|`, `a`-`z` and apostrophe; used when no vocabulary file is configured.
    pub fn latin() -> Self {
        let mut chars = HashMap::new();
        chars.insert('|', 1);
        for (i, c) in ('a'..='z').enumerate() {
            chars.insert(c, i + 2);
        }
        chars.insert('\'', 28);
        Self::from_chars(chars, 0, 29)
    }

    /// Number of scorer output columns.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn blank_id(&self) -> usize {
        self.blank_id
    }

    /// Token ids for `text`, without blanks.
    ///
    /// Case is folded to whichever case the vocabulary uses. Runs of
    /// whitespace become one word separator when the vocabulary has one.
    /// Characters outside the vocabulary are dropped.
    pub fn tokenize(&self, text: &str) -> Vec<usize> {
        let folded = if self.uppercase {
            text.to_uppercase()
        } else {
            text.to_lowercase()
        };

        let mut tokens = Vec::with_capacity(folded.len());
        for word in folded.split_whitespace() {
            let word_tokens: Vec<usize> = word
                .chars()
                .filter_map(|c| self.chars.get(&c).copied())
                .filter(|&id| Some(id) != self.word_sep_id)
                .collect();
            if word_tokens.is_empty() {
                continue;
            }
            if !tokens.is_empty()
                && let Some(sep) = self.word_sep_id
            {
                tokens.push(sep);
            }
            tokens.extend(word_tokens);
        }
        tokens
    }
}
