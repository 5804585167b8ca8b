//! Dual-script keyword matching over enriched transcript segments

use serde::{Deserialize, Serialize};

use crate::transcription::TranscriptSegment;

/// How a keyword is located inside the romanized rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-sensitive containment anywhere, in both scripts
    #[default]
    Substring,
    /// Romanized hits must not be flanked by alphanumerics. Native text
    /// still uses containment since it has no word delimiters.
    WordBoundary,
}

/// Pure predicate over segments whose `romanized` field is already set
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    mode: MatchMode,
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(keywords: &[S], mode: MatchMode) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.as_ref().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            mode,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// True if any keyword occurs in the native text or the romanized text
    pub fn matches(&self, segment: &TranscriptSegment) -> bool {
        self.first_match(segment).is_some()
    }

    /// First keyword, in configured order, that hits this segment
    pub fn first_match(&self, segment: &TranscriptSegment) -> Option<&str> {
        let romanized = segment.romanized.as_deref().unwrap_or("");
        self.keywords
            .iter()
            .find(|keyword| {
                segment.text.contains(keyword.as_str()) || self.hits_romanized(romanized, keyword)
            })
            .map(String::as_str)
    }

    fn hits_romanized(&self, romanized: &str, keyword: &str) -> bool {
        match self.mode {
            MatchMode::Substring => romanized.contains(keyword),
            MatchMode::WordBoundary => romanized.match_indices(keyword).any(|(pos, _)| {
                let before = romanized[..pos].chars().next_back();
                let after = romanized[pos + keyword.len()..].chars().next();
                !before.map_or(false, char::is_alphanumeric)
                    && !after.map_or(false, char::is_alphanumeric)
            }),
        }
    }
}
