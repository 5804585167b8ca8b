use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A time-bounded unit of transcribed speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// 1-based position within the episode's transcript
    pub index: u32,
    /// Start offset in seconds
    pub start_seconds: f64,
    /// End offset in seconds
    pub end_seconds: f64,
    /// Native-script text
    pub text: String,
    /// Transliterated text; `None` until enrichment runs
    pub romanized: Option<String>,
}

impl TranscriptSegment {
    /// Build a segment, enforcing `0 <= start <= end`
    pub fn new(index: u32, start_seconds: f64, end_seconds: f64, text: impl Into<String>) -> Self {
        let start = if start_seconds.is_finite() {
            start_seconds.max(0.0)
        } else {
            0.0
        };
        let end = if end_seconds.is_finite() {
            end_seconds.max(start)
        } else {
            start
        };

        Self {
            index,
            start_seconds: start,
            end_seconds: end,
            text: text.into(),
            romanized: None,
        }
    }

    pub fn with_romanized(mut self, romanized: impl Into<String>) -> Self {
        self.romanized = Some(romanized.into());
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.end_seconds - self.start_seconds)
    }

    pub fn is_enriched(&self) -> bool {
        self.romanized.is_some()
    }
}

/// Assign 1-based indices in emission order
pub fn number_segments<I>(raw: I) -> Vec<TranscriptSegment>
where
    I: IntoIterator<Item = (f64, f64, String)>,
{
    raw.into_iter()
        .enumerate()
        .map(|(i, (start, end, text))| TranscriptSegment::new(i as u32 + 1, start, end, text.trim()))
        .collect()
}
