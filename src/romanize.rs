//! Script-to-script transliteration used to widen keyword matching

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::RomanizationConfig;
use crate::error::{PipelineError, Result};
use crate::tool::run_tool;
use crate::transcription::TranscriptSegment;

/// Converts native-script text to a space-joined phonetic rendering
#[async_trait]
pub trait Transliterator: Send + Sync {
    async fn romanize(&self, text: &str) -> Result<String>;
}

/// Shells out to `kakasi`, one process per segment
#[derive(Debug, Clone)]
pub struct KakasiTransliterator {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl KakasiTransliterator {
    pub fn new(config: &RomanizationConfig, timeout: Duration) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl Transliterator for KakasiTransliterator {
    async fn romanize(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);

        let output = run_tool(cmd, &self.command, Some(text.as_bytes()), self.timeout)
            .await
            .map_err(|e| PipelineError::Transliteration(e.to_string()))?
            .into_result(&self.command)
            .map_err(|e| PipelineError::Transliteration(e.to_string()))?;

        Ok(join_tokens(&output.stdout))
    }
}

/// Identity transliteration for languages with a single script
#[derive(Debug, Clone, Default)]
pub struct NoopTransliterator;

#[async_trait]
impl Transliterator for NoopTransliterator {
    async fn romanize(&self, text: &str) -> Result<String> {
        Ok(join_tokens(text))
    }
}

/// Collapse any whitespace run into a single space
pub fn join_tokens(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Populate `romanized` on every segment, matching or not.
///
/// Each segment is transliterated independently; nothing is cached across
/// segments.
pub async fn enrich_segments(
    segments: &mut [TranscriptSegment],
    transliterator: &dyn Transliterator,
) -> Result<()> {
    for segment in segments.iter_mut() {
        let romanized = transliterator.romanize(&segment.text).await?;
        debug!("Segment {}: {} -> {}", segment.index, segment.text, romanized);
        segment.romanized = Some(romanized);
    }
    Ok(())
}
