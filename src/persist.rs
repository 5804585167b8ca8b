//! Per-episode transcript records on disk

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::fragments::sanitize_component;
use crate::timestamp::{format_timestamp, TimestampStyle};
use crate::transcription::TranscriptSegment;

/// One persisted segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub start: String,
    pub end: String,
    pub text: String,
    pub romanized: String,
}

impl TranscriptRecord {
    pub fn from_segment(segment: &TranscriptSegment, style: TimestampStyle) -> Self {
        Self {
            start: format_timestamp(segment.start_seconds, style),
            end: format_timestamp(segment.end_seconds, style),
            text: segment.text.clone(),
            romanized: segment.romanized.clone().unwrap_or_default(),
        }
    }
}

/// Writes `<dir>/<base name>.json`
#[derive(Debug, Clone)]
pub struct TranscriptWriter {
    dir: PathBuf,
    style: TimestampStyle,
}

impl TranscriptWriter {
    pub fn new(dir: impl Into<PathBuf>, style: TimestampStyle) -> Self {
        Self {
            dir: dir.into(),
            style,
        }
    }

    pub fn path_for(&self, base_name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_component(base_name)))
    }

    /// Records in the transcriber's original order
    pub fn records(&self, segments: &[TranscriptSegment]) -> Vec<TranscriptRecord> {
        segments
            .iter()
            .map(|s| TranscriptRecord::from_segment(s, self.style))
            .collect()
    }

    /// Serialize every segment and replace the target file in one step
    pub async fn write(&self, base_name: &str, segments: &[TranscriptSegment]) -> Result<PathBuf> {
        let path = self.path_for(base_name);
        let json = serde_json::to_vec_pretty(&self.records(segments))?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &json))
            .await
            .map_err(|e| {
                PipelineError::io(&path, std::io::Error::new(std::io::ErrorKind::Other, e))
            })??;

        info!("💾 Transcription saved to {} ({} segments)", path.display(), segments.len());
        Ok(path)
    }
}

/// Write through a temp file in the same directory, then rename over `path`
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))?;
    temp.write_all(contents)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| PipelineError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;

    Ok(())
}

/// Read a transcript back, mainly for tooling and tests
pub async fn read_records(path: &Path) -> Result<Vec<TranscriptRecord>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn segments() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment::new(1, 3661.4, 3663.0, "忍者だ").with_romanized("ninja da"),
            TranscriptSegment::new(2, 3.0, 5.0, "はい").with_romanized("hai"),
        ]
    }

    #[test]
    fn test_record_uses_display_timestamps() {
        let record = TranscriptRecord::from_segment(&segments()[0], TimestampStyle::Colon);
        assert_eq!(record.start, "01:01:01");
        assert_eq!(record.end, "01:01:03");
        assert_eq!(record.romanized, "ninja da");
    }

    #[tokio::test]
    async fn test_write_keeps_original_order_and_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let writer = TranscriptWriter::new(temp_dir.path(), TimestampStyle::UnitSuffixed);

        let path = writer.write("Series - 05", &segments()).await.unwrap();
        assert_eq!(path, temp_dir.path().join("Series - 05.json"));

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(raw.contains("忍者だ"));

        let records = read_records(&path).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "忍者だ");
        assert_eq!(records[1].start, "00h00m03s");
    }

    #[tokio::test]
    async fn test_write_replaces_existing_file_without_leftovers() {
        let temp_dir = TempDir::new().unwrap();
        let writer = TranscriptWriter::new(temp_dir.path(), TimestampStyle::Colon);

        writer.write("Series - 05", &segments()).await.unwrap();
        writer.write("Series - 05", &segments()[..1]).await.unwrap();

        let records = read_records(&writer.path_for("Series - 05")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_empty_transcript_is_still_written() {
        let temp_dir = TempDir::new().unwrap();
        let writer = TranscriptWriter::new(temp_dir.path(), TimestampStyle::Colon);
        let path = writer.write("Series - 06", &[]).await.unwrap();
        assert!(read_records(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let writer = TranscriptWriter::new(temp_dir.path().join("missing"), TimestampStyle::Colon);
        let err = writer.write("x - 1", &segments()).await.unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
