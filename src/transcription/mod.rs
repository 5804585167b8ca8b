pub mod segment;
pub mod whisper;
pub mod remote;

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

pub use remote::RemoteTranscriber;
pub use segment::{number_segments, TranscriptSegment};
pub use whisper::{WhisperBackend, WhisperTranscriber};

/// Speech-to-text backend.
///
/// Built once per run and shared read-only by every job.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Ordered, 1-based segments for one audio file
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Vec<TranscriptSegment>>;

    /// Backend name for logs and reports
    fn name(&self) -> &str;
}
