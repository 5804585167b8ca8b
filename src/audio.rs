use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::TrackExtractionConfig;
use crate::discovery::FileScanner;
use crate::error::{PipelineError, Result};
use crate::tool::run_tool;

/// Pulls one audio track out of a container file
#[async_trait]
pub trait TrackExtractor: Send + Sync {
    async fn extract_track(&self, container: &Path, track_index: u32, output_path: &Path) -> Result<()>;
}

/// `mkvextract tracks <file> <track>:<output>`
#[derive(Debug, Clone)]
pub struct MkvExtractTool {
    command: String,
    timeout: Duration,
}

impl MkvExtractTool {
    pub fn new(config: &TrackExtractionConfig, timeout: Duration) -> Self {
        Self {
            command: config.command.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl TrackExtractor for MkvExtractTool {
    async fn extract_track(&self, container: &Path, track_index: u32, output_path: &Path) -> Result<()> {
        let mut track_spec = std::ffi::OsString::from(format!("{}:", track_index));
        track_spec.push(output_path.as_os_str());

        let mut cmd = Command::new(&self.command);
        cmd.arg("tracks").arg(container).arg(track_spec);

        run_tool(cmd, &self.command, None, self.timeout)
            .await?
            .into_result(&self.command)?;
        Ok(())
    }
}

/// Per-container result of the extraction pre-pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackExtractionOutcome {
    pub container: PathBuf,
    pub audio_path: PathBuf,
    pub error: Option<String>,
}

impl TrackExtractionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Materialize an audio file for every recognized container in `video_dir`.
///
/// Failures are recorded per file; only an unreadable `video_dir` or an
/// uncreatable `audio_dir` is returned as an error.
pub async fn extract_audio_tracks(
    extractor: &dyn TrackExtractor,
    config: &TrackExtractionConfig,
    video_dir: &Path,
    audio_dir: &Path,
) -> Result<Vec<TrackExtractionOutcome>> {
    tokio::fs::create_dir_all(audio_dir)
        .await
        .map_err(|e| PipelineError::io(audio_dir, e))?;

    let containers = FileScanner::new(&config.container_extensions).scan(video_dir)?;
    info!("🎞️ Extracting audio tracks from {} containers", containers.len());

    let mut outcomes = Vec::with_capacity(containers.len());
    for container in containers {
        let stem = container
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let audio_path = audio_dir.join(format!("{}.{}", stem, config.audio_extension));

        let error = match extractor
            .extract_track(&container, config.track_index, &audio_path)
            .await
        {
            Ok(()) => {
                info!("🎵 Extracted {}", audio_path.display());
                None
            }
            Err(e) => {
                warn!("⚠️ Track extraction failed for {}: {}", container.display(), e);
                Some(e.to_string())
            }
        };

        outcomes.push(TrackExtractionOutcome {
            container,
            audio_path,
            error,
        });
    }

    Ok(outcomes)
}
