use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::segment::{number_segments, TranscriptSegment};
use super::Transcriber;
use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, Result};

/// OpenAI-compatible `/audio/transcriptions` client
#[derive(Debug, Clone)]
pub struct RemoteTranscriber {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl RemoteTranscriber {
    pub fn new(config: &TranscriptionConfig) -> anyhow::Result<Self> {
        let endpoint = config
            .api_endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("API endpoint required for remote transcription provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn failure(audio_path: &Path, reason: impl ToString) -> PipelineError {
        PipelineError::Transcription {
            path: audio_path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for RemoteTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Vec<TranscriptSegment>> {
        info!("🌐 Uploading {} to {}", audio_path.display(), self.endpoint);

        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| PipelineError::io(audio_path, e))?;

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::failure(audio_path, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::failure(audio_path, format!("HTTP {}: {}", status, body)));
        }

        let body: VerboseJson = response
            .json()
            .await
            .map_err(|e| Self::failure(audio_path, e))?;

        let segments = number_segments(
            body.segments
                .unwrap_or_default()
                .into_iter()
                .map(|seg| (seg.start, seg.end, seg.text)),
        );

        info!("✅ Remote transcription returned {} segments", segments.len());
        Ok(segments)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[derive(Debug, Deserialize)]
struct VerboseJson {
    segments: Option<Vec<VerboseSegment>>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}
