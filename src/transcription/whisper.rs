use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::segment::{number_segments, TranscriptSegment};
use super::Transcriber;
use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, Result};
use crate::tool::run_tool;

/// Which command-line Whisper is driving the transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhisperBackend {
    /// whisper.cpp (`whisper-cli` / `whisper-cpp`)
    Cpp(String),
    /// OpenAI's Python `whisper`
    Python(String),
}

impl WhisperBackend {
    pub fn from_command(cmd_name: &str) -> Self {
        let stem = Path::new(cmd_name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if stem.starts_with("whisper-cli") || stem.starts_with("whisper-cpp") || stem == "main" {
            WhisperBackend::Cpp(cmd_name.to_string())
        } else {
            WhisperBackend::Python(cmd_name.to_string())
        }
    }

    fn command(&self) -> &str {
        match self {
            WhisperBackend::Cpp(cmd) | WhisperBackend::Python(cmd) => cmd,
        }
    }
}

/// Local Whisper command-line transcriber
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    backend: WhisperBackend,
    model: String,
    threads: u32,
    use_gpu: bool,
    timeout: Duration,
}

impl WhisperTranscriber {
    /// Use an explicitly named backend without probing
    pub fn with_backend(backend: WhisperBackend, config: &TranscriptionConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            threads: config.threads.max(1),
            use_gpu: config.use_gpu,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Probe the PATH for a Whisper backend, preferring whisper.cpp
    pub async fn detect(config: &TranscriptionConfig) -> anyhow::Result<Self> {
        if let Some(cmd_name) = &config.whisper_command {
            info!("🎯 Using configured Whisper command: {}", cmd_name);
            return Ok(Self::with_backend(WhisperBackend::from_command(cmd_name), config));
        }

        let backends = ["whisper-cli", "whisper-cpp", "whisper"];

        info!("🔍 Detecting available Whisper backends...");
        for cmd_name in backends {
            if Self::check_command_available(cmd_name).await {
                info!("✅ Found {} backend, using it for transcription", cmd_name);
                return Ok(Self::with_backend(WhisperBackend::from_command(cmd_name), config));
            }
            debug!("❌ {} not available", cmd_name);
        }

        error!("❌ No Whisper backend found!");
        Err(anyhow!(
            "No Whisper backend found. Please install:\n\
            - whisper.cpp (recommended): https://github.com/ggerganov/whisper.cpp\n\
            - Or OpenAI Whisper: pip install openai-whisper"
        ))
    }

    async fn check_command_available(cmd_name: &str) -> bool {
        Command::new(cmd_name)
            .arg("--help")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Resolve a model name to a ggml file for whisper.cpp
    fn cpp_model_path(&self) -> PathBuf {
        let as_path = PathBuf::from(&self.model);
        if as_path.extension().map_or(false, |ext| ext == "bin") || as_path.exists() {
            as_path
        } else {
            PathBuf::from(format!("models/ggml-{}.bin", self.model))
        }
    }

    fn build_command(&self, audio_path: &Path, output_dir: &Path, language: &str) -> Command {
        let mut cmd = Command::new(self.backend.command());

        match &self.backend {
            WhisperBackend::Cpp(_) => {
                let base_name = audio_path
                    .file_stem()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                cmd.arg("-f")
                    .arg(audio_path)
                    .arg("-oj")
                    .arg("-of")
                    .arg(output_dir.join(base_name))
                    .arg("-t")
                    .arg(self.threads.to_string())
                    .arg("-m")
                    .arg(self.cpp_model_path())
                    .arg("-l")
                    .arg(language);
                if !self.use_gpu {
                    cmd.arg("-ng");
                }
            }
            WhisperBackend::Python(_) => {
                cmd.arg(audio_path)
                    .arg("--model")
                    .arg(&self.model)
                    .arg("--output_dir")
                    .arg(output_dir)
                    .arg("--output_format")
                    .arg("json")
                    .arg("--language")
                    .arg(language)
                    .arg("--verbose")
                    .arg("False")
                    .arg("--temperature")
                    .arg("0.0");
                if !self.use_gpu {
                    cmd.arg("--device").arg("cpu").arg("--fp16").arg("False");
                }
            }
        }

        cmd
    }

    async fn find_json_output(&self, dir: &Path) -> Result<PathBuf> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| PipelineError::io(dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::io(dir, e))?
        {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                return Ok(path);
            }
        }

        Err(PipelineError::Transcription {
            path: dir.to_path_buf(),
            reason: "no JSON output produced".to_string(),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Vec<TranscriptSegment>> {
        info!(
            "🎤 Starting Whisper transcription for: {} (model {}, language {})",
            audio_path.display(),
            self.model,
            language
        );

        let temp_dir = tempfile::Builder::new()
            .prefix("whisper_")
            .tempdir()
            .map_err(|e| PipelineError::io(audio_path, e))?;

        let cmd = self.build_command(audio_path, temp_dir.path(), language);
        let backend_name = self.backend.command().to_string();

        run_tool(cmd, &backend_name, None, self.timeout)
            .await?
            .into_result(&backend_name)?;

        let json_path = self.find_json_output(temp_dir.path()).await?;
        let json_content = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| PipelineError::io(&json_path, e))?;
        debug!("📊 JSON content size: {} bytes", json_content.len());

        let segments = parse_whisper_json(&json_content).map_err(|e| {
            warn!("❌ Failed to parse Whisper JSON for {}: {}", audio_path.display(), e);
            PipelineError::Transcription {
                path: audio_path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        info!(
            "✅ Transcription completed for {}: {} segments",
            audio_path.display(),
            segments.len()
        );
        Ok(segments)
    }

    fn name(&self) -> &str {
        self.backend.command()
    }
}

/// Parse any of the JSON layouts the Whisper CLIs emit
pub fn parse_whisper_json(json_content: &str) -> anyhow::Result<Vec<TranscriptSegment>> {
    let whisper_output: WhisperOutput = serde_json::from_str(json_content)?;

    let raw: Vec<(f64, f64, String)> = if !whisper_output.transcription.is_empty() {
        // whisper.cpp: "timestamps": {"from": "00:01:23,456", ...}
        whisper_output
            .transcription
            .into_iter()
            .map(|seg| {
                let start = parse_srt_timestamp(&seg.timestamps.from)?;
                let end = parse_srt_timestamp(&seg.timestamps.to)?;
                Ok((start, end, seg.text))
            })
            .collect::<anyhow::Result<_>>()?
    } else if let Some(result) = whisper_output.result.filter(|r| !r.segments.is_empty()) {
        result
            .segments
            .into_iter()
            .map(|seg| (seg.start, seg.end, seg.text))
            .collect()
    } else {
        whisper_output
            .segments
            .into_iter()
            .map(|seg| (seg.start, seg.end, seg.text))
            .collect()
    };

    Ok(number_segments(raw))
}

/// Parse `HH:MM:SS,mmm` to seconds
fn parse_srt_timestamp(timestamp: &str) -> anyhow::Result<f64> {
    let (time_part, millis) = timestamp
        .split_once([',', '.'])
        .ok_or_else(|| anyhow!("Invalid timestamp format: {}", timestamp))?;

    let milliseconds: f64 = millis.parse::<f64>()? / 1000.0;

    let time_components: Vec<&str> = time_part.split(':').collect();
    if time_components.len() != 3 {
        return Err(anyhow!("Invalid time format: {}", time_part));
    }

    let hours: f64 = time_components[0].parse()?;
    let minutes: f64 = time_components[1].parse()?;
    let seconds: f64 = time_components[2].parse()?;

    Ok(hours * 3600.0 + minutes * 60.0 + seconds + milliseconds)
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    #[serde(default)]
    transcription: Vec<WhisperTranscriptionSegment>,
    #[serde(default)]
    result: Option<WhisperResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperResult {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperTranscriptionSegment {
    timestamps: WhisperTimestamps,
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperTimestamps {
    from: String,
    to: String,
}

#[derive(Debug, Clone, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}
