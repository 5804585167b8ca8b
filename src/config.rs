use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::episode::{EpisodePattern, VideoMatch, DEFAULT_EPISODE_PATTERN};
use crate::error::{PipelineError, Result};
use crate::fragments::FragmentNaming;
use crate::matching::MatchMode;
use crate::timestamp::TimestampStyle;

/// Prefix for environment overrides, e.g. `EPISODE_CLIPPER_OUTPUT_DIR`
pub const ENV_PREFIX: &str = "EPISODE_CLIPPER_";

/// Configuration for the Episode Clipper
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Input and output locations
    pub paths: PathsConfig,

    /// Search terms
    pub search: SearchConfig,

    /// Episode identification and video correspondence
    pub episode: EpisodeConfig,

    /// Clip windows, naming and the cutting tool
    pub fragments: FragmentConfig,

    /// Transcription service settings
    pub transcription: TranscriptionConfig,

    /// Transliteration command
    pub romanization: RomanizationConfig,

    /// Optional container track extraction before the batch
    pub track_extraction: TrackExtractionConfig,

    /// Performance and resource settings
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the audio tracks to process
    pub audio_dir: PathBuf,

    /// Directory holding the episode videos
    pub video_dir: PathBuf,

    /// Output root
    pub output_dir: PathBuf,

    /// Transcript records go under `<output_dir>/<transcripts_subdir>`
    pub transcripts_subdir: String,

    /// Clips go under `<output_dir>/<clips_subdir>`
    pub clips_subdir: String,
}

impl PathsConfig {
    pub fn transcripts_dir(&self) -> PathBuf {
        self.output_dir.join(&self.transcripts_subdir)
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.output_dir.join(&self.clips_subdir)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join("processing_results.json")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SearchConfig {
    /// Keywords in either script
    pub keywords: Vec<String>,

    pub match_mode: MatchMode,
}

/// What happens to an episode whose video cannot be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedVideoPolicy {
    /// Transcribe and persist, skip fragment extraction
    #[default]
    PersistTranscript,
    /// End the job before transcription
    SkipEpisode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Regex with the base name as group 1 and the episode number as group 2
    pub pattern: String,

    /// Audio extensions picked up from the audio directory
    pub audio_extensions: Vec<String>,

    pub unresolved_video: UnresolvedVideoPolicy,

    pub video_match: VideoMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    /// Seconds added on both sides of a matching segment
    pub padding_seconds: f64,

    pub naming: FragmentNaming,

    /// Used for both transcript records and clip filenames
    pub timestamp_style: TimestampStyle,

    /// Clip container extension
    pub extension: String,

    /// Path to the ffmpeg binary
    pub ffmpeg_path: String,

    /// Video encoder for the forced re-encode
    pub video_codec: String,

    /// Audio encoder, ffmpeg picks one for the container when unset
    pub audio_codec: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionProvider {
    /// Local Whisper command line
    #[default]
    Local,
    /// OpenAI-compatible HTTP endpoint
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub provider: TranscriptionProvider,

    /// Model to use for transcription
    pub model: String,

    /// Language hint, fixed for the whole run
    pub language: String,

    /// Timeout for one transcription (seconds)
    pub timeout_secs: u64,

    /// CPU threads for whisper.cpp
    pub threads: u32,

    /// Enable GPU acceleration for Whisper
    pub use_gpu: bool,

    /// Explicit Whisper binary, skips PATH probing
    pub whisper_command: Option<String>,

    /// API endpoint for the remote provider
    pub api_endpoint: Option<String>,

    /// API key for the remote provider
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RomanizationConfig {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackExtractionConfig {
    pub enabled: bool,

    /// Path to the mkvextract binary
    pub command: String,

    /// Container files in the video directory that get a track pulled out
    pub container_extensions: Vec<String>,

    /// Track id handed to mkvextract
    pub track_index: u32,

    /// Extension for the materialized audio files
    pub audio_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Files processed concurrently; 1 keeps the batch strictly sequential
    pub max_workers: usize,

    /// Extra attempts for transient tool failures
    pub max_retries: u32,

    /// Base delay before the first retry, doubled on each attempt
    pub retry_backoff_ms: u64,

    /// Timeout for ffmpeg, mkvextract and kakasi calls (seconds)
    pub tool_timeout_secs: u64,
}

impl PerformanceConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("./audio"),
            video_dir: PathBuf::from("./video"),
            output_dir: PathBuf::from("./output"),
            transcripts_subdir: "json".to_string(),
            clips_subdir: "mp4".to_string(),
        }
    }
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_EPISODE_PATTERN.to_string(),
            audio_extensions: vec![
                "aac".to_string(),
                "mp3".to_string(),
                "wav".to_string(),
                "flac".to_string(),
            ],
            unresolved_video: UnresolvedVideoPolicy::default(),
            video_match: VideoMatch::default(),
        }
    }
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            padding_seconds: 2.0,
            naming: FragmentNaming::default(),
            timestamp_style: TimestampStyle::default(),
            extension: "mp4".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: None,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::Local,
            model: "large".to_string(),
            language: "ja".to_string(),
            timeout_secs: 3600, // 60 minutes for long episodes
            threads: 4,
            use_gpu: false,
            whisper_command: None,
            api_endpoint: None,
            api_key: None,
        }
    }
}

impl Default for RomanizationConfig {
    fn default() -> Self {
        Self {
            command: "kakasi".to_string(),
            args: ["-iutf8", "-outf8", "-Ja", "-Ha", "-Ka", "-Ea", "-s"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for TrackExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: "mkvextract".to_string(),
            container_extensions: vec!["mkv".to_string()],
            track_index: 1,
            audio_extension: "aac".to_string(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            max_retries: 0,
            retry_backoff_ms: 500,
            tool_timeout_secs: 600,
        }
    }
}

impl Config {
    /// Load configuration from the first config file found, then apply
    /// environment overrides. Falls back to defaults when no file exists.
    pub fn load() -> AnyResult<Self> {
        let config_paths = ["episode-clipper.toml", "config/episode-clipper.toml"];

        let mut config = None;
        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::from_file(Path::new(path)) {
                    Ok(loaded) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config = Some(loaded);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {:#}", path, e);
                    }
                }
            }
        }

        let mut config = config.unwrap_or_else(|| {
            tracing::warn!("No configuration file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: &Path) -> AnyResult<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok());
    }

    /// Apply overrides from any key lookup; keys are given without the prefix
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("AUDIO_DIR") {
            self.paths.audio_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("VIDEO_DIR") {
            self.paths.video_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Some(keywords) = lookup("KEYWORDS") {
            self.search.keywords = keywords
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }
        if let Some(language) = lookup("LANGUAGE") {
            self.transcription.language = language;
        }
        if let Some(model) = lookup("MODEL") {
            self.transcription.model = model;
        }
        if let Some(api_key) = lookup("API_KEY") {
            self.transcription.api_key = Some(api_key);
        }
        if let Some(endpoint) = lookup("API_ENDPOINT") {
            self.transcription.api_endpoint = Some(endpoint);
            self.transcription.provider = TranscriptionProvider::Remote;
        }

        if let Some(padding) = lookup("PADDING") {
            match padding.parse() {
                Ok(value) => self.fragments.padding_seconds = value,
                Err(_) => tracing::warn!("Ignoring invalid {}PADDING: {}", ENV_PREFIX, padding),
            }
        }
        if let Some(workers) = lookup("WORKERS") {
            match workers.parse() {
                Ok(value) => self.performance.max_workers = value,
                Err(_) => tracing::warn!("Ignoring invalid {}WORKERS: {}", ENV_PREFIX, workers),
            }
        }
        if let Some(retries) = lookup("RETRIES") {
            match retries.parse() {
                Ok(value) => self.performance.max_retries = value,
                Err(_) => tracing::warn!("Ignoring invalid {}RETRIES: {}", ENV_PREFIX, retries),
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> AnyResult<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.search.keywords.is_empty() {
            return Err(PipelineError::Configuration(
                "at least one keyword is required".to_string(),
            ));
        }
        if self.search.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(PipelineError::Configuration(
                "keywords must not be empty".to_string(),
            ));
        }

        let padding = self.fragments.padding_seconds;
        if !padding.is_finite() || padding < 0.0 {
            return Err(PipelineError::Configuration(format!(
                "padding_seconds must be a non-negative number, got {}",
                padding
            )));
        }

        EpisodePattern::new(&self.episode.pattern)?;

        if self.episode.audio_extensions.is_empty() {
            return Err(PipelineError::Configuration(
                "audio_extensions must not be empty".to_string(),
            ));
        }
        if self.track_extraction.enabled && self.track_extraction.container_extensions.is_empty() {
            return Err(PipelineError::Configuration(
                "container_extensions must not be empty when track extraction is enabled".to_string(),
            ));
        }

        if self.performance.max_workers == 0 {
            return Err(PipelineError::Configuration(
                "max_workers must be greater than 0".to_string(),
            ));
        }

        if self.transcription.language.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "a language hint is required".to_string(),
            ));
        }
        if self.transcription.provider == TranscriptionProvider::Remote
            && self.transcription.api_endpoint.is_none()
        {
            return Err(PipelineError::Configuration(
                "API endpoint required for remote transcription provider".to_string(),
            ));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Episode Clipper Configuration:\n\
            - Audio Directory: {}\n\
            - Video Directory: {}\n\
            - Output Directory: {}\n\
            - Keywords: {}\n\
            - Match Mode: {:?}\n\
            - Padding: {}s\n\
            - Naming: {:?}\n\
            - Transcription: {:?} ({}, {})\n\
            - Track Extraction: {}\n\
            - Workers: {}",
            self.paths.audio_dir.display(),
            self.paths.video_dir.display(),
            self.paths.output_dir.display(),
            self.search.keywords.join(", "),
            self.search.match_mode,
            self.fragments.padding_seconds,
            self.fragments.naming,
            self.transcription.provider,
            self.transcription.model,
            self.transcription.language,
            self.track_extraction.enabled,
            self.performance.max_workers
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_audio_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.paths.audio_dir = dir.into();
        self
    }

    pub fn with_video_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.paths.video_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.paths.output_dir = dir.into();
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.config.search.keywords.push(keyword.into());
        self
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.config.search.match_mode = mode;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.episode.pattern = pattern.into();
        self
    }

    pub fn with_unresolved_video(mut self, policy: UnresolvedVideoPolicy) -> Self {
        self.config.episode.unresolved_video = policy;
        self
    }

    pub fn with_video_match(mut self, mode: VideoMatch) -> Self {
        self.config.episode.video_match = mode;
        self
    }

    pub fn with_padding(mut self, seconds: f64) -> Self {
        self.config.fragments.padding_seconds = seconds;
        self
    }

    pub fn with_naming(mut self, naming: FragmentNaming) -> Self {
        self.config.fragments.naming = naming;
        self
    }

    pub fn with_timestamp_style(mut self, style: TimestampStyle) -> Self {
        self.config.fragments.timestamp_style = style;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.config.transcription.language = language.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.transcription.model = model.into();
        self
    }

    pub fn enable_track_extraction(mut self, enable: bool) -> Self {
        self.config.track_extraction.enabled = enable;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn with_retries(mut self, retries: u32, backoff_ms: u64) -> Self {
        self.config.performance.max_retries = retries;
        self.config.performance.retry_backoff_ms = backoff_ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
