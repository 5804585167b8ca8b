//! Per-item failure kinds for the clipping pipeline

use std::path::PathBuf;
use std::time::Duration;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error types for a single file, episode, or fragment.
///
/// None of these abort a batch on their own; the orchestrator records them
/// against the item that produced them and moves on.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("no episode identifier in filename: {0}")]
    UnrecognizedFilename(String),

    #[error("no video file for episode {episode} in {}", dir.display())]
    VideoNotFound { episode: String, dir: PathBuf },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} timed out after {}s", timeout.as_secs())]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("failed to spawn {tool}: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transcription failed for {}: {reason}", path.display())]
    Transcription { path: PathBuf, reason: String },

    #[error("transliteration failed: {0}")]
    Transliteration(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly label used in the batch report
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnrecognizedFilename(_) => "unrecognized_filename",
            PipelineError::VideoNotFound { .. } => "video_not_found",
            PipelineError::ToolFailed { .. } => "tool_failed",
            PipelineError::ToolTimeout { .. } => "tool_timeout",
            PipelineError::ToolSpawn { .. } => "tool_spawn",
            PipelineError::Transcription { .. } => "transcription",
            PipelineError::Transliteration(_) => "transliteration",
            PipelineError::Io { .. } => "io",
            PipelineError::Serialization(_) => "serialization",
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Cancelled => "cancelled",
        }
    }

    /// Whether an opt-in retry may help
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PipelineError::ToolFailed { .. } | PipelineError::ToolTimeout { .. }
        )
    }
}
