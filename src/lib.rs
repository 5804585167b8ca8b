//! Episode Clipper
//!
//! Finds spoken keywords in a batch of episode audio tracks and cuts padded
//! video clips around every hit, keeping a transcript per episode.

pub mod audio;
pub mod config;
pub mod discovery;
pub mod episode;
pub mod error;
pub mod fragments;
pub mod matching;
pub mod persist;
pub mod processing;
pub mod romanize;
pub mod timestamp;
pub mod tool;
pub mod transcription;
pub mod video;

// Re-export main types for easy access
pub use crate::audio::{MkvExtractTool, TrackExtractor};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::episode::{EpisodeJob, EpisodePattern};
pub use crate::error::{PipelineError, Result};
pub use crate::fragments::{FragmentNaming, FragmentPlanner, FragmentWindow};
pub use crate::matching::{KeywordMatcher, MatchMode};
pub use crate::processing::{
    BatchProcessor, CancellationToken, FileResult, ProcessingResult, ProcessingStage, ProcessingStatus,
};
pub use crate::romanize::{KakasiTransliterator, NoopTransliterator, Transliterator};
pub use crate::timestamp::{format_timestamp, TimestampStyle};
pub use crate::transcription::{RemoteTranscriber, Transcriber, TranscriptSegment, WhisperTranscriber};
pub use crate::video::{ClipCutter, FfmpegCutter};
