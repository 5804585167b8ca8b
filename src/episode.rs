use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::discovery::list_files;
use crate::error::{PipelineError, Result};

/// Default filename pattern: everything up to and including ` - <digits>`
pub const DEFAULT_EPISODE_PATTERN: &str = r"^(.+? - (\d+))";

/// Identifier pulled out of an audio filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeId {
    /// Full matched prefix, e.g. series name plus episode number
    pub base_name: String,
    /// Token used to find the matching video
    pub episode_number: String,
}

/// One audio file's unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeJob {
    pub base_name: String,
    pub episode_number: String,
    pub audio_path: PathBuf,
    pub video_path: Option<PathBuf>,
}

impl EpisodeJob {
    pub fn new(id: EpisodeId, audio_path: PathBuf) -> Self {
        Self {
            base_name: id.base_name,
            episode_number: id.episode_number,
            audio_path,
            video_path: None,
        }
    }

    pub fn with_video(mut self, video_path: Option<PathBuf>) -> Self {
        self.video_path = video_path;
        self
    }
}

/// Compiled filename pattern.
///
/// Capture group 1 is the base name, group 2 the episode number.
#[derive(Debug, Clone)]
pub struct EpisodePattern {
    regex: Regex,
}

impl EpisodePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            PipelineError::Configuration(format!("invalid episode pattern {:?}: {}", pattern, e))
        })?;

        // captures_len counts the implicit whole-match group
        if regex.captures_len() < 3 {
            return Err(PipelineError::Configuration(format!(
                "episode pattern {:?} needs two capture groups (base name, episode number)",
                pattern
            )));
        }

        Ok(Self { regex })
    }

    /// Extract base name and episode number from a bare filename
    pub fn extract(&self, filename: &str) -> Result<EpisodeId> {
        let captures = self
            .regex
            .captures(filename)
            .ok_or_else(|| PipelineError::UnrecognizedFilename(filename.to_string()))?;

        match (captures.get(1), captures.get(2)) {
            (Some(base), Some(episode)) => Ok(EpisodeId {
                base_name: base.as_str().trim().to_string(),
                episode_number: episode.as_str().to_string(),
            }),
            _ => Err(PipelineError::UnrecognizedFilename(filename.to_string())),
        }
    }

    /// Extract from a full path using its file name
    pub fn extract_from_path(&self, path: &Path) -> Result<EpisodeId> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.extract(&filename)
    }
}

/// How a video filename is compared against an episode number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoMatch {
    /// Plain substring containment; `5` also matches `15`
    #[default]
    Substring,
    /// Episode number must not touch other digits
    DigitBounded,
}

/// Locate the video whose filename contains the episode number.
///
/// Only direct entries are considered. When several match, the first in
/// directory-listing order wins.
pub fn find_video_file(
    video_dir: &Path,
    episode_number: &str,
    mode: VideoMatch,
) -> Result<PathBuf> {
    let candidates = list_files(video_dir)?;

    for path in candidates {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if name_contains_episode(&name, episode_number, mode) {
            debug!("Episode {} resolved to {}", episode_number, path.display());
            return Ok(path);
        }
    }

    Err(PipelineError::VideoNotFound {
        episode: episode_number.to_string(),
        dir: video_dir.to_path_buf(),
    })
}

fn name_contains_episode(name: &str, episode_number: &str, mode: VideoMatch) -> bool {
    if episode_number.is_empty() {
        return false;
    }

    match mode {
        VideoMatch::Substring => name.contains(episode_number),
        VideoMatch::DigitBounded => name.match_indices(episode_number).any(|(pos, _)| {
            let before = name[..pos].chars().next_back();
            let after = name[pos + episode_number.len()..].chars().next();
            !before.map_or(false, |c| c.is_ascii_digit())
                && !after.map_or(false, |c| c.is_ascii_digit())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_extract_series_and_episode() {
        let pattern = EpisodePattern::new(DEFAULT_EPISODE_PATTERN).unwrap();
        let id = pattern.extract("Series - 05.aac").unwrap();
        assert_eq!(id.base_name, "Series - 05");
        assert_eq!(id.episode_number, "05");
    }

    #[test]
    fn test_extract_ignores_trailing_tags() {
        let pattern = EpisodePattern::new(DEFAULT_EPISODE_PATTERN).unwrap();
        let id = pattern.extract("Naruto Shippuden - 123 [1080p].aac").unwrap();
        assert_eq!(id.base_name, "Naruto Shippuden - 123");
        assert_eq!(id.episode_number, "123");
    }

    #[test]
    fn test_no_numeric_token_is_not_found() {
        let pattern = EpisodePattern::new(DEFAULT_EPISODE_PATTERN).unwrap();
        let err = pattern.extract("Series - Finale.aac").unwrap_err();
        assert!(matches!(err, PipelineError::UnrecognizedFilename(_)));
    }

    #[test]
    fn test_custom_series_pattern() {
        let pattern = EpisodePattern::new(r"(Naruto Shippuden - (\d+))").unwrap();
        assert!(pattern.extract("Bleach - 01.aac").is_err());
        let id = pattern.extract("[Group] Naruto Shippuden - 42.mp3").unwrap();
        assert_eq!(id.base_name, "Naruto Shippuden - 42");
    }

    #[test]
    fn test_pattern_needs_two_groups() {
        assert!(EpisodePattern::new(r"(\d+)").is_err());
        assert!(EpisodePattern::new(r"(unclosed").is_err());
    }

    #[test]
    fn test_find_video_file_by_substring() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Series - 04.mkv"), b"x").unwrap();
        fs::write(temp_dir.path().join("Series - 05.mkv"), b"x").unwrap();

        let found = find_video_file(temp_dir.path(), "05", VideoMatch::Substring).unwrap();
        assert_eq!(found.file_name().unwrap(), "Series - 05.mkv");
    }

    #[test]
    fn test_find_video_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Series - 04.mkv"), b"x").unwrap();

        let err = find_video_file(temp_dir.path(), "07", VideoMatch::Substring).unwrap_err();
        assert!(matches!(err, PipelineError::VideoNotFound { .. }));
    }

    #[test]
    fn test_digit_bounded_match() {
        assert!(name_contains_episode("Show - 105.mkv", "05", VideoMatch::Substring));
        assert!(!name_contains_episode("Show - 105.mkv", "05", VideoMatch::DigitBounded));
        assert!(name_contains_episode("Show - 105 - 05.mkv", "05", VideoMatch::DigitBounded));
        assert!(name_contains_episode("Show_05v2.mkv", "05", VideoMatch::DigitBounded));
    }

    #[test]
    fn test_job_carries_resolution() {
        let id = EpisodeId {
            base_name: "Series - 05".to_string(),
            episode_number: "05".to_string(),
        };
        let job = EpisodeJob::new(id, PathBuf::from("a/Series - 05.aac"))
            .with_video(Some(PathBuf::from("v/Series - 05.mkv")));
        assert_eq!(job.base_name, "Series - 05");
        assert!(job.video_path.is_some());
    }
}
