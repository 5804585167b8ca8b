use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

use crate::config::FragmentConfig;
use crate::error::Result;
use crate::fragments::FragmentWindow;
use crate::tool::run_tool;

/// What a successful cut left behind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipReport {
    pub output_path: PathBuf,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Cuts one window out of a source video into a standalone file
#[async_trait]
pub trait ClipCutter: Send + Sync {
    /// Creates or overwrites `window.output_path`. A non-zero exit is an error
    /// carrying the tool's diagnostics.
    async fn cut(&self, video_path: &Path, window: &FragmentWindow) -> Result<ClipReport>;
}

/// ffmpeg-backed cutter that re-encodes video for frame-accurate edges
#[derive(Debug, Clone)]
pub struct FfmpegCutter {
    ffmpeg_path: String,
    video_codec: String,
    audio_codec: Option<String>,
    timeout: Duration,
}

impl FfmpegCutter {
    pub fn new(config: &FragmentConfig, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
            timeout,
        }
    }

    /// Full argument list for one cut
    pub fn build_args(&self, video_path: &Path, window: &FragmentWindow) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            video_path.as_os_str().to_owned(),
            "-ss".into(),
            format_seconds(window.start_seconds).into(),
            "-to".into(),
            format_seconds(window.end_seconds).into(),
            "-c:v".into(),
            self.video_codec.clone().into(),
        ];

        if let Some(audio_codec) = &self.audio_codec {
            args.push("-c:a".into());
            args.push(audio_codec.clone().into());
        }

        args.push(window.output_path.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl ClipCutter for FfmpegCutter {
    async fn cut(&self, video_path: &Path, window: &FragmentWindow) -> Result<ClipReport> {
        info!(
            "✂️ Cutting fragment {} [{:.2}s - {:.2}s] from {}",
            window.ordinal,
            window.start_seconds,
            window.end_seconds,
            video_path.display()
        );

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(self.build_args(video_path, window));

        let output = run_tool(cmd, "ffmpeg", None, self.timeout).await?;

        let output = output.into_result("ffmpeg")?;

        Ok(ClipReport {
            output_path: window.output_path.clone(),
            stdout: output.stdout,
            stderr: output.stderr,
            elapsed: output.elapsed,
        })
    }
}

/// Seconds as a plain decimal, the form ffmpeg accepts for `-ss`/`-to`
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> FragmentWindow {
        FragmentWindow {
            ordinal: 1,
            segment_index: 4,
            start_seconds: 8.0,
            end_seconds: 14.25,
            keyword: "ninja".to_string(),
            output_path: PathBuf::from("out/Series - 05_segment1_00h00m08s.mp4"),
        }
    }

    fn args_as_strings(cutter: &FfmpegCutter) -> Vec<String> {
        cutter
            .build_args(Path::new("in/Series - 05.mkv"), &window())
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_ffmpeg_args_overwrite_and_reencode() {
        let cutter = FfmpegCutter::new(&FragmentConfig::default(), Duration::from_secs(60));
        let args = args_as_strings(&cutter);

        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "in/Series - 05.mkv",
                "-ss",
                "8.000",
                "-to",
                "14.250",
                "-c:v",
                "libx264",
                "out/Series - 05_segment1_00h00m08s.mp4",
            ]
        );
    }

    #[test]
    fn test_audio_codec_directive_is_optional() {
        let config = FragmentConfig {
            audio_codec: Some("aac".to_string()),
            ..FragmentConfig::default()
        };
        let cutter = FfmpegCutter::new(&config, Duration::from_secs(60));
        let args = args_as_strings(&cutter);

        let pos = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[pos + 1], "aac");
        assert_eq!(args.last().unwrap(), "out/Series - 05_segment1_00h00m08s.mp4");
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "0.000");
        assert_eq!(format_seconds(3661.5), "3661.500");
        assert_eq!(format_seconds(-1.0), "0.000");
    }
}
