use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::audio::{extract_audio_tracks, TrackExtractionOutcome, TrackExtractor};
use crate::config::{Config, UnresolvedVideoPolicy};
use crate::discovery::FileScanner;
use crate::episode::{find_video_file, EpisodeJob, EpisodePattern};
use crate::error::PipelineError;
use crate::fragments::{FragmentPlanner, FragmentWindow};
use crate::matching::KeywordMatcher;
use crate::persist::TranscriptWriter;
use crate::romanize::{enrich_segments, Transliterator};
use crate::tool::{tail, with_retries};
use crate::transcription::Transcriber;
use crate::video::ClipCutter;

const DIAGNOSTIC_TAIL_CHARS: usize = 2000;

/// Coarse cancellation, checked between files and between fragments
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Completed,
    /// Transcript persisted but at least one clip failed
    Partial,
    Failed,
    Skipped,
    Cancelled,
    DryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStage {
    Discovered,
    EpisodeResolved,
    Transcribed,
    Persisted,
    VideoResolved,
    VideoUnresolved,
    FragmentsExtracted,
    Skipped,
}

/// A clip that could not be produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentFailure {
    pub ordinal: u32,
    pub output_path: PathBuf,
    pub error_kind: String,
    pub message: String,
}

/// Tool output left behind by a clip that was produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipDiagnostics {
    pub ordinal: u32,
    pub stdout: String,
    pub stderr: String,
}

/// Processing result for a single audio file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    pub audio_path: PathBuf,
    pub base_name: Option<String>,
    pub episode_number: Option<String>,
    pub video_path: Option<PathBuf>,
    pub transcript_path: Option<PathBuf>,
    pub segments: usize,
    pub matches: usize,
    pub clips: Vec<PathBuf>,
    pub fragment_failures: Vec<FragmentFailure>,
    pub clip_diagnostics: Vec<ClipDiagnostics>,
    pub status: ProcessingStatus,
    pub stages_completed: Vec<ProcessingStage>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub processing_time: Duration,
}

impl FileResult {
    fn new(audio_path: &Path) -> Self {
        Self {
            audio_path: audio_path.to_path_buf(),
            base_name: None,
            episode_number: None,
            video_path: None,
            transcript_path: None,
            segments: 0,
            matches: 0,
            clips: Vec::new(),
            fragment_failures: Vec::new(),
            clip_diagnostics: Vec::new(),
            status: ProcessingStatus::Completed,
            stages_completed: vec![ProcessingStage::Discovered],
            error_kind: None,
            error_message: None,
            processing_time: Duration::ZERO,
        }
    }

    /// Last stage reached
    pub fn final_stage(&self) -> ProcessingStage {
        self.stages_completed
            .last()
            .copied()
            .unwrap_or(ProcessingStage::Discovered)
    }

    fn reached(&mut self, stage: ProcessingStage) {
        debug!("{} -> {:?}", self.audio_path.display(), stage);
        self.stages_completed.push(stage);
    }

    fn fail(&mut self, status: ProcessingStatus, err: &PipelineError) {
        self.status = status;
        self.error_kind = Some(err.kind().to_string());
        self.error_message = Some(err.to_string());
    }
}

/// Overall batch processing results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub completed: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub clips_produced: usize,
    pub total_time: Duration,
    pub track_extraction: Vec<TrackExtractionOutcome>,
    pub results: Vec<FileResult>,
}

impl ProcessingResult {
    fn from_results(
        started_at: DateTime<Utc>,
        total_time: Duration,
        track_extraction: Vec<TrackExtractionOutcome>,
        results: Vec<FileResult>,
    ) -> Self {
        let count = |status: ProcessingStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            started_at,
            total: results.len(),
            completed: count(ProcessingStatus::Completed),
            partial: count(ProcessingStatus::Partial),
            failed: count(ProcessingStatus::Failed),
            skipped: count(ProcessingStatus::Skipped),
            cancelled: count(ProcessingStatus::Cancelled),
            clips_produced: results.iter().map(|r| r.clips.len()).sum(),
            total_time,
            track_extraction,
            results,
        }
    }

    /// Whether any file ended in `Failed`
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Batch orchestrator: one job per audio file, collaborators injected
pub struct BatchProcessor {
    config: Config,
    pattern: EpisodePattern,
    matcher: KeywordMatcher,
    planner: FragmentPlanner,
    writer: TranscriptWriter,
    transcriber: Arc<dyn Transcriber>,
    transliterator: Arc<dyn Transliterator>,
    cutter: Arc<dyn ClipCutter>,
    track_extractor: Option<Arc<dyn TrackExtractor>>,
    cancel: CancellationToken,
    dry_run: bool,
}

impl BatchProcessor {
    pub fn new(
        config: Config,
        transcriber: Arc<dyn Transcriber>,
        transliterator: Arc<dyn Transliterator>,
        cutter: Arc<dyn ClipCutter>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let pattern = EpisodePattern::new(&config.episode.pattern)?;
        let matcher = KeywordMatcher::new(&config.search.keywords, config.search.match_mode);
        let planner = FragmentPlanner::new(
            config.fragments.padding_seconds,
            config.fragments.naming,
            config.fragments.timestamp_style,
            config.paths.clips_dir(),
            config.fragments.extension.clone(),
        );
        let writer = TranscriptWriter::new(
            config.paths.transcripts_dir(),
            config.fragments.timestamp_style,
        );

        info!(
            "🔧 Initializing BatchProcessor with {} worker(s), transcriber {}",
            config.performance.max_workers,
            transcriber.name()
        );

        Ok(Self {
            config,
            pattern,
            matcher,
            planner,
            writer,
            transcriber,
            transliterator,
            cutter,
            track_extractor: None,
            cancel: CancellationToken::new(),
            dry_run: false,
        })
    }

    pub fn with_track_extractor(mut self, extractor: Arc<dyn TrackExtractor>) -> Self {
        self.track_extractor = Some(extractor);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Resolve and log without transcribing, cutting or writing
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the whole batch and write `processing_results.json`.
    ///
    /// Only an uncreatable output tree or an unreadable audio directory
    /// fails the batch; everything else lands in the per-file results.
    pub async fn run(&self) -> Result<ProcessingResult> {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let paths = &self.config.paths;

        info!("🚀 Starting batch processing...");
        info!("📁 Audio: {}", paths.audio_dir.display());
        info!("🎬 Video: {}", paths.video_dir.display());
        info!("📂 Output: {}", paths.output_dir.display());

        if !self.dry_run {
            for dir in [paths.transcripts_dir(), paths.clips_dir()] {
                tokio::fs::create_dir_all(&dir)
                    .await
                    .with_context(|| format!("Cannot create output directory {}", dir.display()))?;
            }
        }

        let track_extraction = self.run_track_extraction().await?;

        let scanner = FileScanner::new(&self.config.episode.audio_extensions);
        let audio_files = scanner
            .scan(&paths.audio_dir)
            .with_context(|| format!("Cannot read audio directory {}", paths.audio_dir.display()))?;

        if audio_files.is_empty() {
            warn!("No audio files found in {}", paths.audio_dir.display());
        } else {
            info!("🎧 Found {} audio files to process", audio_files.len());
        }

        let total_files = audio_files.len();
        let results: Vec<FileResult> = stream::iter(audio_files.into_iter().enumerate())
            .map(|(index, path)| async move {
                info!("🎧 Processing file {}/{}: {}", index + 1, total_files, path.display());
                let result = self.process_file(&path).await;
                log_outcome(&result);
                result
            })
            .buffered(self.config.performance.max_workers.max(1))
            .collect()
            .await;

        let processing_result = ProcessingResult::from_results(
            started_at,
            start_time.elapsed(),
            track_extraction,
            results,
        );

        if !self.dry_run {
            let results_path = paths.report_path();
            let json_data = serde_json::to_string_pretty(&processing_result)?;
            tokio::fs::write(&results_path, json_data)
                .await
                .with_context(|| format!("Cannot write {}", results_path.display()))?;
            info!("💾 Results saved to: {}", results_path.display());
        }

        info!(
            "🏁 Batch finished in {:.2}s: {} completed, {} partial, {} failed, {} skipped, {} clips",
            processing_result.total_time.as_secs_f64(),
            processing_result.completed,
            processing_result.partial,
            processing_result.failed,
            processing_result.skipped,
            processing_result.clips_produced
        );

        Ok(processing_result)
    }

    async fn run_track_extraction(&self) -> Result<Vec<TrackExtractionOutcome>> {
        let config = &self.config.track_extraction;
        if !config.enabled {
            return Ok(Vec::new());
        }
        if self.dry_run {
            info!("🧪 Dry run: skipping track extraction");
            return Ok(Vec::new());
        }
        let Some(extractor) = &self.track_extractor else {
            warn!("Track extraction enabled but no extractor configured, skipping");
            return Ok(Vec::new());
        };

        let outcomes = extract_audio_tracks(
            extractor.as_ref(),
            config,
            &self.config.paths.video_dir,
            &self.config.paths.audio_dir,
        )
        .await
        .context("Track extraction pass failed")?;

        let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
        if failed > 0 {
            warn!("⚠️ {} of {} track extractions failed", failed, outcomes.len());
        }
        Ok(outcomes)
    }

    /// Drive one audio file through the per-file state machine
    pub async fn process_file(&self, audio_path: &Path) -> FileResult {
        let start_time = Instant::now();
        let mut result = FileResult::new(audio_path);

        if self.cancel.is_cancelled() {
            result.fail(ProcessingStatus::Cancelled, &PipelineError::Cancelled);
        } else {
            self.drive(audio_path, &mut result).await;
        }

        result.processing_time = start_time.elapsed();
        result
    }

    async fn drive(&self, audio_path: &Path, result: &mut FileResult) {
        let id = match self.pattern.extract_from_path(audio_path) {
            Ok(id) => id,
            Err(e) => {
                warn!("⏭️ Skipping {}: {}", audio_path.display(), e);
                result.reached(ProcessingStage::Skipped);
                result.fail(ProcessingStatus::Skipped, &e);
                return;
            }
        };
        result.base_name = Some(id.base_name.clone());
        result.episode_number = Some(id.episode_number.clone());
        result.reached(ProcessingStage::EpisodeResolved);

        let video_path = match find_video_file(
            &self.config.paths.video_dir,
            &id.episode_number,
            self.config.episode.video_match,
        ) {
            Ok(path) => Some(path),
            Err(e @ PipelineError::VideoNotFound { .. }) => {
                warn!("🎬 {} ({}): {}", id.base_name, e.kind(), e);
                if self.config.episode.unresolved_video == UnresolvedVideoPolicy::SkipEpisode {
                    result.reached(ProcessingStage::VideoUnresolved);
                    result.fail(ProcessingStatus::Skipped, &e);
                    return;
                }
                None
            }
            Err(e) => {
                warn!("❌ {}: cannot search for a video ({}): {}", id.base_name, e.kind(), e);
                result.fail(ProcessingStatus::Failed, &e);
                return;
            }
        };
        result.video_path = video_path.clone();
        let job = EpisodeJob::new(id, audio_path.to_path_buf()).with_video(video_path);

        if self.dry_run {
            info!(
                "🧪 Dry run: {} (episode {}) -> {}",
                job.base_name,
                job.episode_number,
                job.video_path
                    .as_deref()
                    .map_or_else(|| "no video".to_string(), |p| p.display().to_string())
            );
            result.status = ProcessingStatus::DryRun;
            return;
        }

        if let Err(e) = self.transcribe_and_persist(&job, result).await {
            warn!("❌ {} failed at {:?} ({}): {}", job.base_name, result.final_stage(), e.kind(), e);
            result.fail(ProcessingStatus::Failed, &e);
        }
    }

    async fn transcribe_and_persist(
        &self,
        job: &EpisodeJob,
        result: &mut FileResult,
    ) -> std::result::Result<(), PipelineError> {
        let performance = &self.config.performance;
        let language = self.config.transcription.language.as_str();

        let mut segments = with_retries(
            &format!("transcription of {}", job.base_name),
            performance.max_retries,
            performance.retry_backoff(),
            || self.transcriber.transcribe(&job.audio_path, language),
        )
        .await?;
        result.segments = segments.len();
        result.reached(ProcessingStage::Transcribed);

        enrich_segments(&mut segments, self.transliterator.as_ref()).await?;

        let transcript_path = self.writer.write(&job.base_name, &segments).await?;
        result.transcript_path = Some(transcript_path);
        result.reached(ProcessingStage::Persisted);

        let Some(video_path) = job.video_path.as_deref() else {
            info!("⏭️ No video for {}, fragments skipped", job.base_name);
            result.reached(ProcessingStage::VideoUnresolved);
            return Ok(());
        };
        result.reached(ProcessingStage::VideoResolved);

        let windows = self.planner.plan(&job.base_name, &segments, &self.matcher);
        result.matches = windows.len();
        info!("🔎 {}: {} of {} segments matched", job.base_name, windows.len(), segments.len());

        for window in &windows {
            if self.cancel.is_cancelled() {
                warn!("🛑 Cancelled before fragment {} of {}", window.ordinal, job.base_name);
                result.fail(ProcessingStatus::Cancelled, &PipelineError::Cancelled);
                return Ok(());
            }
            self.extract_fragment(video_path, window, result).await;
        }

        result.reached(ProcessingStage::FragmentsExtracted);
        if !result.fragment_failures.is_empty() {
            result.status = ProcessingStatus::Partial;
        }
        Ok(())
    }

    async fn extract_fragment(&self, video_path: &Path, window: &FragmentWindow, result: &mut FileResult) {
        let performance = &self.config.performance;
        let outcome = with_retries(
            &format!("fragment {}", window.output_path.display()),
            performance.max_retries,
            performance.retry_backoff(),
            || self.cutter.cut(video_path, window),
        )
        .await;

        match outcome {
            Ok(report) => {
                info!(
                    "🎬 Extracted fragment {} ({:.2}s of video) in {:.2}s: {}",
                    window.ordinal,
                    window.duration_seconds(),
                    report.elapsed.as_secs_f64(),
                    report.output_path.display()
                );
                let diagnostics = ClipDiagnostics {
                    ordinal: window.ordinal,
                    stdout: tail(&report.stdout, DIAGNOSTIC_TAIL_CHARS),
                    stderr: tail(&report.stderr, DIAGNOSTIC_TAIL_CHARS),
                };
                for (label, text) in [("stdout", &diagnostics.stdout), ("stderr", &diagnostics.stderr)] {
                    if !text.is_empty() {
                        info!("📝 Fragment {} {}: {}", window.ordinal, label, text);
                    }
                }
                result.clip_diagnostics.push(diagnostics);
                result.clips.push(report.output_path);
            }
            Err(e) => {
                warn!(
                    "⚠️ Fragment {} of {} failed ({}): {}",
                    window.ordinal,
                    video_path.display(),
                    e.kind(),
                    e
                );
                result.fragment_failures.push(FragmentFailure {
                    ordinal: window.ordinal,
                    output_path: window.output_path.clone(),
                    error_kind: e.kind().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

fn log_outcome(result: &FileResult) {
    let name = result.audio_path.display();
    match result.status {
        ProcessingStatus::Completed | ProcessingStatus::Partial => info!(
            "✅ Completed: {} in {:.2}s ({} clips, {} failed)",
            name,
            result.processing_time.as_secs_f64(),
            result.clips.len(),
            result.fragment_failures.len()
        ),
        ProcessingStatus::Failed => error!(
            "❌ Failed: {} - {}",
            name,
            result.error_message.as_deref().unwrap_or("Unknown error")
        ),
        ProcessingStatus::Skipped | ProcessingStatus::Cancelled | ProcessingStatus::DryRun => {
            debug!("{}: {:?}", name, result.status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::romanize::NoopTransliterator;
    use crate::transcription::TranscriptSegment;
    use crate::video::ClipReport;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StaticTranscriber;

    #[async_trait]
    impl Transcriber for StaticTranscriber {
        async fn transcribe(
            &self,
            _audio_path: &Path,
            _language: &str,
        ) -> crate::error::Result<Vec<TranscriptSegment>> {
            Ok(vec![TranscriptSegment::new(1, 10.0, 12.0, "ninja")])
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct TouchCutter;

    #[async_trait]
    impl ClipCutter for TouchCutter {
        async fn cut(&self, _video: &Path, window: &FragmentWindow) -> crate::error::Result<ClipReport> {
            Ok(ClipReport {
                output_path: window.output_path.clone(),
                stdout: String::new(),
                stderr: String::new(),
                elapsed: Duration::ZERO,
            })
        }
    }

    fn processor(temp_dir: &TempDir) -> BatchProcessor {
        let config = ConfigBuilder::new()
            .with_audio_dir(temp_dir.path().join("audio"))
            .with_video_dir(temp_dir.path().join("video"))
            .with_output_dir(temp_dir.path().join("output"))
            .with_keyword("ninja")
            .build();
        BatchProcessor::new(
            config,
            Arc::new(StaticTranscriber),
            Arc::new(NoopTransliterator),
            Arc::new(TouchCutter),
        )
        .unwrap()
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = BatchProcessor::new(
            Config::default(),
            Arc::new(StaticTranscriber),
            Arc::new(NoopTransliterator),
            Arc::new(TouchCutter),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_directory_processing() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("audio")).unwrap();

        let result = processor(&temp_dir).run().await.unwrap();

        assert_eq!(result.total, 0);
        assert_eq!(result.failed, 0);
        assert!(temp_dir.path().join("output/json").is_dir());
        assert!(temp_dir.path().join("output/mp4").is_dir());
        assert!(temp_dir.path().join("output/processing_results.json").exists());
    }

    #[tokio::test]
    async fn test_missing_audio_directory_fails_batch() {
        let temp_dir = TempDir::new().unwrap();
        assert!(processor(&temp_dir).run().await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp_dir = TempDir::new().unwrap();
        let processor = processor(&temp_dir);
        processor.cancellation_token().cancel();

        let result = processor.process_file(Path::new("Series - 01.aac")).await;
        assert_eq!(result.status, ProcessingStatus::Cancelled);
        assert_eq!(result.final_stage(), ProcessingStage::Discovered);
    }

    #[tokio::test]
    async fn test_unrecognized_filename_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let result = processor(&temp_dir).process_file(Path::new("random.aac")).await;
        assert_eq!(result.status, ProcessingStatus::Skipped);
        assert_eq!(result.final_stage(), ProcessingStage::Skipped);
        assert_eq!(result.error_kind.as_deref(), Some("unrecognized_filename"));
    }
}
