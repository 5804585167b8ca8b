use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use episode_clipper::config::{TranscriptionProvider, UnresolvedVideoPolicy};
use episode_clipper::transcription::WhisperBackend;
use episode_clipper::{
    BatchProcessor, CancellationToken, ClipCutter, Config, FfmpegCutter, FragmentNaming,
    KakasiTransliterator, MkvExtractTool, NoopTransliterator, RemoteTranscriber, Transcriber,
    Transliterator, WhisperTranscriber,
};

fn cli() -> Command {
    Command::new("Episode Clipper")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Find spoken keywords in episode audio and cut video clips around them")
        .arg(
            Arg::new("audio-dir")
                .long("audio-dir")
                .value_name("DIR")
                .help("Directory containing the audio tracks to transcribe"),
        )
        .arg(
            Arg::new("video-dir")
                .long("video-dir")
                .value_name("DIR")
                .help("Directory containing the episode videos"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Output root for transcripts, clips and the batch report"),
        )
        .arg(
            Arg::new("keyword")
                .short('k')
                .long("keyword")
                .value_name("TEXT")
                .help("Keyword to search for, in either script (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("padding")
                .long("padding")
                .value_name("SECS")
                .help("Seconds added before and after each matching segment")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("naming")
                .long("naming")
                .value_name("STYLE")
                .help("Clip filename suffix")
                .value_parser(["start-timestamp", "keyword"]),
        )
        .arg(
            Arg::new("language")
                .long("language")
                .value_name("LANG")
                .help("Language hint for transcription"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .value_name("MODEL")
                .help("Transcription model"),
        )
        .arg(
            Arg::new("pattern")
                .long("pattern")
                .value_name("REGEX")
                .help("Filename pattern: group 1 is the base name, group 2 the episode number"),
        )
        .arg(
            Arg::new("extract-tracks")
                .long("extract-tracks")
                .help("Extract audio tracks from container videos before the batch")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("skip-unresolved")
                .long("skip-unresolved")
                .help("Skip episodes without a matching video instead of still transcribing them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("NUM")
                .help("Number of files processed concurrently")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .value_name("NUM")
                .help("Retries for failed external tool runs")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file"),
        )
        .arg(
            Arg::new("write-config")
                .long("write-config")
                .value_name("FILE")
                .help("Write the effective configuration to FILE and exit"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Resolve episodes and videos without transcribing or cutting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
}

fn init_logging(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("episode_clipper=debug,info"))
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("episode_clipper=info,warn"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// File, then environment, then command line
fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let mut config = Config::from_file(Path::new(path))?;
            config.apply_env_overrides();
            info!("📄 Loaded configuration from: {}", path);
            config
        }
        None => Config::load()?,
    };

    if let Some(dir) = matches.get_one::<String>("audio-dir") {
        config.paths.audio_dir = PathBuf::from(dir);
    }
    if let Some(dir) = matches.get_one::<String>("video-dir") {
        config.paths.video_dir = PathBuf::from(dir);
    }
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.paths.output_dir = PathBuf::from(dir);
    }
    if let Some(keywords) = matches.get_many::<String>("keyword") {
        config.search.keywords = keywords.cloned().collect();
    }
    if let Some(padding) = matches.get_one::<f64>("padding") {
        config.fragments.padding_seconds = *padding;
    }
    if let Some(naming) = matches.get_one::<String>("naming") {
        config.fragments.naming = match naming.as_str() {
            "keyword" => FragmentNaming::Keyword,
            _ => FragmentNaming::StartTimestamp,
        };
    }
    if let Some(language) = matches.get_one::<String>("language") {
        config.transcription.language = language.clone();
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config.transcription.model = model.clone();
    }
    if let Some(pattern) = matches.get_one::<String>("pattern") {
        config.episode.pattern = pattern.clone();
    }
    if matches.get_flag("extract-tracks") {
        config.track_extraction.enabled = true;
    }
    if matches.get_flag("skip-unresolved") {
        config.episode.unresolved_video = UnresolvedVideoPolicy::SkipEpisode;
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.performance.max_workers = *workers;
    }
    if let Some(retries) = matches.get_one::<u32>("retries") {
        config.performance.max_retries = *retries;
    }

    Ok(config)
}

async fn build_transcriber(config: &Config, dry_run: bool) -> Result<Arc<dyn Transcriber>> {
    let transcription = &config.transcription;
    let transcriber: Arc<dyn Transcriber> = match transcription.provider {
        TranscriptionProvider::Remote => Arc::new(RemoteTranscriber::new(transcription)?),
        TranscriptionProvider::Local if dry_run => {
            let command = transcription.whisper_command.as_deref().unwrap_or("whisper-cli");
            Arc::new(WhisperTranscriber::with_backend(
                WhisperBackend::from_command(command),
                transcription,
            ))
        }
        TranscriptionProvider::Local => Arc::new(WhisperTranscriber::detect(transcription).await?),
    };
    Ok(transcriber)
}

/// Japanese gets kakasi romanization; other languages have one script
fn build_transliterator(config: &Config) -> Arc<dyn Transliterator> {
    if config.transcription.language == "ja" {
        Arc::new(KakasiTransliterator::new(
            &config.romanization,
            config.performance.tool_timeout(),
        ))
    } else {
        Arc::new(NoopTransliterator)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let config = load_config(&matches)?;

    if let Some(path) = matches.get_one::<String>("write-config") {
        config.save(Path::new(path))?;
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;
    let dry_run = matches.get_flag("dry-run");

    info!("🚀 Episode Clipper starting...");
    info!("{}", config.summary());

    let transcriber = build_transcriber(&config, dry_run).await?;
    let transliterator = build_transliterator(&config);
    let cutter: Arc<dyn ClipCutter> = Arc::new(FfmpegCutter::new(
        &config.fragments,
        config.performance.tool_timeout(),
    ));
    let extractor = Arc::new(MkvExtractTool::new(
        &config.track_extraction,
        config.performance.tool_timeout(),
    ));

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received, stopping after the current step");
            ctrl_c_token.cancel();
        }
    });

    let processor = BatchProcessor::new(config, transcriber, transliterator, cutter)?
        .with_track_extractor(extractor)
        .with_cancellation(cancel)
        .with_dry_run(dry_run);

    let results = processor.run().await?;

    info!("🎉 Processing completed in {:.2}s", results.total_time.as_secs_f64());
    info!("✅ Completed: {} (partial: {})", results.completed, results.partial);
    info!("⏭️ Skipped: {}", results.skipped);
    info!("❌ Failed: {}", results.failed);
    info!("🎬 Clips: {}", results.clips_produced);

    if results.has_failures() {
        return Err(anyhow!("{} of {} files failed", results.failed, results.total));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_override_config() {
        let matches = cli().get_matches_from([
            "episode-clipper",
            "--audio-dir",
            "InputAudio",
            "-k",
            "忍者",
            "-k",
            "ninja",
            "--padding",
            "0",
            "--naming",
            "keyword",
            "--skip-unresolved",
            "--workers",
            "3",
        ]);
        let config = load_config(&matches).unwrap();

        assert_eq!(config.paths.audio_dir, PathBuf::from("InputAudio"));
        assert_eq!(config.search.keywords, vec!["忍者", "ninja"]);
        assert_eq!(config.fragments.padding_seconds, 0.0);
        assert_eq!(config.fragments.naming, FragmentNaming::Keyword);
        assert_eq!(config.episode.unresolved_video, UnresolvedVideoPolicy::SkipEpisode);
        assert_eq!(config.performance.max_workers, 3);
    }

    #[test]
    fn test_cli_rejects_unknown_naming() {
        assert!(cli()
            .try_get_matches_from(["episode-clipper", "--naming", "ordinal"])
            .is_err());
    }
}
