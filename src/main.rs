//! Lector - 文本朗读
//!
//! 命令行入口：
//! - 从参数、文件或标准输入读取文本
//! - `--lang/--rate/--voice` 写入偏好设置
//! - Ctrl-C 立即停止朗读

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast::error::RecvError;

use lector::application::ports::{PreferenceStorePort, SpeechEnginePort};
use lector::application::{
    CatalogRetryPolicy, PlaybackController, PlaybackSettings, SpeechPreferences, StartOptions,
    StartOutcome,
};
use lector::config::{
    load_config_from_path, print_config, AppConfig, EngineKind, LogConfig, PreferenceBackend,
};
use lector::domain::playback::SpeedMultiplier;
use lector::domain::voice::{VoiceDescriptor, VoiceSelector};
use lector::domain::ChunkConfig;
use lector::infrastructure::adapters::{
    HttpSpeechEngine, HttpSpeechEngineConfig, SimulatedSpeechEngine, SimulatedSpeechEngineConfig,
};
use lector::infrastructure::events::EventPublisher;
use lector::infrastructure::memory::InMemoryPreferenceStore;
use lector::infrastructure::persistence::sled::{SledPreferenceConfig, SledPreferenceStore};

/// Read text aloud through a pluggable speech engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Text to read (joined with spaces)
    text: Vec<String>,

    /// Read the text from a file instead
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Reading language, saved as a preference
    #[arg(short, long)]
    lang: Option<String>,

    /// Speed multiplier (0.5 - 4), saved as a preference
    #[arg(short, long)]
    rate: Option<String>,

    /// Voice name, saved as a preference; an empty name clears it
    #[arg(long)]
    voice: Option<String>,

    /// List the voices for the reading language and exit
    #[arg(long)]
    list_voices: bool,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config.log);
    print_config(&config);

    let preferences =
        SpeechPreferences::new(build_preference_store(&config).await?, &config.speech.default_lang)
            .arc();

    // 面板设置项
    if let Some(lang) = &cli.lang {
        preferences.set_language(lang);
    }
    if let Some(rate) = &cli.rate {
        preferences.set_rate(SpeedMultiplier::parse(rate));
    }
    if let Some(voice) = &cli.voice {
        preferences.set_preferred_voice(Some(voice.as_str()));
    }

    let engine = build_engine(&config).await?;
    let selector = VoiceSelector::new(
        &config.speech.region_tags,
        &config.speech.name_hints,
        &config.speech.vendor_hints,
    )?;
    let settings = PlaybackSettings {
        chunk: ChunkConfig::new(config.speech.max_chunk_chars),
        safe_retry_rate: config.speech.safe_retry_rate,
        catalog_retry: CatalogRetryPolicy::from_millis(&config.speech.voice_retry_delays_ms),
    };
    let events = EventPublisher::new().arc();
    let controller = PlaybackController::new(
        engine,
        preferences.clone(),
        selector,
        settings,
        events.clone(),
    );

    if cli.list_voices {
        let language = preferences.language();
        let voices = controller.voices_for_language(&language).await;
        if voices.is_empty() {
            tracing::warn!(language = %language, "No voices available");
        }
        for voice in voices {
            println!("{}", voice);
        }
        return Ok(());
    }

    let text = read_input(&cli).await?;

    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => tracing::debug!(event = %json, "Playback event"),
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize playback event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped = skipped, "Playback event log lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    match controller.start(&text, StartOptions::default()).await {
        StartOutcome::Started { .. } => {}
        StartOutcome::EmptyInput => {
            tracing::info!("Nothing to read");
            return Ok(());
        }
        StartOutcome::EngineUnavailable => {
            tracing::warn!("Speech engine unavailable");
            return Ok(());
        }
        StartOutcome::Cancelled => return Ok(()),
    }

    tokio::select! {
        _ = controller.wait_until_idle() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            tracing::info!("Received stop signal");
            controller.stop().await;
        }
    }

    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let log_filter = format!("{},lector={}", log.level, log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn build_preference_store(config: &AppConfig) -> anyhow::Result<Arc<dyn PreferenceStorePort>> {
    match config.preferences.backend {
        PreferenceBackend::Sled => {
            // 确保数据目录存在
            if let Some(parent) = std::path::Path::new(&config.preferences.path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let store = SledPreferenceStore::new(&SledPreferenceConfig {
                db_path: config.preferences.path.clone(),
            })?;
            Ok(Arc::new(store))
        }
        PreferenceBackend::Memory => Ok(Arc::new(InMemoryPreferenceStore::new())),
    }
}

async fn build_engine(config: &AppConfig) -> anyhow::Result<Arc<dyn SpeechEnginePort>> {
    match config.engine.kind {
        EngineKind::Simulated => {
            let mut engine_config = SimulatedSpeechEngineConfig {
                ms_per_char: config.engine.ms_per_char,
                fail_above_rate: config.engine.fail_above_rate,
                ..Default::default()
            };
            if !config.engine.voices.is_empty() {
                engine_config.voices = config
                    .engine
                    .voices
                    .iter()
                    .map(VoiceDescriptor::from)
                    .collect();
            }
            Ok(Arc::new(SimulatedSpeechEngine::new(engine_config)))
        }
        EngineKind::Http => {
            let engine = HttpSpeechEngine::new(
                HttpSpeechEngineConfig::new(&config.engine.url)
                    .with_timeout(config.engine.timeout_secs),
            )?;
            if !engine.health_check().await {
                tracing::warn!(url = %config.engine.url, "Speech service health check failed");
            }
            if let Err(e) = engine.refresh_voices().await {
                tracing::warn!(error = %e, "Failed to fetch voice catalog");
            }
            Ok(Arc::new(engine))
        }
    }
}

/// 文本来源：位置参数，其次 `--file`，最后标准输入
async fn read_input(cli: &Cli) -> anyhow::Result<String> {
    if !cli.text.is_empty() {
        return Ok(cli.text.join(" "));
    }

    if let Some(path) = &cli.file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    if std::io::stdin().is_terminal() {
        anyhow::bail!("No text given: pass TEXT, --file or pipe text on stdin");
    }

    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read stdin")?;
    Ok(text)
}
