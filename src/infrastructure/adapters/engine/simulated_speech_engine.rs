//! Simulated Speech Engine - 进程内模拟语音引擎
//!
//! 不发声，按 "字符数 × 每字符时长 / 语速" 休眠来模拟朗读时长。
//! 可配置一个语速上限，超过时直接报错，用来模拟高语速下不稳定的引擎。

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

use crate::application::ports::{SpeechEnginePort, SpeechError, UtteranceRequest};
use crate::domain::voice::VoiceDescriptor;

/// 模拟引擎配置
#[derive(Debug, Clone)]
pub struct SimulatedSpeechEngineConfig {
    /// 1.0 语速下每个字符的朗读时长（毫秒）
    pub ms_per_char: u64,
    /// 语速高于该值时朗读失败
    pub fail_above_rate: Option<f32>,
    /// 静态音色目录
    pub voices: Vec<VoiceDescriptor>,
}

impl Default for SimulatedSpeechEngineConfig {
    fn default() -> Self {
        Self {
            ms_per_char: 60,
            fail_above_rate: None,
            voices: vec![
                VoiceDescriptor::new("Google español de Estados Unidos", "es-US")
                    .with_vendor("Google"),
                VoiceDescriptor::new("Paulina", "es-MX"),
                VoiceDescriptor::new("Jorge", "es-ES"),
                VoiceDescriptor::new("Samantha", "en-US"),
            ],
        }
    }
}

/// 模拟语音引擎
pub struct SimulatedSpeechEngine {
    config: SimulatedSpeechEngineConfig,
    /// 每次 cancel 递增，正在朗读的请求据此提前结束
    cancel_epoch: watch::Sender<u64>,
    completed: AtomicUsize,
}

impl SimulatedSpeechEngine {
    pub fn new(config: SimulatedSpeechEngineConfig) -> Self {
        tracing::info!(
            ms_per_char = config.ms_per_char,
            fail_above_rate = ?config.fail_above_rate,
            voices = config.voices.len(),
            "SimulatedSpeechEngine initialized"
        );
        let (cancel_epoch, _) = watch::channel(0);
        Self {
            config,
            cancel_epoch,
            completed: AtomicUsize::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SimulatedSpeechEngineConfig::default())
    }

    /// 已完整朗读的片段数
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn duration_for(&self, request: &UtteranceRequest) -> Duration {
        let chars = request.text.chars().count() as f64;
        let rate = if request.rate > 0.0 {
            f64::from(request.rate)
        } else {
            1.0
        };
        Duration::from_secs_f64(chars * self.config.ms_per_char as f64 / rate / 1000.0)
    }
}

impl Default for SimulatedSpeechEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl SpeechEnginePort for SimulatedSpeechEngine {
    async fn speak(&self, request: UtteranceRequest) -> Result<(), SpeechError> {
        // 订阅时即视为已看到当前值，只有之后的 cancel 会唤醒
        let mut cancelled = self.cancel_epoch.subscribe();

        if let Some(limit) = self.config.fail_above_rate {
            if request.rate > limit {
                return Err(SpeechError::UtteranceFailed(format!(
                    "rate {} exceeds engine limit {}",
                    request.rate, limit
                )));
            }
        }

        let duration = self.duration_for(&request);
        tracing::trace!(
            voice = request.voice.as_ref().map(|v| v.name.as_str()).unwrap_or("<default>"),
            lang = %request.lang,
            rate = request.rate,
            duration_ms = duration.as_millis() as u64,
            "Simulating utterance"
        );

        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            _ = cancelled.changed() => Err(SpeechError::Cancelled),
        }
    }

    async fn cancel(&self) {
        self.cancel_epoch.send_modify(|epoch| *epoch += 1);
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.config.voices.clone()
    }
}
