//! Speech Engine Port - 语音合成引擎抽象
//!
//! 对应浏览器 speechSynthesis 一类的能力：朗读、取消、枚举音色以及音色列表就绪通知。
//! 具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::voice::VoiceDescriptor;

/// 语音引擎错误
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech engine unavailable")]
    Unavailable,

    #[error("Utterance cancelled")]
    Cancelled,

    #[error("Utterance failed: {0}")]
    UtteranceFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 单次朗读请求
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    /// 要朗读的文本
    pub text: String,
    /// 指定音色；为空时由引擎按语言标签选择默认音色
    pub voice: Option<VoiceDescriptor>,
    /// 语言标签
    pub lang: String,
    /// 语速（1.0 为正常）
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl UtteranceRequest {
    pub fn new(text: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            lang: lang.into(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    pub fn with_voice(mut self, voice: Option<VoiceDescriptor>) -> Self {
        if let Some(voice) = &voice {
            self.lang = voice.lang.clone();
        }
        self.voice = voice;
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }
}

/// Speech Engine Port
///
/// 进程内唯一的语音引擎句柄，同一时刻只由一个朗读会话驱动
#[async_trait]
pub trait SpeechEnginePort: Send + Sync {
    /// 宿主环境是否提供语音能力
    fn is_available(&self) -> bool {
        true
    }

    /// 朗读一段文本
    ///
    /// 在引擎触发结束（`Ok`）或错误（`Err`）事件时返回。被 [`cancel`](Self::cancel)
    /// 打断时返回 `Err(SpeechError::Cancelled)` 或 `Ok(())` 均可，调用方会忽略过期结果。
    async fn speak(&self, request: UtteranceRequest) -> Result<(), SpeechError>;

    /// 取消所有正在进行的朗读
    ///
    /// 返回时引擎已确认取消；之后提交的朗读不会再被这次取消打断。
    async fn cancel(&self);

    /// 当前音色目录快照（首次查询时可能为空）
    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// 等待音色目录变更通知
    ///
    /// 默认实现永不返回，即目录是静态的
    async fn voices_changed(&self) {
        std::future::pending::<()>().await
    }
}
