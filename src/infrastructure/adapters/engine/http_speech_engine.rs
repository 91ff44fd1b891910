//! HTTP Speech Engine - 调用外部语音服务
//!
//! 实现 SpeechEnginePort trait，通过 HTTP 驱动外部朗读服务
//!
//! 外部语音 API:
//! POST {base}/api/tts/speak   Request: {"text", "voice", "lang", "rate", "pitch", "volume"}
//!                             朗读结束后才返回 2xx，失败返回非 2xx
//! POST {base}/api/tts/cancel  取消所有正在进行的朗读
//! GET  {base}/api/tts/voices  Response: [{"name", "lang", "vendor"?}]
//! GET  {base}/health

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::application::ports::{SpeechEnginePort, SpeechError, UtteranceRequest};
use crate::domain::voice::VoiceDescriptor;

/// 朗读请求体 (JSON)
#[derive(Debug, Serialize)]
struct SpeakHttpRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
    lang: &'a str,
    rate: f32,
    pitch: f32,
    volume: f32,
}

impl<'a> From<&'a UtteranceRequest> for SpeakHttpRequest<'a> {
    fn from(request: &'a UtteranceRequest) -> Self {
        Self {
            text: &request.text,
            voice: request.voice.as_ref().map(|v| v.name.as_str()),
            lang: &request.lang,
            rate: request.rate,
            pitch: request.pitch,
            volume: request.volume,
        }
    }
}

/// 音色目录条目
#[derive(Debug, Deserialize)]
struct VoiceDto {
    name: String,
    lang: String,
    #[serde(default)]
    vendor: Option<String>,
}

impl From<VoiceDto> for VoiceDescriptor {
    fn from(dto: VoiceDto) -> Self {
        let voice = VoiceDescriptor::new(dto.name, dto.lang);
        match dto.vendor {
            Some(vendor) if !vendor.trim().is_empty() => voice.with_vendor(vendor),
            _ => voice,
        }
    }
}

/// HTTP 语音引擎配置
#[derive(Debug, Clone)]
pub struct HttpSpeechEngineConfig {
    /// 语音服务基础 URL
    pub base_url: String,
    /// 单次朗读请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpSpeechEngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 120,
        }
    }
}

impl HttpSpeechEngineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP 语音引擎
///
/// `cancel` 等待服务确认后才返回。音色目录在 [`refresh_voices`](Self::refresh_voices) 或目录变更等待时拉取并缓存
pub struct HttpSpeechEngine {
    client: Client,
    config: HttpSpeechEngineConfig,
    voices: RwLock<Vec<VoiceDescriptor>>,
}

impl HttpSpeechEngine {
    /// 创建新的 HTTP 语音引擎
    pub fn new(config: HttpSpeechEngineConfig) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SpeechError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            config,
            voices: RwLock::new(Vec::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// 拉取音色目录并更新缓存
    pub async fn refresh_voices(&self) -> Result<Vec<VoiceDescriptor>, SpeechError> {
        let response = self
            .client
            .get(self.url("/api/tts/voices"))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpeechError::InvalidResponse(format!("HTTP {}", status)));
        }

        let voices: Vec<VoiceDescriptor> = response
            .json::<Vec<VoiceDto>>()
            .await
            .map_err(|e| SpeechError::InvalidResponse(format!("Failed to parse voices: {}", e)))?
            .into_iter()
            .map(VoiceDescriptor::from)
            .collect();

        tracing::debug!(count = voices.len(), "Voice catalog fetched");
        *self.voices.write().unwrap_or_else(PoisonError::into_inner) = voices.clone();
        Ok(voices)
    }

    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

fn map_request_error(e: reqwest::Error) -> SpeechError {
    if e.is_timeout() {
        SpeechError::Timeout
    } else if e.is_connect() {
        SpeechError::NetworkError(format!("Cannot connect to speech service: {}", e))
    } else {
        SpeechError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl SpeechEnginePort for HttpSpeechEngine {
    async fn speak(&self, request: UtteranceRequest) -> Result<(), SpeechError> {
        let body = SpeakHttpRequest::from(&request);

        tracing::debug!(
            url = %self.url("/api/tts/speak"),
            text_len = body.text.len(),
            voice = body.voice.unwrap_or("<default>"),
            lang = %body.lang,
            rate = body.rate,
            "Sending speak request"
        );

        let response = self
            .client
            .post(self.url("/api/tts/speak"))
            .json(&body)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SpeechError::UtteranceFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }
        Ok(())
    }

    async fn cancel(&self) {
        match self
            .client
            .post(self.url("/api/tts/cancel"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Speech service cancelled");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Cancel request rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send cancel request");
            }
        }
    }

    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 拉取到非空目录即视为变更；失败或仍为空时保持等待，由调用方的退避超时结束
    async fn voices_changed(&self) {
        match self.refresh_voices().await {
            Ok(voices) if !voices.is_empty() => {}
            Ok(_) => std::future::pending::<()>().await,
            Err(e) => {
                tracing::debug!(error = %e, "Voice catalog fetch failed");
                std::future::pending::<()>().await
            }
        }
    }
}
