//! 音色目录等待
//!
//! 引擎的音色目录可能异步到达，首次查询常为空。这里按有限次数的退避重试，
//! 每次等待同时监听引擎的目录变更通知。

use std::time::Duration;

use crate::application::ports::SpeechEnginePort;
use crate::domain::voice::VoiceDescriptor;

/// 目录为空时的重试策略
#[derive(Debug, Clone)]
pub struct CatalogRetryPolicy {
    /// 每次重试前的等待时长
    pub delays: Vec<Duration>,
}

impl Default for CatalogRetryPolicy {
    fn default() -> Self {
        Self {
            delays: vec![Duration::from_millis(300), Duration::from_millis(1200)],
        }
    }
}

impl CatalogRetryPolicy {
    pub fn from_millis(delays: &[u64]) -> Self {
        Self {
            delays: delays.iter().copied().map(Duration::from_millis).collect(),
        }
    }
}

/// 获取音色目录，必要时等待其就绪
///
/// 重试用尽仍为空时返回空列表，由调用方按“无可用音色”处理。
pub async fn wait_for_voices(
    engine: &dyn SpeechEnginePort,
    policy: &CatalogRetryPolicy,
) -> Vec<VoiceDescriptor> {
    let voices = engine.voices();
    if !voices.is_empty() {
        return voices;
    }

    for (attempt, delay) in policy.delays.iter().enumerate() {
        tokio::select! {
            _ = engine.voices_changed() => {
                tracing::debug!(attempt = attempt + 1, "Voice catalog change notified");
            }
            _ = tokio::time::sleep(*delay) => {}
        }

        let voices = engine.voices();
        if !voices.is_empty() {
            tracing::debug!(
                attempt = attempt + 1,
                count = voices.len(),
                "Voice catalog loaded"
            );
            return voices;
        }
    }

    tracing::warn!(
        retries = policy.delays.len(),
        "Voice catalog still empty after retries"
    );
    Vec::new()
}
