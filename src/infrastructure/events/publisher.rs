//! Event Publisher Implementation
//!
//! 朗读会话事件推送，供 UI 协作者（播放按钮、快捷键、日志）订阅

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// 事件通道容量
const CHANNEL_CAPACITY: usize = 100;

/// 会话停止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// 显式调用 stop
    Requested,
    /// 被新会话取代
    Superseded,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Superseded => "superseded",
        }
    }
}

/// 朗读事件类型
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum PlaybackEvent {
    /// 会话开始
    SessionStarted {
        session_id: Uuid,
        total_chunks: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        voice: Option<String>,
    },
    /// 开始朗读片段
    ChunkStarted {
        session_id: Uuid,
        index: usize,
        rate: f32,
    },
    /// 片段失败后降速重试
    ChunkRetried {
        session_id: Uuid,
        index: usize,
        rate: f32,
    },
    /// 片段失败被跳过
    ChunkSkipped { session_id: Uuid, index: usize },
    /// 全部片段朗读完成
    SessionFinished { session_id: Uuid },
    /// 会话被停止
    SessionStopped { session_id: Uuid, reason: StopReason },
}

impl PlaybackEvent {
    pub fn session_id(&self) -> Uuid {
        match self {
            Self::SessionStarted { session_id, .. }
            | Self::ChunkStarted { session_id, .. }
            | Self::ChunkRetried { session_id, .. }
            | Self::ChunkSkipped { session_id, .. }
            | Self::SessionFinished { session_id }
            | Self::SessionStopped { session_id, .. } => *session_id,
        }
    }
}

/// 事件发布器
pub struct EventPublisher {
    channel: broadcast::Sender<PlaybackEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { channel: tx }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全部朗读事件
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.channel.subscribe()
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.channel.receiver_count()
    }

    pub fn publish_started(&self, session_id: Uuid, total_chunks: usize, voice: Option<&str>) {
        self.publish(PlaybackEvent::SessionStarted {
            session_id,
            total_chunks,
            voice: voice.map(str::to_string),
        });
    }

    pub fn publish_chunk_started(&self, session_id: Uuid, index: usize, rate: f32) {
        self.publish(PlaybackEvent::ChunkStarted {
            session_id,
            index,
            rate,
        });
    }

    pub fn publish_chunk_retried(&self, session_id: Uuid, index: usize, rate: f32) {
        self.publish(PlaybackEvent::ChunkRetried {
            session_id,
            index,
            rate,
        });
    }

    pub fn publish_chunk_skipped(&self, session_id: Uuid, index: usize) {
        self.publish(PlaybackEvent::ChunkSkipped { session_id, index });
    }

    pub fn publish_finished(&self, session_id: Uuid) {
        self.publish(PlaybackEvent::SessionFinished { session_id });
    }

    pub fn publish_stopped(&self, session_id: Uuid, reason: StopReason) {
        self.publish(PlaybackEvent::SessionStopped { session_id, reason });
    }

    fn publish(&self, event: PlaybackEvent) {
        // 没有订阅者时 send 返回错误，忽略即可
        if self.channel.send(event.clone()).is_err() {
            tracing::trace!(session_id = %event.session_id(), "No subscribers for playback event");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
