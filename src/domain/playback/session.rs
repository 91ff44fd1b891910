//! Playback Context - 会话状态机
//!
//! `Idle -> Playing -> {Idle, Playing}`
//!
//! 引擎回调以 [`SessionTicket`] 为凭证进入状态机。每次开始或结束会话都会
//! 推进代数（generation），持有旧代数凭证的回调一律视为过期并被忽略。

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Playing,
}

/// 会话凭证
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    generation: u64,
    session_id: Uuid,
}

impl SessionTicket {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

/// 待朗读的片段
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkStep {
    pub index: usize,
    pub text: String,
    pub rate: f32,
    /// 是否为降速重试
    pub retry: bool,
}

/// 状态转移后的下一步动作
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    /// 朗读该片段
    Speak(ChunkStep),
    /// 队列全部完成，会话已回到 Idle
    Finished,
    /// 凭证已过期（会话被停止或被新会话取代）
    Stale,
}

/// 朗读会话
///
/// 不变量:
/// - `cursor` 在 `[0, queue.len()]` 内，会话内单调不减
/// - `Idle` 时队列为空且 `cursor == 0`
#[derive(Debug)]
pub struct PlaybackSession {
    generation: u64,
    status: PlaybackStatus,
    session_id: Option<Uuid>,
    queue: Vec<String>,
    cursor: usize,
    rate: f32,
    safe_rate: f32,
    retrying: bool,
    started_at: Option<DateTime<Utc>>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self {
            generation: 0,
            status: PlaybackStatus::Idle,
            session_id: None,
            queue: Vec::new(),
            cursor: 0,
            rate: 1.0,
            safe_rate: 1.0,
            retrying: false,
            started_at: None,
        }
    }

    /// 开始新会话
    ///
    /// 队列为空时不改变状态并返回 `None`。调用方应先 [`stop`](Self::stop)
    /// 正在进行的会话以便取消引擎；这里仍会推进代数使旧凭证失效。
    pub fn begin(
        &mut self,
        queue: Vec<String>,
        rate: f32,
        safe_rate: f32,
    ) -> Option<SessionTicket> {
        if queue.is_empty() {
            return None;
        }

        let session_id = Uuid::new_v4();
        self.generation += 1;
        self.status = PlaybackStatus::Playing;
        self.session_id = Some(session_id);
        self.queue = queue;
        self.cursor = 0;
        self.rate = rate;
        self.safe_rate = safe_rate;
        self.retrying = false;
        self.started_at = Some(Utc::now());

        Some(SessionTicket {
            generation: self.generation,
            session_id,
        })
    }

    /// 当前应朗读的片段
    pub fn current_step(&mut self, ticket: SessionTicket) -> NextStep {
        if !self.is_current(ticket) {
            return NextStep::Stale;
        }

        match self.queue.get(self.cursor) {
            Some(text) => NextStep::Speak(ChunkStep {
                index: self.cursor,
                text: text.clone(),
                rate: if self.retrying { self.safe_rate } else { self.rate },
                retry: self.retrying,
            }),
            None => {
                if let Some(started_at) = self.started_at {
                    tracing::debug!(
                        session_id = ?self.session_id,
                        chunks = self.queue.len(),
                        elapsed_ms = (Utc::now() - started_at).num_milliseconds(),
                        "Playback queue drained"
                    );
                }
                self.reset();
                NextStep::Finished
            }
        }
    }

    /// 引擎报告片段朗读结束
    pub fn on_chunk_ended(&mut self, ticket: SessionTicket) -> NextStep {
        if !self.is_current(ticket) {
            return NextStep::Stale;
        }
        self.advance();
        self.current_step(ticket)
    }

    /// 引擎报告片段朗读失败
    ///
    /// 原语速高于保守语速时降速重试一次；重试仍失败或原本就是保守语速时跳过该片段。
    pub fn on_chunk_failed(&mut self, ticket: SessionTicket) -> NextStep {
        if !self.is_current(ticket) {
            return NextStep::Stale;
        }
        if !self.retrying && self.rate > self.safe_rate {
            self.retrying = true;
        } else {
            self.advance();
        }
        self.current_step(ticket)
    }

    /// 停止当前会话，返回被停止的会话 ID；已是 Idle 时为 no-op
    pub fn stop(&mut self) -> Option<Uuid> {
        if self.status == PlaybackStatus::Idle {
            return None;
        }
        let session_id = self.session_id;
        self.reset();
        session_id
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn is_current(&self, ticket: SessionTicket) -> bool {
        self.status == PlaybackStatus::Playing && ticket.generation == self.generation
    }

    fn advance(&mut self) {
        self.retrying = false;
        if self.cursor < self.queue.len() {
            self.cursor += 1;
        }
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.status = PlaybackStatus::Idle;
        self.session_id = None;
        self.queue.clear();
        self.cursor = 0;
        self.retrying = false;
        self.started_at = None;
    }
}
