//! Playback Controller - 朗读控制器
//!
//! 把文本分块、音色挑选和会话状态机串起来，按顺序驱动语音引擎：
//! 片段 N 的结束/失败回调到达之前，绝不会提交片段 N+1。
//!
//! 同一时刻只有一个会话处于 Playing；开始新会话会先停止旧会话并取消引擎。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::ports::{SpeechEnginePort, UtteranceRequest};
use crate::application::preferences::SpeechPreferences;
use crate::application::voice_catalog::{wait_for_voices, CatalogRetryPolicy};
use crate::domain::playback::{
    NextStep, PlaybackSession, PlaybackStatus, SessionTicket, SpeedMultiplier,
    DEFAULT_SAFE_RETRY_RATE,
};
use crate::domain::voice::{VoiceDescriptor, VoiceQuery, VoiceSelector};
use crate::domain::{chunk_text, ChunkConfig};
use crate::infrastructure::events::{EventPublisher, StopReason};

/// 控制器参数
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub chunk: ChunkConfig,
    /// 片段失败后重试使用的保守语速
    pub safe_retry_rate: f32,
    pub catalog_retry: CatalogRetryPolicy,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig::default(),
            safe_retry_rate: DEFAULT_SAFE_RETRY_RATE,
            catalog_retry: CatalogRetryPolicy::default(),
        }
    }
}

/// 单次开始朗读的选项，未指定的项取自偏好设置
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub language: Option<String>,
    pub rate: Option<SpeedMultiplier>,
}

/// 开始朗读的结果
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started {
        session_id: Uuid,
        total_chunks: usize,
        voice: Option<VoiceDescriptor>,
    },
    /// 文本规整后为空，什么都不做
    EmptyInput,
    /// 宿主环境没有语音能力，静默禁用
    EngineUnavailable,
    /// 挑选音色期间被停止或被新的 start 取代
    Cancelled,
}

/// 播放/停止切换的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Stopped,
    Start(StartOutcome),
}

struct ControllerState {
    session: PlaybackSession,
    /// 当前会话（或正在挑选音色、尚未开始的会话）的取消令牌
    cancel: CancellationToken,
    /// `start` 正在等待音色目录，会话尚未开始
    starting: bool,
}

impl ControllerState {
    fn is_busy(&self) -> bool {
        self.starting || self.session.is_playing()
    }
}

/// 控制器与后台驱动任务共享的状态
struct Shared {
    engine: Arc<dyn SpeechEnginePort>,
    state: Mutex<ControllerState>,
    /// 引擎取消与新会话开始互斥，取消完成前不会提交新会话的片段
    cancel_gate: tokio::sync::Mutex<()>,
    playing: watch::Sender<bool>,
    events: Arc<EventPublisher>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// "正在播放" 指示与状态保持一致，必须在持锁时调用
    fn sync_indicator(&self, state: &ControllerState) {
        let playing = state.is_busy();
        self.playing.send_if_modified(|current| {
            if *current == playing {
                false
            } else {
                *current = playing;
                true
            }
        });
    }

    /// 持锁停止会话并撤销尚未开始的会话，返回被停止的会话 ID
    ///
    /// 驱动任务立即退出；引擎取消由调用方在释放锁后通过 [`cancel_engine`](Self::cancel_engine) 完成。
    fn stop_locked(&self, state: &mut ControllerState, reason: StopReason) -> Option<Uuid> {
        let played = state.session.cursor();
        let total = state.session.len();
        let stopped = state.session.stop();

        if stopped.is_some() || state.starting {
            state.cancel.cancel();
        }
        if state.starting {
            tracing::debug!(reason = reason.as_str(), "Pending start cancelled");
            state.starting = false;
        }
        self.sync_indicator(state);

        if let Some(session_id) = stopped {
            tracing::info!(
                session_id = %session_id,
                reason = reason.as_str(),
                played = played,
                total_chunks = total,
                "Playback stopped"
            );
        }
        stopped
    }

    async fn cancel_engine(&self) {
        let _gate = self.cancel_gate.lock().await;
        self.engine.cancel().await;
    }

    async fn stop(&self, reason: StopReason) -> Option<Uuid> {
        let stopped = {
            let mut state = self.lock();
            self.stop_locked(&mut state, reason)
        };
        if let Some(session_id) = stopped {
            self.events.publish_stopped(session_id, reason);
            self.cancel_engine().await;
        }
        stopped
    }
}

/// 朗读控制器
pub struct PlaybackController {
    shared: Arc<Shared>,
    preferences: Arc<SpeechPreferences>,
    selector: VoiceSelector,
    settings: PlaybackSettings,
}

impl PlaybackController {
    pub fn new(
        engine: Arc<dyn SpeechEnginePort>,
        preferences: Arc<SpeechPreferences>,
        selector: VoiceSelector,
        settings: PlaybackSettings,
        events: Arc<EventPublisher>,
    ) -> Self {
        let (playing, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                engine,
                state: Mutex::new(ControllerState {
                    session: PlaybackSession::new(),
                    cancel: CancellationToken::new(),
                    starting: false,
                }),
                cancel_gate: tokio::sync::Mutex::new(()),
                playing,
                events,
            }),
            preferences,
            selector,
            settings,
        }
    }

    /// 开始朗读
    ///
    /// 文本分块后为空时保持现状直接返回；否则停止正在进行的会话，
    /// 挑选音色并在后台按顺序朗读全部片段。挑选音色期间调用 [`stop`](Self::stop)
    /// 或再次 `start` 会撤销这次开始，返回 [`StartOutcome::Cancelled`]。
    pub async fn start(&self, text: &str, options: StartOptions) -> StartOutcome {
        let chunks = chunk_text(text, &self.settings.chunk);
        if chunks.is_empty() {
            tracing::debug!("Nothing to read after normalization");
            return StartOutcome::EmptyInput;
        }

        if !self.shared.engine.is_available() {
            tracing::debug!("Speech engine unavailable, playback disabled");
            return StartOutcome::EngineUnavailable;
        }

        let (token, superseded) = {
            let mut state = self.shared.lock();
            let superseded = self
                .shared
                .stop_locked(&mut state, StopReason::Superseded);
            state.cancel = CancellationToken::new();
            state.starting = true;
            self.shared.sync_indicator(&state);
            (state.cancel.clone(), superseded)
        };

        // 等待音色目录期间旧会话不应继续出声
        if let Some(old_session) = superseded {
            self.shared
                .events
                .publish_stopped(old_session, StopReason::Superseded);
            self.shared.cancel_engine().await;
        }

        let language = options
            .language
            .filter(|lang| !lang.trim().is_empty())
            .unwrap_or_else(|| self.preferences.language());
        let multiplier = options.rate.unwrap_or_else(|| self.preferences.rate());
        let rate = multiplier.effective_rate();
        let voice = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!("Start cancelled while waiting for voices");
                return StartOutcome::Cancelled;
            }
            voice = self.resolve_voice(&language) => voice,
        };
        let total_chunks = chunks.len();

        let ticket = {
            let _gate = self.shared.cancel_gate.lock().await;
            let mut state = self.shared.lock();
            if token.is_cancelled() {
                None
            } else {
                state.starting = false;
                let ticket = state
                    .session
                    .begin(chunks, rate, self.settings.safe_retry_rate);
                self.shared.sync_indicator(&state);
                ticket
            }
        };

        let Some(ticket) = ticket else {
            tracing::debug!("Start cancelled before playback began");
            return StartOutcome::Cancelled;
        };
        let session_id = ticket.session_id();

        tracing::info!(
            session_id = %session_id,
            total_chunks = total_chunks,
            language = %language,
            multiplier = multiplier.value(),
            rate = rate,
            voice = voice.as_ref().map(|v| v.name.as_str()).unwrap_or("<engine default>"),
            "Playback started"
        );
        self.shared.events.publish_started(
            session_id,
            total_chunks,
            voice.as_ref().map(|v| v.name.as_str()),
        );

        tokio::spawn(drive(
            self.shared.clone(),
            ticket,
            token,
            voice.clone(),
            language,
        ));

        StartOutcome::Started {
            session_id,
            total_chunks,
            voice,
        }
    }

    /// 停止朗读
    ///
    /// 状态在第一次 poll 时立即回到 Idle，随后等待引擎确认取消。已是 Idle 时为 no-op。
    pub async fn stop(&self) {
        self.shared.stop(StopReason::Requested).await;
    }

    /// 正在播放（或正在准备开始）则停止，否则开始朗读 `text`
    pub async fn toggle(&self, text: &str, options: StartOptions) -> ToggleOutcome {
        if self.is_playing() {
            self.stop().await;
            ToggleOutcome::Stopped
        } else {
            ToggleOutcome::Start(self.start(text, options).await)
        }
    }

    /// 会话正在播放，或 `start` 正在挑选音色
    pub fn is_playing(&self) -> bool {
        self.shared.lock().is_busy()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.lock().session.status()
    }

    /// 订阅 "正在播放" 指示
    pub fn subscribe_playing(&self) -> watch::Receiver<bool> {
        self.shared.playing.subscribe()
    }

    /// 等待当前会话结束（完成或被停止）
    pub async fn wait_until_idle(&self) {
        let mut rx = self.subscribe_playing();
        // 发送端与控制器同生命周期，这里不会出错
        let _ = rx.wait_for(|playing| !*playing).await;
    }

    /// 引擎当前的音色目录快照
    pub fn available_voices(&self) -> Vec<VoiceDescriptor> {
        self.shared.engine.voices()
    }

    /// 某语言的全部音色，按展示优先级排序
    pub async fn voices_for_language(&self, language: &str) -> Vec<VoiceDescriptor> {
        let catalog =
            wait_for_voices(self.shared.engine.as_ref(), &self.settings.catalog_retry).await;
        self.selector
            .rank_for_language(&catalog, language)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn preferences(&self) -> &SpeechPreferences {
        &self.preferences
    }

    async fn resolve_voice(&self, language: &str) -> Option<VoiceDescriptor> {
        let catalog =
            wait_for_voices(self.shared.engine.as_ref(), &self.settings.catalog_retry).await;
        let preferred = self.preferences.preferred_voice();
        let query = VoiceQuery::new(language).with_preferred_name(preferred.as_deref());

        match self.selector.select(&catalog, &query) {
            Some(found) => {
                tracing::debug!(
                    voice = %found.voice,
                    stage = found.stage.as_str(),
                    "Voice selected"
                );
                Some(found.voice.clone())
            }
            None => {
                tracing::warn!(language = %language, "No voice available, using engine default");
                None
            }
        }
    }
}

/// 后台驱动任务：逐个提交片段，把引擎回调喂给状态机
async fn drive(
    shared: Arc<Shared>,
    ticket: SessionTicket,
    token: CancellationToken,
    voice: Option<VoiceDescriptor>,
    language: String,
) {
    let session_id = ticket.session_id();
    let mut step = {
        let mut state = shared.lock();
        let step = state.session.current_step(ticket);
        shared.sync_indicator(&state);
        step
    };

    loop {
        let chunk = match step {
            NextStep::Speak(chunk) => chunk,
            NextStep::Finished => {
                tracing::info!(session_id = %session_id, "Playback finished");
                shared.events.publish_finished(session_id);
                return;
            }
            NextStep::Stale => {
                tracing::debug!(session_id = %session_id, "Ignoring stale playback callback");
                return;
            }
        };

        let index = chunk.index;
        if chunk.retry {
            tracing::info!(
                session_id = %session_id,
                index = index,
                rate = chunk.rate,
                "Retrying chunk at safe rate"
            );
            shared
                .events
                .publish_chunk_retried(session_id, index, chunk.rate);
        } else {
            tracing::debug!(
                session_id = %session_id,
                index = index,
                rate = chunk.rate,
                chars = chunk.text.chars().count(),
                "Speaking chunk"
            );
            shared
                .events
                .publish_chunk_started(session_id, index, chunk.rate);
        }

        let request = UtteranceRequest::new(chunk.text, language.as_str())
            .with_voice(voice.clone())
            .with_rate(chunk.rate);

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(session_id = %session_id, index = index, "Utterance abandoned after stop");
                return;
            }
            result = shared.engine.speak(request) => result,
        };

        step = {
            let mut state = shared.lock();
            let next = match result {
                Ok(()) => state.session.on_chunk_ended(ticket),
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        index = index,
                        error = %e,
                        "Utterance failed"
                    );
                    let next = state.session.on_chunk_failed(ticket);
                    let retrying = matches!(&next, NextStep::Speak(c) if c.index == index);
                    if !retrying && next != NextStep::Stale {
                        shared.events.publish_chunk_skipped(session_id, index);
                    }
                    next
                }
            };
            shared.sync_indicator(&state);
            next
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::SpeechError;
    use crate::infrastructure::events::PlaybackEvent;
    use crate::infrastructure::memory::InMemoryPreferenceStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{broadcast, mpsc, oneshot};

    type Responder = oneshot::Sender<Result<(), SpeechError>>;

    const THREE_SENTENCES: &str = "Primera frase. Segunda frase. Tercera frase.";

    /// 由测试逐个触发回调的引擎
    struct ScriptedEngine {
        available: bool,
        voices: Vec<VoiceDescriptor>,
        requests: mpsc::UnboundedSender<(UtteranceRequest, Responder)>,
        cancels: AtomicUsize,
        cancel_delay: Duration,
        /// 引擎收到的调用顺序
        calls: std::sync::Mutex<Vec<&'static str>>,
    }

    impl ScriptedEngine {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechEnginePort for ScriptedEngine {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn speak(&self, request: UtteranceRequest) -> Result<(), SpeechError> {
            self.calls.lock().unwrap().push("speak");
            let (tx, rx) = oneshot::channel();
            self.requests
                .send((request, tx))
                .map_err(|_| SpeechError::Unavailable)?;
            rx.await.unwrap_or(Err(SpeechError::Cancelled))
        }

        async fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            if !self.cancel_delay.is_zero() {
                tokio::time::sleep(self.cancel_delay).await;
            }
            self.calls.lock().unwrap().push("cancel");
        }

        fn voices(&self) -> Vec<VoiceDescriptor> {
            self.voices.clone()
        }
    }

    struct Harness {
        controller: PlaybackController,
        engine: Arc<ScriptedEngine>,
        requests: mpsc::UnboundedReceiver<(UtteranceRequest, Responder)>,
        events: broadcast::Receiver<PlaybackEvent>,
        preferences: Arc<SpeechPreferences>,
    }

    fn spanish_voices() -> Vec<VoiceDescriptor> {
        vec![
            VoiceDescriptor::new("Jorge", "es-ES"),
            VoiceDescriptor::new("Google español de Estados Unidos", "es-US"),
            VoiceDescriptor::new("Samantha", "en-US"),
        ]
    }

    fn harness_with(available: bool, voices: Vec<VoiceDescriptor>) -> Harness {
        build_harness(available, voices, &[5], Duration::ZERO)
    }

    fn build_harness(
        available: bool,
        voices: Vec<VoiceDescriptor>,
        catalog_delays_ms: &[u64],
        cancel_delay: Duration,
    ) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(ScriptedEngine {
            available,
            voices,
            requests: tx,
            cancels: AtomicUsize::new(0),
            cancel_delay,
            calls: std::sync::Mutex::new(Vec::new()),
        });
        let preferences = SpeechPreferences::new(Arc::new(InMemoryPreferenceStore::new()), "es").arc();
        let selector = VoiceSelector::new(
            &["es-US"],
            &["US", "Estados Unidos"],
            &["Google", "Microsoft"],
        )
        .unwrap();
        let settings = PlaybackSettings {
            chunk: ChunkConfig::new(20),
            safe_retry_rate: 1.2,
            catalog_retry: CatalogRetryPolicy::from_millis(catalog_delays_ms),
        };
        let events = EventPublisher::new().arc();
        let event_rx = events.subscribe();
        let controller =
            PlaybackController::new(engine.clone(), preferences.clone(), selector, settings, events);

        Harness {
            controller,
            engine,
            requests: rx,
            events: event_rx,
            preferences,
        }
    }

    fn harness() -> Harness {
        harness_with(true, spanish_voices())
    }

    async fn next_request(
        rx: &mut mpsc::UnboundedReceiver<(UtteranceRequest, Responder)>,
    ) -> (UtteranceRequest, Responder) {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for utterance")
            .expect("engine channel closed")
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn drain(rx: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn started_id(outcome: &StartOutcome) -> Uuid {
        match outcome {
            StartOutcome::Started { session_id, .. } => *session_id,
            other => panic!("expected Started, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_plays_all_chunks_then_returns_to_idle() {
        let mut h = harness();
        assert!(!h.controller.is_playing());

        let outcome = h.controller.start(THREE_SENTENCES, StartOptions::default()).await;
        let session_id = started_id(&outcome);
        assert!(matches!(outcome, StartOutcome::Started { total_chunks: 3, .. }));
        assert!(h.controller.is_playing());
        assert!(*h.controller.subscribe_playing().borrow());

        for expected in ["Primera frase.", "Segunda frase.", "Tercera frase."] {
            let (request, responder) = next_request(&mut h.requests).await;
            assert_eq!(request.text, expected);
            assert_eq!(request.rate, 1.0);
            assert_eq!(request.pitch, 1.0);
            responder.send(Ok(())).unwrap();
        }

        tokio::time::timeout(Duration::from_secs(1), h.controller.wait_until_idle())
            .await
            .expect("session should complete");
        assert!(!h.controller.is_playing());
        assert_eq!(h.controller.status(), PlaybackStatus::Idle);

        let events = drain(&mut h.events);
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], PlaybackEvent::SessionStarted { total_chunks: 3, .. }));
        assert!(matches!(events[3], PlaybackEvent::ChunkStarted { index: 2, .. }));
        assert_eq!(events[4], PlaybackEvent::SessionFinished { session_id });
    }

    #[tokio::test]
    async fn test_empty_text_is_a_no_op() {
        let mut h = harness();
        let outcome = h.controller.start("  \n\t ", StartOptions::default()).await;
        assert_eq!(outcome, StartOutcome::EmptyInput);
        assert!(!h.controller.is_playing());
        settle().await;
        assert!(h.requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unavailable_engine_disables_playback() {
        let mut h = harness_with(false, spanish_voices());
        let outcome = h.controller.start(THREE_SENTENCES, StartOptions::default()).await;
        assert_eq!(outcome, StartOutcome::EngineUnavailable);
        assert!(!h.controller.is_playing());
        settle().await;
        assert!(h.requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_mid_playback_ignores_late_callback() {
        let mut h = harness();
        let outcome = h.controller.start(THREE_SENTENCES, StartOptions::default()).await;
        let session_id = started_id(&outcome);
        let (_, responder) = next_request(&mut h.requests).await;

        h.controller.stop().await;
        assert!(!h.controller.is_playing());
        assert_eq!(h.engine.cancels.load(Ordering::SeqCst), 1);

        // 引擎在取消之后才触发的结束回调
        let _ = responder.send(Ok(()));
        settle().await;

        assert!(!h.controller.is_playing());
        assert!(h.requests.try_recv().is_err());

        let events = drain(&mut h.events);
        assert_eq!(
            events.last(),
            Some(&PlaybackEvent::SessionStopped {
                session_id,
                reason: StopReason::Requested,
            })
        );
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_a_no_op() {
        let mut h = harness();
        h.controller.stop().await;
        h.controller.stop().await;
        assert_eq!(h.engine.cancels.load(Ordering::SeqCst), 0);
        assert!(drain(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn test_new_start_supersedes_running_session() {
        let mut h = harness();
        let first = h.controller.start(THREE_SENTENCES, StartOptions::default()).await;
        let first_id = started_id(&first);
        let (_, old_responder) = next_request(&mut h.requests).await;

        let second = h.controller.start("Otra cosa.", StartOptions::default()).await;
        let second_id = started_id(&second);
        assert_ne!(first_id, second_id);
        assert_eq!(h.engine.cancels.load(Ordering::SeqCst), 1);

        let _ = old_responder.send(Ok(()));
        let (request, responder) = next_request(&mut h.requests).await;
        assert_eq!(request.text, "Otra cosa.");
        responder.send(Ok(())).unwrap();

        tokio::time::timeout(Duration::from_secs(1), h.controller.wait_until_idle())
            .await
            .expect("second session should complete");
        assert!(h.requests.try_recv().is_err());

        let events = drain(&mut h.events);
        assert!(events.contains(&PlaybackEvent::SessionStopped {
            session_id: first_id,
            reason: StopReason::Superseded,
        }));
        assert_eq!(
            events.last(),
            Some(&PlaybackEvent::SessionFinished {
                session_id: second_id
            })
        );
    }

    #[tokio::test]
    async fn test_failed_chunk_retries_at_safe_rate_then_skips() {
        let mut h = harness();
        let options = StartOptions {
            rate: Some(SpeedMultiplier::new(4.0)),
            ..Default::default()
        };
        let outcome = h
            .controller
            .start("Primera frase. Segunda frase.", options)
            .await;
        let session_id = started_id(&outcome);

        let (request, responder) = next_request(&mut h.requests).await;
        assert_eq!(request.rate, 1.6);
        responder
            .send(Err(SpeechError::UtteranceFailed("synthesis-failed".into())))
            .unwrap();

        let (retry, responder) = next_request(&mut h.requests).await;
        assert_eq!(retry.text, "Primera frase.");
        assert_eq!(retry.rate, 1.2);
        responder
            .send(Err(SpeechError::UtteranceFailed("synthesis-failed".into())))
            .unwrap();

        let (next, responder) = next_request(&mut h.requests).await;
        assert_eq!(next.text, "Segunda frase.");
        assert_eq!(next.rate, 1.6);
        responder.send(Ok(())).unwrap();

        tokio::time::timeout(Duration::from_secs(1), h.controller.wait_until_idle())
            .await
            .expect("session should complete");

        let events = drain(&mut h.events);
        assert!(events.contains(&PlaybackEvent::ChunkRetried {
            session_id,
            index: 0,
            rate: 1.2,
        }));
        assert!(events.contains(&PlaybackEvent::ChunkSkipped {
            session_id,
            index: 0
        }));
        assert_eq!(events.last(), Some(&PlaybackEvent::SessionFinished { session_id }));
    }

    #[tokio::test]
    async fn test_failure_at_normal_rate_skips_without_retry() {
        let mut h = harness();
        h.controller
            .start("Primera frase. Segunda frase.", StartOptions::default())
            .await;

        let (_, responder) = next_request(&mut h.requests).await;
        responder
            .send(Err(SpeechError::UtteranceFailed("interrupted".into())))
            .unwrap();

        let (next, responder) = next_request(&mut h.requests).await;
        assert_eq!(next.text, "Segunda frase.");
        assert_eq!(next.rate, 1.0);
        responder.send(Ok(())).unwrap();

        tokio::time::timeout(Duration::from_secs(1), h.controller.wait_until_idle())
            .await
            .expect("session should complete");
    }

    #[tokio::test]
    async fn test_utterance_uses_selected_voice_and_language() {
        let mut h = harness();
        let outcome = h.controller.start("Hola.", StartOptions::default()).await;
        match outcome {
            StartOutcome::Started { voice, .. } => {
                assert_eq!(voice.unwrap().name, "Google español de Estados Unidos");
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let (request, responder) = next_request(&mut h.requests).await;
        assert_eq!(request.lang, "es-US");
        assert_eq!(
            request.voice.as_ref().map(|v| v.name.as_str()),
            Some("Google español de Estados Unidos")
        );
        responder.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_saved_voice_preference_wins() {
        let mut h = harness();
        h.preferences.set_preferred_voice(Some("Jorge"));
        h.controller.start("Hola.", StartOptions::default()).await;

        let (request, responder) = next_request(&mut h.requests).await;
        assert_eq!(request.voice.unwrap().name, "Jorge");
        assert_eq!(request.lang, "es-ES");
        responder.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_plays_with_engine_default_when_catalog_empty() {
        let mut h = harness_with(true, Vec::new());
        let outcome = h.controller.start("Hola.", StartOptions::default()).await;
        assert!(matches!(outcome, StartOutcome::Started { voice: None, .. }));

        let (request, responder) = next_request(&mut h.requests).await;
        assert!(request.voice.is_none());
        assert_eq!(request.lang, "es");
        responder.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_rate_preference_is_applied() {
        let mut h = harness();
        h.preferences.set_rate(SpeedMultiplier::new(2.0));
        h.controller.start("Hola.", StartOptions::default()).await;

        let (request, responder) = next_request(&mut h.requests).await;
        assert_eq!(request.rate, 1.25);
        responder.send(Ok(())).unwrap();
    }

    #[tokio::test]
    async fn test_toggle_starts_then_stops() {
        let mut h = harness();
        let first = h.controller.toggle(THREE_SENTENCES, StartOptions::default()).await;
        assert!(matches!(first, ToggleOutcome::Start(StartOutcome::Started { .. })));
        let _pending = next_request(&mut h.requests).await;

        let second = h.controller.toggle(THREE_SENTENCES, StartOptions::default()).await;
        assert_eq!(second, ToggleOutcome::Stopped);
        assert!(!h.controller.is_playing());
    }

    #[tokio::test]
    async fn test_voices_for_language_ranked() {
        let h = harness();
        let names: Vec<String> = h
            .controller
            .voices_for_language("es")
            .await
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["Google español de Estados Unidos", "Jorge"]);
        assert_eq!(h.controller.available_voices().len(), 3);
    }

    #[tokio::test]
    async fn test_stop_while_waiting_for_voices_cancels_start() {
        let mut h = build_harness(true, Vec::new(), &[200, 200], Duration::ZERO);

        let (outcome, ()) = tokio::join!(
            h.controller.start(THREE_SENTENCES, StartOptions::default()),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                assert!(h.controller.is_playing());
                h.controller.stop().await;
                assert!(!h.controller.is_playing());
            }
        );

        assert_eq!(outcome, StartOutcome::Cancelled);
        assert!(!h.controller.is_playing());
        assert!(!*h.controller.subscribe_playing().borrow());
        settle().await;
        assert!(h.requests.try_recv().is_err());
        assert!(drain(&mut h.events).is_empty());
        assert_eq!(h.engine.cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_toggle_while_waiting_for_voices_stops() {
        let mut h = build_harness(true, Vec::new(), &[200, 200], Duration::ZERO);

        let (outcome, toggled) = tokio::join!(
            h.controller.start(THREE_SENTENCES, StartOptions::default()),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                h.controller
                    .toggle(THREE_SENTENCES, StartOptions::default())
                    .await
            }
        );

        assert_eq!(outcome, StartOutcome::Cancelled);
        assert_eq!(toggled, ToggleOutcome::Stopped);
        assert!(!h.controller.is_playing());
        settle().await;
        assert!(h.requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_waits_for_engine_cancel() {
        let mut h = build_harness(true, spanish_voices(), &[5], Duration::from_millis(30));
        h.controller.start(THREE_SENTENCES, StartOptions::default()).await;
        let _pending = next_request(&mut h.requests).await;

        h.controller.stop().await;
        assert_eq!(h.engine.calls(), vec!["speak", "cancel"]);
    }

    #[tokio::test]
    async fn test_superseding_session_speaks_after_engine_cancel() {
        let mut h = build_harness(true, spanish_voices(), &[5], Duration::from_millis(30));
        h.controller.start(THREE_SENTENCES, StartOptions::default()).await;
        let _old = next_request(&mut h.requests).await;

        h.controller.start("Otra cosa.", StartOptions::default()).await;
        let (request, responder) = next_request(&mut h.requests).await;
        assert_eq!(request.text, "Otra cosa.");
        assert_eq!(h.engine.calls(), vec!["speak", "cancel", "speak"]);
        responder.send(Ok(())).unwrap();
    }
}
