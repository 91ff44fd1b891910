//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SpeechEngine、PreferenceStore）
//! - preferences: 朗读偏好设置读写
//! - voice_catalog: 音色目录就绪等待
//! - playback_controller: 朗读会话控制

pub mod playback_controller;
pub mod ports;
pub mod preferences;
pub mod voice_catalog;

// Re-exports
pub use playback_controller::{
    PlaybackController, PlaybackSettings, StartOptions, StartOutcome, ToggleOutcome,
};

pub use ports::{
    // Preference store
    PreferenceError,
    PreferenceStorePort,
    // Speech engine
    SpeechEnginePort,
    SpeechError,
    UtteranceRequest,
};

pub use preferences::{SpeechPreferences, DEFAULT_LANGUAGE, LANGUAGE_KEY, RATE_KEY, VOICE_KEY};
pub use voice_catalog::{wait_for_voices, CatalogRetryPolicy};
