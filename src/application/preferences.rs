//! 朗读偏好设置
//!
//! 音色名称、语言、倍速的读写。持久化是尽力而为的：读写失败只记录日志，
//! 读取失败时使用默认值。

use std::sync::Arc;

use crate::application::ports::PreferenceStorePort;
use crate::domain::playback::SpeedMultiplier;

/// 已保存的音色名称
pub const VOICE_KEY: &str = "tts_pref_voice";
/// 朗读语言
pub const LANGUAGE_KEY: &str = "tts_lang_pref_v1";
/// 倍速
pub const RATE_KEY: &str = "tts_rate_v1";

/// 默认朗读语言
pub const DEFAULT_LANGUAGE: &str = "es";

/// 朗读偏好设置
pub struct SpeechPreferences {
    store: Arc<dyn PreferenceStorePort>,
    default_language: String,
}

impl SpeechPreferences {
    pub fn new(store: Arc<dyn PreferenceStorePort>, default_language: impl Into<String>) -> Self {
        let default_language = default_language.into();
        let default_language = if default_language.trim().is_empty() {
            DEFAULT_LANGUAGE.to_string()
        } else {
            default_language
        };
        Self {
            store,
            default_language,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 已保存的音色名称，未设置时为 `None`
    pub fn preferred_voice(&self) -> Option<String> {
        self.read(VOICE_KEY).filter(|name| !name.trim().is_empty())
    }

    /// 保存音色名称，`None` 表示清除
    pub fn set_preferred_voice(&self, name: Option<&str>) {
        self.write(VOICE_KEY, name.unwrap_or_default());
    }

    pub fn language(&self) -> String {
        self.read(LANGUAGE_KEY)
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| self.default_language.clone())
    }

    pub fn set_language(&self, language: &str) {
        let language = language.trim();
        let language = if language.is_empty() {
            self.default_language.as_str()
        } else {
            language
        };
        self.write(LANGUAGE_KEY, language);
    }

    pub fn rate(&self) -> SpeedMultiplier {
        self.read(RATE_KEY)
            .map(|raw| SpeedMultiplier::parse(&raw))
            .unwrap_or_default()
    }

    pub fn set_rate(&self, rate: SpeedMultiplier) {
        self.write(RATE_KEY, &rate.to_string());
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read preference, using default");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::warn!(key = %key, error = %e, "Failed to save preference");
        }
    }
}
