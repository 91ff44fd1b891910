//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

use crate::domain::voice::VoiceDescriptor;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 朗读配置
    #[serde(default)]
    pub speech: SpeechConfig,

    /// 语音引擎配置
    #[serde(default)]
    pub engine: EngineConfig,

    /// 偏好存储配置
    #[serde(default)]
    pub preferences: PreferencesConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 朗读配置
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// 单个片段的最大字符数
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// 未保存语言偏好时使用的语言
    #[serde(default = "default_lang")]
    pub default_lang: String,

    /// 优先的地区标签
    #[serde(default = "default_region_tags")]
    pub region_tags: Vec<String>,

    /// 音色名称中的地区提示词
    #[serde(default = "default_name_hints")]
    pub name_hints: Vec<String>,

    /// 优先的厂商名
    #[serde(default = "default_vendor_hints")]
    pub vendor_hints: Vec<String>,

    /// 片段失败后的重试语速
    #[serde(default = "default_safe_retry_rate")]
    pub safe_retry_rate: f32,

    /// 音色目录为空时的重试间隔（毫秒）
    #[serde(default = "default_voice_retry_delays_ms")]
    pub voice_retry_delays_ms: Vec<u64>,
}

fn default_max_chunk_chars() -> usize {
    200
}

fn default_lang() -> String {
    "es".to_string()
}

fn default_region_tags() -> Vec<String> {
    vec!["es-US".to_string()]
}

fn default_name_hints() -> Vec<String> {
    ["US", "Estados Unidos", "United States"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_vendor_hints() -> Vec<String> {
    ["Google", "Microsoft", "Apple"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_safe_retry_rate() -> f32 {
    1.2
}

fn default_voice_retry_delays_ms() -> Vec<u64> {
    vec![300, 1200]
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            default_lang: default_lang(),
            region_tags: default_region_tags(),
            name_hints: default_name_hints(),
            vendor_hints: default_vendor_hints(),
            safe_retry_rate: default_safe_retry_rate(),
            voice_retry_delays_ms: default_voice_retry_delays_ms(),
        }
    }
}

/// 语音引擎类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// 进程内模拟引擎
    #[default]
    Simulated,
    /// 外部 HTTP 语音服务
    Http,
}

/// 静态音色目录条目
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceEntry {
    pub name: String,
    pub lang: String,
    #[serde(default)]
    pub vendor: Option<String>,
}

impl From<&VoiceEntry> for VoiceDescriptor {
    fn from(entry: &VoiceEntry) -> Self {
        let voice = VoiceDescriptor::new(entry.name.clone(), entry.lang.clone());
        match &entry.vendor {
            Some(vendor) => voice.with_vendor(vendor.clone()),
            None => voice,
        }
    }
}

/// 语音引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,

    /// HTTP 语音服务基础 URL
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,

    /// 模拟引擎：1.0 语速下每字符时长（毫秒）
    #[serde(default = "default_ms_per_char")]
    pub ms_per_char: u64,

    /// 模拟引擎：语速高于该值时朗读失败
    #[serde(default)]
    pub fail_above_rate: Option<f32>,

    /// 模拟引擎：静态音色目录，为空时使用内置目录
    #[serde(default)]
    pub voices: Vec<VoiceEntry>,
}

fn default_engine_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_engine_timeout() -> u64 {
    120
}

fn default_ms_per_char() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            url: default_engine_url(),
            timeout_secs: default_engine_timeout(),
            ms_per_char: default_ms_per_char(),
            fail_above_rate: None,
            voices: Vec::new(),
        }
    }
}

/// 偏好存储后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceBackend {
    #[default]
    Sled,
    Memory,
}

/// 偏好存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default)]
    pub backend: PreferenceBackend,

    /// Sled 数据库路径
    #[serde(default = "default_preferences_path")]
    pub path: String,
}

fn default_preferences_path() -> String {
    "data/preferences.sled".to_string()
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            backend: PreferenceBackend::default(),
            path: default_preferences_path(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
