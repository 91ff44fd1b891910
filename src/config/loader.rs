//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（lector.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, EngineKind, PreferenceBackend};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["lector", "lector.local"];

/// 可用逗号分隔列表形式通过环境变量设置的键
const LIST_KEYS: &[&str] = &[
    "speech.region_tags",
    "speech.name_hints",
    "speech.vendor_hints",
    "speech.voice_retry_delays_ms",
];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `LECTOR_`，层级分隔符 `__`）
/// 2. 配置文件（`config_path`，为 None 时搜索 lector.toml 或 lector.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `LECTOR_SPEECH__MAX_CHUNK_CHARS=180`
/// - `LECTOR_SPEECH__REGION_TAGS=es-US,es-MX`
/// - `LECTOR_ENGINE__KIND=http`
/// - `LECTOR_ENGINE__URL=http://tts-server:8000`
/// - `LECTOR_PREFERENCES__BACKEND=memory`
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级），列表项由 serde 默认值补齐
    builder = builder
        .set_default("speech.max_chunk_chars", 200)?
        .set_default("speech.default_lang", "es")?
        .set_default("speech.safe_retry_rate", 1.2)?
        .set_default("engine.kind", "simulated")?
        .set_default("engine.url", "http://localhost:8000")?
        .set_default("engine.timeout_secs", 120)?
        .set_default("engine.ms_per_char", 60)?
        .set_default("preferences.backend", "sled")?
        .set_default("preferences.path", "data/preferences.sled")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: LECTOR_
    // 层级分隔符: __ (双下划线)
    // 注意: 环境变量名会被转换为小写
    let mut environment = Environment::with_prefix("LECTOR")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .try_parsing(true);
    for key in LIST_KEYS {
        environment = environment.with_list_parse_key(key);
    }
    builder = builder.add_source(environment);

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.speech.max_chunk_chars == 0 {
        return Err(ConfigError::ValidationError(
            "Max chunk chars must be greater than 0".to_string(),
        ));
    }

    if config.speech.default_lang.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Default language cannot be empty".to_string(),
        ));
    }

    if !(config.speech.safe_retry_rate > 0.0) {
        return Err(ConfigError::ValidationError(
            "Safe retry rate must be greater than 0".to_string(),
        ));
    }

    if config.engine.kind == EngineKind::Http && config.engine.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Engine URL cannot be empty for the http engine".to_string(),
        ));
    }

    if config.preferences.backend == PreferenceBackend::Sled
        && config.preferences.path.trim().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "Preferences path cannot be empty for the sled backend".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Max Chunk Chars: {}", config.speech.max_chunk_chars);
    tracing::info!("Default Language: {}", config.speech.default_lang);
    tracing::info!("Region Tags: {:?}", config.speech.region_tags);
    tracing::info!("Safe Retry Rate: {}", config.speech.safe_retry_rate);
    tracing::info!("Voice Retry Delays: {:?}ms", config.speech.voice_retry_delays_ms);
    tracing::info!("Engine: {:?}", config.engine.kind);
    match config.engine.kind {
        EngineKind::Http => {
            tracing::info!("Engine URL: {}", config.engine.url);
            tracing::info!("Engine Timeout: {}s", config.engine.timeout_secs);
        }
        EngineKind::Simulated => {
            tracing::info!("Simulated ms/char: {}", config.engine.ms_per_char);
        }
    }
    tracing::info!("Preferences: {:?}", config.preferences.backend);
    if config.preferences.backend == PreferenceBackend::Sled {
        tracing::info!("Preferences Path: {}", config.preferences.path);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_chunk_size() {
        let mut config = AppConfig::default();
        config.speech.max_chunk_chars = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_language() {
        let mut config = AppConfig::default();
        config.speech.default_lang = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_bad_retry_rate() {
        let mut config = AppConfig::default();
        config.speech.safe_retry_rate = 0.0;
        assert!(validate_config(&config).is_err());
        config.speech.safe_retry_rate = f32::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_http_without_url() {
        let mut config = AppConfig::default();
        config.engine.url = String::new();
        assert!(validate_config(&config).is_ok());
        config.engine.kind = EngineKind::Http;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_sled_without_path() {
        let mut config = AppConfig::default();
        config.preferences.path = String::new();
        assert!(validate_config(&config).is_err());
        config.preferences.backend = PreferenceBackend::Memory;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[speech]
max_chunk_chars = 180
region_tags = ["es-MX"]

[engine]
kind = "simulated"
fail_above_rate = 1.5
voices = [{{ name = "Paulina", lang = "es-MX" }}]

[preferences]
backend = "memory"
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.speech.max_chunk_chars, 180);
        assert_eq!(config.speech.region_tags, vec!["es-MX".to_string()]);
        assert_eq!(config.speech.default_lang, "es");
        assert_eq!(config.speech.voice_retry_delays_ms, vec![300, 1200]);
        assert_eq!(config.engine.fail_above_rate, Some(1.5));
        assert_eq!(config.engine.voices.len(), 1);
        assert_eq!(config.preferences.backend, PreferenceBackend::Memory);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[speech]\nmax_chunk_chars = 0").unwrap();
        assert!(matches!(
            load_config_from_path(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(load_config_from_path(Some(&missing)).is_err());
    }
}
