//! Lector - 文本朗读播放
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Text Chunker: 文本分块
//! - Voice Context: 音色挑选
//! - Playback Context: 朗读会话状态机与语速映射
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechEngine, PreferenceStore）
//! - PlaybackController: 朗读会话编排
//! - SpeechPreferences: 偏好设置
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: 模拟引擎、HTTP 语音服务
//! - Memory: 内存偏好存储
//! - Persistence: Sled 偏好存储
//! - Events: 朗读事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config_from_path, AppConfig};
