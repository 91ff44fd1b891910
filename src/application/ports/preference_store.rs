//! Preference Store Port - 偏好设置键值存储
//!
//! 同步的字符串 get/set，对应浏览器 localStorage。
//! 具体实现在 infrastructure/persistence (Sled) 与 infrastructure/memory 层

use thiserror::Error;

/// 偏好存储错误
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Preference Store Port
pub trait PreferenceStorePort: Send + Sync {
    /// 读取键值，不存在时返回 `None`
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError>;

    /// 写入键值
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}
