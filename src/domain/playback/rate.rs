//! Playback Context - 语速

use serde::{Deserialize, Serialize};

/// 失败重试时使用的保守语速
pub const DEFAULT_SAFE_RETRY_RATE: f32 = 1.2;

const MIN_MULTIPLIER: f32 = 0.5;
const MAX_MULTIPLIER: f32 = 4.0;

/// 用户选择的倍速（1x / 2x / 4x ...）
///
/// 不变量: 值在 0.5 ~ 4.0 之间
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedMultiplier(f32);

impl SpeedMultiplier {
    /// 非法值（NaN、非正数）回退为 1x，其余截断到合法区间
    pub fn new(value: f32) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::default();
        }
        Self(value.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER))
    }

    /// 解析偏好设置里保存的字符串
    pub fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<f32>()
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// 引擎实际语速
    ///
    /// 引擎超过 ~1.6 后不可靠，因此高倍速被压缩：
    /// 4x -> 1.6，2x -> 1.25，其余 -> 1.0
    pub fn effective_rate(&self) -> f32 {
        if self.0 >= 3.5 {
            1.6
        } else if self.0 >= 1.5 {
            1.25
        } else {
            1.0
        }
    }
}

impl Default for SpeedMultiplier {
    fn default() -> Self {
        Self(1.0)
    }
}

impl std::fmt::Display for SpeedMultiplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
