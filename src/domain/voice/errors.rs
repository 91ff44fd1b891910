//! Voice Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("无效的音色名称提示: {0}")]
    InvalidHint(String),
}
