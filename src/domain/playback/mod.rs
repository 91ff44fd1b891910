//! Playback Context - 朗读会话
//!
//! 职责:
//! - 会话状态机（队列、游标、状态、代数）
//! - 用户倍速到引擎语速的映射

mod rate;
mod session;

pub use rate::{SpeedMultiplier, DEFAULT_SAFE_RETRY_RATE};
pub use session::{ChunkStep, NextStep, PlaybackSession, PlaybackStatus, SessionTicket};
