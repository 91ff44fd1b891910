//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Voice Context: 音色挑选
//! - Playback Context: 朗读会话状态机与语速
//!
//! 以及共享的文本分块器

pub mod playback;
pub mod voice;

mod text_chunker;

pub use text_chunker::{
    chunk_text, chunk_text_default, normalize_whitespace, ChunkConfig, DEFAULT_MAX_CHARS,
};
