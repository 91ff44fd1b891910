//! Voice Context - 音色限界上下文
//!
//! 职责:
//! - 音色描述（由宿主语音引擎枚举，只读）
//! - 按语言/地区/名称提示对音色排序并挑选最佳音色

mod errors;
mod selector;
mod value_objects;

pub use errors::VoiceError;
pub use selector::{SelectionStage, VoiceMatch, VoiceQuery, VoiceSelector};
pub use value_objects::VoiceDescriptor;
