//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod events;
pub mod memory;
pub mod persistence;

pub use adapters::{
    HttpSpeechEngine, HttpSpeechEngineConfig, SimulatedSpeechEngine, SimulatedSpeechEngineConfig,
};
pub use events::{EventPublisher, PlaybackEvent, StopReason};
pub use memory::InMemoryPreferenceStore;
pub use persistence::{SledPreferenceConfig, SledPreferenceStore};
