//! Speech Engine Adapters - 语音引擎实现

mod http_speech_engine;
mod simulated_speech_engine;

pub use http_speech_engine::{HttpSpeechEngine, HttpSpeechEngineConfig};
pub use simulated_speech_engine::{SimulatedSpeechEngine, SimulatedSpeechEngineConfig};
