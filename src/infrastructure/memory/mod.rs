//! Memory Layer - In-Memory State Management
//!
//! 进程内偏好存储，用于测试和不需要持久化的运行

mod preference_store;

pub use preference_store::InMemoryPreferenceStore;
