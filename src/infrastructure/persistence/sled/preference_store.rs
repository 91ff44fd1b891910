//! Sled-based Preference Store Implementation

use sled::Db;
use std::path::Path;

use crate::application::ports::{PreferenceError, PreferenceStorePort};

/// 偏好键前缀
const KEY_PREFIX: &str = "pref:";

/// Sled 偏好存储配置
#[derive(Debug, Clone)]
pub struct SledPreferenceConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledPreferenceConfig {
    fn default() -> Self {
        Self {
            db_path: "data/preferences.sled".to_string(),
        }
    }
}

/// Sled 偏好存储
pub struct SledPreferenceStore {
    db: Db,
}

impl SledPreferenceStore {
    /// 创建新的存储实例
    pub fn new(config: &SledPreferenceConfig) -> Result<Self, PreferenceError> {
        let db = sled::open(&config.db_path)
            .map_err(|e| PreferenceError::DatabaseError(e.to_string()))?;

        tracing::info!(
            db_path = %config.db_path,
            entries = db.scan_prefix(KEY_PREFIX).count(),
            "SledPreferenceStore initialized"
        );

        Ok(Self { db })
    }

    /// 打开现有存储
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PreferenceError> {
        let config = SledPreferenceConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
        };
        Self::new(&config)
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}

impl PreferenceStorePort for SledPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        let Some(value) = self
            .db
            .get(Self::storage_key(key))
            .map_err(|e| PreferenceError::DatabaseError(e.to_string()))?
        else {
            return Ok(None);
        };

        String::from_utf8(value.to_vec())
            .map(Some)
            .map_err(|e| PreferenceError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.db
            .insert(Self::storage_key(key), value.as_bytes())
            .map_err(|e| PreferenceError::DatabaseError(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| PreferenceError::DatabaseError(e.to_string()))?;
        tracing::debug!(key = %key, "Preference saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_missing_key() {
        let dir = tempdir().unwrap();
        let store = SledPreferenceStore::open(dir.path().join("prefs.sled")).unwrap();
        assert_eq!(store.get("tts_rate_v1").unwrap(), None);
    }

    #[test]
    fn test_set_and_overwrite() {
        let dir = tempdir().unwrap();
        let store = SledPreferenceStore::open(dir.path().join("prefs.sled")).unwrap();

        store.set("tts_pref_voice", "Paulina").unwrap();
        assert_eq!(store.get("tts_pref_voice").unwrap().as_deref(), Some("Paulina"));

        store.set("tts_pref_voice", "").unwrap();
        assert_eq!(store.get("tts_pref_voice").unwrap().as_deref(), Some(""));
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.sled");
        {
            let store = SledPreferenceStore::open(&path).unwrap();
            store.set("tts_lang_pref_v1", "es").unwrap();
            store.set("tts_rate_v1", "2").unwrap();
        }

        let store = SledPreferenceStore::open(&path).unwrap();
        assert_eq!(store.get("tts_lang_pref_v1").unwrap().as_deref(), Some("es"));
        assert_eq!(store.get("tts_rate_v1").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_invalid_utf8_is_reported() {
        let dir = tempdir().unwrap();
        let store = SledPreferenceStore::open(dir.path().join("prefs.sled")).unwrap();
        store
            .db
            .insert(SledPreferenceStore::storage_key("broken"), &[0xff, 0xfe][..])
            .unwrap();

        assert!(matches!(
            store.get("broken"),
            Err(PreferenceError::InvalidValue { .. })
        ));
    }
}
