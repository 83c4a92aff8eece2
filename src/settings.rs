//! Per-room settings persistence.
//!
//! Settings live in a single JSON object keyed by room id. Saves go through a
//! temp file that is renamed over the original, and a store that fails to
//! parse is moved aside to `<file>.backup` before starting over empty.

use async_trait::async_trait;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::error::{GameError, GameResult};
use crate::types::{GameSettings, RoomId, SettingsUpdate};

/// Source of per-room settings
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Settings for a room, creating and persisting defaults on first access
    async fn get_settings(&self, room_id: &RoomId) -> GameSettings;

    /// Validate and persist a partial update, returning the new settings
    async fn update_settings(
        &self,
        room_id: &RoomId,
        update: &SettingsUpdate,
    ) -> GameResult<GameSettings>;
}

/// JSON file backed settings store
pub struct JsonConfigStore {
    path: PathBuf,
    settings: RwLock<HashMap<RoomId, GameSettings>>,
}

impl JsonConfigStore {
    /// Open (or create) the store at `path`. Never fails: unreadable or
    /// corrupted files degrade to an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let settings = load_settings(&path).await;
        tracing::info!(
            "Loaded settings for {} rooms from {}",
            settings.len(),
            path.display()
        );
        Self {
            path,
            settings: RwLock::new(settings),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, settings: &HashMap<RoomId, GameSettings>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(settings)?;
        let temp = sibling_path(&self.path, ".temp");
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn get_settings(&self, room_id: &RoomId) -> GameSettings {
        if let Some(settings) = self.settings.read().await.get(room_id) {
            return settings.clone();
        }

        let mut all = self.settings.write().await;
        if let Some(settings) = all.get(room_id) {
            return settings.clone();
        }
        let defaults = GameSettings::default();
        all.insert(room_id.clone(), defaults.clone());
        if let Err(e) = self.save(&all).await {
            tracing::warn!("Failed to persist default settings for {}: {}", room_id, e);
        }
        defaults
    }

    async fn update_settings(
        &self,
        room_id: &RoomId,
        update: &SettingsUpdate,
    ) -> GameResult<GameSettings> {
        let mut all = self.settings.write().await;
        let current = all.get(room_id).cloned().unwrap_or_default();
        let next = update.apply(&current).map_err(GameError::Validation)?;

        let mut staged = all.clone();
        staged.insert(room_id.clone(), next.clone());
        self.save(&staged)
            .await
            .map_err(|e| GameError::Storage(e.to_string()))?;
        *all = staged;

        tracing::info!("Updated settings for room {}: {:?}", room_id, next);
        Ok(next)
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

async fn load_settings(path: &Path) -> HashMap<RoomId, GameSettings> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Err(e) = tokio::fs::write(path, "{}").await {
                tracing::warn!("Could not create settings file {}: {}", path.display(), e);
            }
            return HashMap::new();
        }
        Err(e) => {
            tracing::error!("Error loading settings file {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    let entries: HashMap<RoomId, serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            let backup = sibling_path(path, ".backup");
            tracing::warn!(
                "Settings file {} is corrupted ({}), moving it to {}",
                path.display(),
                e,
                backup.display()
            );
            if let Err(e) = tokio::fs::rename(path, &backup).await {
                tracing::error!("Failed to back up corrupted settings: {}", e);
            }
            if let Err(e) = tokio::fs::write(path, "{}").await {
                tracing::error!("Failed to recreate settings file: {}", e);
            }
            return HashMap::new();
        }
    };

    entries
        .into_iter()
        .map(|(room_id, value)| {
            let settings = serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("Invalid settings for room {}, using defaults: {}", room_id, e);
                GameSettings::default()
            });
            (room_id, settings)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_are_created_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_config.json");
        let store = JsonConfigStore::open(&path).await;

        let settings = store.get_settings(&"room-1".to_string()).await;
        assert_eq!(settings, GameSettings::default());

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: HashMap<String, GameSettings> = serde_json::from_str(&raw).unwrap();
        assert!(parsed.contains_key("room-1"));
    }

    #[tokio::test]
    async fn test_update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_config.json");
        let room = "room-1".to_string();

        {
            let store = JsonConfigStore::open(&path).await;
            let update = SettingsUpdate {
                rounds: Some(5),
                multiple_imposters: Some(true),
                ..Default::default()
            };
            let next = store.update_settings(&room, &update).await.unwrap();
            assert_eq!(next.rounds, 5);
        }

        let reopened = JsonConfigStore::open(&path).await;
        let settings = reopened.get_settings(&room).await;
        assert_eq!(settings.rounds, 5);
        assert!(settings.multiple_imposters);
        assert!(!sibling_path(&path, ".temp").exists());
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::open(dir.path().join("cfg.json")).await;
        let room = "room-1".to_string();

        store
            .update_settings(
                &room,
                &SettingsUpdate {
                    min_players: Some(2),
                    max_players: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let result = store
            .update_settings(
                &room,
                &SettingsUpdate {
                    min_players: Some(5),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(GameError::Validation(_))));

        let settings = store.get_settings(&room).await;
        assert_eq!(settings.min_players, 2);
        assert_eq!(settings.max_players, 3);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonConfigStore::open(&path).await;
        assert_eq!(
            store.get_settings(&"r".to_string()).await,
            GameSettings::default()
        );

        let backup = sibling_path(&path, ".backup");
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_invalid_room_entry_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(
            &path,
            r#"{"good": {"rounds": 4}, "bad": {"rounds": "many"}}"#,
        )
        .unwrap();

        let store = JsonConfigStore::open(&path).await;
        assert_eq!(store.get_settings(&"good".to_string()).await.rounds, 4);
        assert_eq!(
            store.get_settings(&"bad".to_string()).await,
            GameSettings::default()
        );
    }
}
