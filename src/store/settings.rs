use std::sync::Arc;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::io::{StoreContent, StoreIO};
use crate::store::types::{
    bool_value, parse_bool, ConnectionState, MotorSettings, Preference, Preferences,
    KEY_BLUETOOTH_CONNECTED, KEY_CONNECTED_DEVICE_ID, KEY_CONNECTED_DEVICE_NAME,
    KEY_MOTOR_SETTINGS,
};

/// Key-value view over the store file. Reads are served from memory, every write goes
/// through to disk before it becomes visible.
#[derive(Clone)]
pub struct SettingsStore {
    io: StoreIO,
    content: Arc<Mutex<StoreContent>>,
}

impl SettingsStore {
    pub async fn load(io: StoreIO) -> Result<Self, StoreError> {
        let content = io.read().await?;
        Ok(SettingsStore {
            io,
            content: Arc::new(Mutex::new(content)),
        })
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.content.lock().await.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|content| {
            content.insert(key.to_string(), value.to_string());
        }).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|content| {
            content.remove(key);
        }).await
    }

    /// Applies any number of changes and persists them with a single write. If the write fails
    /// nothing changes in memory either.
    pub async fn update<F>(&self, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreContent),
    {
        let mut content = self.content.lock().await;
        let mut updated = content.clone();
        change(&mut updated);

        if updated == *content {
            return Ok(());
        }

        self.io.save(&updated).await?;
        *content = updated;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key).await {
            None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_string(value)?;
        self.set(key, &value).await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        let content = self.content.lock().await;
        let connected = parse_bool(content.get(KEY_BLUETOOTH_CONNECTED).map(String::as_str))
            .unwrap_or(false);

        ConnectionState {
            connected,
            device_id: content.get(KEY_CONNECTED_DEVICE_ID).cloned(),
            device_name: content.get(KEY_CONNECTED_DEVICE_NAME).cloned(),
        }
    }

    pub async fn save_connection(&self, state: &ConnectionState) -> Result<(), StoreError> {
        self.update(|content| {
            content.insert(KEY_BLUETOOTH_CONNECTED.to_string(), bool_value(state.connected));
            match &state.device_id {
                Some(id) => { content.insert(KEY_CONNECTED_DEVICE_ID.to_string(), id.clone()); },
                None => { content.remove(KEY_CONNECTED_DEVICE_ID); },
            }
            match &state.device_name {
                Some(name) => { content.insert(KEY_CONNECTED_DEVICE_NAME.to_string(), name.clone()); },
                None => { content.remove(KEY_CONNECTED_DEVICE_NAME); },
            }
        }).await
    }

    pub async fn clear_connection(&self) -> Result<(), StoreError> {
        self.save_connection(&ConnectionState::default()).await
    }

    pub async fn motor_settings(&self) -> MotorSettings {
        match self.get_json::<MotorSettings>(KEY_MOTOR_SETTINGS).await {
            Ok(Some(settings)) => settings,
            Ok(None) => MotorSettings::default(),
            Err(err) => {
                warn!("Stored motor settings are unreadable, using defaults: {}", err);
                MotorSettings::default()
            },
        }
    }

    pub async fn save_motor_settings(&self, settings: &MotorSettings) -> Result<(), StoreError> {
        self.set_json(KEY_MOTOR_SETTINGS, settings).await
    }

    pub async fn preferences(&self) -> Preferences {
        let defaults = Preferences::default();
        let content = self.content.lock().await;
        let read = |preference: Preference, default: bool| {
            parse_bool(content.get(preference.key()).map(String::as_str)).unwrap_or(default)
        };

        Preferences {
            auto_connect: read(Preference::AutoConnect, defaults.auto_connect),
            sound_enabled: read(Preference::SoundEnabled, defaults.sound_enabled),
            dark_mode: read(Preference::DarkMode, defaults.dark_mode),
        }
    }

    pub async fn set_preference(&self, preference: Preference, value: bool) -> Result<(), StoreError> {
        self.set(preference.key(), &bool_value(value)).await
    }

    pub async fn reset_preferences(&self) -> Result<(), StoreError> {
        let defaults = Preferences::default();
        self.update(|content| {
            content.insert(Preference::AutoConnect.key().to_string(), bool_value(defaults.auto_connect));
            content.insert(Preference::SoundEnabled.key().to_string(), bool_value(defaults.sound_enabled));
            content.insert(Preference::DarkMode.key().to_string(), bool_value(defaults.dark_mode));
        }).await
    }
}

#[cfg(test)]
pub(crate) async fn temp_store() -> (tempfile::TempDir, SettingsStore) {
    let dir = tempfile::tempdir().unwrap();
    let io = StoreIO::open(dir.path().join("store.json")).unwrap();
    let store = SettingsStore::load(io).await.unwrap();
    (dir, store)
}
