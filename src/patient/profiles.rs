use log::{info, warn};

use crate::error::ProfileError;
use crate::patient::types::{PatientProfile, StoredProfile};
use crate::store::settings::SettingsStore;
use crate::store::types::{profile_key, KEY_PATIENT_DATA, KEY_SAVED_PROFILES};

/// Named snapshots of patient data. The list lives under `savedProfiles`, each body under
/// `profile_<name>`; both are always written together.
pub struct ProfileBook {
    store: SettingsStore,
}

impl ProfileBook {
    pub fn new(store: SettingsStore) -> Self {
        ProfileBook { store }
    }

    async fn stored_names(&self) -> Vec<String> {
        match self.store.get_json::<Vec<String>>(KEY_SAVED_PROFILES).await {
            Ok(names) => names.unwrap_or_default(),
            Err(err) => {
                warn!("Saved profile list is unreadable: {}", err);
                vec![]
            },
        }
    }

    async fn body(&self, name: &str) -> Option<StoredProfile> {
        match self.store.get_json::<StoredProfile>(&profile_key(name)).await {
            Ok(body) => body,
            Err(err) => {
                warn!("Profile {:?} is unreadable: {}", name, err);
                None
            },
        }
    }

    /// Names whose body is missing or unreadable are left out.
    pub async fn list(&self) -> Vec<String> {
        let mut names = vec![];
        for name in self.stored_names().await {
            if self.body(&name).await.is_some() {
                names.push(name);
            } else {
                warn!("Profile {:?} has no stored data, ignoring it", name);
            }
        }
        names
    }

    pub async fn save(&self, name: &str) -> Result<(), ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyProfileName);
        }

        let data: PatientProfile = self.store.get_json(KEY_PATIENT_DATA).await?
            .ok_or(ProfileError::NoPatientData)?;

        let body = serde_json::to_string(&StoredProfile { name: name.to_string(), data })
            .map_err(|source| ProfileError::Store { source: source.into() })?;

        let mut names = self.stored_names().await;
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
        let names = serde_json::to_string(&names)
            .map_err(|source| ProfileError::Store { source: source.into() })?;

        self.store.update(|content| {
            content.insert(profile_key(name), body);
            content.insert(KEY_SAVED_PROFILES.to_string(), names);
        }).await?;

        info!("Saved profile {:?}", name);
        Ok(())
    }

    /// Makes the profile's data the current patient data.
    pub async fn load(&self, name: &str) -> Result<PatientProfile, ProfileError> {
        let body = self.body(name).await
            .ok_or_else(|| ProfileError::ProfileNotFound { name: name.to_string() })?;

        self.store.set_json(KEY_PATIENT_DATA, &body.data).await?;
        info!("Loaded profile {:?}", name);
        Ok(body.data)
    }

    pub async fn delete(&self, name: &str) -> Result<(), ProfileError> {
        let names: Vec<String> = self.stored_names().await
            .into_iter()
            .filter(|existing| existing != name)
            .collect();
        let names = serde_json::to_string(&names)
            .map_err(|source| ProfileError::Store { source: source.into() })?;

        self.store.update(|content| {
            content.insert(KEY_SAVED_PROFILES.to_string(), names);
            content.remove(&profile_key(name));
        }).await?;

        info!("Deleted profile {:?}", name);
        Ok(())
    }
}
