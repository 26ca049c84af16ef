use log::{info, warn};

use crate::error::SessionError;
use crate::motor::types::{MotorCommand, MotorSetting, OperationalStatus, SETTING_MAX, SETTING_MIN};
use crate::store::settings::SettingsStore;
use crate::store::types::MotorSettings;

pub struct MotorSession {
    store: SettingsStore,
    settings: MotorSettings,
    status: OperationalStatus,
}

impl MotorSession {
    pub async fn load(store: SettingsStore) -> Self {
        let settings = store.motor_settings().await;

        MotorSession {
            store,
            settings,
            status: OperationalStatus::Idle,
        }
    }

    pub fn status(&self) -> OperationalStatus {
        self.status
    }

    pub fn settings(&self) -> MotorSettings {
        self.settings
    }

    // Commands are only logged; the firmware command set is not defined yet.
    fn transmit(&self, command: MotorCommand) -> MotorCommand {
        info!("Motor command: {}", command);
        command
    }

    /// Refused unless the persisted connection state says a device is linked.
    pub async fn start(&mut self) -> Result<MotorCommand, SessionError> {
        if !self.store.connection_state().await.connected {
            return Err(SessionError::NotConnected);
        }

        self.status = OperationalStatus::Running;
        Ok(self.transmit(MotorCommand::Start {
            speed: self.settings.speed,
            step_distance: self.settings.step_distance,
        }))
    }

    /// Only a running motor can be paused, otherwise nothing happens.
    pub fn pause(&mut self) -> Option<MotorCommand> {
        if self.status != OperationalStatus::Running {
            return None;
        }

        self.status = OperationalStatus::Paused;
        Some(self.transmit(MotorCommand::Pause))
    }

    pub fn stop(&mut self) -> MotorCommand {
        self.status = OperationalStatus::Idle;
        self.transmit(MotorCommand::Stop)
    }

    pub fn get(&self, setting: MotorSetting) -> u8 {
        match setting {
            MotorSetting::Speed => self.settings.speed,
            MotorSetting::StepDistance => self.settings.step_distance,
        }
    }

    /// Moves a setting by one unit. A step that would leave [SETTING_MIN, SETTING_MAX] is
    /// refused and `false` is returned.
    pub async fn step(&mut self, setting: MotorSetting, up: bool) -> bool {
        let current = self.get(setting);
        let next = if up { current.checked_add(1) } else { current.checked_sub(1) };

        match next {
            Some(value) if (SETTING_MIN..=SETTING_MAX).contains(&value) => {
                self.apply(setting, value).await;
                true
            },
            _ => false,
        }
    }

    pub async fn set(&mut self, setting: MotorSetting, value: i64) -> Result<(), SessionError> {
        if value < SETTING_MIN as i64 || value > SETTING_MAX as i64 {
            return Err(SessionError::OutOfRange {
                what: setting.label(),
                value,
                min: SETTING_MIN,
                max: SETTING_MAX,
            });
        }

        self.apply(setting, value as u8).await;
        Ok(())
    }

    async fn apply(&mut self, setting: MotorSetting, value: u8) {
        match setting {
            MotorSetting::Speed => self.settings.speed = value,
            MotorSetting::StepDistance => self.settings.step_distance = value,
        }

        if let Err(err) = self.store.save_motor_settings(&self.settings).await {
            warn!("Failed to save motor settings: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::settings::temp_store;
    use crate::store::types::{ConnectionState, KEY_MOTOR_SETTINGS};

    #[tokio::test]
    async fn start_requires_a_connected_device() {
        let (_dir, store) = temp_store().await;
        let mut session = MotorSession::load(store.clone()).await;

        assert!(matches!(session.start().await, Err(SessionError::NotConnected)));
        assert_eq!(session.status(), OperationalStatus::Idle);

        store.save_connection(&ConnectionState::connected("id-1", "ESP32-A")).await.unwrap();
        assert_eq!(
            session.start().await.unwrap(),
            MotorCommand::Start { speed: 50, step_distance: 50 }
        );
        assert_eq!(session.status(), OperationalStatus::Running);
    }

    #[tokio::test]
    async fn pause_only_from_running_and_stop_always_idles() {
        let (_dir, store) = temp_store().await;
        store.save_connection(&ConnectionState::connected("id-1", "ESP32-A")).await.unwrap();
        let mut session = MotorSession::load(store).await;

        assert_eq!(session.pause(), None);
        assert_eq!(session.status(), OperationalStatus::Idle);

        session.start().await.unwrap();
        assert_eq!(session.pause(), Some(MotorCommand::Pause));
        assert_eq!(session.pause(), None);
        assert_eq!(session.status(), OperationalStatus::Paused);

        session.start().await.unwrap();
        assert_eq!(session.status(), OperationalStatus::Running);

        assert_eq!(session.stop(), MotorCommand::Stop);
        assert_eq!(session.stop(), MotorCommand::Stop);
        assert_eq!(session.status(), OperationalStatus::Idle);
    }

    #[tokio::test]
    async fn steps_stop_at_the_bounds_and_persist() {
        let (_dir, store) = temp_store().await;
        let mut session = MotorSession::load(store.clone()).await;

        session.set(MotorSetting::Speed, 100).await.unwrap();
        assert!(!session.step(MotorSetting::Speed, true).await);
        assert_eq!(session.get(MotorSetting::Speed), 100);

        session.set(MotorSetting::StepDistance, 1).await.unwrap();
        assert!(!session.step(MotorSetting::StepDistance, false).await);
        assert!(session.step(MotorSetting::StepDistance, true).await);

        assert_eq!(
            store.get(KEY_MOTOR_SETTINGS).await.as_deref(),
            Some(r#"{"speed":100,"stepDistance":2}"#)
        );
    }

    #[tokio::test]
    async fn out_of_range_values_are_rejected() {
        let (_dir, store) = temp_store().await;
        let mut session = MotorSession::load(store).await;

        assert!(matches!(
            session.set(MotorSetting::Speed, 0).await,
            Err(SessionError::OutOfRange { value: 0, .. })
        ));
        assert!(session.set(MotorSetting::StepDistance, 101).await.is_err());
        assert_eq!(session.settings(), MotorSettings::default());
    }

    #[tokio::test]
    async fn settings_are_restored_on_load() {
        let (_dir, store) = temp_store().await;
        {
            let mut session = MotorSession::load(store.clone()).await;
            session.set(MotorSetting::Speed, 7).await.unwrap();
        }

        let session = MotorSession::load(store).await;
        assert_eq!(session.settings(), MotorSettings { speed: 7, step_distance: 50 });
    }
}
