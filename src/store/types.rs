use serde::{Deserialize, Serialize};

pub const KEY_CONNECTED_DEVICE_ID: &str = "connectedDeviceId";
pub const KEY_BLUETOOTH_CONNECTED: &str = "bluetoothConnected";
pub const KEY_CONNECTED_DEVICE_NAME: &str = "connectedDeviceName";
pub const KEY_PATIENT_DATA: &str = "patientData";
pub const KEY_MOTOR_SETTINGS: &str = "motorSettings";
pub const KEY_AUTO_CONNECT: &str = "autoConnect";
pub const KEY_SOUND_ENABLED: &str = "soundEnabled";
pub const KEY_DARK_MODE: &str = "darkMode";
pub const KEY_SAVED_PROFILES: &str = "savedProfiles";
pub const PROFILE_KEY_PREFIX: &str = "profile_";

pub fn profile_key(name: &str) -> String {
    format!("{}{}", PROFILE_KEY_PREFIX, name)
}

pub fn bool_value(value: bool) -> String {
    value.to_string()
}

/// Anything other than the literal "true" is false.
pub fn parse_bool(value: Option<&str>) -> Option<bool> {
    value.map(|v| v == "true")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

impl ConnectionState {
    pub fn connected(device_id: &str, device_name: &str) -> Self {
        ConnectionState {
            connected: true,
            device_id: Some(device_id.to_string()),
            device_name: Some(device_name.to_string()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotorSettings {
    pub speed: u8,
    pub step_distance: u8,
}

impl Default for MotorSettings {
    fn default() -> Self {
        MotorSettings {
            speed: 50,
            step_distance: 50,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub auto_connect: bool,
    pub sound_enabled: bool,
    pub dark_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            auto_connect: false,
            sound_enabled: true,
            dark_mode: false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Preference {
    AutoConnect,
    SoundEnabled,
    DarkMode,
}

impl Preference {
    pub fn key(&self) -> &'static str {
        match self {
            Preference::AutoConnect => KEY_AUTO_CONNECT,
            Preference::SoundEnabled => KEY_SOUND_ENABLED,
            Preference::DarkMode => KEY_DARK_MODE,
        }
    }
}

impl std::fmt::Display for Preference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Preference::AutoConnect => "auto-connect",
            Preference::SoundEnabled => "sound",
            Preference::DarkMode => "dark-mode",
        };

        write!(f, "{}", result)
    }
}
