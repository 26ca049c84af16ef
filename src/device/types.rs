use indexmap::IndexMap;

use crate::device::constants::DEVICE_NAME_MARKER;

/// One advertisement as reported by the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub id: String,
    pub name: Option<String>,
}

impl Advertisement {
    /// The name, if this advertisement comes from the stepper controller.
    pub fn target_name(&self) -> Option<&str> {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() && name.contains(DEVICE_NAME_MARKER) => Some(name),
            _ => None,
        }
    }
}

/// A platform handle together with what is known about it.
#[derive(Debug, Clone)]
pub struct KnownPeripheral<H> {
    pub id: String,
    pub name: Option<String>,
    pub handle: H,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub connected: bool,
}

/// Devices seen during the current scan, in discovery order. The first advertisement for an
/// id wins, later ones for the same id are ignored.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredDevices {
    devices: IndexMap<String, DeviceInfo>,
}

impl DiscoveredDevices {
    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Returns true if the advertisement added a device.
    pub fn accept(&mut self, advertisement: &Advertisement) -> bool {
        let name = match advertisement.target_name() {
            Some(name) => name,
            None => return false,
        };

        if self.devices.contains_key(&advertisement.id) {
            return false;
        }

        self.devices.insert(advertisement.id.clone(), DeviceInfo {
            id: advertisement.id.clone(),
            name: name.to_string(),
            connected: false,
        });
        true
    }

    /// Marks `id` as the connected device; every other device is marked disconnected.
    pub fn mark_connected(&mut self, id: Option<&str>) {
        for device in self.devices.values_mut() {
            device.connected = Some(device.id.as_str()) == id;
        }
    }

    pub fn to_vec(&self) -> Vec<DeviceInfo> {
        self.devices.values().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Scanning,
    Connecting,
    Connected,
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            ManagerState::Idle => "idle",
            ManagerState::Scanning => "scanning",
            ManagerState::Connecting => "connecting",
            ManagerState::Connected => "connected",
        };

        write!(f, "{}", result)
    }
}
