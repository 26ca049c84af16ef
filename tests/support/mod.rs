#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;

use geto_stepper::device::backend::{AdvertisementStream, BleBackend};
use geto_stepper::device::types::{Advertisement, DeviceInfo, KnownPeripheral};
use geto_stepper::error::DeviceError;
use geto_stepper::store::io::StoreIO;
use geto_stepper::store::settings::SettingsStore;

pub async fn temp_store() -> (tempfile::TempDir, SettingsStore) {
    let dir = tempfile::tempdir().unwrap();
    let io = StoreIO::open(dir.path().join("store.json")).unwrap();
    let store = SettingsStore::load(io).await.unwrap();
    (dir, store)
}

pub fn adv(id: &str, name: Option<&str>) -> Advertisement {
    Advertisement { id: id.to_string(), name: name.map(str::to_string) }
}

pub fn device(id: &str, name: &str) -> DeviceInfo {
    DeviceInfo { id: id.to_string(), name: name.to_string(), connected: false }
}

fn refused() -> DeviceError {
    DeviceError::Btle { source: btleplug::Error::NotConnected }
}

#[derive(Default)]
pub struct FakeState {
    /// peripherals the platform can resolve by id, with their names
    pub known: BTreeMap<String, Option<String>>,
    /// ids of peripherals with a live link
    pub connected: Vec<String>,
    /// sent as soon as the next scan starts
    pub queued: Vec<Result<Advertisement, DeviceError>>,
    pub sender: Option<UnboundedSender<Result<Advertisement, DeviceError>>>,
    pub scans_started: usize,
    pub scans_stopped: usize,
    pub fail_start_scan: bool,
    pub fail_connect: bool,
    pub fail_discover: bool,
    pub fail_cancel: bool,
    pub cancelled: Vec<String>,
}

/// In-memory radio. Handles are peripheral ids.
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn with_devices(devices: &[(&str, &str)]) -> Self {
        let backend = FakeBackend::default();
        {
            let mut state = backend.state();
            for (id, name) in devices {
                state.known.insert(id.to_string(), Some(name.to_string()));
                state.queued.push(Ok(adv(id, Some(name))));
            }
        }
        backend
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn queue(&self, item: Result<Advertisement, DeviceError>) {
        self.state().queued.push(item);
    }

    pub fn advertise(&self, advertisement: Advertisement) {
        let state = self.state();
        let sender = state.sender.as_ref().expect("no scan is running");
        sender.unbounded_send(Ok(advertisement)).unwrap();
    }
}

#[async_trait]
impl BleBackend for FakeBackend {
    type Handle = String;

    async fn start_scan(&self) -> Result<AdvertisementStream, DeviceError> {
        let mut state = self.state();
        if state.fail_start_scan {
            return Err(DeviceError::Btle { source: btleplug::Error::PermissionDenied });
        }

        let (sender, receiver) = unbounded();
        for item in state.queued.drain(..) {
            sender.unbounded_send(item).unwrap();
        }
        state.sender = Some(sender);
        state.scans_started += 1;
        Ok(receiver.boxed())
    }

    async fn stop_scan(&self) -> Result<(), DeviceError> {
        let mut state = self.state();
        state.sender = None;
        state.scans_stopped += 1;
        Ok(())
    }

    async fn peripheral(&self, id: &str) -> Result<Option<String>, DeviceError> {
        Ok(self.state().known.get(id).map(|_| id.to_string()))
    }

    async fn connected_peripherals(&self) -> Result<Vec<KnownPeripheral<String>>, DeviceError> {
        let state = self.state();
        Ok(state.connected.iter()
            .map(|id| KnownPeripheral {
                id: id.clone(),
                name: state.known.get(id).cloned().flatten(),
                handle: id.clone(),
            })
            .collect())
    }

    async fn connect(&self, handle: &String) -> Result<(), DeviceError> {
        let mut state = self.state();
        if state.fail_connect {
            return Err(refused());
        }
        if !state.connected.contains(handle) {
            state.connected.push(handle.clone());
        }
        Ok(())
    }

    async fn discover_services(&self, _handle: &String) -> Result<(), DeviceError> {
        if self.state().fail_discover {
            return Err(refused());
        }
        Ok(())
    }

    async fn cancel_connection(&self, handle: &String) -> Result<(), DeviceError> {
        let mut state = self.state();
        if state.fail_cancel {
            return Err(refused());
        }
        state.connected.retain(|id| id != handle);
        state.cancelled.push(handle.clone());
        Ok(())
    }
}
